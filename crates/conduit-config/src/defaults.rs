//! Default values shared by the configuration layer.

use std::env;
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// File name prefix that marks an executable as a plugin.
pub const DEFAULT_PLUGIN_PREFIX: &str = "plugin-";

/// Directory plugins are installed into, relative to the working directory.
pub const DEFAULT_INSTALL_DIR: &str = ".plugins";

/// Number of concurrent downloads used when none is configured.
pub const DEFAULT_PARALLEL_DOWNLOADS: usize = 4;

/// Upper bound on concurrent downloads.
pub const MAX_PARALLEL_DOWNLOADS: usize = 10;

/// Per-entry extraction cap for plugin archives (100 MiB).
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 100 * 1024 * 1024;

/// Timeout applied to each HTTP transfer.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Time a plugin process is given to exit after a shutdown request.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 500;

/// Environment variable holding extra plugin directories, separated like
/// `PATH`.
pub const PLUGIN_PATH_ENV: &str = "CONDUIT_PLUGIN_PATH";

/// System-wide plugin directory on Unix hosts.
#[cfg(unix)]
const SYSTEM_PLUGIN_DIR: &str = "/usr/local/lib/plugins";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned plugin prefix.
#[must_use]
pub fn default_plugin_prefix() -> String {
    DEFAULT_PLUGIN_PREFIX.to_owned()
}

/// Default install directory.
#[must_use]
pub fn default_install_dir() -> PathBuf {
    PathBuf::from(DEFAULT_INSTALL_DIR)
}

/// Computes the default plugin search path.
///
/// Directories are returned in lookup order: the per-user data directory,
/// `./plugins`, `./.plugins`, every entry of [`PLUGIN_PATH_ENV`], then the
/// system directory. Missing directories are not filtered here; scanners skip
/// them.
#[must_use]
pub fn default_plugin_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(data) = dirs::data_local_dir() {
        paths.push(data.join("plugins"));
    }
    if let Ok(cwd) = env::current_dir() {
        paths.push(cwd.join("plugins"));
        paths.push(cwd.join(DEFAULT_INSTALL_DIR));
    }
    if let Some(extra) = env::var_os(PLUGIN_PATH_ENV) {
        paths.extend(env::split_paths(&extra).filter(|path| !path.as_os_str().is_empty()));
    }
    #[cfg(unix)]
    paths.push(PathBuf::from(SYSTEM_PLUGIN_DIR));
    paths
}
