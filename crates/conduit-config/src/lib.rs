//! Configuration and telemetry for Conduit.
//!
//! [`Config`] is the single explicit configuration record passed into the
//! pipeline and installer constructors. It is layered by `ortho_config` from
//! defaults, configuration files, `CONDUIT_*` environment variables and
//! command-line flags, in increasing order of precedence.

use std::path::PathBuf;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod logging;
pub mod telemetry;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_ENTRY_BYTES, DEFAULT_PARALLEL_DOWNLOADS,
    DEFAULT_PLUGIN_PREFIX, MAX_PARALLEL_DOWNLOADS, PLUGIN_PATH_ENV, default_plugin_paths,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use telemetry::{TelemetryError, TelemetryHandle};

/// Runtime configuration shared by the pipeline and the installer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "CONDUIT")]
pub struct Config {
    /// `tracing-subscriber` filter expression.
    #[ortho_config(default = defaults::default_log_filter())]
    pub log_filter: String,
    /// Output format for log events.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Extra plugin directories searched after the defaults.
    #[serde(default)]
    #[ortho_config(merge_strategy = "append")]
    pub plugin_paths: Vec<String>,
    /// File name prefix identifying plugin executables.
    #[ortho_config(default = defaults::default_plugin_prefix())]
    pub plugin_prefix: String,
    /// Directory that installed plugins are extracted into.
    #[ortho_config(default = defaults::default_install_dir())]
    pub install_dir: PathBuf,
    /// Requested number of concurrent downloads; see
    /// [`Config::download_concurrency`].
    #[ortho_config(default = defaults::DEFAULT_PARALLEL_DOWNLOADS)]
    pub parallel_downloads: usize,
    /// Skips detached checksum verification entirely.
    #[serde(default)]
    pub skip_checksums: bool,
    /// Turns a checksum failure into an install failure instead of a warning.
    #[serde(default)]
    pub strict_checksums: bool,
    /// Largest file an archive entry may expand to.
    #[ortho_config(default = defaults::DEFAULT_MAX_ENTRY_BYTES)]
    pub max_entry_bytes: u64,
    /// Release repository in `owner/name` form.
    #[serde(default)]
    pub repository: Option<String>,
    /// Timeout applied to each HTTP transfer, in seconds.
    #[ortho_config(default = defaults::DEFAULT_DOWNLOAD_TIMEOUT_SECS)]
    pub download_timeout_secs: u64,
    /// Grace period granted to a plugin process after shutdown, in
    /// milliseconds.
    #[ortho_config(default = defaults::DEFAULT_SHUTDOWN_GRACE_MS)]
    pub shutdown_grace_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: defaults::default_log_filter(),
            log_format: defaults::default_log_format(),
            plugin_paths: Vec::new(),
            plugin_prefix: defaults::default_plugin_prefix(),
            install_dir: defaults::default_install_dir(),
            parallel_downloads: DEFAULT_PARALLEL_DOWNLOADS,
            skip_checksums: false,
            strict_checksums: false,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
            repository: None,
            download_timeout_secs: defaults::DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            shutdown_grace_ms: defaults::DEFAULT_SHUTDOWN_GRACE_MS,
        }
    }
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the configured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns every directory searched for plugins, in lookup order.
    ///
    /// The default search path comes first and configured directories are
    /// appended to it.
    #[must_use]
    pub fn plugin_search_paths(&self) -> Vec<PathBuf> {
        let mut paths = default_plugin_paths();
        paths.extend(self.plugin_paths.iter().map(PathBuf::from));
        paths
    }

    /// Returns the download concurrency, clamped to
    /// `1..=`[`MAX_PARALLEL_DOWNLOADS`].
    #[must_use]
    pub fn download_concurrency(&self) -> usize {
        self.parallel_downloads.clamp(1, MAX_PARALLEL_DOWNLOADS)
    }

    /// Returns the HTTP transfer timeout.
    #[must_use]
    pub const fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Returns the plugin shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
