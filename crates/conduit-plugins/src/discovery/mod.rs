//! Locating plugin executables.
//!
//! The pipeline only needs `(name, path)` pairs; how they are found is up to
//! a [`PluginDiscovery`] implementation. [`DirectoryScanner`] walks a search
//! path looking for executables whose file name starts with a prefix, and
//! [`StaticDiscovery`] returns a fixed list for embedding and tests.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use conduit_config::Config;
use tracing::{debug, warn};

use crate::error::PluginError;

const DISCOVERY_TARGET: &str = "conduit_plugins::discovery";

/// A plugin executable found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    /// Plugin name with the prefix removed.
    pub name: String,
    /// Path to the executable.
    pub path: PathBuf,
}

impl DiscoveredPlugin {
    /// Creates a discovered plugin entry.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Enumerates candidate plugins.
#[cfg_attr(test, mockall::automock)]
pub trait PluginDiscovery {
    /// Returns every candidate in discovery order.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Discovery`] when candidates cannot be
    /// enumerated at all.
    fn discover(&self) -> Result<Vec<DiscoveredPlugin>, PluginError>;
}

/// Looks up a single plugin by name.
///
/// # Errors
///
/// Propagates discovery failures and returns [`PluginError::NotFound`] when
/// no candidate has the requested name.
pub fn find<D: PluginDiscovery + ?Sized>(
    discovery: &D,
    name: &str,
) -> Result<DiscoveredPlugin, PluginError> {
    discovery
        .discover()?
        .into_iter()
        .find(|plugin| plugin.name == name)
        .ok_or_else(|| PluginError::NotFound {
            name: name.to_owned(),
        })
}

/// Returns a fixed list of plugins.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    plugins: Vec<DiscoveredPlugin>,
}

impl StaticDiscovery {
    /// Creates a discovery source that always yields `plugins`.
    #[must_use]
    pub const fn new(plugins: Vec<DiscoveredPlugin>) -> Self {
        Self { plugins }
    }
}

impl PluginDiscovery for StaticDiscovery {
    fn discover(&self) -> Result<Vec<DiscoveredPlugin>, PluginError> {
        Ok(self.plugins.clone())
    }
}

/// Scans directories for executables named `<prefix><name>`.
///
/// Directories are visited in order and entries within a directory in file
/// name order, so repeated scans of an unchanged tree return the same
/// sequence. Missing or unreadable directories are skipped. A path reached
/// twice is reported once.
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    paths: Vec<PathBuf>,
    prefix: String,
}

impl DirectoryScanner {
    /// Creates a scanner over `paths`.
    #[must_use]
    pub fn new(paths: Vec<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            paths,
            prefix: prefix.into(),
        }
    }

    /// Creates a scanner over the configured search path.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.plugin_search_paths(), config.plugin_prefix.clone())
    }

    /// Returns the directories being scanned.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    fn scan_dir(&self, dir: &Path) -> Result<Vec<DiscoveredPlugin>, PluginError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                warn!(
                    target: DISCOVERY_TARGET,
                    path = %dir.display(),
                    error = %err,
                    "skipping unreadable plugin directory"
                );
                return Ok(Vec::new());
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let dir_entry = entry.map_err(|source| PluginError::Discovery {
                path: dir.to_path_buf(),
                source: Arc::new(source),
            })?;
            names.push(dir_entry.file_name());
        }
        names.sort();

        Ok(names
            .into_iter()
            .filter_map(|os_name| {
                let file_name = os_name.to_str()?;
                let name = self.plugin_name(file_name)?;
                let path = dir.join(file_name);
                is_executable(&path).then(|| DiscoveredPlugin::new(name, path))
            })
            .collect())
    }

    fn plugin_name(&self, file_name: &str) -> Option<String> {
        let stem = if cfg!(windows) {
            file_name.strip_suffix(".exe")?
        } else {
            file_name
        };
        stem.strip_prefix(self.prefix.as_str())
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
    }
}

impl PluginDiscovery for DirectoryScanner {
    fn discover(&self) -> Result<Vec<DiscoveredPlugin>, PluginError> {
        let mut seen = HashSet::new();
        let mut plugins = Vec::new();
        for dir in &self.paths {
            for plugin in self.scan_dir(dir)? {
                let identity = fs::canonicalize(&plugin.path).unwrap_or_else(|_| plugin.path.clone());
                if seen.insert(identity) {
                    debug!(
                        target: DISCOVERY_TARGET,
                        plugin = %plugin.name,
                        path = %plugin.path.display(),
                        "discovered plugin"
                    );
                    plugins.push(plugin);
                }
            }
        }
        Ok(plugins)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .is_ok_and(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.is_file())
}

#[cfg(test)]
mod tests;
