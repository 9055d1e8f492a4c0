//! Turning discovered plugins into live handles.

use std::time::Duration;

use conduit_config::Config;
use tracing::debug;

use crate::descriptor::HOST_VERSION;
use crate::discovery::DiscoveredPlugin;
use crate::error::PluginError;
use crate::handle::PluginHandle;
use crate::process::ProcessPluginHandle;

const LOADER_TARGET: &str = "conduit_plugins::loader";

/// Loads a discovered plugin into a [`PluginHandle`].
///
/// Closures with the matching signature implement this trait, which keeps
/// test loaders short:
///
/// ```
/// use conduit_plugins::{DiscoveredPlugin, PluginError, PluginHandle, PluginLoader};
///
/// let loader = |plugin: &DiscoveredPlugin| -> Result<Box<dyn PluginHandle>, PluginError> {
///     Err(PluginError::NotFound { name: plugin.name.clone() })
/// };
/// assert!(loader.load(&DiscoveredPlugin::new("x", "/bin/x")).is_err());
/// ```
pub trait PluginLoader {
    /// Loads `plugin`.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] when the plugin cannot be started or is not
    /// compatible with this host.
    fn load(&self, plugin: &DiscoveredPlugin) -> Result<Box<dyn PluginHandle>, PluginError>;
}

impl<F> PluginLoader for F
where
    F: Fn(&DiscoveredPlugin) -> Result<Box<dyn PluginHandle>, PluginError>,
{
    fn load(&self, plugin: &DiscoveredPlugin) -> Result<Box<dyn PluginHandle>, PluginError> {
        self(plugin)
    }
}

/// Spawns plugin processes and checks their declared host range.
#[derive(Debug, Clone)]
pub struct ProcessLoader {
    host_version: String,
    grace: Duration,
}

impl ProcessLoader {
    /// Creates a loader that checks plugins against `host_version`.
    #[must_use]
    pub fn new(host_version: impl Into<String>, grace: Duration) -> Self {
        Self {
            host_version: host_version.into(),
            grace,
        }
    }

    /// Creates a loader for this host's version and the configured grace
    /// period.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(HOST_VERSION, config.shutdown_grace())
    }

    /// Returns the host version plugins are checked against.
    #[must_use]
    pub fn host_version(&self) -> &str {
        &self.host_version
    }
}

impl PluginLoader for ProcessLoader {
    fn load(&self, plugin: &DiscoveredPlugin) -> Result<Box<dyn PluginHandle>, PluginError> {
        let mut handle = ProcessPluginHandle::spawn(plugin, self.grace)?;
        let descriptor = handle.describe();
        if let Err(err) = descriptor.check_compatible(&self.host_version) {
            handle.teardown();
            return Err(err);
        }
        debug!(
            target: LOADER_TARGET,
            plugin = %plugin.name,
            version = %descriptor.version,
            priority = descriptor.priority,
            "plugin loaded"
        );
        Ok(Box::new(handle))
    }
}
