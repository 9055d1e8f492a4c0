//! Drives one event through every loaded plugin.
//!
//! A run discovers candidates, loads each into a [`PluginHandle`], orders
//! them by ascending priority (ties keep discovery order) and then visits
//! them one at a time: `decide`, and on acceptance `process`. A plugin that
//! fails to load, declines, errors or returns a context that lost state is
//! logged and passed over; the run carries on with the last good context.
//! Every loaded handle is torn down exactly once before the run returns,
//! including when a plugin panics.
//!
//! Plugins run sequentially because later plugins read properties written
//! by earlier ones.

use conduit_config::Config;
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::descriptor::PluginDescriptor;
use crate::discovery::{DirectoryScanner, PluginDiscovery};
use crate::error::PluginError;
use crate::event::Event;
use crate::handle::PluginHandle;
use crate::loader::{PluginLoader, ProcessLoader};

const PIPELINE_TARGET: &str = "conduit_plugins::pipeline";

/// A loaded handle with its descriptor cached for the run.
struct LoadedPlugin {
    label: String,
    descriptor: PluginDescriptor,
    handle: Box<dyn PluginHandle>,
}

/// Owns the handles of one run and tears each down exactly once.
#[derive(Default)]
struct LoadedPlugins {
    plugins: Vec<LoadedPlugin>,
}

impl LoadedPlugins {
    fn push(&mut self, mut handle: Box<dyn PluginHandle>) {
        let descriptor = handle.describe();
        let label = if descriptor.name.is_empty() {
            handle.name().to_owned()
        } else {
            descriptor.name.clone()
        };
        self.plugins.push(LoadedPlugin {
            label,
            descriptor,
            handle,
        });
    }

    /// Stable sort: equal priorities keep discovery order.
    fn sort_by_priority(&mut self) {
        self.plugins.sort_by_key(|plugin| plugin.descriptor.priority);
    }

    fn teardown_all(&mut self) {
        for mut plugin in self.plugins.drain(..) {
            plugin.handle.teardown();
            debug!(target: PIPELINE_TARGET, plugin = %plugin.label, "plugin released");
        }
    }
}

impl Drop for LoadedPlugins {
    fn drop(&mut self) {
        self.teardown_all();
    }
}

/// Runs events through discovered plugins.
///
/// # Example
///
/// ```
/// use conduit_plugins::{
///     DiscoveredPlugin, Event, Pipeline, PluginError, PluginHandle, StaticDiscovery,
/// };
///
/// let loader = |plugin: &DiscoveredPlugin| -> Result<Box<dyn PluginHandle>, PluginError> {
///     Err(PluginError::NotFound { name: plugin.name.clone() })
/// };
/// let pipeline = Pipeline::new(StaticDiscovery::default(), loader);
/// let context = pipeline.run(Event::message("cli", "hello", "me", "here")).unwrap();
/// assert!(context.responses().is_empty());
/// ```
#[derive(Debug)]
pub struct Pipeline<D, L> {
    discovery: D,
    loader: L,
}

impl Pipeline<DirectoryScanner, ProcessLoader> {
    /// Creates a pipeline that scans the configured search path and spawns
    /// plugin processes.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            DirectoryScanner::from_config(config),
            ProcessLoader::from_config(config),
        )
    }
}

impl<D, L> Pipeline<D, L> {
    /// Creates a pipeline from a discovery source and a loader.
    #[must_use]
    pub const fn new(discovery: D, loader: L) -> Self {
        Self { discovery, loader }
    }
}

impl<D: PluginDiscovery, L: PluginLoader> Pipeline<D, L> {
    /// Runs `event` through every loadable plugin and returns the final
    /// context.
    ///
    /// # Errors
    ///
    /// Returns the discovery error when plugins cannot be enumerated. No
    /// other failure aborts a run.
    pub fn run(&self, event: Event) -> Result<Context, PluginError> {
        let discovered = self.discovery.discover()?;

        let mut loaded = LoadedPlugins::default();
        for candidate in &discovered {
            debug!(
                target: PIPELINE_TARGET,
                plugin = %candidate.name,
                path = %candidate.path.display(),
                "loading plugin"
            );
            match self.loader.load(candidate) {
                Ok(handle) => loaded.push(handle),
                Err(err) => info!(
                    target: PIPELINE_TARGET,
                    plugin = %candidate.name,
                    error = %err,
                    "plugin failed to load, leaving it out of this run"
                ),
            }
        }
        loaded.sort_by_priority();

        let mut context = Context::new(event);
        for plugin in &mut loaded.plugins {
            context = step(plugin, context);
        }

        loaded.teardown_all();
        Ok(context)
    }

    /// Runs a message event built from its parts.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub fn run_message(
        &self,
        source: &str,
        content: &str,
        user_id: &str,
        channel_id: &str,
    ) -> Result<Context, PluginError> {
        self.run(Event::message(source, content, user_id, channel_id))
    }

    /// Runs a command event built from its parts.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub fn run_command(
        &self,
        source: &str,
        command: &str,
        user_id: &str,
        channel_id: &str,
    ) -> Result<Context, PluginError> {
        self.run(Event::command(source, command, user_id, channel_id))
    }
}

/// Visits one plugin and returns the context to carry forward.
fn step(plugin: &mut LoadedPlugin, context: Context) -> Context {
    let label = plugin.label.as_str();
    info!(
        target: PIPELINE_TARGET,
        plugin = label,
        priority = plugin.descriptor.priority,
        "checking plugin"
    );

    let decision = plugin.handle.decide(&context);
    if !decision.should_execute() {
        info!(
            target: PIPELINE_TARGET,
            plugin = label,
            reason = decision.reason(),
            "plugin skipped"
        );
        return context;
    }

    info!(target: PIPELINE_TARGET, plugin = label, "executing plugin");
    let outcome = plugin.handle.process(&context).and_then(|next| {
        next.check_extends(&context)
            .map(|()| next)
            .map_err(|message| PluginError::ContractViolation {
                name: label.to_owned(),
                message,
            })
    });

    match outcome {
        Ok(next) => {
            info!(target: PIPELINE_TARGET, plugin = label, "plugin executed successfully");
            next
        }
        Err(err) => {
            warn!(
                target: PIPELINE_TARGET,
                plugin = label,
                error = %err,
                "plugin execution failed, keeping previous context"
            );
            context
        }
    }
}
