//! The capability the pipeline drives for each loaded plugin.

use crate::context::{Context, ExecutionDecision};
use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;

/// A live plugin: one spawned process (or in-process adapter) and its three
/// remote operations.
///
/// Implementations absorb transport failures in [`decide`](Self::decide) and
/// [`describe`](Self::describe) so a broken plugin is skipped or sorted last
/// rather than aborting the run. Only [`process`](Self::process) reports
/// errors, and the caller keeps its own copy of the context when it does.
pub trait PluginHandle {
    /// Name the handle was loaded under, used in logs.
    fn name(&self) -> &str;

    /// Asks whether the plugin wants to act on `context`.
    ///
    /// A failure to reach the plugin yields a declining decision whose
    /// reason carries the error text.
    fn decide(&mut self, context: &Context) -> ExecutionDecision;

    /// Asks the plugin to transform `context`.
    ///
    /// # Errors
    ///
    /// Returns a [`PluginError`] when the plugin fails or cannot be reached.
    fn process(&mut self, context: &Context) -> Result<Context, PluginError>;

    /// Returns the plugin's descriptor, or
    /// [`PluginDescriptor::unavailable`] when it cannot be obtained.
    fn describe(&mut self) -> PluginDescriptor;

    /// Releases the plugin. Calls after the first are no-ops.
    fn teardown(&mut self);
}
