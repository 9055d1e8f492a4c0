//! In-process plugin handles.

use crate::context::{Context, ExecutionDecision};
use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::handle::PluginHandle;
use crate::serve::Plugin;

/// Adapts a [`Plugin`] implementation into a [`PluginHandle`] without
/// spawning a process.
///
/// Useful for embedding plugins that ship with the host and for tests. After
/// teardown the handle declines every decision and refuses to process.
#[derive(Debug)]
pub struct LocalPluginHandle<P> {
    name: String,
    plugin: P,
    torn_down: bool,
}

impl<P: Plugin> LocalPluginHandle<P> {
    /// Wraps `plugin`, naming the handle after its descriptor.
    #[must_use]
    pub fn new(plugin: P) -> Self {
        let name = plugin.describe().name;
        Self {
            name,
            plugin,
            torn_down: false,
        }
    }

    /// Reports whether teardown has run.
    #[must_use]
    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl<P: Plugin> PluginHandle for LocalPluginHandle<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn decide(&mut self, context: &Context) -> ExecutionDecision {
        if self.torn_down {
            return ExecutionDecision::decline(
                PluginError::TornDown {
                    name: self.name.clone(),
                }
                .to_string(),
            );
        }
        self.plugin.decide(context)
    }

    fn process(&mut self, context: &Context) -> Result<Context, PluginError> {
        if self.torn_down {
            return Err(PluginError::TornDown {
                name: self.name.clone(),
            });
        }
        self.plugin
            .process(context.clone())
            .map_err(|failure| PluginError::Remote {
                name: self.name.clone(),
                message: failure.message().to_owned(),
            })
    }

    fn describe(&mut self) -> PluginDescriptor {
        self.plugin.describe()
    }

    fn teardown(&mut self) {
        self.torn_down = true;
    }
}
