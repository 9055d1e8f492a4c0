//! Plugin pipeline for Conduit.
//!
//! The `conduit-plugins` crate runs a chain of independently executing
//! plugin processes that cooperatively enrich a shared [`Context`] in
//! response to one [`Event`].
//!
//! # Architecture
//!
//! A [`Pipeline`] asks a [`PluginDiscovery`] source for candidates, loads
//! each through a [`PluginLoader`] into a [`PluginHandle`], sorts the handles
//! by [`PluginDescriptor::priority`] and drives the event through them one
//! at a time. Each handle first decides whether to act and, if it does,
//! processes the context. Failures stay with the plugin that caused them.
//!
//! The production loader, [`ProcessLoader`], spawns each plugin executable
//! once per run and talks to it over a line-delimited JSON
//! [`protocol`]. Plugin binaries implement [`Plugin`] and call
//! [`serve`](crate::serve::serve).
//!
//! # Example
//!
//! ```rust,no_run
//! use conduit_config::Config;
//! use conduit_plugins::Pipeline;
//!
//! let pipeline = Pipeline::from_config(&Config::default());
//! let context = pipeline
//!     .run_message("slack", "convert this video and upload it", "u-42", "general")
//!     .expect("plugins can be enumerated");
//! for response in context.responses() {
//!     println!("{}: {}", response.plugin_name, response.content);
//! }
//! ```

pub mod context;
pub mod descriptor;
pub mod discovery;
pub mod error;
pub mod event;
pub mod handle;
pub mod loader;
pub mod local;
pub mod pipeline;
pub mod process;
pub mod protocol;
pub mod serve;
pub mod value;

#[cfg(test)]
mod tests;

pub use self::context::{Context, ExecutionDecision, Properties, Response};
pub use self::descriptor::{HOST_VERSION, PluginDescriptor};
pub use self::discovery::{
    DirectoryScanner, DiscoveredPlugin, PluginDiscovery, StaticDiscovery, find,
};
pub use self::error::PluginError;
pub use self::event::{Event, EventType};
pub use self::handle::PluginHandle;
pub use self::loader::{PluginLoader, ProcessLoader};
pub use self::local::LocalPluginHandle;
pub use self::pipeline::Pipeline;
pub use self::process::ProcessPluginHandle;
pub use self::serve::{Plugin, ProcessFailure, ServeError, serve};
pub use self::value::PropertyValue;
