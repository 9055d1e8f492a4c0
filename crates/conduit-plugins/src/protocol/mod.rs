//! Line-delimited JSON protocol between the host and a plugin process.
//!
//! A plugin process stays alive for a whole pipeline run. The host writes one
//! [`HostMessage`] per line to the plugin's stdin and reads exactly one
//! [`PluginReply`] line back from stdout before sending the next message.
//! [`HostMessage::Shutdown`] is the only message without a reply. Plugin
//! stderr is inherited and is not part of the protocol.
//!
//! # Example
//!
//! ```
//! use conduit_plugins::protocol::{HostMessage, PluginReply};
//! use conduit_plugins::ExecutionDecision;
//!
//! let line = serde_json::to_string(&HostMessage::Describe).unwrap();
//! assert_eq!(line, r#"{"op":"describe"}"#);
//!
//! let reply: PluginReply =
//!     serde_json::from_str(r#"{"kind":"decision","decision":{"should_execute":false,"reason":"idle"}}"#)
//!         .unwrap();
//! assert_eq!(
//!     reply,
//!     PluginReply::Decision { decision: ExecutionDecision::decline("idle") }
//! );
//! ```

use serde::{Deserialize, Serialize};

use crate::context::{Context, ExecutionDecision};
use crate::descriptor::PluginDescriptor;

/// Message written by the host to a plugin's stdin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostMessage {
    /// Requests the plugin's [`PluginDescriptor`].
    Describe,
    /// Asks whether the plugin wants to act on the context.
    Decide {
        /// Current context, read-only for the plugin.
        context: Context,
    },
    /// Asks the plugin to transform the context.
    Process {
        /// Current context.
        context: Context,
    },
    /// Tells the plugin to exit. No reply is expected.
    Shutdown,
}

impl HostMessage {
    /// Short operation name used in logs and errors.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::Describe => "describe",
            Self::Decide { .. } => "decide",
            Self::Process { .. } => "process",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Reply written by a plugin to its stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PluginReply {
    /// Answer to [`HostMessage::Describe`].
    Descriptor {
        /// Plugin identity and compatibility.
        descriptor: PluginDescriptor,
    },
    /// Answer to [`HostMessage::Decide`].
    Decision {
        /// The plugin's verdict.
        decision: ExecutionDecision,
    },
    /// Answer to [`HostMessage::Process`].
    Context {
        /// The transformed context.
        context: Context,
    },
    /// The plugin could not handle the message.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl PluginReply {
    /// Builds an error reply.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Short reply kind used in logs and errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Descriptor { .. } => "descriptor",
            Self::Decision { .. } => "decision",
            Self::Context { .. } => "context",
            Self::Error { .. } => "error",
        }
    }
}
