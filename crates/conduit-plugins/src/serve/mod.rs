//! Plugin-side request loop.
//!
//! A plugin binary implements [`Plugin`] and hands stdin and stdout to
//! [`serve`], which answers host messages until it receives
//! [`HostMessage::Shutdown`] or stdin reaches end of file.

use std::io::{BufRead, Write};

use thiserror::Error;
use tracing::debug;

use crate::context::{Context, ExecutionDecision};
use crate::descriptor::PluginDescriptor;
use crate::protocol::{HostMessage, PluginReply};

const SERVE_TARGET: &str = "conduit_plugins::serve";

/// Behaviour a plugin provides to the host.
pub trait Plugin {
    /// Returns the plugin's identity, compatibility range and priority.
    fn describe(&self) -> PluginDescriptor;

    /// Decides whether to act on `context`. Must not have side effects.
    fn decide(&self, context: &Context) -> ExecutionDecision;

    /// Transforms `context`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessFailure`] describing why the context could not be
    /// transformed. The host keeps its previous context.
    fn process(&self, context: Context) -> Result<Context, ProcessFailure>;
}

/// A plugin's own report that `process` failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProcessFailure {
    message: String,
}

impl ProcessFailure {
    /// Creates a failure with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors that end the serve loop.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Reading a host message failed.
    #[error("failed to read host message: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Writing a reply failed.
    #[error("failed to write plugin reply: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Serialising a reply failed.
    #[error("failed to serialise plugin reply: {source}")]
    Serialize {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
}

/// Answers host messages from `stdin` on `stdout` until shutdown or EOF.
///
/// Lines that are not valid host messages receive a
/// [`PluginReply::Error`] and the loop continues.
///
/// # Errors
///
/// Returns a [`ServeError`] when stdin cannot be read or a reply cannot be
/// written.
pub fn serve<P: Plugin + ?Sized>(
    plugin: &P,
    stdin: &mut impl BufRead,
    stdout: &mut impl Write,
) -> Result<(), ServeError> {
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = stdin
            .read_line(&mut line)
            .map_err(|source| ServeError::Read { source })?;
        if bytes_read == 0 {
            debug!(target: SERVE_TARGET, "host closed stdin");
            return Ok(());
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<HostMessage>(trimmed) {
            Ok(message) => match dispatch(plugin, message) {
                Some(reply) => reply,
                None => {
                    debug!(target: SERVE_TARGET, "shutdown requested");
                    return Ok(());
                }
            },
            Err(error) => PluginReply::error(format!("invalid host message: {error}")),
        };
        write_reply(stdout, &reply)?;
    }
}

/// Produces the reply for one message, or `None` on shutdown.
fn dispatch<P: Plugin + ?Sized>(plugin: &P, message: HostMessage) -> Option<PluginReply> {
    let reply = match message {
        HostMessage::Describe => PluginReply::Descriptor {
            descriptor: plugin.describe(),
        },
        HostMessage::Decide { context } => PluginReply::Decision {
            decision: plugin.decide(&context),
        },
        HostMessage::Process { context } => match plugin.process(context) {
            Ok(processed) => PluginReply::Context { context: processed },
            Err(failure) => PluginReply::error(failure.message),
        },
        HostMessage::Shutdown => return None,
    };
    Some(reply)
}

fn write_reply(stdout: &mut impl Write, reply: &PluginReply) -> Result<(), ServeError> {
    let payload =
        serde_json::to_string(reply).map_err(|source| ServeError::Serialize { source })?;
    stdout
        .write_all(payload.as_bytes())
        .map_err(|source| ServeError::Write { source })?;
    stdout
        .write_all(b"\n")
        .map_err(|source| ServeError::Write { source })?;
    stdout.flush().map_err(|source| ServeError::Write { source })
}
