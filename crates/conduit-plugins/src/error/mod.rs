//! Domain errors raised by plugin operations.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! to satisfy the `result_large_err` Clippy lint.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors arising from plugin discovery, loading and execution.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The plugin search path could not be enumerated.
    #[error("failed to enumerate plugins in {path}: {source}")]
    Discovery {
        /// Directory being scanned.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// No plugin with the requested name was discovered.
    #[error("plugin '{name}' not found")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },

    /// The plugin process could not be spawned.
    #[error("plugin '{name}' failed to start: {message}")]
    SpawnFailed {
        /// Plugin name.
        name: String,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// The plugin declared a host version range that excludes this host.
    #[error("plugin '{name}' requires host {min}..={max}, running {host}")]
    Incompatible {
        /// Plugin name.
        name: String,
        /// Host version being checked.
        host: String,
        /// Declared minimum, or `*` when unbounded.
        min: String,
        /// Declared maximum, or `*` when unbounded.
        max: String,
    },

    /// A version string could not be parsed.
    #[error("plugin '{name}' declared an invalid {field} '{value}': {source}")]
    InvalidVersion {
        /// Plugin name.
        name: String,
        /// Which descriptor field held the value.
        field: &'static str,
        /// Offending text.
        value: String,
        /// Parser error.
        #[source]
        source: semver::Error,
    },

    /// A host message could not be serialised to JSON.
    #[error("failed to serialise plugin message: {0}")]
    SerializeMessage(#[source] serde_json::Error),

    /// A plugin reply could not be deserialised from JSON.
    #[error("plugin '{name}' sent an unreadable reply: {message}")]
    DeserializeReply {
        /// Plugin name.
        name: String,
        /// Human-readable description of the parse failure.
        message: String,
        /// Optional underlying JSON error.
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The plugin produced output that does not conform to the protocol.
    #[error("plugin '{name}' wrote invalid output: {message}")]
    InvalidOutput {
        /// Plugin name.
        name: String,
        /// Description of the protocol violation.
        message: String,
    },

    /// The plugin reported a failure of its own.
    #[error("plugin '{name}' failed: {message}")]
    Remote {
        /// Plugin name.
        name: String,
        /// Message reported by the plugin.
        message: String,
    },

    /// A returned context dropped state it was handed.
    #[error("plugin '{name}' violated the context contract: {message}")]
    ContractViolation {
        /// Plugin name.
        name: String,
        /// Which part of the context was lost.
        message: String,
    },

    /// The handle was used after teardown.
    #[error("plugin '{name}' has already been torn down")]
    TornDown {
        /// Plugin name.
        name: String,
    },

    /// An I/O error occurred while communicating with the plugin process.
    #[error("I/O error communicating with plugin '{name}': {source}")]
    Io {
        /// Plugin name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl PluginError {
    /// Wraps an I/O error raised while talking to `name`.
    pub(crate) fn io(name: &str, err: std::io::Error) -> Self {
        Self::Io {
            name: name.to_owned(),
            source: Arc::new(err),
        }
    }
}
