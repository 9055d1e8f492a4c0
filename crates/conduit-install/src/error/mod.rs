//! Errors raised while downloading and installing plugins.
//!
//! I/O errors are wrapped in `Arc` to keep the enum small and shareable
//! across worker threads.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors arising from the install subsystem.
#[derive(Debug, Error)]
pub enum InstallError {
    /// A transfer could not be completed.
    #[error("download of {url} failed: {reason}")]
    Download {
        /// URL being fetched.
        url: String,
        /// Human-readable failure description.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("download of {url} failed with HTTP {status}")]
    HttpStatus {
        /// URL being fetched.
        url: String,
        /// Status code returned.
        status: u16,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {reason}")]
    Client {
        /// Description of the builder failure.
        reason: String,
    },

    /// No release repository was configured.
    #[error("no release repository configured")]
    RepositoryNotConfigured,

    /// A requested version could not be parsed.
    #[error("invalid version '{version}' for plugin '{name}': {source}")]
    InvalidVersion {
        /// Plugin name.
        name: String,
        /// Offending version text.
        version: String,
        /// Parser error.
        #[source]
        source: semver::Error,
    },

    /// The latest release could not be determined.
    #[error("could not resolve the latest release: {reason}")]
    LatestRelease {
        /// Description of the failure.
        reason: String,
    },

    /// The item was cancelled before its transfer began.
    #[error("download of '{name}' was cancelled")]
    Cancelled {
        /// Item name.
        name: String,
    },

    /// A worker panicked while handling the item.
    #[error("worker for '{name}' panicked")]
    WorkerPanicked {
        /// Item name.
        name: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The archive could not be read.
    #[error("failed to read archive {}: {reason}", path.display())]
    Archive {
        /// Archive path.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// An archive entry exceeds the per-entry size cap.
    #[error("archive entry '{entry}' exceeds the {limit}-byte limit")]
    EntryTooLarge {
        /// Entry name as recorded in the archive.
        entry: String,
        /// Configured cap in bytes.
        limit: u64,
    },

    /// A file did not match its expected digest.
    #[error("checksum mismatch for {filename}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// File that was hashed.
        filename: String,
        /// Digest from the checksum resource.
        expected: String,
        /// Digest of the local file.
        actual: String,
    },

    /// The checksum resource did not contain a usable digest.
    #[error("invalid checksum file: {reason}")]
    InvalidChecksumFile {
        /// Description of the problem.
        reason: String,
    },
}

impl InstallError {
    /// Wraps an I/O error raised at `path`.
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(err),
        }
    }

    /// Reports whether the error came from cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
