//! SHA-256 verification of downloaded artefacts.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use conduit_config::Config;
use sha2::{Digest, Sha256};

use crate::error::InstallError;

/// Read buffer used while hashing (64 KiB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// How checksum problems affect an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Do not fetch or check digests.
    Skip,
    /// Check digests but only log failures.
    #[default]
    Warn,
    /// Reject artefacts whose digest is missing or wrong.
    Strict,
}

impl ChecksumPolicy {
    /// Derives the policy from configuration. Skipping wins over strictness.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        if config.skip_checksums {
            Self::Skip
        } else if config.strict_checksums {
            Self::Strict
        } else {
            Self::Warn
        }
    }
}

/// Computes the lowercase hex SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns [`InstallError::Io`] when the file cannot be read.
pub fn calculate_file_checksum(path: &Path) -> Result<String, InstallError> {
    let file = File::open(path).map_err(|err| InstallError::io(path, err))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher).map_err(|err| InstallError::io(path, err))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Checks that the file at `path` hashes to `expected`.
///
/// The comparison ignores ASCII case.
///
/// # Errors
///
/// Returns [`InstallError::ChecksumMismatch`] when the digests differ, or
/// [`InstallError::Io`] when the file cannot be read.
pub fn verify_checksum(path: &Path, expected: &str) -> Result<(), InstallError> {
    let actual = calculate_file_checksum(path)?;
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }
    Err(InstallError::ChecksumMismatch {
        filename: path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned(),
        expected: expected.to_owned(),
        actual,
    })
}

/// Extracts the digest from a `.sha256` resource.
///
/// Accepts the bare digest or the `<digest>  <filename>` layout written by
/// `sha256sum`. Only the first non-blank line is read.
///
/// # Errors
///
/// Returns [`InstallError::InvalidChecksumFile`] when no well-formed digest
/// is present.
pub fn parse_checksum_file(contents: &str) -> Result<String, InstallError> {
    let token = contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.split_whitespace().next())
        .ok_or_else(|| InstallError::InvalidChecksumFile {
            reason: "checksum file is empty".to_owned(),
        })?;
    if token.len() != DIGEST_HEX_LEN || !token.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(InstallError::InvalidChecksumFile {
            reason: format!("'{token}' is not a SHA-256 digest"),
        });
    }
    Ok(token.to_ascii_lowercase())
}

/// Verifies `archive` against the contents of its detached `.sha256`
/// resource.
///
/// # Errors
///
/// Returns [`InstallError::InvalidChecksumFile`] when `checksum_text` holds
/// no digest, otherwise the errors of [`verify_checksum`].
pub fn verify_detached(archive: &Path, checksum_text: &str) -> Result<(), InstallError> {
    let expected = parse_checksum_file(checksum_text)?;
    verify_checksum(archive, &expected)
}
