//! Retrieval of release artefacts.
//!
//! [`DownloadTransport`] is the seam between the installer and the network.
//! [`HttpTransport`] is the production implementation; tests substitute a
//! mock.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use tracing::debug;

use crate::error::InstallError;

const TRANSPORT_TARGET: &str = "conduit_install::transport";

/// Write buffer used while streaming downloads (64 KiB).
const BUFFER_SIZE: usize = 64 * 1024;

const USER_AGENT: &str = concat!("conduit/", env!("CARGO_PKG_VERSION"));

/// Fetches remote resources for the installer.
#[cfg_attr(test, mockall::automock)]
pub trait DownloadTransport: Send + Sync {
    /// Streams the resource at `url` into `destination` and returns the
    /// number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error when the resource cannot be fetched or written.
    fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<u64, InstallError>;

    /// Fetches the resource at `url` as text.
    ///
    /// # Errors
    ///
    /// Returns an error when the resource cannot be fetched or is not
    /// valid UTF-8.
    fn fetch_text(&self, url: &str) -> Result<String, InstallError>;
}

/// Blocking HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Client`] when the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: Duration) -> Result<Self, InstallError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| InstallError::Client {
                reason: err.to_string(),
            })?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Response, InstallError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| InstallError::Download {
                url: url.to_owned(),
                reason: err.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(InstallError::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl DownloadTransport for HttpTransport {
    fn fetch_to_file(&self, url: &str, destination: &Path) -> Result<u64, InstallError> {
        let mut response = self.get(url)?;
        let file = File::create(destination).map_err(|err| InstallError::io(destination, err))?;
        let mut writer = BufWriter::with_capacity(BUFFER_SIZE, file);
        let written = io::copy(&mut response, &mut writer).map_err(|err| InstallError::Download {
            url: url.to_owned(),
            reason: err.to_string(),
        })?;
        writer
            .flush()
            .map_err(|err| InstallError::io(destination, err))?;
        debug!(target: TRANSPORT_TARGET, url, bytes = written, "download complete");
        Ok(written)
    }

    fn fetch_text(&self, url: &str) -> Result<String, InstallError> {
        self.get(url)?
            .text()
            .map_err(|err| InstallError::Download {
                url: url.to_owned(),
                reason: err.to_string(),
            })
    }
}
