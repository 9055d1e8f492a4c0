//! Plugin installation for Conduit.
//!
//! The `conduit-install` crate fetches plugin release archives, checks
//! their digests and installs the plugin executables into a plugin directory.
//!
//! # Architecture
//!
//! - [`Bulkhead`] caps how many tasks run at once and admits waiters in
//!   arrival order.
//! - [`DownloadQueue`] runs a batch of [`DownloadItem`]s through a
//!   caller-supplied function, one worker per item, gated by a bulkhead and
//!   stoppable through a [`CancellationToken`].
//! - [`ArchiveInstaller`] unpacks `.tar.gz` and `.zip` archives, refusing
//!   entries that would escape the destination or exceed the size cap.
//! - [`checksum`] verifies SHA-256 digests published beside each archive.
//! - [`PluginInstaller`] ties these together over a [`DownloadTransport`],
//!   locating artefacts with a [`ReleaseLocator`]. [`installed_plugins`]
//!   and [`remove_plugin`] manage an existing plugin directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use conduit_config::Config;
//! use conduit_install::{CancellationToken, DownloadItem, PluginInstaller};
//!
//! let config = Config {
//!     repository: Some("acme/conduit-plugins".to_owned()),
//!     ..Config::default()
//! };
//! let installer = PluginInstaller::from_config(&config).expect("installer");
//! let items = vec![DownloadItem::new("filter", "latest", &config.install_dir)];
//! for outcome in installer.install_all(items, None, CancellationToken::new()) {
//!     println!("{}: {:?}", outcome.name, outcome.error);
//! }
//! ```

pub mod archive;
pub mod bulkhead;
pub mod cancel;
pub mod checksum;
pub mod error;
pub mod installer;
pub mod queue;
pub mod release;
pub mod transport;

#[cfg(test)]
mod tests;

pub use self::archive::{
    ArchiveFormat, ArchiveInstaller, ExtractionReport, SkipReason, SkippedEntry,
};
pub use self::bulkhead::{Bulkhead, TaskResult};
pub use self::cancel::CancellationToken;
pub use self::checksum::{
    ChecksumPolicy, calculate_file_checksum, parse_checksum_file, verify_checksum,
    verify_detached,
};
pub use self::error::InstallError;
pub use self::installer::{InstalledPlugin, PluginInstaller, installed_plugins, remove_plugin};
pub use self::queue::{DownloadItem, DownloadOutcome, DownloadQueue, QueueProgress};
pub use self::release::{Platform, ReleaseLocator, parse_version_spec};
pub use self::transport::{DownloadTransport, HttpTransport};
