//! Installing plugins from release artefacts.
//!
//! [`PluginInstaller::install`] resolves the requested version, downloads
//! the platform archive into a scratch directory beside the destination,
//! checks its digest according to the [`ChecksumPolicy`], unpacks it there
//! and moves only the plugin executable into place.
//! Plugins that are already present are left alone unless forced.
//! [`PluginInstaller::install_all`] runs a batch through the
//! [`DownloadQueue`]. [`installed_plugins`] and [`remove_plugin`] manage
//! what is already in a plugin directory.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use conduit_config::Config;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveFormat, ArchiveInstaller};
use crate::cancel::CancellationToken;
use crate::checksum::{ChecksumPolicy, verify_detached};
use crate::error::InstallError;
use crate::queue::{DownloadItem, DownloadOutcome, DownloadQueue, QueueProgress};
use crate::release::{
    LATEST, PLUGIN_PREFIX, Platform, ReleaseLocator, archive_name, checksum_url, executable_name,
    parse_latest_release, parse_version_spec,
};
use crate::transport::{DownloadTransport, HttpTransport};

const INSTALLER_TARGET: &str = "conduit_install::installer";

/// Result of installing one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPlugin {
    /// Executable name, always carrying the `plugin-` prefix.
    pub name: String,
    /// Installed version, or `None` when an existing copy was kept.
    pub version: Option<String>,
    /// Path of the plugin executable.
    pub path: PathBuf,
    /// `true` when an existing copy was kept and nothing was downloaded.
    pub skipped: bool,
}

/// Downloads, verifies and unpacks plugins.
#[derive(Debug)]
pub struct PluginInstaller<T> {
    transport: T,
    locator: ReleaseLocator,
    platform: Platform,
    archive: ArchiveInstaller,
    checksums: ChecksumPolicy,
    concurrency: usize,
    force: bool,
}

impl PluginInstaller<HttpTransport> {
    /// Builds an HTTP-backed installer from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::RepositoryNotConfigured`] when no repository
    /// is set, or [`InstallError::Client`] when the HTTP client fails to
    /// initialise.
    pub fn from_config(config: &Config) -> Result<Self, InstallError> {
        let repository = config
            .repository
            .as_deref()
            .ok_or(InstallError::RepositoryNotConfigured)?;
        let transport = HttpTransport::new(config.download_timeout())?;
        Ok(Self::new(transport, ReleaseLocator::new(repository))
            .with_archive_installer(ArchiveInstaller::from_config(config))
            .with_checksum_policy(ChecksumPolicy::from_config(config))
            .with_concurrency(config.download_concurrency()))
    }
}

impl<T: DownloadTransport> PluginInstaller<T> {
    /// Creates an installer with default limits for the current platform.
    #[must_use]
    pub fn new(transport: T, locator: ReleaseLocator) -> Self {
        Self {
            transport,
            locator,
            platform: Platform::current(),
            archive: ArchiveInstaller::default(),
            checksums: ChecksumPolicy::default(),
            concurrency: conduit_config::DEFAULT_PARALLEL_DOWNLOADS,
            force: false,
        }
    }

    /// Targets another platform's archives.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Replaces the archive extractor.
    #[must_use]
    pub const fn with_archive_installer(mut self, archive: ArchiveInstaller) -> Self {
        self.archive = archive;
        self
    }

    /// Sets how checksum failures are treated.
    #[must_use]
    pub const fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.checksums = policy;
        self
    }

    /// Sets how many downloads [`PluginInstaller::install_all`] runs at
    /// once.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Reinstalls plugins that are already present.
    #[must_use]
    pub const fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Downloads and installs one plugin.
    ///
    /// # Errors
    ///
    /// Returns the last transfer error when no candidate URL could be
    /// fetched, a checksum error under [`ChecksumPolicy::Strict`], an
    /// archive error when the artefact cannot be unpacked or lacks the
    /// plugin executable, or [`InstallError::Io`] on filesystem failures.
    pub fn install(&self, item: &DownloadItem) -> Result<InstalledPlugin, InstallError> {
        let executable = executable_name(&item.name);
        let target = item.destination.join(platform_executable(&executable));
        if target.exists() && !self.force {
            info!(
                target: INSTALLER_TARGET,
                plugin = %executable,
                path = %target.display(),
                "plugin already installed; skipping download"
            );
            return Ok(InstalledPlugin {
                name: executable,
                version: None,
                path: target,
                skipped: true,
            });
        }

        let version = self.resolve_version(item)?;
        fs::create_dir_all(&item.destination)
            .map_err(|err| InstallError::io(&item.destination, err))?;
        let scratch = tempfile::Builder::new()
            .prefix(".download-")
            .tempdir_in(&item.destination)
            .map_err(|err| InstallError::io(&item.destination, err))?;
        let artefact = scratch
            .path()
            .join(archive_name(&item.name, &version, &self.platform));

        let url = self.fetch_first(&item.name, &version, &artefact)?;
        self.check_digest(&url, &artefact)?;
        let path =
            self.place_artefact(&executable, &artefact, scratch.path(), &item.destination)?;
        info!(
            target: INSTALLER_TARGET,
            plugin = %executable,
            version = %version,
            path = %path.display(),
            "plugin installed"
        );
        Ok(InstalledPlugin {
            name: executable,
            version: Some(version),
            path,
            skipped: false,
        })
    }

    /// Installs a batch with bounded parallelism.
    ///
    /// Every item yields one outcome, in input order. Failures are logged
    /// and reported per item; they never stop the batch.
    pub fn install_all(
        &self,
        items: Vec<DownloadItem>,
        on_progress: Option<Box<dyn Fn(&QueueProgress) + Send + Sync>>,
        cancellation: CancellationToken,
    ) -> Vec<DownloadOutcome> {
        let mut queue = DownloadQueue::new(self.concurrency).with_cancellation(cancellation);
        for item in items {
            queue.add(item);
        }
        if let Some(observer) = on_progress {
            queue.set_progress_callback(observer);
        }
        queue.execute(|item| self.install(item).map(|_| ()))
    }

    /// Installs a local artefact for `name` into `destination`.
    ///
    /// Archives recognised by [`ArchiveFormat::from_path`] are unpacked in
    /// a scratch directory and only the plugin executable is moved into
    /// `destination`; anything else is taken to be the executable itself.
    /// The result is marked executable.
    ///
    /// # Errors
    ///
    /// Returns an archive error when the artefact cannot be unpacked or
    /// does not provide the plugin, or [`InstallError::Io`] on filesystem
    /// failures. `destination` is left untouched on failure.
    pub fn install_artefact(
        &self,
        name: &str,
        artefact: &Path,
        destination: &Path,
    ) -> Result<PathBuf, InstallError> {
        fs::create_dir_all(destination).map_err(|err| InstallError::io(destination, err))?;
        let scratch = tempfile::Builder::new()
            .prefix(".unpack-")
            .tempdir_in(destination)
            .map_err(|err| InstallError::io(destination, err))?;
        self.place_artefact(name, artefact, scratch.path(), destination)
    }

    /// Stages the plugin executable under `scratch`, then moves it into
    /// `destination`.
    fn place_artefact(
        &self,
        name: &str,
        artefact: &Path,
        scratch: &Path,
        destination: &Path,
    ) -> Result<PathBuf, InstallError> {
        let executable = platform_executable(&executable_name(name));
        let target = destination.join(&executable);
        let staged = if ArchiveFormat::from_path(artefact).is_some() {
            let report = self.archive.extract(artefact, &scratch.join("unpacked"))?;
            debug!(
                target: INSTALLER_TARGET,
                plugin = %executable,
                files = report.files.len(),
                skipped = report.skipped.len(),
                "archive unpacked"
            );
            report
                .files
                .into_iter()
                .find(|path| path.file_name() == Some(OsStr::new(&executable)))
                .ok_or_else(|| InstallError::Archive {
                    path: artefact.to_path_buf(),
                    reason: format!("archive does not contain {executable}"),
                })?
        } else {
            let copy = scratch.join(&executable);
            fs::copy(artefact, &copy).map_err(|err| InstallError::io(&copy, err))?;
            copy
        };
        mark_executable(&staged)?;
        fs::rename(&staged, &target).map_err(|err| InstallError::io(&target, err))?;
        Ok(target)
    }

    fn resolve_version(&self, item: &DownloadItem) -> Result<String, InstallError> {
        let requested = parse_version_spec(&item.version);
        let version = if requested == LATEST {
            let body = self.transport.fetch_text(&self.locator.latest_release_url())?;
            let latest = parse_latest_release(&body)?;
            debug!(
                target: INSTALLER_TARGET,
                plugin = %item.name,
                version = %latest,
                "resolved latest release"
            );
            latest
        } else {
            requested
        };
        semver::Version::parse(&version).map_err(|source| InstallError::InvalidVersion {
            name: item.name.clone(),
            version: version.clone(),
            source,
        })?;
        Ok(version)
    }

    /// Tries each candidate URL in turn and returns the one that worked.
    fn fetch_first(
        &self,
        name: &str,
        version: &str,
        artefact: &Path,
    ) -> Result<String, InstallError> {
        let mut last_error = None;
        for url in self.locator.candidate_urls(name, version, &self.platform) {
            match self.transport.fetch_to_file(&url, artefact) {
                Ok(bytes) => {
                    debug!(target: INSTALLER_TARGET, url = %url, bytes, "artefact fetched");
                    return Ok(url);
                }
                Err(err) => {
                    debug!(target: INSTALLER_TARGET, url = %url, error = %err, "candidate failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| InstallError::Download {
            url: self.locator.repository().to_owned(),
            reason: "no candidate URLs".to_owned(),
        }))
    }

    fn check_digest(&self, url: &str, artefact: &Path) -> Result<(), InstallError> {
        if self.checksums == ChecksumPolicy::Skip {
            return Ok(());
        }
        let result = self
            .transport
            .fetch_text(&checksum_url(url))
            .and_then(|text| verify_detached(artefact, &text));
        match result {
            Ok(()) => {
                debug!(target: INSTALLER_TARGET, url, "checksum verified");
                Ok(())
            }
            Err(err) if self.checksums == ChecksumPolicy::Strict => Err(err),
            Err(err) => {
                warn!(
                    target: INSTALLER_TARGET,
                    url,
                    error = %err,
                    "checksum verification failed; continuing"
                );
                Ok(())
            }
        }
    }
}

/// Lists the plugins installed in `directory`, without their prefix.
///
/// Only regular files named `plugin-*` count. A missing directory holds no
/// plugins.
///
/// # Errors
///
/// Returns [`InstallError::Io`] when the directory cannot be read.
pub fn installed_plugins(directory: &Path) -> Result<Vec<String>, InstallError> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(InstallError::io(directory, err)),
    };
    let mut names = Vec::new();
    for item in entries {
        let entry = item.map_err(|err| InstallError::io(directory, err))?;
        let is_file = entry
            .file_type()
            .map_err(|err| InstallError::io(entry.path(), err))?
            .is_file();
        let file_name = entry.file_name();
        let Some(short) = file_name.to_str().and_then(|name| name.strip_prefix(PLUGIN_PREFIX))
        else {
            continue;
        };
        if is_file {
            let bare = if cfg!(windows) {
                short.strip_suffix(".exe").unwrap_or(short)
            } else {
                short
            };
            names.push(bare.to_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Deletes the executable of plugin `name` from `directory`.
///
/// `name` may be given with or without the `plugin-` prefix. Returns the
/// removed path.
///
/// # Errors
///
/// Returns [`InstallError::Io`] when the plugin is not installed or cannot
/// be deleted.
pub fn remove_plugin(name: &str, directory: &Path) -> Result<PathBuf, InstallError> {
    let path = directory.join(platform_executable(&executable_name(name)));
    fs::remove_file(&path).map_err(|err| InstallError::io(&path, err))?;
    info!(
        target: INSTALLER_TARGET,
        plugin = %executable_name(name),
        path = %path.display(),
        "plugin removed"
    );
    Ok(path)
}

fn platform_executable(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_owned()
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|err| InstallError::io(path, err))
}

#[cfg(not(unix))]
#[expect(
    clippy::unnecessary_wraps,
    reason = "mirrors the unix signature so callers stay platform-neutral"
)]
fn mark_executable(_path: &Path) -> Result<(), InstallError> {
    Ok(())
}
