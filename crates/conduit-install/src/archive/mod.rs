//! Safe extraction of plugin archives.
//!
//! Gzip-compressed tar and zip archives are supported. Entry names are
//! checked before anything touches the disk: names containing `..`,
//! absolute names and names whose joined path leaves the destination are
//! skipped. Regular files are capped at a configurable size and an
//! oversized entry fails the extraction instead of being truncated. Only
//! directories and regular files are materialised, and only the `0o777`
//! permission bits survive.
//!
//! Entries are unpacked into a hidden staging directory inside the
//! destination and moved into place once the whole archive has been read.
//! A failed extraction leaves the destination as it was.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

use conduit_config::{Config, DEFAULT_MAX_ENTRY_BYTES};
use flate2::read::GzDecoder;
use tar::EntryType;
use tempfile::TempDir;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::InstallError;

const ARCHIVE_TARGET: &str = "conduit_install::archive";

const STAGING_PREFIX: &str = ".extract-";

/// Setuid, setgid and sticky bits are never carried over.
const PERMISSION_BITS: u32 = 0o777;

const UNIX_FILE_TYPE: u32 = 0o170_000;
const UNIX_SYMLINK: u32 = 0o120_000;

/// Container formats [`ArchiveInstaller`] unpacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// `.tar.gz` or `.tgz`.
    TarGz,
    /// `.zip`.
    Zip,
}

impl ArchiveFormat {
    /// Recognises an archive by its file name suffix, ignoring case.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Why an entry was not extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The name contains `..`.
    Traversal,
    /// The name is an absolute path.
    Absolute,
    /// The joined path does not stay under the destination.
    Escapes,
    /// The entry is neither a directory nor a regular file.
    Unsupported,
}

/// An entry left out of the extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Name as recorded in the archive.
    pub name: String,
    /// Reason it was skipped.
    pub reason: SkipReason,
}

/// Summary of one extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    /// Regular files written.
    pub files: Vec<PathBuf>,
    /// Directories created from directory entries.
    pub directories: Vec<PathBuf>,
    /// Entries that were not extracted.
    pub skipped: Vec<SkippedEntry>,
}

/// Extracts plugin archives with a per-entry size cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveInstaller {
    max_entry_bytes: u64,
}

impl Default for ArchiveInstaller {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRY_BYTES)
    }
}

impl ArchiveInstaller {
    /// Creates an installer rejecting entries larger than `max_entry_bytes`.
    #[must_use]
    pub const fn new(max_entry_bytes: u64) -> Self {
        Self { max_entry_bytes }
    }

    /// Creates an installer using the configured entry cap.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.max_entry_bytes)
    }

    /// Largest regular file, in bytes, the installer will write.
    #[must_use]
    pub const fn max_entry_bytes(&self) -> u64 {
        self.max_entry_bytes
    }

    /// Extracts `archive` into `destination`, creating it when missing.
    ///
    /// The format follows the file name; names that are not recognised by
    /// [`ArchiveFormat::from_path`] are read as gzip-compressed tar.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Archive`] when the archive cannot be
    /// decoded, [`InstallError::EntryTooLarge`] when a regular file exceeds
    /// the cap, and [`InstallError::Io`] on filesystem failures. Nothing is
    /// moved into `destination` unless every entry was read successfully.
    pub fn extract(
        &self,
        archive: &Path,
        destination: &Path,
    ) -> Result<ExtractionReport, InstallError> {
        let root = clean(destination);
        fs::create_dir_all(&root).map_err(|err| InstallError::io(&root, err))?;
        let mut staging = Staging::new(root, self.max_entry_bytes)?;
        match ArchiveFormat::from_path(archive).unwrap_or(ArchiveFormat::TarGz) {
            ArchiveFormat::TarGz => stage_tar(archive, &mut staging)?,
            ArchiveFormat::Zip => stage_zip(archive, &mut staging)?,
        }
        let report = staging.commit()?;
        debug!(
            target: ARCHIVE_TARGET,
            archive = %archive.display(),
            files = report.files.len(),
            skipped = report.skipped.len(),
            "archive extracted"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy)]
enum EntryKind {
    Directory,
    File,
    Unsupported(EntryType),
}

/// Entries unpacked so far, as paths relative to the staging directory.
struct Staging {
    root: PathBuf,
    area: TempDir,
    max_entry_bytes: u64,
    directories: Vec<(PathBuf, Option<u32>)>,
    files: Vec<PathBuf>,
    skipped: Vec<SkippedEntry>,
}

impl Staging {
    fn new(root: PathBuf, max_entry_bytes: u64) -> Result<Self, InstallError> {
        let area = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&root)
            .map_err(|err| InstallError::io(&root, err))?;
        Ok(Self {
            root,
            area,
            max_entry_bytes,
            directories: Vec::new(),
            files: Vec::new(),
            skipped: Vec::new(),
        })
    }

    fn admit<R: Read>(
        &mut self,
        name: String,
        kind: EntryKind,
        mode: Option<u32>,
        declared: u64,
        reader: &mut R,
    ) -> Result<(), InstallError> {
        let relative = match relative_entry(&self.root, &name) {
            Ok(relative) => relative,
            Err(reason) => {
                warn!(
                    target: ARCHIVE_TARGET,
                    entry = %name,
                    reason = ?reason,
                    "skipping unsafe archive entry"
                );
                self.skipped.push(SkippedEntry { name, reason });
                return Ok(());
            }
        };
        match kind {
            EntryKind::Directory => {
                let staged = self.area.path().join(&relative);
                fs::create_dir_all(&staged).map_err(|err| InstallError::io(&staged, err))?;
                self.directories.push((relative, mode));
            }
            EntryKind::File => {
                self.write_file(reader, &name, &relative, mode, declared)?;
                if !self.files.contains(&relative) {
                    self.files.push(relative);
                }
            }
            EntryKind::Unsupported(other) => {
                debug!(
                    target: ARCHIVE_TARGET,
                    entry = %name,
                    kind = ?other,
                    "skipping unsupported entry type"
                );
                self.skipped.push(SkippedEntry {
                    name,
                    reason: SkipReason::Unsupported,
                });
            }
        }
        Ok(())
    }

    fn write_file<R: Read>(
        &self,
        reader: &mut R,
        name: &str,
        relative: &Path,
        mode: Option<u32>,
        declared: u64,
    ) -> Result<(), InstallError> {
        let too_large = || InstallError::EntryTooLarge {
            entry: name.to_owned(),
            limit: self.max_entry_bytes,
        };
        if declared > self.max_entry_bytes {
            return Err(too_large());
        }

        let target = self.area.path().join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| InstallError::io(parent, err))?;
        }
        let mut output = File::create(&target).map_err(|err| InstallError::io(&target, err))?;
        let mut limited = reader.take(self.max_entry_bytes.saturating_add(1));
        let copied =
            io::copy(&mut limited, &mut output).map_err(|err| InstallError::io(&target, err))?;
        drop(output);
        if copied > self.max_entry_bytes {
            return Err(too_large());
        }
        apply_mode(&target, mode)
    }

    /// Moves staged entries into the destination.
    ///
    /// Directory modes are applied last, and only to directories this
    /// extraction created, so a read-only directory entry cannot block the
    /// files placed inside it.
    fn commit(self) -> Result<ExtractionReport, InstallError> {
        let Self {
            root,
            area,
            directories,
            files,
            skipped,
            ..
        } = self;
        let fresh: Vec<(PathBuf, Option<u32>)> = directories
            .iter()
            .map(|(relative, mode)| (root.join(relative), *mode))
            .filter(|(target, _)| !target.is_dir())
            .collect();

        let mut report = ExtractionReport {
            skipped,
            ..ExtractionReport::default()
        };
        for (relative, _) in &directories {
            let target = root.join(relative);
            fs::create_dir_all(&target).map_err(|err| InstallError::io(&target, err))?;
            report.directories.push(target);
        }
        for relative in &files {
            let target = root.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|err| InstallError::io(parent, err))?;
            }
            fs::rename(area.path().join(relative), &target)
                .map_err(|err| InstallError::io(&target, err))?;
            report.files.push(target);
        }
        for (target, mode) in fresh.iter().rev() {
            apply_mode(target, *mode)?;
        }

        let staged = area.path().to_path_buf();
        if let Err(err) = area.close() {
            warn!(
                target: ARCHIVE_TARGET,
                path = %staged.display(),
                error = %err,
                "failed to remove staging directory"
            );
        }
        Ok(report)
    }
}

fn stage_tar(archive: &Path, staging: &mut Staging) -> Result<(), InstallError> {
    let file = File::open(archive).map_err(|err| InstallError::io(archive, err))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
    let entries = tarball
        .entries()
        .map_err(|err| archive_error(archive, &err))?;
    for item in entries {
        let mut entry = item.map_err(|err| archive_error(archive, &err))?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let header = entry.header();
        let mode = header.mode().ok();
        let declared = header.size().map_err(|err| archive_error(archive, &err))?;
        let kind = match header.entry_type() {
            EntryType::Directory => EntryKind::Directory,
            EntryType::Regular | EntryType::Continuous => EntryKind::File,
            other => EntryKind::Unsupported(other),
        };
        staging.admit(name, kind, mode, declared, &mut entry)?;
    }
    Ok(())
}

fn stage_zip(archive: &Path, staging: &mut Staging) -> Result<(), InstallError> {
    let file = File::open(archive).map_err(|err| InstallError::io(archive, err))?;
    let mut zipped =
        ZipArchive::new(BufReader::new(file)).map_err(|err| archive_error(archive, &err))?;
    for index in 0..zipped.len() {
        let mut entry = zipped
            .by_index(index)
            .map_err(|err| archive_error(archive, &err))?;
        let name = String::from_utf8_lossy(entry.name_raw()).into_owned();
        let mode = entry.unix_mode();
        let kind = if entry.is_dir() {
            EntryKind::Directory
        } else if mode.is_some_and(|bits| bits & UNIX_FILE_TYPE == UNIX_SYMLINK) {
            EntryKind::Unsupported(EntryType::Symlink)
        } else {
            EntryKind::File
        };
        let declared = entry.size();
        staging.admit(name, kind, mode, declared, &mut entry)?;
    }
    Ok(())
}

/// Applies the entry path rule and returns the destination path.
fn resolve_entry(root: &Path, name: &str) -> Result<PathBuf, SkipReason> {
    if name.contains("..") {
        return Err(SkipReason::Traversal);
    }
    if Path::new(name).is_absolute() {
        return Err(SkipReason::Absolute);
    }
    let joined = clean(&root.join(name));
    let prefix = format!("{}{MAIN_SEPARATOR}", root.to_string_lossy());
    if joined.to_string_lossy().starts_with(&prefix) {
        Ok(joined)
    } else {
        Err(SkipReason::Escapes)
    }
}

fn relative_entry(root: &Path, name: &str) -> Result<PathBuf, SkipReason> {
    let joined = resolve_entry(root, name)?;
    joined
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| SkipReason::Escapes)
}

/// Drops `.` components, repeated separators and trailing separators.
fn clean(path: &Path) -> PathBuf {
    path.components().collect()
}

fn archive_error(archive: &Path, err: &impl ToString) -> InstallError {
    InstallError::Archive {
        path: archive.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(unix)]
fn apply_mode(target: &Path, mode: Option<u32>) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;

    let Some(bits) = mode else {
        return Ok(());
    };
    fs::set_permissions(target, fs::Permissions::from_mode(bits & PERMISSION_BITS))
        .map_err(|err| InstallError::io(target, err))
}

#[cfg(not(unix))]
#[expect(
    clippy::unnecessary_wraps,
    reason = "mirrors the unix signature so callers stay platform-neutral"
)]
fn apply_mode(_target: &Path, _mode: Option<u32>) -> Result<(), InstallError> {
    Ok(())
}

#[cfg(test)]
mod tests;
