//! Tests for archive extraction and entry path safety.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use rstest::{fixture, rstest};
use tar::{Builder, EntryType, Header};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::*;

/// One entry to place in a test archive.
struct Fixture<'a> {
    name: &'a str,
    kind: EntryType,
    mode: u32,
    declared_size: u64,
    data: &'a [u8],
}

impl<'a> Fixture<'a> {
    fn file(name: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            kind: EntryType::Regular,
            mode: 0o644,
            declared_size: data.len() as u64,
            data,
        }
    }

    fn dir(name: &'a str) -> Self {
        Self {
            name,
            kind: EntryType::Directory,
            mode: 0o755,
            declared_size: 0,
            data: b"",
        }
    }

    const fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }
}

/// Writes the name bytes directly so unsafe names survive the builder.
fn raw_header(fixture: &Fixture<'_>) -> Header {
    let mut header = Header::new_gnu();
    for (slot, byte) in header
        .as_old_mut()
        .name
        .iter_mut()
        .zip(fixture.name.as_bytes())
    {
        *slot = *byte;
    }
    header.set_entry_type(fixture.kind);
    header.set_mode(fixture.mode);
    header.set_size(fixture.declared_size);
    header.set_cksum();
    header
}

fn build_archive(dir: &Path, entries: &[Fixture<'_>]) -> PathBuf {
    let path = dir.join("plugin.tar.gz");
    let file = File::create(&path).expect("create archive");
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    for fixture in entries {
        builder
            .append(&raw_header(fixture), fixture.data)
            .expect("append entry");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip");
    path
}

struct Workspace {
    _dir: TempDir,
    source: PathBuf,
    destination: PathBuf,
}

#[fixture]
fn workspace() -> Workspace {
    let dir = TempDir::new().expect("tempdir");
    let source = dir.path().join("download");
    let destination = dir.path().join("plugins");
    fs::create_dir_all(&source).expect("source dir");
    Workspace {
        _dir: dir,
        source,
        destination,
    }
}

#[rstest]
fn extracts_files_and_directories(workspace: Workspace) {
    let archive = build_archive(
        &workspace.source,
        &[
            Fixture::dir("share/"),
            Fixture::file("share/README", b"docs"),
            Fixture::file("plugin-filter", b"#!/bin/sh\n").with_mode(0o755),
        ],
    );

    let report = ArchiveInstaller::default()
        .extract(&archive, &workspace.destination)
        .expect("extract");

    assert_eq!(report.directories, [workspace.destination.join("share")]);
    assert_eq!(
        report.files,
        [
            workspace.destination.join("share/README"),
            workspace.destination.join("plugin-filter"),
        ]
    );
    assert!(report.skipped.is_empty());
    assert_eq!(
        fs::read(workspace.destination.join("share/README")).expect("read"),
        b"docs"
    );
}

#[cfg(unix)]
#[rstest]
#[case::executable(0o755, 0o755)]
#[case::private(0o600, 0o600)]
#[case::setuid(0o4755, 0o755)]
#[case::setgid_and_sticky(0o3750, 0o750)]
fn file_modes_are_reapplied(workspace: Workspace, #[case] mode: u32, #[case] expected: u32) {
    use std::os::unix::fs::PermissionsExt;

    let archive = build_archive(
        &workspace.source,
        &[Fixture::file("plugin-x", b"bin").with_mode(mode)],
    );

    ArchiveInstaller::default()
        .extract(&archive, &workspace.destination)
        .expect("extract");

    let metadata = fs::metadata(workspace.destination.join("plugin-x")).expect("metadata");
    assert_eq!(metadata.permissions().mode() & 0o7777, expected);
}

#[cfg(unix)]
#[rstest]
fn directory_modes_are_applied_after_their_files(workspace: Workspace) {
    use std::os::unix::fs::PermissionsExt;

    let archive = build_archive(
        &workspace.source,
        &[
            Fixture::dir("locked/").with_mode(0o6555),
            Fixture::file("locked/plugin-x", b"bin"),
        ],
    );

    ArchiveInstaller::default()
        .extract(&archive, &workspace.destination)
        .expect("extract");

    let locked = workspace.destination.join("locked");
    assert!(locked.join("plugin-x").is_file());
    let mode = fs::metadata(&locked).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o7777, 0o555);
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("unlock for cleanup");
}

#[rstest]
fn failed_extraction_leaves_the_destination_empty(workspace: Workspace) {
    let bomb = vec![b'x'; 32];
    let archive = build_archive(
        &workspace.source,
        &[
            Fixture::file("plugin-evil", b"#!/bin/sh\n").with_mode(0o755),
            Fixture::dir("share/"),
            Fixture::file("share/bomb.bin", &bomb),
        ],
    );

    let result = ArchiveInstaller::new(16).extract(&archive, &workspace.destination);

    assert!(matches!(
        result,
        Err(InstallError::EntryTooLarge { ref entry, .. }) if entry == "share/bomb.bin"
    ));
    let left: Vec<_> = fs::read_dir(&workspace.destination)
        .expect("list destination")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert!(left.is_empty(), "destination holds {left:?}");
}

#[rstest]
fn failed_extraction_keeps_existing_files(workspace: Workspace) {
    fs::create_dir_all(&workspace.destination).expect("destination");
    let existing = workspace.destination.join("plugin-keep");
    fs::write(&existing, b"old").expect("existing plugin");
    let bomb = vec![b'x'; 32];
    let archive = build_archive(
        &workspace.source,
        &[
            Fixture::file("plugin-keep", b"new"),
            Fixture::file("bomb.bin", &bomb),
        ],
    );

    let result = ArchiveInstaller::new(16).extract(&archive, &workspace.destination);

    assert!(result.is_err());
    assert_eq!(fs::read(&existing).expect("read"), b"old");
}

#[rstest]
#[case::parent_traversal("../../etc/passwd", SkipReason::Traversal)]
#[case::embedded_traversal("share/../../escape", SkipReason::Traversal)]
#[case::dotted_name("notes..txt", SkipReason::Traversal)]
#[case::absolute("/etc/passwd", SkipReason::Absolute)]
#[case::current_dir("./", SkipReason::Escapes)]
fn unsafe_entries_are_never_written(
    workspace: Workspace,
    #[case] name: &str,
    #[case] reason: SkipReason,
) {
    let archive = build_archive(
        &workspace.source,
        &[
            Fixture::file(name, b"root:x:0:0"),
            Fixture::file("plugin-safe", b"ok"),
        ],
    );

    let report = ArchiveInstaller::default()
        .extract(&archive, &workspace.destination)
        .expect("extract");

    assert_eq!(
        report.skipped,
        [SkippedEntry {
            name: name.to_owned(),
            reason,
        }]
    );
    assert_eq!(report.files, [workspace.destination.join("plugin-safe")]);
    let written: Vec<_> = fs::read_dir(&workspace.destination)
        .expect("list destination")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(written, ["plugin-safe"]);
}

#[rstest]
fn links_are_skipped(workspace: Workspace) {
    let link = Fixture {
        name: "plugin-link",
        kind: EntryType::Symlink,
        mode: 0o777,
        declared_size: 0,
        data: b"",
    };
    let archive = build_archive(&workspace.source, &[link]);

    let report = ArchiveInstaller::default()
        .extract(&archive, &workspace.destination)
        .expect("extract");

    assert_eq!(
        report.skipped.first().map(|entry| entry.reason),
        Some(SkipReason::Unsupported)
    );
    assert!(!workspace.destination.join("plugin-link").exists());
}

#[rstest]
fn gigabyte_entry_fails_under_the_default_cap(workspace: Workspace) {
    let huge = Fixture {
        declared_size: 1 << 30,
        ..Fixture::file("plugin-huge", b"")
    };
    let archive = build_archive(&workspace.source, &[huge]);

    let err = ArchiveInstaller::default()
        .extract(&archive, &workspace.destination)
        .expect_err("oversized entry");

    assert!(matches!(
        err,
        InstallError::EntryTooLarge { ref entry, limit }
            if entry == "plugin-huge" && limit == DEFAULT_MAX_ENTRY_BYTES
    ));
    assert!(!workspace.destination.join("plugin-huge").exists());
}

#[rstest]
#[case::over_by_one(16, 17)]
#[case::far_over(16, 4096)]
fn entries_over_a_custom_cap_fail(
    workspace: Workspace,
    #[case] cap: u64,
    #[case] size: usize,
) {
    let payload = vec![b'x'; size];
    let archive = build_archive(&workspace.source, &[Fixture::file("plugin-big", &payload)]);

    let result = ArchiveInstaller::new(cap).extract(&archive, &workspace.destination);

    assert!(matches!(result, Err(InstallError::EntryTooLarge { .. })));
    assert!(!workspace.destination.join("plugin-big").exists());
}

#[rstest]
fn entry_at_the_cap_is_accepted(workspace: Workspace) {
    let payload = vec![b'x'; 16];
    let archive = build_archive(&workspace.source, &[Fixture::file("plugin-edge", &payload)]);

    ArchiveInstaller::new(16)
        .extract(&archive, &workspace.destination)
        .expect("entry fits");

    assert_eq!(
        fs::metadata(workspace.destination.join("plugin-edge"))
            .expect("metadata")
            .len(),
        16
    );
}

#[rstest]
fn corrupt_archive_is_rejected(workspace: Workspace) {
    let path = workspace.source.join("broken.tar.gz");
    fs::write(&path, b"definitely not gzip").expect("write");

    let result = ArchiveInstaller::default().extract(&path, &workspace.destination);

    assert!(matches!(result, Err(InstallError::Archive { .. })));
}

#[cfg(unix)]
#[rstest]
#[case::plain("/srv/plugins", "plugin-x", Some("/srv/plugins/plugin-x"))]
#[case::nested("/srv/plugins", "a/./b", Some("/srv/plugins/a/b"))]
#[case::root_itself("/srv/plugins", ".", None)]
#[case::traversal("/srv/plugins", "a/../b", None)]
fn entry_paths_follow_the_prefix_rule(
    #[case] root: &str,
    #[case] name: &str,
    #[case] expected: Option<&str>,
) {
    let resolved = resolve_entry(Path::new(root), name).ok();
    assert_eq!(resolved, expected.map(PathBuf::from));
}

/// One zip entry: name, unix mode and contents. Names ending in `/` become
/// directories.
type ZipEntry<'a> = (&'a str, u32, &'a [u8]);

fn build_zip(dir: &Path, entries: &[ZipEntry<'_>]) -> PathBuf {
    let path = dir.join("plugin.zip");
    let mut writer = ZipWriter::new(File::create(&path).expect("create zip"));
    for (name, mode, data) in entries {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .unix_permissions(*mode);
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add directory");
        } else {
            writer.start_file(*name, options).expect("start entry");
            writer.write_all(data).expect("write entry");
        }
    }
    writer.finish().expect("finish zip");
    path
}

#[rstest]
fn extracts_zip_archives(workspace: Workspace) {
    let archive = build_zip(
        &workspace.source,
        &[
            ("share/", 0o755, b""),
            ("share/README", 0o644, b"docs"),
            ("plugin-filter", 0o4755, b"#!/bin/sh\n"),
        ],
    );

    let report = ArchiveInstaller::default()
        .extract(&archive, &workspace.destination)
        .expect("extract");

    assert_eq!(
        report.files,
        [
            workspace.destination.join("share/README"),
            workspace.destination.join("plugin-filter"),
        ]
    );
    assert_eq!(
        fs::read(workspace.destination.join("share/README")).expect("read"),
        b"docs"
    );
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(workspace.destination.join("plugin-filter"))
            .expect("metadata")
            .permissions()
            .mode();
        assert_eq!(mode & 0o7777, 0o755);
    }
}

#[rstest]
#[case::parent_traversal("../../etc/passwd", SkipReason::Traversal)]
#[case::absolute("/etc/passwd", SkipReason::Absolute)]
fn unsafe_zip_entries_are_never_written(
    workspace: Workspace,
    #[case] name: &str,
    #[case] reason: SkipReason,
) {
    let archive = build_zip(
        &workspace.source,
        &[(name, 0o644, b"root:x:0:0"), ("plugin-safe", 0o755, b"ok")],
    );

    let report = ArchiveInstaller::default()
        .extract(&archive, &workspace.destination)
        .expect("extract");

    assert_eq!(
        report.skipped,
        [SkippedEntry {
            name: name.to_owned(),
            reason,
        }]
    );
    assert_eq!(report.files, [workspace.destination.join("plugin-safe")]);
}

#[rstest]
fn oversized_zip_entry_leaves_nothing_behind(workspace: Workspace) {
    let bomb = vec![b'x'; 32];
    let archive = build_zip(
        &workspace.source,
        &[("plugin-evil", 0o755, b"#!/bin/sh\n"), ("bomb.bin", 0o644, bomb.as_slice())],
    );

    let result = ArchiveInstaller::new(16).extract(&archive, &workspace.destination);

    assert!(matches!(result, Err(InstallError::EntryTooLarge { .. })));
    let left = fs::read_dir(&workspace.destination)
        .expect("list destination")
        .count();
    assert_eq!(left, 0);
}

#[rstest]
fn zip_symlinks_are_skipped(workspace: Workspace) {
    let path = workspace.source.join("links.zip");
    let mut writer = ZipWriter::new(File::create(&path).expect("create zip"));
    writer
        .add_symlink("plugin-link", "/bin/sh", SimpleFileOptions::default())
        .expect("add symlink");
    writer.finish().expect("finish zip");

    let report = ArchiveInstaller::default()
        .extract(&path, &workspace.destination)
        .expect("extract");

    assert_eq!(
        report.skipped.first().map(|entry| entry.reason),
        Some(SkipReason::Unsupported)
    );
    assert!(!workspace.destination.join("plugin-link").exists());
}

#[rstest]
fn corrupt_zip_is_rejected(workspace: Workspace) {
    let path = workspace.source.join("broken.zip");
    fs::write(&path, b"PK but not really").expect("write");

    let result = ArchiveInstaller::default().extract(&path, &workspace.destination);

    assert!(matches!(result, Err(InstallError::Archive { .. })));
}

#[rstest]
#[case::tarball("plugin.tar.gz", Some(ArchiveFormat::TarGz))]
#[case::tgz("plugin.tgz", Some(ArchiveFormat::TarGz))]
#[case::upper_case("PLUGIN.ZIP", Some(ArchiveFormat::Zip))]
#[case::zip("plugin.zip", Some(ArchiveFormat::Zip))]
#[case::gzip_only("plugin.gz", None)]
#[case::bare("plugin-filter", None)]
fn formats_are_recognised_by_suffix(#[case] name: &str, #[case] expected: Option<ArchiveFormat>) {
    assert_eq!(ArchiveFormat::from_path(Path::new(name)), expected);
}
