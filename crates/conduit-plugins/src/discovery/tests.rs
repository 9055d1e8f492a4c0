//! Unit tests for plugin discovery.

use std::fs;
use std::path::Path;

use rstest::{fixture, rstest};
use tempfile::TempDir;

use super::*;

#[fixture]
fn plugin_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn write_file(dir: &Path, name: &str, executable: bool) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"#!/bin/sh\n").expect("write plugin file");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if executable { 0o755 } else { 0o644 };
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("chmod");
    }
    #[cfg(not(unix))]
    let _ = executable;
    path
}

fn scanner(paths: Vec<PathBuf>) -> DirectoryScanner {
    DirectoryScanner::new(paths, "plugin-")
}

#[cfg(unix)]
#[rstest]
fn finds_prefixed_executables_in_name_order(plugin_dir: TempDir) {
    write_file(plugin_dir.path(), "plugin-uploader", true);
    write_file(plugin_dir.path(), "plugin-converter", true);
    write_file(plugin_dir.path(), "plugin-filter", true);

    let found = scanner(vec![plugin_dir.path().to_path_buf()])
        .discover()
        .expect("discover");
    let names: Vec<&str> = found.iter().map(|plugin| plugin.name.as_str()).collect();
    assert_eq!(names, ["converter", "filter", "uploader"]);
}

#[cfg(unix)]
#[rstest]
#[case::not_executable("plugin-notes", false)]
#[case::wrong_prefix("helper-tool", true)]
#[case::bare_prefix("plugin-", true)]
fn ignores_non_plugins(plugin_dir: TempDir, #[case] file: &str, #[case] executable: bool) {
    write_file(plugin_dir.path(), file, executable);
    let found = scanner(vec![plugin_dir.path().to_path_buf()])
        .discover()
        .expect("discover");
    assert!(found.is_empty(), "unexpected plugins: {found:?}");
}

#[cfg(unix)]
#[rstest]
fn ignores_directories_with_plugin_names(plugin_dir: TempDir) {
    fs::create_dir(plugin_dir.path().join("plugin-dir")).expect("mkdir");
    let found = scanner(vec![plugin_dir.path().to_path_buf()])
        .discover()
        .expect("discover");
    assert!(found.is_empty());
}

#[cfg(unix)]
#[rstest]
fn earlier_directories_come_first(plugin_dir: TempDir) {
    let first = plugin_dir.path().join("first");
    let second = plugin_dir.path().join("second");
    fs::create_dir_all(&first).expect("mkdir first");
    fs::create_dir_all(&second).expect("mkdir second");
    write_file(&second, "plugin-alpha", true);
    write_file(&first, "plugin-zulu", true);

    let found = scanner(vec![first, second]).discover().expect("discover");
    let names: Vec<&str> = found.iter().map(|plugin| plugin.name.as_str()).collect();
    assert_eq!(names, ["zulu", "alpha"]);
}

#[cfg(unix)]
#[rstest]
fn repeated_directories_are_reported_once(plugin_dir: TempDir) {
    write_file(plugin_dir.path(), "plugin-filter", true);
    let dir = plugin_dir.path().to_path_buf();
    let found = scanner(vec![dir.clone(), dir]).discover().expect("discover");
    assert_eq!(found.len(), 1);
}

#[rstest]
fn missing_directories_are_skipped(plugin_dir: TempDir) {
    let found = scanner(vec![plugin_dir.path().join("absent")])
        .discover()
        .expect("discover");
    assert!(found.is_empty());
}

#[test]
fn find_returns_named_plugin() {
    let discovery = StaticDiscovery::new(vec![
        DiscoveredPlugin::new("filter", "/plugins/plugin-filter"),
        DiscoveredPlugin::new("uploader", "/plugins/plugin-uploader"),
    ]);
    let plugin = find(&discovery, "uploader").expect("find uploader");
    assert_eq!(plugin.path, PathBuf::from("/plugins/plugin-uploader"));
}

#[test]
fn find_reports_missing_plugin() {
    let discovery = StaticDiscovery::default();
    let err = find(&discovery, "ghost").expect_err("must fail");
    assert!(matches!(err, PluginError::NotFound { ref name } if name == "ghost"));
}

#[test]
fn find_propagates_discovery_failure() {
    let mut discovery = MockPluginDiscovery::new();
    discovery.expect_discover().returning(|| {
        Err(PluginError::Discovery {
            path: PathBuf::from("/plugins"),
            source: Arc::new(io::Error::other("device gone")),
        })
    });
    let err = find(&discovery, "filter").expect_err("must fail");
    assert!(matches!(err, PluginError::Discovery { .. }));
}
