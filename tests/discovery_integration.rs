//! Integration tests for R executable discovery against a real filesystem

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use rbridge_app::{find_with, Lookup, LookupRequest};
use rbridge_core::Platform;
use rbridge_process::locator::windows_candidate_dirs;
use rbridge_process::test_utils::StaticProber;
use rbridge_process::{scan_install_root, Locator, OsFileSystem};

/// Lay out `<root>/<version>/<entry>` directories
fn create_install(root: &Path, version: &str, entries: &[&str]) {
    for entry in entries {
        fs::create_dir_all(root.join(version).join(entry)).unwrap();
    }
}

#[test]
fn test_windows_scan_both_roots_primary_first() {
    let temp = TempDir::new().unwrap();
    let primary = temp.path().join("Program Files").join("R");
    let secondary = temp.path().join("Program Files (x86)").join("R");

    create_install(&primary, "R-4.3.1", &["bin", "doc", "library"]);
    create_install(&primary, "R-4.4.0", &["bin"]);
    create_install(&secondary, "R-3.6.3", &["bin", "etc"]);

    let dirs = windows_candidate_dirs(&OsFileSystem, &primary, &secondary);

    assert_eq!(
        dirs,
        vec![
            primary.join("R-4.3.1").join("bin"),
            primary.join("R-4.4.0").join("bin"),
            secondary.join("R-3.6.3").join("bin"),
        ]
    );
}

#[test]
fn test_windows_missing_root_same_as_empty_root() {
    let temp = TempDir::new().unwrap();
    let primary = temp.path().join("R");
    create_install(&primary, "R-4.4.0", &["bin"]);

    let empty = temp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();
    let missing = temp.path().join("missing");

    assert_eq!(
        windows_candidate_dirs(&OsFileSystem, &primary, &missing),
        windows_candidate_dirs(&OsFileSystem, &primary, &empty),
    );
    assert!(scan_install_root(&OsFileSystem, &missing).is_none());
    assert_eq!(scan_install_root(&OsFileSystem, &empty), Some(Vec::new()));
}

#[test]
fn test_scan_ignores_files_named_bin() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("R");
    create_install(&root, "R-4.4.0", &["bin"]);
    fs::write(root.join("R-4.4.0").join("binary.txt"), "not a dir").unwrap();

    let dirs = scan_install_root(&OsFileSystem, &root).unwrap();
    assert_eq!(dirs, vec![root.join("R-4.4.0").join("bin")]);
}

#[test]
fn test_folder_lookup_canonicalizes() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("R-devel").join("bin");
    fs::create_dir_all(&bin).unwrap();
    fs::write(bin.join("R"), "").unwrap();

    // Reach the folder through a `..` segment
    let indirect: PathBuf = bin.join("..").join("bin");

    let locator = Locator::with_parts(Platform::Unix, OsFileSystem, StaticProber::accept_all());
    let request = LookupRequest::default().with_folder(Some(indirect));

    let expected = fs::canonicalize(bin.join("R")).unwrap();
    assert_eq!(find_with(&locator, &request), Lookup::Found(expected));
}

#[test]
fn test_extra_dir_searched_before_defaults() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("R"), "").unwrap();

    let locator = Locator::with_parts(Platform::Unix, OsFileSystem, StaticProber::accept_all())
        .with_extra_dirs(vec![temp.path().to_path_buf()]);

    let expected = fs::canonicalize(temp.path().join("R")).unwrap();
    assert_eq!(locator.locate(), Some(expected));
    assert_eq!(locator.candidate_dirs()[0], temp.path());
}

#[cfg(unix)]
mod spawn_probe {
    use super::*;
    use rbridge_process::test_utils::write_fake_interpreter;
    use rbridge_process::SpawnProbe;

    #[test]
    fn test_non_executable_candidate_is_skipped() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        // Present but not runnable
        fs::write(first.join("R"), "#!/bin/sh\nexit 0\n").unwrap();
        let good = write_fake_interpreter(&second, "R", "exit 0");

        let locator = Locator::with_parts(Platform::Unix, OsFileSystem, SpawnProbe::new())
            .with_extra_dirs(vec![first, second]);

        assert_eq!(locator.locate(), Some(fs::canonicalize(good).unwrap()));
    }

    #[test]
    fn test_probe_terminates_long_running_interpreter() {
        let temp = TempDir::new().unwrap();
        let exe = write_fake_interpreter(temp.path(), "R", "trap '' TERM\nexec sleep 60");

        let started = std::time::Instant::now();
        let locator = Locator::with_parts(Platform::Unix, OsFileSystem, SpawnProbe::new());
        let found = locator.verify(&exe).expect("probe should accept runnable script");

        assert_eq!(found, fs::canonicalize(&exe).unwrap());
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
