// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn paths() -> (tempfile::TempDir, StatePaths) {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());
    (dir, paths)
}

#[test]
fn canonical_locations() {
    let (_dir, paths) = paths();
    let root = paths.root().to_path_buf();
    assert_eq!(paths.state_file(), root.join("state.json"));
    assert_eq!(paths.state_lock(), root.join("state.json.lock"));
    assert_eq!(paths.daemon_meta(), root.join("daemon.json"));
    assert_eq!(
        paths.artifact_file("art-3").unwrap(),
        root.join("artifacts/network/art-3.har")
    );
    assert_eq!(
        paths.capture_result("cap-2").unwrap(),
        root.join("captures/cap-2.result.json")
    );
}

#[test]
fn traversal_is_rejected() {
    let (_dir, paths) = paths();
    assert!(paths.profile_dir("../evil").is_err());
    assert!(paths.profile_dir("a/b").is_err());
    assert!(paths.capture_signal("").is_err());
}

#[test]
fn every_path_stays_under_root() {
    let (_dir, paths) = paths();
    for p in [
        paths.state_file(),
        paths.daemon_meta(),
        paths.profile_dir("s-1").unwrap(),
        paths.capture_done("cap-1").unwrap(),
        paths.artifact_file("art-1").unwrap(),
    ] {
        assert!(p.starts_with(paths.root()), "{p:?} escapes the root");
    }
}

#[cfg(unix)]
#[test]
fn ensure_root_restricts_mode() {
    use std::os::unix::fs::PermissionsExt;
    let (_dir, paths) = paths();
    paths.ensure_root().unwrap();
    let mode = paths.root().metadata().unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
    let mode = paths.profiles_root().metadata().unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o700);
}
