// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn binary_lookup_yields_some_path() {
    let path = find_daemon_binary();
    assert_eq!(path.file_name().unwrap(), "swd");
}

#[tokio::test]
async fn wait_for_metadata_gives_up_when_child_dies() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());
    let child = std::process::Command::new("true").spawn().unwrap();

    let started = std::time::Instant::now();
    let metadata = wait_for_metadata(&paths, Some(child), Duration::from_secs(5)).await;
    assert!(metadata.is_none());
    // Returned on child exit, well before the deadline.
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn wait_for_metadata_times_out_without_child() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());
    let metadata = wait_for_metadata(&paths, None, Duration::from_millis(150)).await;
    assert!(metadata.is_none());
}

#[test]
fn startup_error_is_scoped_to_last_marker() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());
    std::fs::write(
        paths.daemon_log(),
        format!(
            "{marker}100)\nERROR old failure\n{marker}200)\nINFO starting\nERROR bind refused\n",
            marker = STARTUP_MARKER_PREFIX
        ),
    )
    .unwrap();

    let error = read_startup_error(&paths).unwrap();
    assert!(error.contains("bind refused"));
    assert!(!error.contains("old failure"));
}

#[test]
fn no_errors_after_marker_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());
    std::fs::write(
        paths.daemon_log(),
        format!("{}42)\nINFO all good\n", STARTUP_MARKER_PREFIX),
    )
    .unwrap();
    assert!(read_startup_error(&paths).is_none());
    std::fs::remove_file(paths.daemon_log()).unwrap();
    assert!(read_startup_error(&paths).is_none());
}
