//! Help and version surfaces.

use crate::prelude::*;

#[test]
fn help_prints_usage() {
    let dir = state_dir();
    let output = sw_no_daemon(dir.path()).arg("--help").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("USAGE"));
    assert!(text.contains("session"));
}

#[test]
fn version_prints_and_exits_zero() {
    let dir = state_dir();
    let output = sw_no_daemon(dir.path()).arg("--version").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.starts_with("sw "));
}
