//! `SURFWRIGHT_DAEMON=0` disables the daemon path entirely.

use crate::prelude::*;

#[test]
fn ping_runs_in_process_without_a_daemon() {
    let dir = state_dir();
    let output = sw_no_daemon(dir.path()).arg("ping").output().unwrap();

    assert_eq!(output.status.code(), Some(0));
    let value = last_json(&output.stdout);
    assert_eq!(value["ok"], true);
    assert_eq!(value["kind"], "pong");

    // No worker, no metadata.
    assert!(!dir.path().join("daemon.json").exists());
}

#[test]
fn state_survives_between_in_process_invocations() {
    let dir = state_dir();

    let output = sw_no_daemon(dir.path())
        .args(["session", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(last_json(&output.stdout)["count"], 0);

    // target prune writes the state document; the next read sees it.
    let output = sw_no_daemon(dir.path())
        .args(["target", "prune"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert!(dir.path().join("state.json").exists());
}
