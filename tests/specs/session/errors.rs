//! Session identity errors surface typed envelopes.

use crate::prelude::*;

#[test]
fn session_use_of_missing_session_is_not_found() {
    let dir = state_dir();
    let output = sw_no_daemon(dir.path())
        .args(["session", "use", "s-404"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let envelope = last_json(&output.stdout);
    assert_eq!(envelope["code"], "E_SESSION_NOT_FOUND");
    assert_eq!(envelope["retryable"], false);
}

#[test]
fn session_attach_validates_the_endpoint() {
    let dir = state_dir();

    let output = sw_no_daemon(dir.path())
        .args(["session", "attach", "--cdp", "http://example.com:9222"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(last_json(&output.stdout)["code"], "E_CDP_INVALID");

    // Loopback but nothing listening: reachable-endpoint check fails.
    let output = sw_no_daemon(dir.path())
        .args(["session", "attach", "--cdp", "http://127.0.0.1:1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let envelope = last_json(&output.stdout);
    assert_eq!(envelope["code"], "E_CDP_UNREACHABLE");
    assert_eq!(envelope["retryable"], true);
}

#[test]
fn session_list_is_deterministic_and_empty_at_start() {
    let dir = state_dir();
    let first = sw_no_daemon(dir.path())
        .args(["session", "list"])
        .output()
        .unwrap();
    let second = sw_no_daemon(dir.path())
        .args(["session", "list"])
        .output()
        .unwrap();
    assert_eq!(first.stdout, second.stdout);
    assert_eq!(last_json(&first.stdout)["count"], 0);
}
