//! Exit-code and envelope contract.

use crate::prelude::*;

#[test]
fn unknown_command_is_misuse_with_envelope() {
    let dir = state_dir();
    let output = sw_no_daemon(dir.path())
        .arg("frobnicate")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let envelope = last_json(&output.stdout);
    assert_eq!(envelope["ok"], false);
    assert_eq!(envelope["code"], "E_QUERY_INVALID");
    assert_eq!(envelope["retryable"], false);
}

#[test]
fn unknown_flag_is_misuse() {
    let dir = state_dir();
    let output = sw_no_daemon(dir.path())
        .args(["session", "list", "--definitely-not-a-flag"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(last_json(&output.stdout)["code"], "E_QUERY_INVALID");
}

#[test]
fn no_arguments_is_misuse() {
    let dir = state_dir();
    let output = sw_no_daemon(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let envelope = last_json(&output.stdout);
    assert_eq!(envelope["ok"], false);
}
