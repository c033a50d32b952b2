// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn own_pid_is_alive() {
    assert!(pid_alive(std::process::id()));
}

#[test]
fn out_of_range_pid_is_dead() {
    assert!(!pid_alive(u32::MAX));
}

#[tokio::test]
async fn terminate_ends_a_sleeping_child() {
    let mut child = tokio::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .unwrap();
    let pid = child.id().unwrap();
    assert!(pid_alive(pid));

    terminate(pid, Duration::from_secs(2)).await.unwrap();
    let status = child.wait().await.unwrap();
    assert!(!status.success());
    // Reaped: the pid no longer refers to our child.
}

#[tokio::test]
async fn terminate_of_dead_pid_is_ok() {
    let mut child = tokio::process::Command::new("true").spawn().unwrap();
    let pid = child.id().unwrap();
    child.wait().await.unwrap();
    terminate(pid, Duration::from_millis(100)).await.unwrap();
}
