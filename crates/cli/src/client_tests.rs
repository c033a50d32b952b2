// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use sw_daemon::{run_daemon, DaemonConfig, DaemonLimits};

fn test_client(paths: &StatePaths, daemon_enabled: bool) -> Orchestrator {
    Orchestrator::new(ClientConfig {
        paths: paths.clone(),
        daemon_enabled,
        connect_timeout: Duration::from_secs(2),
        ipc_timeout: Duration::from_secs(10),
    })
}

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|s| s.to_string()).collect()
}

async fn start_daemon(paths: &StatePaths) -> tokio::task::JoinHandle<()> {
    let config = DaemonConfig {
        paths: paths.clone(),
        limits: DaemonLimits::default(),
    };
    let handle = tokio::spawn(async move {
        let _ = run_daemon(config).await;
    });
    for _ in 0..100 {
        if meta::read_valid(paths).is_some() {
            return handle;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("in-process daemon never came up");
}

#[tokio::test]
async fn ping_rides_the_daemon_when_one_is_up() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());
    let daemon = start_daemon(&paths).await;

    let client = test_client(&paths, true);
    let outcome = client.execute(argv(&["ping"])).await;
    assert_eq!(outcome.code, 0, "stdout: {}", outcome.stdout);
    let value: serde_json::Value =
        serde_json::from_str(outcome.stdout.lines().last().unwrap()).unwrap();
    assert_eq!(value["kind"], "pong");

    let outcome = client.execute(argv(&["daemon", "status"])).await;
    let value: serde_json::Value =
        serde_json::from_str(outcome.stdout.lines().last().unwrap()).unwrap();
    assert_eq!(value["running"], true);
    assert_eq!(value["pid"], std::process::id());

    let outcome = client.execute(argv(&["daemon", "stop"])).await;
    let value: serde_json::Value =
        serde_json::from_str(outcome.stdout.lines().last().unwrap()).unwrap();
    assert_eq!(value["stopped"], true);

    tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .expect("daemon did not stop")
        .unwrap();
    assert!(meta::read_valid(&paths).is_none());
}

#[tokio::test]
async fn daemon_and_in_process_paths_agree() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());
    let daemon = start_daemon(&paths).await;

    let via_daemon = test_client(&paths, true).execute(argv(&["ping"])).await;
    let in_process = test_client(&paths, false).execute(argv(&["ping"])).await;
    assert_eq!(via_daemon.code, in_process.code);
    assert_eq!(via_daemon.stdout, in_process.stdout);
    assert_eq!(via_daemon.stderr, in_process.stderr);

    // Misuse is identical on both paths too.
    let via_daemon = test_client(&paths, true).execute(argv(&["bogus"])).await;
    let in_process = test_client(&paths, false).execute(argv(&["bogus"])).await;
    assert_eq!(via_daemon.code, 2);
    assert_eq!(via_daemon.code, in_process.code);
    assert_eq!(via_daemon.stdout, in_process.stdout);

    test_client(&paths, true)
        .execute(argv(&["daemon", "stop"]))
        .await;
    let _ = tokio::time::timeout(Duration::from_secs(5), daemon).await;
}

#[tokio::test]
async fn falls_back_in_process_when_no_daemon_can_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());

    // No daemon, and `swd` is not spawnable from the test harness; the
    // orchestrator must still answer via the in-process dispatcher.
    let client = test_client(&paths, true);
    let outcome = client.execute(argv(&["ping"])).await;
    assert_eq!(outcome.code, 0, "stdout: {}", outcome.stdout);
    let value: serde_json::Value =
        serde_json::from_str(outcome.stdout.lines().last().unwrap()).unwrap();
    assert_eq!(value["kind"], "pong");
}

#[tokio::test]
async fn daemon_status_reports_not_running() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());
    let client = test_client(&paths, true);
    let outcome = client.execute(argv(&["daemon", "status"])).await;
    assert_eq!(outcome.code, 0);
    let value: serde_json::Value =
        serde_json::from_str(outcome.stdout.lines().last().unwrap()).unwrap();
    assert_eq!(value["running"], false);
}

#[tokio::test]
async fn streaming_commands_bypass_the_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let paths = StatePaths::from_root(dir.path().to_path_buf());

    // No daemon is running and none is spawned for a bypass command; the
    // in-process dispatcher answers (here: a typed failure for a missing
    // capture).
    let client = test_client(&paths, true);
    let outcome = client
        .execute(argv(&["target", "network", "tail", "--capture", "cap-1"]))
        .await;
    assert_eq!(outcome.code, 1);
    let value: serde_json::Value =
        serde_json::from_str(outcome.stdout.lines().last().unwrap()).unwrap();
    assert_eq!(value["code"], "E_QUERY_INVALID");
    // The daemon was not spawned on the bypass path.
    assert!(meta::read_valid(&paths).is_none());
}
