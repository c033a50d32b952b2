//! Cold-start handoff: the first client spawns the worker, later and
//! concurrent clients reuse it through the metadata file.

use crate::prelude::*;
use serial_test::serial;

#[test]
#[serial]
fn first_ping_spawns_a_worker_that_later_pings_reuse() {
    let dir = state_dir();

    let output = sw(dir.path()).arg("ping").output().unwrap();
    assert_eq!(
        output.status.code(),
        Some(0),
        "stdout: {} stderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(last_json(&output.stdout)["kind"], "pong");

    let meta_path = dir.path().join("daemon.json");
    assert!(meta_path.exists(), "worker did not publish metadata");
    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&meta_path).unwrap()).unwrap();
    let pid = meta["pid"].as_u64().unwrap();

    // Second invocation reuses the same worker.
    let output = sw(dir.path()).arg("ping").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let meta_after: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&meta_path).unwrap()).unwrap();
    assert_eq!(meta_after["pid"].as_u64().unwrap(), pid);

    let output = sw(dir.path()).args(["daemon", "status"]).output().unwrap();
    let status = last_json(&output.stdout);
    assert_eq!(status["running"], true);
    assert_eq!(status["pid"].as_u64().unwrap(), pid);

    stop_daemon(dir.path());
    assert!(!meta_path.exists(), "owned metadata not cleaned up");
}

#[test]
#[serial]
fn concurrent_cold_start_elects_one_worker() {
    let dir = state_dir();
    let root = dir.path().to_path_buf();

    let clients: Vec<_> = (0..2)
        .map(|_| {
            let root = root.clone();
            std::thread::spawn(move || sw(&root).arg("ping").output().unwrap())
        })
        .collect();

    for client in clients {
        let output = client.join().unwrap();
        assert_eq!(
            output.status.code(),
            Some(0),
            "stdout: {} stderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        assert_eq!(last_json(&output.stdout)["ok"], true);
    }

    // Exactly one daemon.json, and no leftover tmp variants.
    let metas: Vec<_> = std::fs::read_dir(&root)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("daemon.json")
        })
        .collect();
    assert_eq!(metas.len(), 1, "found {metas:?}");

    stop_daemon(&root);
}

#[test]
#[serial]
fn stale_metadata_is_replaced_by_a_fresh_worker() {
    let dir = state_dir();

    // Metadata pointing at a pid that cannot exist.
    let stale = serde_json::json!({
        "version": 1,
        "pid": 3_999_999_999u32,
        "host": "127.0.0.1",
        "port": 4,
        "token": "deadbeefdeadbeefdeadbeefdeadbeef",
        "startedAt": "2026-01-01T00:00:00Z",
    });
    let meta_path = dir.path().join("daemon.json");
    std::fs::write(&meta_path, stale.to_string()).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&meta_path, std::fs::Permissions::from_mode(0o600)).unwrap();
    }

    let output = sw(dir.path()).arg("ping").output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(last_json(&output.stdout)["kind"], "pong");

    // The stale file was replaced by a live worker's metadata.
    let meta: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&meta_path).unwrap()).unwrap();
    assert_ne!(meta["pid"].as_u64().unwrap(), 3_999_999_999);

    stop_daemon(dir.path());
}
