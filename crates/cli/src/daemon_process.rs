// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process management: locating, spawning, and watching `swd`.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use sw_daemon::{meta, DaemonMetadata, STARTUP_MARKER_PREFIX};
use sw_storage::StatePaths;

use crate::env;

const SPAWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Find the worker binary: `SURFWRIGHT_DAEMON_BINARY`, then a sibling of
/// the current executable, then `PATH`.
pub fn find_daemon_binary() -> PathBuf {
    if let Some(path) = env::daemon_binary() {
        return PathBuf::from(path);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("swd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("swd")
}

/// Start the worker detached from this process.
pub fn spawn_daemon_background() -> std::io::Result<std::process::Child> {
    Command::new(find_daemon_binary())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}

/// Poll until valid metadata appears, the child exits, or the deadline
/// passes.
pub async fn wait_for_metadata(
    paths: &StatePaths,
    mut child: Option<std::process::Child>,
    timeout: Duration,
) -> Option<DaemonMetadata> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(metadata) = meta::read_valid(paths) {
            return Some(metadata);
        }
        if let Some(child) = child.as_mut() {
            if matches!(child.try_wait(), Ok(Some(_))) {
                // Worker died during startup; nothing more will appear.
                return None;
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(SPAWN_POLL_INTERVAL).await;
    }
}

/// Pull error lines from the worker log, scoped to the most recent
/// startup marker.
pub fn read_startup_error(paths: &StatePaths) -> Option<String> {
    let content = std::fs::read_to_string(paths.daemon_log()).ok()?;
    let start = content.rfind(STARTUP_MARKER_PREFIX)?;
    let errors: Vec<&str> = content[start..]
        .lines()
        .filter(|line| line.contains("ERROR") || line.contains("failed to start"))
        .collect();
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("\n"))
    }
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
