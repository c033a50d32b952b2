// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process helpers: liveness probes and graceful termination.

use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::debug;

const TERMINATE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Check whether a pid refers to a live process.
pub fn pid_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    kill(Pid::from_raw(raw), None).is_ok()
}

/// SIGTERM, wait up to `grace`, then SIGKILL.
pub async fn terminate(pid: u32, grace: Duration) -> Result<(), String> {
    let raw = i32::try_from(pid).map_err(|_| format!("pid {pid} out of range"))?;
    let target = Pid::from_raw(raw);

    if kill(target, Signal::SIGTERM).is_err() {
        // Already gone.
        return Ok(());
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !pid_alive(pid) {
            return Ok(());
        }
        tokio::time::sleep(TERMINATE_POLL_INTERVAL).await;
    }

    debug!(pid, "process survived SIGTERM, sending SIGKILL");
    match kill(target, Signal::SIGKILL) {
        Ok(()) => Ok(()),
        Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
