// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.
//!
//! Limits are read once at daemon start and carried in [`DaemonLimits`].

use std::time::Duration;

fn parse_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok())
}

/// Scheduler and transport tunables.
#[derive(Debug, Clone)]
pub struct DaemonLimits {
    /// `SURFWRIGHT_MAX_ACTIVE` — concurrent tasks across all lanes.
    pub max_active: usize,
    /// `SURFWRIGHT_MAX_QUEUE_DEPTH` — queued tasks per lane.
    pub max_queue_depth: usize,
    /// `SURFWRIGHT_QUEUE_WAIT_MS` — queue-wait deadline.
    pub queue_wait: Duration,
    /// `SURFWRIGHT_DAEMON_IDLE_MS` — idle shutdown timer.
    pub idle_timeout: Duration,
}

impl Default for DaemonLimits {
    fn default() -> Self {
        Self {
            max_active: 8,
            max_queue_depth: 8,
            queue_wait: Duration::from_millis(2000),
            idle_timeout: Duration::from_millis(15_000),
        }
    }
}

impl DaemonLimits {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_active: parse_u64("SURFWRIGHT_MAX_ACTIVE")
                .map(|n| n.max(1) as usize)
                .unwrap_or(defaults.max_active),
            max_queue_depth: parse_u64("SURFWRIGHT_MAX_QUEUE_DEPTH")
                .map(|n| n.max(1) as usize)
                .unwrap_or(defaults.max_queue_depth),
            queue_wait: parse_u64("SURFWRIGHT_QUEUE_WAIT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.queue_wait),
            idle_timeout: parse_u64("SURFWRIGHT_DAEMON_IDLE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.idle_timeout),
        }
    }
}
