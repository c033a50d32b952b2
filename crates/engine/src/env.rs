// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.
//!
//! Read exactly once, at [`RuntimeLimits::from_env`](crate::RuntimeLimits)
//! construction time.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// `SURFWRIGHT_GC_ENABLED` — `0` disables opportunistic maintenance.
pub fn gc_enabled() -> bool {
    std::env::var("SURFWRIGHT_GC_ENABLED").map_or(true, |v| v != "0")
}

/// `SURFWRIGHT_GC_MIN_INTERVAL_MS` — floor between opportunistic passes.
pub fn gc_min_interval() -> Duration {
    parse_duration_ms("SURFWRIGHT_GC_MIN_INTERVAL_MS").unwrap_or(Duration::from_secs(30))
}

/// `SURFWRIGHT_IDLE_PROCESS_TTL_MS` — idle time before a managed browser
/// is parked.
pub fn idle_process_ttl() -> Duration {
    parse_duration_ms("SURFWRIGHT_IDLE_PROCESS_TTL_MS").unwrap_or(Duration::from_secs(600))
}

/// `SURFWRIGHT_SESSION_LEASE_TTL_MS` — default lease override, clamped
/// into lease bounds at use.
pub fn session_lease_ttl_ms() -> Option<u64> {
    std::env::var("SURFWRIGHT_SESSION_LEASE_TTL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
}

/// `SURFWRIGHT_AGENT_ID` — identifier of the invoking agent.
pub fn agent_id() -> String {
    std::env::var("SURFWRIGHT_AGENT_ID")
        .ok()
        .and_then(|raw| sw_core::sanitize_id(&raw))
        .unwrap_or_else(|| "default".to_string())
}
