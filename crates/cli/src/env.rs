// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the CLI crate.

use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// `SURFWRIGHT_DAEMON` — `0` disables the daemon path entirely.
pub fn daemon_enabled() -> bool {
    std::env::var("SURFWRIGHT_DAEMON").map_or(true, |v| v != "0")
}

/// `SURFWRIGHT_TIMEOUT_CONNECT_MS` — deadline for connect and for a
/// spawned worker to come up.
pub fn timeout_connect() -> Duration {
    parse_duration_ms("SURFWRIGHT_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_millis(3000))
}

/// `SURFWRIGHT_TIMEOUT_IPC_MS` — deadline for one request/response
/// round-trip. Generous: `run` requests take as long as the command.
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("SURFWRIGHT_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(120))
}

/// `SURFWRIGHT_DAEMON_BINARY` — explicit worker binary override.
pub fn daemon_binary() -> Option<String> {
    std::env::var("SURFWRIGHT_DAEMON_BINARY").ok()
}

/// `SURFWRIGHT_AGENT_ID`, sanitized, defaulting to `default`.
pub fn agent_id() -> String {
    std::env::var("SURFWRIGHT_AGENT_ID")
        .ok()
        .and_then(|raw| sw_core::sanitize_id(&raw))
        .unwrap_or_else(|| "default".to_string())
}
