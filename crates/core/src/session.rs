// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session semantics: kind, policy, browser mode, and lease bounds.

use serde::{Deserialize, Serialize};

/// Shortest lease a session may hold.
pub const MIN_LEASE_MS: u64 = 60_000;
/// Longest lease a session may hold.
pub const MAX_LEASE_MS: u64 = 86_400_000;
/// Default lease for `policy=persistent` sessions (4 hours).
pub const DEFAULT_PERSISTENT_LEASE_MS: u64 = 4 * 60 * 60 * 1000;
/// Default lease for `policy=ephemeral` sessions (15 minutes).
pub const DEFAULT_EPHEMERAL_LEASE_MS: u64 = 15 * 60 * 1000;

/// Whether the runtime owns the browser process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Launched and owned by the runtime; has a user-data dir and pid.
    Managed,
    /// Connected over a caller-supplied debug endpoint; process not owned.
    Attached,
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionKind::Managed => f.write_str("managed"),
            SessionKind::Attached => f.write_str("attached"),
        }
    }
}

/// Lease policy controlling the default TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPolicy {
    #[default]
    Persistent,
    Ephemeral,
}

impl std::fmt::Display for SessionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPolicy::Persistent => f.write_str("persistent"),
            SessionPolicy::Ephemeral => f.write_str("ephemeral"),
        }
    }
}

/// Browser display mode. `Unknown` is only valid for attached sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserMode {
    #[default]
    Headless,
    Headed,
    Unknown,
}

impl std::fmt::Display for BrowserMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserMode::Headless => f.write_str("headless"),
            BrowserMode::Headed => f.write_str("headed"),
            BrowserMode::Unknown => f.write_str("unknown"),
        }
    }
}

/// Default lease TTL for a policy.
pub fn default_lease_ms(policy: SessionPolicy) -> u64 {
    match policy {
        SessionPolicy::Persistent => DEFAULT_PERSISTENT_LEASE_MS,
        SessionPolicy::Ephemeral => DEFAULT_EPHEMERAL_LEASE_MS,
    }
}

/// Resolve a requested TTL against policy defaults, clamped into
/// [`MIN_LEASE_MS`, `MAX_LEASE_MS`].
pub fn clamp_lease_ms(requested: Option<u64>, policy: SessionPolicy) -> u64 {
    requested
        .unwrap_or_else(|| default_lease_ms(policy))
        .clamp(MIN_LEASE_MS, MAX_LEASE_MS)
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
