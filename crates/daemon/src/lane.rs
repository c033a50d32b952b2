// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lane key resolution.
//!
//! Pure and stateless: the same argv always maps to the same
//! `(laneKey, family)`, no matter what state the daemon is in. Command
//! paths come from the injected manifest; no I/O happens here.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use sw_core::{first_positional, flag_value, origin_of_url, CommandManifest, Family};

/// Maps argv to the lane that serializes its mutations.
pub struct LaneResolver {
    manifest: Arc<CommandManifest>,
    agent_id: String,
}

impl LaneResolver {
    pub fn new(manifest: Arc<CommandManifest>, agent_id: impl Into<String>) -> Self {
        Self {
            manifest,
            agent_id: agent_id.into(),
        }
    }

    /// Resolve `(laneKey, family)`. Rules, in order:
    /// 1. `--session <id>` partitions by session.
    /// 2. `session attach --cdp <url>` partitions by endpoint origin.
    /// 3. `open|run --profile <name>` partitions by profile.
    /// 4. `open|run --isolation=shared` share one origin lane.
    /// 5. `open <url>` partitions by the page origin.
    /// 6. Everything else lands on the agent's control lane.
    pub fn resolve(&self, argv: &[String]) -> (String, Family) {
        let matched = self.manifest.resolve(argv);
        let family = matched.map(|m| m.spec.family).unwrap_or(Family::Control);
        let path: &[&str] = matched.map(|m| m.spec.path).unwrap_or(&[]);
        let rest_start = matched.map(|m| m.consumed).unwrap_or(0);
        let rest = &argv[rest_start.min(argv.len())..];

        if let Some(session_id) = flag_value(rest, "--session") {
            return (format!("session:{session_id}"), family);
        }

        if path == ["session", "attach"] {
            if let Some(cdp) = flag_value(rest, "--cdp") {
                return (
                    format!("origin:{}", hash16(&cdp.to_ascii_lowercase())),
                    Family::SessionAttach,
                );
            }
        }

        let is_open_or_run = matches!(path, ["open"] | ["run"]);
        if is_open_or_run {
            if let Some(profile) = flag_value(rest, "--profile") {
                return (
                    format!("origin:profile:{}", profile.to_ascii_lowercase()),
                    family,
                );
            }
            if flag_value(rest, "--isolation") == Some("shared") {
                return ("origin:shared".to_string(), family);
            }
        }

        if path == ["open"] {
            if let Some(origin) = first_positional(rest, 0).and_then(origin_of_url) {
                return (format!("origin:url:{}", hash16(&origin)), family);
            }
        }

        if self.agent_id.is_empty() || self.agent_id == "default" {
            ("control:default".to_string(), family)
        } else {
            (format!("control:agent:{}", hash16(&self.agent_id)), family)
        }
    }
}

/// First 16 hex chars of SHA-256.
fn hash16(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "lane_tests.rs"]
mod tests;
