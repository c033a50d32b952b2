// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistent state document and its records.
//!
//! Maps are `BTreeMap` so the serialized form has stable key order.
//! Unknown top-level fields written by newer binaries are preserved
//! through the flattened `extra` map.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sw_core::{
    normalize_cdp_origin, sanitize_id, BrowserMode, Error, ErrorCode, SessionKind, SessionPolicy,
    MAX_LEASE_MS, MIN_LEASE_MS,
};

/// Current schema version of `state.json`.
pub const STATE_VERSION: u32 = 1;

/// A browser attachment, managed or attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: String,
    pub kind: SessionKind,
    #[serde(default)]
    pub policy: SessionPolicy,
    #[serde(default)]
    pub browser_mode: BrowserMode,
    pub cdp_origin: String,
    #[serde(default)]
    pub debug_port: Option<u16>,
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,
    #[serde(default)]
    pub browser_pid: Option<u32>,
    #[serde(default)]
    pub owner_id: String,
    pub lease_expires_at: DateTime<Utc>,
    pub lease_ttl_ms: u64,
    #[serde(default)]
    pub managed_unreachable_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub managed_unreachable_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Record-level invariants (§ data model).
    pub fn validate(&self) -> sw_core::Result<()> {
        match sanitize_id(&self.session_id) {
            Some(clean) if clean == self.session_id => {}
            _ => {
                return Err(Error::new(
                    ErrorCode::SessionConflict,
                    format!("invalid session id: {:?}", self.session_id),
                ));
            }
        }
        if self.kind == SessionKind::Managed && self.user_data_dir.is_none() {
            return Err(Error::new(
                ErrorCode::SessionConflict,
                format!("managed session {} has no user data dir", self.session_id),
            ));
        }
        if self.kind == SessionKind::Managed && self.browser_mode == BrowserMode::Unknown {
            return Err(Error::new(
                ErrorCode::SessionConflict,
                format!("managed session {} has unknown browser mode", self.session_id),
            ));
        }
        if !(MIN_LEASE_MS..=MAX_LEASE_MS).contains(&self.lease_ttl_ms) {
            return Err(Error::new(
                ErrorCode::SessionConflict,
                format!(
                    "session {} lease ttl {}ms out of bounds",
                    self.session_id, self.lease_ttl_ms
                ),
            ));
        }
        let normalized = normalize_cdp_origin(&self.cdp_origin)?;
        if normalized != self.cdp_origin {
            return Err(Error::new(
                ErrorCode::CdpInvalid,
                format!(
                    "session {} cdp origin not normalized: {}",
                    self.session_id, self.cdp_origin
                ),
            ));
        }
        Ok(())
    }

    /// Refresh liveness after a successful reachability check.
    pub fn heartbeat(&mut self, now: DateTime<Utc>) {
        self.last_seen_at = now;
        self.lease_expires_at = now + ChronoDuration::milliseconds(self.lease_ttl_ms as i64);
    }

    /// A failed probe: bump the counter, preserve the first-failure time.
    pub fn mark_unreachable(&mut self, now: DateTime<Utc>) {
        self.managed_unreachable_count = self.managed_unreachable_count.saturating_add(1);
        self.managed_unreachable_since.get_or_insert(now);
    }

    /// A successful probe clears the unreachable tracking.
    pub fn mark_reachable(&mut self) {
        self.managed_unreachable_count = 0;
        self.managed_unreachable_since = None;
    }

    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.lease_expires_at < now
    }
}

/// A single page handle within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
    pub target_id: String,
    pub session_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_action_id: Option<String>,
    #[serde(default)]
    pub last_action_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_action_kind: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Capture lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    Recording,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureStatus::Recording => f.write_str("recording"),
            CaptureStatus::Completed => f.write_str("completed"),
            CaptureStatus::Failed => f.write_str("failed"),
            CaptureStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// An in-progress or finished network recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCaptureRecord {
    pub capture_id: String,
    pub session_id: String,
    pub target_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    pub status: CaptureStatus,
    /// Owner while recording; null once idle.
    #[serde(default)]
    pub worker_pid: Option<u32>,
    pub stop_signal_path: PathBuf,
    pub done_path: PathBuf,
    pub result_path: PathBuf,
}

/// A persisted artifact on disk, indexed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkArtifactRecord {
    pub artifact_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_artifact_format")]
    pub format: String,
    pub path: PathBuf,
    pub session_id: String,
    pub target_id: String,
    #[serde(default)]
    pub capture_id: Option<String>,
    #[serde(default)]
    pub entries: u64,
    #[serde(default)]
    pub bytes: u64,
}

fn default_artifact_format() -> String {
    "har".to_string()
}

/// The whole persisted document. One transactional writer at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDocument {
    pub version: u32,
    #[serde(default)]
    pub active_session_id: Option<String>,
    #[serde(default = "one")]
    pub next_session_ordinal: u64,
    #[serde(default = "one")]
    pub next_capture_ordinal: u64,
    #[serde(default = "one")]
    pub next_artifact_ordinal: u64,
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionRecord>,
    #[serde(default)]
    pub targets: BTreeMap<String, TargetRecord>,
    #[serde(default)]
    pub network_captures: BTreeMap<String, NetworkCaptureRecord>,
    #[serde(default)]
    pub network_artifacts: BTreeMap<String, NetworkArtifactRecord>,
    /// Fields written by newer binaries, preserved unchanged.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn one() -> u64 {
    1
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            active_session_id: None,
            next_session_ordinal: 1,
            next_capture_ordinal: 1,
            next_artifact_ordinal: 1,
            sessions: BTreeMap::new(),
            targets: BTreeMap::new(),
            network_captures: BTreeMap::new(),
            network_artifacts: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl StateDocument {
    /// Repair a loaded document. Returns a description of each repair for
    /// logging; an empty vec means the document was already well-formed.
    pub fn normalize(&mut self) -> Vec<String> {
        let mut repairs = Vec::new();

        // Ordinals: at least 1, and past every id already allocated.
        for (ordinal, prefix, ids) in [
            (
                &mut self.next_session_ordinal,
                "s-",
                self.sessions.keys().collect::<Vec<_>>(),
            ),
            (
                &mut self.next_capture_ordinal,
                "cap-",
                self.network_captures.keys().collect::<Vec<_>>(),
            ),
            (
                &mut self.next_artifact_ordinal,
                "art-",
                self.network_artifacts.keys().collect::<Vec<_>>(),
            ),
        ] {
            let max_seen = ids
                .iter()
                .filter_map(|id| id.strip_prefix(prefix))
                .filter_map(|n| n.parse::<u64>().ok())
                .max()
                .unwrap_or(0);
            let floor = max_seen + 1;
            if *ordinal < floor {
                repairs.push(format!("ordinal {prefix} bumped {ordinal} -> {floor}"));
                *ordinal = floor;
            }
        }

        // Orphan targets reference a session that no longer exists.
        let orphans: Vec<String> = self
            .targets
            .iter()
            .filter(|(_, t)| !self.sessions.contains_key(&t.session_id))
            .map(|(id, _)| id.clone())
            .collect();
        for id in orphans {
            repairs.push(format!("removed orphan target {id}"));
            self.targets.remove(&id);
        }

        if let Some(active) = &self.active_session_id {
            if !self.sessions.contains_key(active) {
                repairs.push(format!("cleared dangling active session {active}"));
                self.active_session_id = None;
            }
        }

        repairs
    }

    /// Document-level invariants, checked before every persist.
    pub fn validate(&self) -> sw_core::Result<()> {
        for (key, session) in &self.sessions {
            if key != &session.session_id {
                return Err(Error::internal(format!(
                    "session map key {key} does not match record id {}",
                    session.session_id
                )));
            }
            session.validate()?;
        }
        for (key, target) in &self.targets {
            if key != &target.target_id {
                return Err(Error::internal(format!(
                    "target map key {key} does not match record id {}",
                    target.target_id
                )));
            }
            if !self.sessions.contains_key(&target.session_id) {
                return Err(Error::internal(format!(
                    "target {} references missing session {}",
                    target.target_id, target.session_id
                )));
            }
        }
        if let Some(active) = &self.active_session_id {
            if !self.sessions.contains_key(active) {
                return Err(Error::internal(format!(
                    "active session {active} not present"
                )));
            }
        }
        Ok(())
    }

    /// Allocate the next managed session id.
    pub fn allocate_session_id(&mut self) -> String {
        let id = format!("s-{}", self.next_session_ordinal);
        self.next_session_ordinal += 1;
        id
    }

    pub fn allocate_capture_id(&mut self) -> String {
        let id = format!("cap-{}", self.next_capture_ordinal);
        self.next_capture_ordinal += 1;
        id
    }

    pub fn allocate_artifact_id(&mut self) -> String {
        let id = format!("art-{}", self.next_artifact_ordinal);
        self.next_artifact_ordinal += 1;
        id
    }

    /// Sessions in deterministic order: `createdAt`, then id ascending.
    pub fn sessions_ordered(&self) -> Vec<&SessionRecord> {
        let mut sessions: Vec<&SessionRecord> = self.sessions.values().collect();
        sessions.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        sessions
    }

    /// Targets of one session, most recently updated first, ties broken by
    /// `targetId` ascending.
    pub fn session_targets(&self, session_id: &str) -> Vec<&TargetRecord> {
        let mut targets: Vec<&TargetRecord> = self
            .targets
            .values()
            .filter(|t| t.session_id == session_id)
            .collect();
        targets.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        targets
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
