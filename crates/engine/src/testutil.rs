// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use sw_adapters::FakeBrowserPort;
use sw_core::{BrowserMode, SessionKind, SessionPolicy, DEFAULT_PERSISTENT_LEASE_MS};
use sw_storage::{SessionRecord, StatePaths, TargetRecord};

use crate::runtime::{Runtime, RuntimeLimits};

pub(crate) fn test_limits() -> RuntimeLimits {
    RuntimeLimits {
        gc_enabled: true,
        gc_min_interval: Duration::from_millis(0),
        idle_process_ttl: Duration::from_millis(100),
        session_lease_ttl_ms: None,
        probe_timeout: Duration::from_millis(50),
    }
}

pub(crate) fn runtime_with_fake() -> (tempfile::TempDir, Arc<Runtime>, FakeBrowserPort) {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeBrowserPort::new();
    let runtime = Runtime::new(
        StatePaths::from_root(dir.path().to_path_buf()),
        Arc::new(fake.clone()),
        test_limits(),
        "agent-1".to_string(),
    );
    (dir, Arc::new(runtime), fake)
}

/// A valid managed record pointing at `origin`, one hour old.
pub(crate) fn managed_record(id: &str, origin: &str) -> SessionRecord {
    let now = Utc::now() - ChronoDuration::hours(1);
    SessionRecord {
        session_id: id.to_string(),
        kind: SessionKind::Managed,
        policy: SessionPolicy::Persistent,
        browser_mode: BrowserMode::Headless,
        cdp_origin: origin.to_string(),
        debug_port: sw_core::origin_host_port(origin).map(|(_, p)| p),
        user_data_dir: Some(std::path::PathBuf::from("/tmp/profiles").join(id)),
        browser_pid: Some(3_999_999_999),
        owner_id: "agent-1".to_string(),
        lease_expires_at: now + ChronoDuration::milliseconds(DEFAULT_PERSISTENT_LEASE_MS as i64),
        lease_ttl_ms: DEFAULT_PERSISTENT_LEASE_MS,
        managed_unreachable_since: None,
        managed_unreachable_count: 0,
        created_at: now,
        last_seen_at: now,
    }
}

/// A valid attached record pointing at `origin`.
pub(crate) fn attached_record(id: &str, origin: &str) -> SessionRecord {
    let mut record = managed_record(id, origin);
    record.kind = SessionKind::Attached;
    record.browser_mode = BrowserMode::Unknown;
    record.user_data_dir = None;
    record.browser_pid = None;
    record
}

pub(crate) fn target_record(id: &str, session_id: &str) -> TargetRecord {
    let now = Utc::now();
    TargetRecord {
        target_id: id.to_string(),
        session_id: session_id.to_string(),
        url: "https://example.com".to_string(),
        title: String::new(),
        status: "open".to_string(),
        last_action_id: None,
        last_action_at: None,
        last_action_kind: None,
        updated_at: now,
    }
}
