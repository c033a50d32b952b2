// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared record fixtures for storage tests.

use chrono::{TimeZone, Utc};
use sw_core::{BrowserMode, SessionKind, SessionPolicy, DEFAULT_PERSISTENT_LEASE_MS};

use crate::state::{SessionRecord, TargetRecord};

pub(crate) fn session_fixture(id: &str) -> SessionRecord {
    let now = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
    SessionRecord {
        session_id: id.to_string(),
        kind: SessionKind::Managed,
        policy: SessionPolicy::Persistent,
        browser_mode: BrowserMode::Headless,
        cdp_origin: "http://127.0.0.1:9222".to_string(),
        debug_port: Some(9222),
        user_data_dir: Some(std::path::PathBuf::from("/tmp/profiles").join(id)),
        browser_pid: Some(4242),
        owner_id: "agent-1".to_string(),
        lease_expires_at: now + chrono::Duration::hours(4),
        lease_ttl_ms: DEFAULT_PERSISTENT_LEASE_MS,
        managed_unreachable_since: None,
        managed_unreachable_count: 0,
        created_at: now,
        last_seen_at: now,
    }
}

pub(crate) fn target_fixture(id: &str, session_id: &str) -> TargetRecord {
    let now = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
    TargetRecord {
        target_id: id.to_string(),
        session_id: session_id.to_string(),
        url: "https://example.com".to_string(),
        title: "Example".to_string(),
        status: "open".to_string(),
        last_action_id: None,
        last_action_at: None,
        last_action_kind: None,
        updated_at: now,
    }
}
