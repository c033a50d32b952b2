// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    plain = { "s-1", Some("s-1") },
    dots_and_underscores = { "agent.worker_3", Some("agent.worker_3") },
    spaces_mapped = { "my session", Some("my-session") },
    slash_mapped = { "a/b", Some("a-b") },
    empty = { "", None },
    only_symbols = { "///", None },
)]
fn sanitize_cases(raw: &str, expected: Option<&str>) {
    assert_eq!(sanitize_id(raw).as_deref(), expected);
}

#[test]
fn sanitize_truncates_to_max_len() {
    let raw = "x".repeat(MAX_ID_LEN + 20);
    let id = sanitize_id(&raw).unwrap();
    assert_eq!(id.len(), MAX_ID_LEN);
}

#[test]
fn short_truncates() {
    let id = SessionId::new("s-123456789");
    assert_eq!(id.short(5), "s-123");
    assert_eq!(id.short(64), "s-123456789");
}

#[test]
fn id_equality_with_str() {
    let id = TargetId::new("t-1");
    assert_eq!(id, "t-1");
    assert_eq!(id.to_string(), "t-1");
}

#[test]
fn id_serde_roundtrip() {
    let id = CaptureId::new("cap-7");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"cap-7\"");
    let back: CaptureId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
