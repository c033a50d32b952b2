// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol wire-shape tests

use super::*;
use serde_json::json;
use sw_core::ErrorCode;

#[test]
fn request_wire_shapes() {
    let ping: Request = serde_json::from_value(json!({
        "token": "deadbeef", "kind": "ping",
    }))
    .unwrap();
    assert_eq!(ping.token, "deadbeef");
    assert_eq!(ping.kind, RequestKind::Ping);

    let run: Request = serde_json::from_value(json!({
        "token": "deadbeef", "kind": "run", "argv": ["target", "click", "#go"],
    }))
    .unwrap();
    let RequestKind::Run { argv } = &run.kind else {
        panic!("expected run: {run:?}");
    };
    assert_eq!(argv, &["target", "click", "#go"]);

    // Serialization puts token and kind side by side.
    let value = serde_json::to_value(&run).unwrap();
    assert_eq!(value["token"], "deadbeef");
    assert_eq!(value["kind"], "run");
    assert_eq!(value["argv"][0], "target");
}

#[test]
fn response_success_shapes() {
    let value = serde_json::to_value(Response::pong()).unwrap();
    assert_eq!(value, json!({"ok": true, "kind": "pong"}));

    let value = serde_json::to_value(Response::run(sw_engine::RunOutcome {
        code: 0,
        stdout: "{\"ok\":true}\n".to_string(),
        stderr: String::new(),
    }))
    .unwrap();
    assert_eq!(value["ok"], true);
    assert_eq!(value["kind"], "run");
    assert_eq!(value["code"], 0);
    assert_eq!(value["stdout"], "{\"ok\":true}\n");
}

#[test]
fn response_failure_shape() {
    let value = serde_json::to_value(Response::failure_code(
        ErrorCode::DaemonTokenInvalid,
        "token mismatch",
    ))
    .unwrap();
    assert_eq!(
        value,
        json!({"ok": false, "code": "E_DAEMON_TOKEN_INVALID", "message": "token mismatch"})
    );
}

#[test]
fn response_roundtrip_disambiguates_untagged() {
    for response in [
        Response::pong(),
        Response::shutdown(),
        Response::run(sw_engine::RunOutcome {
            code: 3,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
        }),
        Response::failure_code(ErrorCode::DaemonQueueSaturated, "lane full"),
    ] {
        let encoded = serde_json::to_string(&response).unwrap();
        let decoded: Response = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, response);
    }
}

#[test]
fn failure_to_error_preserves_known_codes() {
    let failure = FailureResponse {
        ok: false,
        code: "E_DAEMON_QUEUE_TIMEOUT".to_string(),
        message: "waited too long".to_string(),
    };
    let error = failure.to_error();
    assert_eq!(error.code, ErrorCode::DaemonQueueTimeout);
    assert!(error.retryable());

    let unknown = FailureResponse {
        ok: false,
        code: "E_FROM_THE_FUTURE".to_string(),
        message: "?".to_string(),
    };
    let error = unknown.to_error();
    assert_eq!(error.code, ErrorCode::Internal);
    assert!(error.message.contains("E_FROM_THE_FUTURE"));
}
