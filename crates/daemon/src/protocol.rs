// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol types for daemon communication.
//!
//! Requests carry the shared-secret token as a sibling of `kind`;
//! responses are `{ok:true, kind, …}` on success and
//! `{ok:false, code, message}` on failure, exactly as on the wire.

use serde::{Deserialize, Serialize};
use sw_core::{Error, ErrorCode};
use sw_engine::RunOutcome;

/// Request from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub token: String,
    #[serde(flatten)]
    pub kind: RequestKind,
}

/// The request body, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RequestKind {
    /// Health check
    Ping,
    /// Close the listener after responding
    Shutdown,
    /// Execute one argv through the lane scheduler
    Run { argv: Vec<String> },
}

/// Response from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Response {
    Success(SuccessResponse),
    Failure(FailureResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuccessResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub body: SuccessBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SuccessBody {
    Pong,
    Shutdown,
    Run {
        code: i32,
        stdout: String,
        stderr: String,
    },
}

/// Typed failure envelope. The daemon fills `code` and `message`; the
/// client adds `retryable` from the central error table when it emits the
/// final envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureResponse {
    pub ok: bool,
    pub code: String,
    pub message: String,
}

impl Response {
    pub fn pong() -> Self {
        Response::Success(SuccessResponse {
            ok: true,
            body: SuccessBody::Pong,
        })
    }

    pub fn shutdown() -> Self {
        Response::Success(SuccessResponse {
            ok: true,
            body: SuccessBody::Shutdown,
        })
    }

    pub fn run(outcome: RunOutcome) -> Self {
        Response::Success(SuccessResponse {
            ok: true,
            body: SuccessBody::Run {
                code: outcome.code,
                stdout: outcome.stdout,
                stderr: outcome.stderr,
            },
        })
    }

    pub fn failure(error: &Error) -> Self {
        Response::Failure(FailureResponse {
            ok: false,
            code: error.code.as_str().to_string(),
            message: error.message.clone(),
        })
    }

    pub fn failure_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::failure(&Error::new(code, message))
    }
}

impl FailureResponse {
    /// Reconstruct a typed error, preserving unknown codes as internal.
    pub fn to_error(&self) -> Error {
        match ErrorCode::parse(&self.code) {
            Some(code) => Error::new(code, self.message.clone()),
            None => Error::internal(format!("{}: {}", self.code, self.message)),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
