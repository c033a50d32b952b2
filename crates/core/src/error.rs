// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Central failure taxonomy.
//!
//! Every failure that crosses a component boundary carries an
//! [`ErrorCode`]. Only `code` and `retryable` are contractually stable;
//! messages are informational. Retryability is fixed per code in exactly
//! one place — [`ErrorCode::retryable`] — and the client layer consults
//! it when emitting envelopes.

use serde::{Deserialize, Serialize};

/// Stable wire codes for typed failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    StateLockTimeout,
    StateLockIo,
    StateCorrupt,
    StateVersionMismatch,
    DaemonUnreachable,
    DaemonTokenInvalid,
    DaemonRequestInvalid,
    DaemonRunFailed,
    DaemonQueueSaturated,
    DaemonQueueTimeout,
    SessionNotFound,
    SessionExists,
    SessionConflict,
    SessionUnreachable,
    CdpInvalid,
    CdpUnreachable,
    QueryInvalid,
    Internal,
}

impl ErrorCode {
    /// Wire representation, e.g. `E_STATE_LOCK_TIMEOUT`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::StateLockTimeout => "E_STATE_LOCK_TIMEOUT",
            ErrorCode::StateLockIo => "E_STATE_LOCK_IO",
            ErrorCode::StateCorrupt => "E_STATE_CORRUPT",
            ErrorCode::StateVersionMismatch => "E_STATE_VERSION_MISMATCH",
            ErrorCode::DaemonUnreachable => "E_DAEMON_UNREACHABLE",
            ErrorCode::DaemonTokenInvalid => "E_DAEMON_TOKEN_INVALID",
            ErrorCode::DaemonRequestInvalid => "E_DAEMON_REQUEST_INVALID",
            ErrorCode::DaemonRunFailed => "E_DAEMON_RUN_FAILED",
            ErrorCode::DaemonQueueSaturated => "E_DAEMON_QUEUE_SATURATED",
            ErrorCode::DaemonQueueTimeout => "E_DAEMON_QUEUE_TIMEOUT",
            ErrorCode::SessionNotFound => "E_SESSION_NOT_FOUND",
            ErrorCode::SessionExists => "E_SESSION_EXISTS",
            ErrorCode::SessionConflict => "E_SESSION_CONFLICT",
            ErrorCode::SessionUnreachable => "E_SESSION_UNREACHABLE",
            ErrorCode::CdpInvalid => "E_CDP_INVALID",
            ErrorCode::CdpUnreachable => "E_CDP_UNREACHABLE",
            ErrorCode::QueryInvalid => "E_QUERY_INVALID",
            ErrorCode::Internal => "E_INTERNAL",
        }
    }

    /// Parse a wire code. Unknown codes map to `None`; the caller decides
    /// whether to forward them opaquely or degrade to `Internal`.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "E_STATE_LOCK_TIMEOUT" => ErrorCode::StateLockTimeout,
            "E_STATE_LOCK_IO" => ErrorCode::StateLockIo,
            "E_STATE_CORRUPT" => ErrorCode::StateCorrupt,
            "E_STATE_VERSION_MISMATCH" => ErrorCode::StateVersionMismatch,
            "E_DAEMON_UNREACHABLE" => ErrorCode::DaemonUnreachable,
            "E_DAEMON_TOKEN_INVALID" => ErrorCode::DaemonTokenInvalid,
            "E_DAEMON_REQUEST_INVALID" => ErrorCode::DaemonRequestInvalid,
            "E_DAEMON_RUN_FAILED" => ErrorCode::DaemonRunFailed,
            "E_DAEMON_QUEUE_SATURATED" => ErrorCode::DaemonQueueSaturated,
            "E_DAEMON_QUEUE_TIMEOUT" => ErrorCode::DaemonQueueTimeout,
            "E_SESSION_NOT_FOUND" => ErrorCode::SessionNotFound,
            "E_SESSION_EXISTS" => ErrorCode::SessionExists,
            "E_SESSION_CONFLICT" => ErrorCode::SessionConflict,
            "E_SESSION_UNREACHABLE" => ErrorCode::SessionUnreachable,
            "E_CDP_INVALID" => ErrorCode::CdpInvalid,
            "E_CDP_UNREACHABLE" => ErrorCode::CdpUnreachable,
            "E_QUERY_INVALID" => ErrorCode::QueryInvalid,
            "E_INTERNAL" => ErrorCode::Internal,
            _ => return None,
        })
    }

    /// Fixed retryability contract (§ error taxonomy).
    pub fn retryable(self) -> bool {
        match self {
            ErrorCode::StateLockTimeout
            | ErrorCode::StateLockIo
            | ErrorCode::DaemonUnreachable
            | ErrorCode::DaemonRunFailed
            | ErrorCode::DaemonQueueSaturated
            | ErrorCode::DaemonQueueTimeout
            | ErrorCode::SessionUnreachable
            | ErrorCode::CdpUnreachable
            | ErrorCode::Internal => true,
            ErrorCode::StateCorrupt
            | ErrorCode::StateVersionMismatch
            | ErrorCode::DaemonTokenInvalid
            | ErrorCode::DaemonRequestInvalid
            | ErrorCode::SessionNotFound
            | ErrorCode::SessionExists
            | ErrorCode::SessionConflict
            | ErrorCode::CdpInvalid
            | ErrorCode::QueryInvalid => false,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ErrorCode::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown error code: {s}")))
    }
}

/// A typed failure threaded through result values.
///
/// Never thrown for control flow across component boundaries; constructed
/// where the failure is classified and propagated with `?`.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint_context: Option<serde_json::Value>,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hints: Vec::new(),
            hint_context: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn with_hint_context(mut self, context: serde_json::Value) -> Self {
        self.hint_context = Some(context);
        self
    }

    pub fn retryable(&self) -> bool {
        self.code.retryable()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    pub fn query_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::QueryInvalid, message)
    }

    /// The `{ok:false, …}` envelope emitted as the final stdout line on
    /// failure paths. The client is the layer that attaches `retryable`.
    pub fn to_envelope(&self) -> serde_json::Value {
        let mut envelope = serde_json::json!({
            "ok": false,
            "code": self.code,
            "message": self.message,
            "retryable": self.retryable(),
        });
        if !self.hints.is_empty() {
            envelope["hints"] = serde_json::json!(self.hints);
        }
        if let Some(context) = &self.hint_context {
            envelope["hintContext"] = context.clone();
        }
        envelope
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
