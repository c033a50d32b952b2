// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser driver port.
//!
//! The core owns the session record; the driver owns the OS process.
//! Protocol semantics (pages, clicks, captures) live behind this seam and
//! are not part of the core.

mod chromium;

pub use chromium::ChromiumAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{BrowserCall, FakeBrowserPort};

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sw_core::BrowserMode;
use thiserror::Error;

/// Errors from browser driver operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("no browser binary found: {0}")]
    BinaryNotFound(String),
    #[error("launch failed: {0}")]
    LaunchFailed(String),
    #[error("debug endpoint not ready after {0:?}")]
    EndpointNotReady(Duration),
    #[error("kill failed for pid {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Launch parameters for a managed browser.
#[derive(Debug, Clone)]
pub struct StartSpec {
    pub debug_port: u16,
    pub user_data_dir: PathBuf,
    pub browser_mode: BrowserMode,
}

/// What a successful launch yields; the caller folds this into its
/// session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedBrowser {
    pub cdp_origin: String,
    pub debug_port: u16,
    pub browser_pid: u32,
    pub browser_mode: BrowserMode,
}

/// Abstract contract for launching, probing, and attaching real browsers.
#[async_trait]
pub trait BrowserPort: Send + Sync + 'static {
    /// Pick an ephemeral TCP port for a new debug endpoint.
    async fn allocate_free_port(&self) -> Result<u16, BrowserError>;

    /// Launch a browser per `spec` and wait until its debug endpoint
    /// accepts connections.
    async fn start_managed(&self, spec: &StartSpec) -> Result<LaunchedBrowser, BrowserError>;

    /// Short reachability check of a debug endpoint.
    async fn probe(&self, cdp_origin: &str, timeout: Duration) -> bool;

    /// Deeper probe used on explicit attach: the endpoint must answer on
    /// a fresh connection.
    async fn attach_handshake(&self, cdp_origin: &str, timeout: Duration) -> Result<bool, BrowserError>;

    /// Terminate a managed browser process (idle parking, relaunch).
    async fn kill_process(&self, pid: u32) -> Result<(), BrowserError>;
}
