// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake browser port for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BrowserError, BrowserPort, LaunchedBrowser, StartSpec};

/// Recorded browser call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserCall {
    AllocateFreePort,
    StartManaged { debug_port: u16 },
    Probe { cdp_origin: String },
    AttachHandshake { cdp_origin: String },
    KillProcess { pid: u32 },
}

struct FakeBrowserState {
    calls: Vec<BrowserCall>,
    reachable: HashSet<String>,
    launch_fails: bool,
    next_port: u16,
    next_pid: u32,
    killed: Vec<u32>,
}

/// Fake browser port with scripted reachability.
#[derive(Clone)]
pub struct FakeBrowserPort {
    inner: Arc<Mutex<FakeBrowserState>>,
}

impl Default for FakeBrowserPort {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeBrowserState {
                calls: Vec::new(),
                reachable: HashSet::new(),
                launch_fails: false,
                next_port: 9300,
                next_pid: 50_000,
                killed: Vec::new(),
            })),
        }
    }
}

impl FakeBrowserPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an origin as reachable for probes and handshakes.
    pub fn set_reachable(&self, origin: &str, reachable: bool) {
        let mut state = self.inner.lock();
        if reachable {
            state.reachable.insert(origin.to_string());
        } else {
            state.reachable.remove(origin);
        }
    }

    /// Make every `start_managed` call fail.
    pub fn fail_launches(&self, fail: bool) {
        self.inner.lock().launch_fails = fail;
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<BrowserCall> {
        self.inner.lock().calls.clone()
    }

    pub fn probe_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, BrowserCall::Probe { .. }))
            .count()
    }

    pub fn start_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, BrowserCall::StartManaged { .. }))
            .count()
    }

    pub fn killed_pids(&self) -> Vec<u32> {
        self.inner.lock().killed.clone()
    }
}

#[async_trait]
impl BrowserPort for FakeBrowserPort {
    async fn allocate_free_port(&self) -> Result<u16, BrowserError> {
        let mut state = self.inner.lock();
        state.calls.push(BrowserCall::AllocateFreePort);
        let port = state.next_port;
        state.next_port += 1;
        Ok(port)
    }

    async fn start_managed(&self, spec: &StartSpec) -> Result<LaunchedBrowser, BrowserError> {
        let mut state = self.inner.lock();
        state.calls.push(BrowserCall::StartManaged {
            debug_port: spec.debug_port,
        });
        if state.launch_fails {
            return Err(BrowserError::LaunchFailed("scripted failure".to_string()));
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        let cdp_origin = format!("http://127.0.0.1:{}", spec.debug_port);
        state.reachable.insert(cdp_origin.clone());
        Ok(LaunchedBrowser {
            cdp_origin,
            debug_port: spec.debug_port,
            browser_pid: pid,
            browser_mode: spec.browser_mode,
        })
    }

    async fn probe(&self, cdp_origin: &str, _timeout: Duration) -> bool {
        let mut state = self.inner.lock();
        state.calls.push(BrowserCall::Probe {
            cdp_origin: cdp_origin.to_string(),
        });
        state.reachable.contains(cdp_origin)
    }

    async fn attach_handshake(
        &self,
        cdp_origin: &str,
        _timeout: Duration,
    ) -> Result<bool, BrowserError> {
        let mut state = self.inner.lock();
        state.calls.push(BrowserCall::AttachHandshake {
            cdp_origin: cdp_origin.to_string(),
        });
        Ok(state.reachable.contains(cdp_origin))
    }

    async fn kill_process(&self, pid: u32) -> Result<(), BrowserError> {
        let mut state = self.inner.lock();
        state.calls.push(BrowserCall::KillProcess { pid });
        state.killed.push(pid);
        Ok(())
    }
}
