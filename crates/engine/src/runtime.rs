// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The explicit runtime value threaded through every engine call.

use std::sync::Arc;
use std::time::Duration;

use sw_adapters::{BrowserPort, ReachCache};
use sw_storage::{StatePaths, StateStore};

use crate::env;

/// Tunables captured from the environment at construction.
#[derive(Debug, Clone)]
pub struct RuntimeLimits {
    pub gc_enabled: bool,
    pub gc_min_interval: Duration,
    pub idle_process_ttl: Duration,
    pub session_lease_ttl_ms: Option<u64>,
    /// Default deadline for a single reachability probe.
    pub probe_timeout: Duration,
}

impl Default for RuntimeLimits {
    fn default() -> Self {
        Self {
            gc_enabled: true,
            gc_min_interval: Duration::from_secs(30),
            idle_process_ttl: Duration::from_secs(600),
            session_lease_ttl_ms: None,
            probe_timeout: Duration::from_millis(1000),
        }
    }
}

impl RuntimeLimits {
    pub fn from_env() -> Self {
        Self {
            gc_enabled: env::gc_enabled(),
            gc_min_interval: env::gc_min_interval(),
            idle_process_ttl: env::idle_process_ttl(),
            session_lease_ttl_ms: env::session_lease_ttl_ms(),
            probe_timeout: Duration::from_millis(1000),
        }
    }
}

/// Shared dependencies for session resolution and maintenance.
pub struct Runtime {
    store: StateStore,
    browser: Arc<dyn BrowserPort>,
    reach: ReachCache,
    limits: RuntimeLimits,
    agent_id: String,
}

impl Runtime {
    pub fn new(
        paths: StatePaths,
        browser: Arc<dyn BrowserPort>,
        limits: RuntimeLimits,
        agent_id: String,
    ) -> Self {
        Self {
            store: StateStore::new(paths),
            browser,
            reach: ReachCache::default(),
            limits,
            agent_id,
        }
    }

    /// Construct against the process environment: state root, limits,
    /// and agent id all resolved here, never mid-call.
    pub fn from_env(browser: Arc<dyn BrowserPort>) -> sw_core::Result<Self> {
        let paths = StatePaths::resolve()?;
        Ok(Self::new(
            paths,
            browser,
            RuntimeLimits::from_env(),
            env::agent_id(),
        ))
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn paths(&self) -> &StatePaths {
        self.store.paths()
    }

    pub fn browser(&self) -> &Arc<dyn BrowserPort> {
        &self.browser
    }

    pub fn reach_cache(&self) -> &ReachCache {
        &self.reach
    }

    pub fn limits(&self) -> &RuntimeLimits {
        &self.limits
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}
