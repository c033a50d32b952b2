// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session resolution: create, attach, ensure, switch, and the action
//! helper.
//!
//! Reachability repair is local to the session being resolved;
//! `session_ensure` never sweeps other sessions (that is `session prune`
//! territory).

use chrono::Utc;
use serde::Serialize;
use sw_adapters::{BrowserError, StartSpec};
use sw_core::{
    clamp_lease_ms, normalize_cdp_origin, origin_host_port, sanitize_id, BrowserMode, Error,
    ErrorCode, SessionKind, SessionPolicy,
};
use sw_storage::SessionRecord;
use tracing::{debug, info, warn};

use crate::runtime::Runtime;

/// How a session was chosen for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Explicit,
    Active,
    Target,
    New,
    Attached,
}

/// Result of any resolver operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session: SessionRecord,
    pub session_source: SessionSource,
    pub restarted: bool,
}

/// Hints for [`Runtime::resolve_for_action`].
#[derive(Debug, Clone, Default)]
pub struct ActionHint {
    pub session_id: Option<String>,
    pub target_id: Option<String>,
}

impl Runtime {
    /// Launch a managed browser session and make it active.
    pub async fn session_new(
        &self,
        requested_id: Option<&str>,
        policy: Option<SessionPolicy>,
        lease_ttl_ms: Option<u64>,
        browser_mode: Option<BrowserMode>,
    ) -> sw_core::Result<SessionReport> {
        let mode = match browser_mode {
            None => BrowserMode::Headless,
            Some(BrowserMode::Unknown) => {
                return Err(Error::query_invalid(
                    "managed sessions cannot use browser mode `unknown`",
                ));
            }
            Some(mode) => mode,
        };
        let policy = policy.unwrap_or_default();
        let lease_ttl_ms =
            clamp_lease_ms(lease_ttl_ms.or(self.limits().session_lease_ttl_ms), policy);

        let session_id = match requested_id {
            Some(raw) => {
                let id = checked_session_id(raw)?;
                if self.store().read().map_err(Error::from)?.sessions.contains_key(&id) {
                    return Err(Error::new(
                        ErrorCode::SessionExists,
                        format!("session already exists: {id}"),
                    ));
                }
                id
            }
            None => self
                .store()
                .mutate(|doc| Ok(doc.allocate_session_id()))
                .map_err(Error::from)?,
        };

        let launched = self.launch_managed(&session_id, mode).await?;
        let now = Utc::now();
        let record = SessionRecord {
            session_id: session_id.clone(),
            kind: SessionKind::Managed,
            policy,
            browser_mode: mode,
            cdp_origin: launched.cdp_origin.clone(),
            debug_port: Some(launched.debug_port),
            user_data_dir: Some(self.paths().profile_dir(&session_id)?),
            browser_pid: Some(launched.browser_pid),
            owner_id: self.agent_id().to_string(),
            lease_expires_at: now + chrono::Duration::milliseconds(lease_ttl_ms as i64),
            lease_ttl_ms,
            managed_unreachable_since: None,
            managed_unreachable_count: 0,
            created_at: now,
            last_seen_at: now,
        };

        let inserted = self.store().mutate(|doc| {
            if doc.sessions.contains_key(&session_id) {
                return Err(Error::new(
                    ErrorCode::SessionExists,
                    format!("session already exists: {session_id}"),
                ));
            }
            doc.sessions.insert(session_id.clone(), record.clone());
            doc.active_session_id = Some(session_id.clone());
            Ok(())
        });
        if let Err(e) = inserted {
            // Lost a creation race after launching: release the process.
            let _ = self.browser().kill_process(launched.browser_pid).await;
            return Err(e.into());
        }

        self.reach_cache().put(&record.cdp_origin, true);
        info!(session_id = %record.session_id, origin = %record.cdp_origin, "managed session created");
        Ok(SessionReport {
            session: record,
            session_source: SessionSource::New,
            restarted: false,
        })
    }

    /// Attach to a caller-supplied debug endpoint and make it active.
    pub async fn session_attach(
        &self,
        requested_id: Option<&str>,
        cdp_origin: &str,
        lease_ttl_ms: Option<u64>,
        policy: Option<SessionPolicy>,
    ) -> sw_core::Result<SessionReport> {
        let origin = normalize_cdp_origin(cdp_origin)?;
        let answered = self
            .browser()
            .attach_handshake(&origin, self.limits().probe_timeout * 2)
            .await
            .map_err(browser_error)?;
        if !answered {
            return Err(Error::new(
                ErrorCode::CdpUnreachable,
                format!("debug endpoint did not answer: {origin}"),
            ));
        }

        let policy = policy.unwrap_or_default();
        let lease_ttl_ms =
            clamp_lease_ms(lease_ttl_ms.or(self.limits().session_lease_ttl_ms), policy);
        let session_id = match requested_id {
            Some(raw) => checked_session_id(raw)?,
            None => self
                .store()
                .mutate(|doc| Ok(doc.allocate_session_id()))
                .map_err(Error::from)?,
        };

        let now = Utc::now();
        let debug_port = origin_host_port(&origin).map(|(_, port)| port);
        let record = SessionRecord {
            session_id: session_id.clone(),
            kind: SessionKind::Attached,
            policy,
            browser_mode: BrowserMode::Unknown,
            cdp_origin: origin.clone(),
            debug_port,
            user_data_dir: None,
            browser_pid: None,
            owner_id: self.agent_id().to_string(),
            lease_expires_at: now + chrono::Duration::milliseconds(lease_ttl_ms as i64),
            lease_ttl_ms,
            managed_unreachable_since: None,
            managed_unreachable_count: 0,
            created_at: now,
            last_seen_at: now,
        };

        let record = self.store().mutate(|doc| {
            if let Some(existing) = doc.sessions.get_mut(&session_id) {
                // Idempotent re-attach to the same endpoint; anything else
                // is an identity conflict.
                if existing.kind == SessionKind::Attached && existing.cdp_origin == origin {
                    existing.heartbeat(now);
                    doc.active_session_id = Some(session_id.clone());
                    return Ok(existing.clone());
                }
                return Err(Error::new(
                    ErrorCode::SessionConflict,
                    format!("session {session_id} exists with a different endpoint"),
                ));
            }
            doc.sessions.insert(session_id.clone(), record.clone());
            doc.active_session_id = Some(session_id.clone());
            Ok(record.clone())
        })
        .map_err(Error::from)?;

        self.reach_cache().put(&origin, true);
        info!(session_id = %record.session_id, origin = %origin, "attached session");
        Ok(SessionReport {
            session: record,
            session_source: SessionSource::Attached,
            restarted: false,
        })
    }

    /// Return the active session if reachable, else create or repair a
    /// managed default. Checks only the active session inline; never a
    /// global sweep.
    pub async fn session_ensure(
        &self,
        browser_mode: Option<BrowserMode>,
    ) -> sw_core::Result<SessionReport> {
        let active = self
            .store()
            .read()
            .map_err(Error::from)?
            .active_session_id;

        if let Some(active_id) = active {
            match self.ensure_reachable(&active_id, browser_mode).await {
                Ok((session, restarted)) => {
                    return Ok(SessionReport {
                        session,
                        session_source: SessionSource::Active,
                        restarted,
                    });
                }
                Err(e) => {
                    let attached_gone = e.code == ErrorCode::SessionUnreachable
                        && self.session_kind(&active_id)? == Some(SessionKind::Attached);
                    if !attached_gone {
                        return Err(e);
                    }
                    // The attached endpoint is gone; leave the record for
                    // `session prune` and fall through to a managed default.
                    warn!(session_id = %active_id, "active attached session unreachable, creating managed default");
                }
            }
        }

        self.session_new(None, None, None, browser_mode).await
    }

    /// Switch the active session after verifying reachability.
    pub async fn session_use(&self, session_id: &str) -> sw_core::Result<SessionReport> {
        let id = checked_session_id(session_id)?;
        let (session, restarted) = self.ensure_reachable(&id, None).await?;
        self.store()
            .mutate(|doc| {
                if !doc.sessions.contains_key(&id) {
                    return Err(session_not_found(&id));
                }
                doc.active_session_id = Some(id.clone());
                Ok(())
            })
            .map_err(Error::from)?;
        Ok(SessionReport {
            session,
            session_source: SessionSource::Explicit,
            restarted,
        })
    }

    /// Deterministically-ordered session snapshot. No probes.
    pub fn session_list(&self) -> sw_core::Result<Vec<SessionRecord>> {
        let document = self.store().read().map_err(Error::from)?;
        Ok(document
            .sessions_ordered()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Resolve which session an action runs against.
    pub async fn resolve_for_action(
        &self,
        hint: &ActionHint,
        browser_mode: Option<BrowserMode>,
        allow_implicit_new: bool,
    ) -> sw_core::Result<SessionReport> {
        if let Some(session_id) = &hint.session_id {
            let id = checked_session_id(session_id)?;
            let (session, restarted) = self.ensure_reachable(&id, browser_mode).await?;
            return Ok(SessionReport {
                session,
                session_source: SessionSource::Explicit,
                restarted,
            });
        }

        if let Some(target_id) = &hint.target_id {
            let document = self.store().read().map_err(Error::from)?;
            if let Some(target) = document.targets.get(target_id) {
                let session_id = target.session_id.clone();
                let (session, restarted) = self.ensure_reachable(&session_id, browser_mode).await?;
                return Ok(SessionReport {
                    session,
                    session_source: SessionSource::Target,
                    restarted,
                });
            }
        }

        if allow_implicit_new {
            return self.session_ensure(browser_mode).await;
        }

        Err(Error::new(
            ErrorCode::SessionNotFound,
            "no session hint and implicit creation not allowed",
        ))
    }

    /// Probe one session; repair a managed session by relaunching once.
    ///
    /// On success the heartbeat (lastSeenAt + leaseExpiresAt) is refreshed
    /// in the same transaction. Attached sessions are never relaunched and
    /// never auto-discovered elsewhere.
    pub async fn ensure_reachable(
        &self,
        session_id: &str,
        desired_mode: Option<BrowserMode>,
    ) -> sw_core::Result<(SessionRecord, bool)> {
        let document = self.store().read().map_err(Error::from)?;
        let snapshot = document
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| session_not_found(session_id))?;

        if self
            .probe_cached(&snapshot.cdp_origin, self.limits().probe_timeout)
            .await
        {
            let session = self.persist_heartbeat(session_id).await?;
            return Ok((session, false));
        }

        match snapshot.kind {
            SessionKind::Attached => {
                self.persist_unreachable(session_id).await?;
                Err(Error::new(
                    ErrorCode::SessionUnreachable,
                    format!(
                        "attached session {session_id} unreachable at {}",
                        snapshot.cdp_origin
                    ),
                )
                .with_hint("attached endpoints are never relaunched; re-run `session attach`"))
            }
            SessionKind::Managed => self.relaunch_managed(&snapshot, desired_mode).await,
        }
    }

    async fn relaunch_managed(
        &self,
        snapshot: &SessionRecord,
        desired_mode: Option<BrowserMode>,
    ) -> sw_core::Result<(SessionRecord, bool)> {
        let session_id = snapshot.session_id.clone();
        if snapshot.managed_unreachable_count + 1 < crate::maintenance::RESTART_THRESHOLD {
            self.persist_unreachable(&session_id).await?;
            return Err(Error::new(
                ErrorCode::SessionUnreachable,
                format!("managed session {session_id} unreachable"),
            ));
        }
        debug!(session_id = %session_id, "managed session unreachable, relaunching");

        // A stale pid is repaired rather than trusted.
        if let Some(pid) = snapshot.browser_pid {
            let _ = self.browser().kill_process(pid).await;
        }
        self.reach_cache().invalidate(&snapshot.cdp_origin);

        let mode = match desired_mode.unwrap_or(snapshot.browser_mode) {
            BrowserMode::Unknown => BrowserMode::Headless,
            mode => mode,
        };

        let launched = match self.launch_managed(&session_id, mode).await {
            Ok(launched) => launched,
            Err(launch_err) => {
                let now = Utc::now();
                self.store()
                    .mutate(|doc| {
                        if let Some(session) = doc.sessions.get_mut(&session_id) {
                            session.browser_pid = None;
                            session.mark_unreachable(now);
                        }
                        Ok(())
                    })
                    .map_err(Error::from)?;
                return Err(Error::new(
                    ErrorCode::SessionUnreachable,
                    format!(
                        "managed session {session_id} relaunch failed: {}",
                        launch_err.message
                    ),
                ));
            }
        };

        let now = Utc::now();
        let session = self
            .store()
            .mutate(|doc| {
                let session = doc
                    .sessions
                    .get_mut(&session_id)
                    .ok_or_else(|| session_not_found(&session_id))?;
                session.cdp_origin = launched.cdp_origin.clone();
                session.debug_port = Some(launched.debug_port);
                session.browser_pid = Some(launched.browser_pid);
                session.browser_mode = mode;
                session.mark_reachable();
                session.heartbeat(now);
                Ok(session.clone())
            })
            .map_err(Error::from)?;

        self.reach_cache().put(&session.cdp_origin, true);
        info!(session_id = %session_id, origin = %session.cdp_origin, "managed session relaunched");
        Ok((session, true))
    }

    async fn launch_managed(
        &self,
        session_id: &str,
        mode: BrowserMode,
    ) -> sw_core::Result<sw_adapters::LaunchedBrowser> {
        let debug_port = self
            .browser()
            .allocate_free_port()
            .await
            .map_err(browser_error)?;
        let spec = StartSpec {
            debug_port,
            user_data_dir: self.paths().profile_dir(session_id)?,
            browser_mode: mode,
        };
        self.browser()
            .start_managed(&spec)
            .await
            .map_err(browser_error)
    }

    async fn probe_cached(&self, origin: &str, timeout: std::time::Duration) -> bool {
        if let Some(cached) = self.reach_cache().get(origin) {
            return cached;
        }
        let reachable = self.browser().probe(origin, timeout).await;
        self.reach_cache().put(origin, reachable);
        reachable
    }

    async fn persist_heartbeat(&self, session_id: &str) -> sw_core::Result<SessionRecord> {
        let now = Utc::now();
        self.store()
            .mutate(|doc| {
                let session = doc
                    .sessions
                    .get_mut(session_id)
                    .ok_or_else(|| session_not_found(session_id))?;
                session.mark_reachable();
                session.heartbeat(now);
                session.owner_id = self.agent_id().to_string();
                Ok(session.clone())
            })
            .map_err(Error::from)
    }

    async fn persist_unreachable(&self, session_id: &str) -> sw_core::Result<()> {
        let now = Utc::now();
        self.store()
            .mutate(|doc| {
                if let Some(session) = doc.sessions.get_mut(session_id) {
                    session.mark_unreachable(now);
                }
                Ok(())
            })
            .map_err(Error::from)?;
        Ok(())
    }

    fn session_kind(&self, session_id: &str) -> sw_core::Result<Option<SessionKind>> {
        Ok(self
            .store()
            .read()
            .map_err(Error::from)?
            .sessions
            .get(session_id)
            .map(|s| s.kind))
    }
}

fn checked_session_id(raw: &str) -> sw_core::Result<String> {
    match sanitize_id(raw) {
        Some(clean) if clean == raw => Ok(clean),
        _ => Err(Error::query_invalid(format!("invalid session id: {raw:?}"))),
    }
}

fn session_not_found(session_id: &str) -> Error {
    Error::new(
        ErrorCode::SessionNotFound,
        format!("no such session: {session_id}"),
    )
}

fn browser_error(err: BrowserError) -> Error {
    Error::new(ErrorCode::SessionUnreachable, err.to_string())
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
