// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic pruning of sessions, targets, captures, and artifacts,
//! plus opportunistic idle parking.
//!
//! The full session sweep runs only from the explicit `session prune`
//! command or a background maintenance tick, never from `session ensure`.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sw_core::{Error, SessionKind};
use sw_storage::{CaptureStatus, StateDocument};
use tracing::{debug, info, warn};

use crate::runtime::Runtime;

/// Unreachable observations before a managed relaunch is attempted.
pub const RESTART_THRESHOLD: u32 = 1;
/// Unreachable observations before explicit prune may drop a managed
/// session.
pub const DROP_THRESHOLD: u32 = 3;

/// Options for the session sweep.
#[derive(Debug, Clone)]
pub struct SessionPruneOptions {
    pub probe_timeout: Duration,
    pub drop_managed_unreachable: bool,
}

impl Default for SessionPruneOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_millis(1000),
            drop_managed_unreachable: false,
        }
    }
}

/// Options for target pruning.
#[derive(Debug, Clone)]
pub struct TargetPruneOptions {
    pub max_age_hours: Option<u64>,
    pub max_per_session: Option<usize>,
}

impl Default for TargetPruneOptions {
    fn default() -> Self {
        Self {
            max_age_hours: Some(24),
            max_per_session: Some(16),
        }
    }
}

/// Options for capture/artifact retention.
#[derive(Debug, Clone, Default)]
pub struct CapturePruneOptions {
    pub max_age_hours: Option<u64>,
    pub max_count: Option<usize>,
    pub max_total_bytes: Option<u64>,
}

/// What a maintenance pass changed.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    pub removed_sessions: Vec<String>,
    pub expired_leases: Vec<String>,
    pub repaired_pids: Vec<String>,
    pub marked_unreachable: Vec<String>,
    pub removed_targets: Vec<String>,
    pub removed_captures: Vec<String>,
    pub removed_artifacts: Vec<String>,
    pub parked_sessions: Vec<String>,
}

/// Disk sweep result.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskPruneReport {
    pub dry_run: bool,
    pub removed: Vec<PathBuf>,
}

impl Runtime {
    /// Probe every session; remove unreachable attached sessions, repair
    /// stale pids on managed ones, drop unreachable managed only when
    /// requested. Expired leases are dropped in the same transaction.
    pub async fn session_prune(
        &self,
        options: &SessionPruneOptions,
    ) -> sw_core::Result<PruneReport> {
        let probes = self.probe_all_sessions(options.probe_timeout).await?;
        let now = Utc::now();
        let mut report = PruneReport::default();
        let mut kill_pids = Vec::new();

        self.store()
            .mutate(|doc| {
                apply_session_prune(doc, &probes, options, now, &mut report, &mut kill_pids);
                Ok(())
            })
            .map_err(Error::from)?;

        for pid in kill_pids {
            if let Err(e) = self.browser().kill_process(pid).await {
                warn!(pid, error = %e, "failed to kill browser of pruned session");
            }
        }
        info!(
            removed = report.removed_sessions.len(),
            expired = report.expired_leases.len(),
            "session prune complete"
        );
        Ok(report)
    }

    /// Remove age-expired targets and cap per-session targets, keeping the
    /// most recently updated (ties broken by target id ascending). Orphan
    /// targets are removed by document normalization in the same
    /// transaction.
    pub async fn target_prune(
        &self,
        options: &TargetPruneOptions,
    ) -> sw_core::Result<PruneReport> {
        let now = Utc::now();
        let mut report = PruneReport::default();
        self.store()
            .mutate(|doc| {
                apply_target_prune(doc, options, now, &mut report);
                Ok(())
            })
            .map_err(Error::from)?;
        Ok(report)
    }

    /// Session and target pruning combined into one transaction.
    pub async fn state_reconcile(
        &self,
        session_options: &SessionPruneOptions,
        target_options: &TargetPruneOptions,
    ) -> sw_core::Result<PruneReport> {
        let probes = self.probe_all_sessions(session_options.probe_timeout).await?;
        let now = Utc::now();
        let mut report = PruneReport::default();
        let mut kill_pids = Vec::new();

        self.store()
            .mutate(|doc| {
                apply_session_prune(
                    doc,
                    &probes,
                    session_options,
                    now,
                    &mut report,
                    &mut kill_pids,
                );
                apply_target_prune(doc, target_options, now, &mut report);
                Ok(())
            })
            .map_err(Error::from)?;

        for pid in kill_pids {
            let _ = self.browser().kill_process(pid).await;
        }
        Ok(report)
    }

    /// Ordered retention over captures and artifacts: missing-file entries
    /// first, then age, then count, then total size (largest first).
    /// Recording captures whose worker died are marked failed.
    pub async fn capture_retention(
        &self,
        options: &CapturePruneOptions,
    ) -> sw_core::Result<PruneReport> {
        let now = Utc::now();
        let snapshot = self.store().read().map_err(Error::from)?;

        // File existence is checked outside the lock to keep holds short.
        let missing: HashSet<String> = snapshot
            .network_artifacts
            .iter()
            .filter(|(_, artifact)| !artifact.path.exists())
            .map(|(id, _)| id.clone())
            .collect();

        let mut report = PruneReport::default();
        let mut delete_files = Vec::new();

        self.store()
            .mutate(|doc| {
                retain_captures(doc, options, now, &mut report, &mut delete_files);
                retain_artifacts(doc, options, now, &missing, &mut report, &mut delete_files);
                Ok(())
            })
            .map_err(Error::from)?;

        for path in delete_files {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove pruned file"),
            }
        }
        Ok(report)
    }

    /// Remove on-disk capture/artifact files that no state record
    /// references. Independent of the index; respects dry-run.
    pub async fn disk_prune(&self, dry_run: bool) -> sw_core::Result<DiskPruneReport> {
        let snapshot = self.store().read().map_err(Error::from)?;
        let mut referenced: HashSet<PathBuf> = HashSet::new();
        for capture in snapshot.network_captures.values() {
            referenced.insert(capture.stop_signal_path.clone());
            referenced.insert(capture.done_path.clone());
            referenced.insert(capture.result_path.clone());
        }
        for artifact in snapshot.network_artifacts.values() {
            referenced.insert(artifact.path.clone());
        }

        let mut report = DiskPruneReport {
            dry_run,
            removed: Vec::new(),
        };
        for root in [self.paths().captures_root(), self.paths().artifacts_root()] {
            let entries = match std::fs::read_dir(&root) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::internal(format!(
                        "disk prune scan of {} failed: {e}",
                        root.display()
                    )));
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() || referenced.contains(&path) {
                    continue;
                }
                if !dry_run {
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %e, "disk prune removal failed");
                        continue;
                    }
                }
                report.removed.push(path);
            }
        }
        report.removed.sort();
        Ok(report)
    }

    /// Park managed browsers whose session has been idle longer than the
    /// idle TTL: kill the process, null `browserPid`, keep the record.
    /// Attached sessions are not owned and never touched.
    pub async fn park_idle_browsers(&self) -> sw_core::Result<Vec<String>> {
        let now = Utc::now();
        let idle_ttl =
            chrono::Duration::milliseconds(self.limits().idle_process_ttl.as_millis() as i64);
        let snapshot = self.store().read().map_err(Error::from)?;

        let mut parked = Vec::new();
        for session in snapshot.sessions_ordered() {
            if session.kind != SessionKind::Managed {
                continue;
            }
            let Some(pid) = session.browser_pid else {
                continue;
            };
            if session.last_seen_at + idle_ttl >= now {
                continue;
            }
            debug!(session_id = %session.session_id, pid, "parking idle managed browser");
            if let Err(e) = self.browser().kill_process(pid).await {
                warn!(session_id = %session.session_id, pid, error = %e, "idle park kill failed");
                continue;
            }
            self.reach_cache().invalidate(&session.cdp_origin);
            parked.push(session.session_id.clone());
        }

        if !parked.is_empty() {
            let ids = parked.clone();
            self.store()
                .mutate(|doc| {
                    for id in &ids {
                        if let Some(session) = doc.sessions.get_mut(id) {
                            session.browser_pid = None;
                        }
                    }
                    Ok(())
                })
                .map_err(Error::from)?;
            info!(count = parked.len(), "parked idle managed browsers");
        }
        Ok(parked)
    }

    async fn probe_all_sessions(
        &self,
        timeout: Duration,
    ) -> sw_core::Result<BTreeMap<String, SessionProbe>> {
        let snapshot = self.store().read().map_err(Error::from)?;
        let mut probes = BTreeMap::new();
        for session in snapshot.sessions_ordered() {
            let reachable = self.browser().probe(&session.cdp_origin, timeout).await;
            let pid_dead = session
                .browser_pid
                .map(|pid| !sw_adapters::process::pid_alive(pid))
                .unwrap_or(false);
            probes.insert(
                session.session_id.clone(),
                SessionProbe {
                    reachable,
                    pid_dead,
                },
            );
        }
        Ok(probes)
    }
}

struct SessionProbe {
    reachable: bool,
    pid_dead: bool,
}

fn apply_session_prune(
    doc: &mut StateDocument,
    probes: &BTreeMap<String, SessionProbe>,
    options: &SessionPruneOptions,
    now: DateTime<Utc>,
    report: &mut PruneReport,
    kill_pids: &mut Vec<u32>,
) {
    let session_ids: Vec<String> = doc.sessions.keys().cloned().collect();
    for session_id in session_ids {
        // Sessions created after the probe snapshot are left alone.
        let Some(probe) = probes.get(&session_id) else {
            continue;
        };
        let Some(session) = doc.sessions.get_mut(&session_id) else {
            continue;
        };

        if session.lease_expired(now) {
            if let Some(pid) = session.browser_pid {
                if session.kind == SessionKind::Managed {
                    kill_pids.push(pid);
                }
            }
            report.expired_leases.push(session_id.clone());
            remove_session(doc, &session_id, report);
            continue;
        }

        if probe.reachable {
            session.mark_reachable();
            continue;
        }

        match session.kind {
            SessionKind::Attached => {
                report.removed_sessions.push(session_id.clone());
                remove_session(doc, &session_id, report);
            }
            SessionKind::Managed => {
                if probe.pid_dead && session.browser_pid.is_some() {
                    session.browser_pid = None;
                    report.repaired_pids.push(session_id.clone());
                }
                session.mark_unreachable(now);
                let count = session.managed_unreachable_count;
                if options.drop_managed_unreachable && count >= DROP_THRESHOLD {
                    if let Some(pid) = session.browser_pid {
                        kill_pids.push(pid);
                    }
                    report.removed_sessions.push(session_id.clone());
                    remove_session(doc, &session_id, report);
                } else {
                    report.marked_unreachable.push(session_id.clone());
                }
            }
        }
    }
}

fn remove_session(doc: &mut StateDocument, session_id: &str, report: &mut PruneReport) {
    doc.sessions.remove(session_id);
    if doc.active_session_id.as_deref() == Some(session_id) {
        doc.active_session_id = None;
    }
    let dangling: Vec<String> = doc
        .targets
        .iter()
        .filter(|(_, t)| t.session_id == session_id)
        .map(|(id, _)| id.clone())
        .collect();
    for target_id in dangling {
        doc.targets.remove(&target_id);
        report.removed_targets.push(target_id);
    }
}

fn apply_target_prune(
    doc: &mut StateDocument,
    options: &TargetPruneOptions,
    now: DateTime<Utc>,
    report: &mut PruneReport,
) {
    if let Some(max_age_hours) = options.max_age_hours {
        let cutoff = now - chrono::Duration::hours(max_age_hours as i64);
        let expired: Vec<String> = doc
            .targets
            .iter()
            .filter(|(_, t)| t.updated_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for target_id in expired {
            doc.targets.remove(&target_id);
            report.removed_targets.push(target_id);
        }
    }

    if let Some(max_per_session) = options.max_per_session {
        let session_ids: Vec<String> = doc.sessions.keys().cloned().collect();
        for session_id in session_ids {
            let overflow: Vec<String> = doc
                .session_targets(&session_id)
                .into_iter()
                .skip(max_per_session)
                .map(|t| t.target_id.clone())
                .collect();
            for target_id in overflow {
                doc.targets.remove(&target_id);
                report.removed_targets.push(target_id);
            }
        }
    }
}

fn retain_captures(
    doc: &mut StateDocument,
    options: &CapturePruneOptions,
    now: DateTime<Utc>,
    report: &mut PruneReport,
    delete_files: &mut Vec<PathBuf>,
) {
    // A recording whose worker died can never finish.
    for capture in doc.network_captures.values_mut() {
        if capture.status == CaptureStatus::Recording {
            let dead = capture
                .worker_pid
                .map(|pid| !sw_adapters::process::pid_alive(pid))
                .unwrap_or(true);
            if dead {
                capture.status = CaptureStatus::Failed;
                capture.worker_pid = None;
                capture.ended_at.get_or_insert(now);
            }
        }
    }

    if let Some(max_age_hours) = options.max_age_hours {
        let cutoff = now - chrono::Duration::hours(max_age_hours as i64);
        let expired: Vec<String> = doc
            .network_captures
            .iter()
            .filter(|(_, c)| c.status != CaptureStatus::Recording)
            .filter(|(_, c)| c.ended_at.unwrap_or(c.started_at) < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for capture_id in expired {
            if let Some(capture) = doc.network_captures.remove(&capture_id) {
                delete_files.push(capture.stop_signal_path);
                delete_files.push(capture.done_path);
                delete_files.push(capture.result_path);
            }
            report.removed_captures.push(capture_id);
        }
    }
}

fn retain_artifacts(
    doc: &mut StateDocument,
    options: &CapturePruneOptions,
    now: DateTime<Utc>,
    missing: &HashSet<String>,
    report: &mut PruneReport,
    delete_files: &mut Vec<PathBuf>,
) {
    let mut remove = |doc: &mut StateDocument,
                      artifact_id: &str,
                      delete_files: &mut Vec<PathBuf>,
                      report: &mut PruneReport| {
        if let Some(artifact) = doc.network_artifacts.remove(artifact_id) {
            delete_files.push(artifact.path);
            report.removed_artifacts.push(artifact_id.to_string());
        }
    };

    // 1. Entries whose file is already gone.
    let mut missing_ordered: Vec<&String> = missing.iter().collect();
    missing_ordered.sort();
    for artifact_id in missing_ordered {
        remove(doc, artifact_id, delete_files, report);
    }

    // 2. Age.
    if let Some(max_age_hours) = options.max_age_hours {
        let cutoff = now - chrono::Duration::hours(max_age_hours as i64);
        let expired: Vec<String> = doc
            .network_artifacts
            .iter()
            .filter(|(_, a)| a.created_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for artifact_id in expired {
            remove(doc, &artifact_id, delete_files, report);
        }
    }

    // 3. Count: keep the newest.
    if let Some(max_count) = options.max_count {
        if doc.network_artifacts.len() > max_count {
            let mut by_age: Vec<(DateTime<Utc>, String)> = doc
                .network_artifacts
                .iter()
                .map(|(id, a)| (a.created_at, id.clone()))
                .collect();
            by_age.sort();
            let excess = by_age.len() - max_count;
            for (_, artifact_id) in by_age.into_iter().take(excess) {
                remove(doc, &artifact_id, delete_files, report);
            }
        }
    }

    // 4. Total size: shed the largest until under budget.
    if let Some(max_total_bytes) = options.max_total_bytes {
        let mut total: u64 = doc.network_artifacts.values().map(|a| a.bytes).sum();
        if total > max_total_bytes {
            let mut by_size: Vec<(u64, String)> = doc
                .network_artifacts
                .iter()
                .map(|(id, a)| (a.bytes, id.clone()))
                .collect();
            by_size.sort_by(|a, b| b.cmp(a));
            for (bytes, artifact_id) in by_size {
                if total <= max_total_bytes {
                    break;
                }
                remove(doc, &artifact_id, delete_files, report);
                total = total.saturating_sub(bytes);
            }
        }
    }
}

#[cfg(test)]
#[path = "maintenance_tests.rs"]
mod tests;
