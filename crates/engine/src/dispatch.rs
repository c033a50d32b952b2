// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command dispatch: argv in, exit code plus captured output out.
//!
//! The daemon worker and the in-process fallback both run commands
//! through this trait, so a given argv produces identical observable
//! output on either path. Unknown paths and unknown flags are misuse
//! (exit 2); every failure path ends stdout with one JSON envelope.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sw_core::{
    first_positional, flag_value, BrowserMode, CommandManifest, Error, ErrorCode, SessionPolicy,
};
use sw_storage::{NetworkArtifactRecord, TargetRecord};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::maintenance::{CapturePruneOptions, SessionPruneOptions, TargetPruneOptions};
use crate::runtime::Runtime;
use crate::session::ActionHint;

/// Captured result of one command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutcome {
    pub fn success(value: serde_json::Value) -> Self {
        Self {
            code: 0,
            stdout: format!("{value}\n"),
            stderr: String::new(),
        }
    }

    pub fn failure(error: &Error) -> Self {
        Self {
            code: 1,
            stdout: format!("{}\n", error.to_envelope()),
            stderr: String::new(),
        }
    }

    pub fn misuse(error: &Error) -> Self {
        Self {
            code: 2,
            stdout: format!("{}\n", error.to_envelope()),
            stderr: String::new(),
        }
    }
}

/// Executes one argv to completion. Implementations never panic; every
/// failure is folded into the outcome.
#[async_trait]
pub trait CommandDispatcher: Send + Sync + 'static {
    async fn dispatch(&self, argv: &[String], cancel: CancellationToken) -> RunOutcome;
}

/// Dispatcher over the built-in command families the core owns.
pub struct EngineDispatcher {
    runtime: Arc<Runtime>,
    manifest: Arc<CommandManifest>,
}

impl EngineDispatcher {
    pub fn new(runtime: Arc<Runtime>, manifest: Arc<CommandManifest>) -> Self {
        Self { runtime, manifest }
    }

    pub fn manifest(&self) -> &CommandManifest {
        &self.manifest
    }

    async fn run(&self, argv: &[String], cancel: CancellationToken) -> Result<RunOutcome, Error> {
        let Some(matched) = self.manifest.resolve(argv) else {
            let head = argv.first().map(String::as_str).unwrap_or("");
            return Ok(RunOutcome::misuse(&Error::query_invalid(format!(
                "unknown command: {head:?}"
            ))));
        };
        let path = matched.spec.path;
        let rest = &argv[matched.consumed..];

        if let Some(unknown) = unknown_flag(rest, allowed_flags(path)) {
            return Ok(RunOutcome::misuse(&Error::query_invalid(format!(
                "unknown argument: {unknown}"
            ))));
        }
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        debug!(command = path.join(" "), "dispatching");
        let outcome = match path {
            ["ping"] => RunOutcome::success(json!({"ok": true, "kind": "pong"})),
            ["open"] => self.cmd_open(rest).await?,
            ["run"] => {
                return Err(Error::query_invalid(
                    "`run` requires the pipeline runner, which is not part of this build",
                ));
            }
            ["session", "new"] => self.cmd_session_new(rest).await?,
            ["session", "attach"] => self.cmd_session_attach(rest).await?,
            ["session", "use"] => self.cmd_session_use(rest).await?,
            ["session", "list"] => self.cmd_session_list()?,
            ["session", "ensure"] => self.cmd_session_ensure(rest).await?,
            ["session", "prune"] => self.cmd_session_prune(rest).await?,
            ["target", "list"] => self.cmd_target_list(rest)?,
            ["target", "prune"] => self.cmd_target_prune(rest).await?,
            ["target", "network", "export"] => self.cmd_network_export(rest).await?,
            ["target", "network", "tail"] => self.cmd_network_tail(rest)?,
            ["state", "reconcile"] => self.cmd_state_reconcile(rest).await?,
            ["capture", "prune"] => self.cmd_capture_prune(rest).await?,
            ["disk", "prune"] => self.cmd_disk_prune(rest).await?,
            ["daemon", _] => {
                return Err(Error::query_invalid(
                    "daemon commands are handled by the client",
                ));
            }
            _ => {
                return Err(Error::internal(format!(
                    "manifest path not routed: {}",
                    path.join(" ")
                )));
            }
        };
        Ok(outcome)
    }

    async fn cmd_open(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let url = first_positional(rest, 0)
            .ok_or_else(|| Error::query_invalid("open requires a url"))?
            .to_string();
        if sw_core::origin_of_url(&url).is_none() {
            return Err(Error::query_invalid(format!("not a valid url: {url}")));
        }

        let hint = ActionHint {
            session_id: flag_value(rest, "--session").map(str::to_string),
            target_id: None,
        };
        let report = self
            .runtime
            .resolve_for_action(&hint, parse_browser_mode(rest)?, true)
            .await?;

        // The page itself is the driver's business; the core records the
        // target snapshot against the resolved session.
        let target_id = format!("t-{}", &uuid_hex()[..8]);
        let now = chrono::Utc::now();
        let session_id = report.session.session_id.clone();
        let record = TargetRecord {
            target_id: target_id.clone(),
            session_id: session_id.clone(),
            url: url.clone(),
            title: String::new(),
            status: "open".to_string(),
            last_action_id: None,
            last_action_at: Some(now),
            last_action_kind: Some("open".to_string()),
            updated_at: now,
        };
        self.runtime
            .store()
            .mutate(|doc| {
                if !doc.sessions.contains_key(&session_id) {
                    return Err(Error::new(
                        ErrorCode::SessionNotFound,
                        format!("no such session: {session_id}"),
                    ));
                }
                doc.targets.insert(target_id.clone(), record.clone());
                Ok(())
            })
            .map_err(Error::from)?;

        Ok(RunOutcome::success(json!({
            "ok": true,
            "targetId": target_id,
            "url": url,
            "session": report.session,
            "sessionSource": report.session_source,
            "restarted": report.restarted,
        })))
    }

    async fn cmd_session_new(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let report = self
            .runtime
            .session_new(
                flag_value(rest, "--id"),
                parse_policy(rest)?,
                parse_u64_flag(rest, "--lease-ttl-ms")?,
                parse_browser_mode(rest)?,
            )
            .await?;
        Ok(session_outcome(report))
    }

    async fn cmd_session_attach(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let cdp = flag_value(rest, "--cdp")
            .ok_or_else(|| Error::query_invalid("session attach requires --cdp <url>"))?;
        let report = self
            .runtime
            .session_attach(
                flag_value(rest, "--id"),
                cdp,
                parse_u64_flag(rest, "--lease-ttl-ms")?,
                parse_policy(rest)?,
            )
            .await?;
        Ok(session_outcome(report))
    }

    async fn cmd_session_use(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let id = first_positional(rest, 0)
            .or(flag_value(rest, "--session"))
            .ok_or_else(|| Error::query_invalid("session use requires a session id"))?;
        let report = self.runtime.session_use(id).await?;
        Ok(session_outcome(report))
    }

    fn cmd_session_list(&self) -> Result<RunOutcome, Error> {
        let sessions = self.runtime.session_list()?;
        Ok(RunOutcome::success(json!({
            "ok": true,
            "sessions": sessions,
            "count": sessions.len(),
        })))
    }

    async fn cmd_session_ensure(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let report = self
            .runtime
            .session_ensure(parse_browser_mode(rest)?)
            .await?;
        Ok(session_outcome(report))
    }

    async fn cmd_session_prune(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let options = SessionPruneOptions {
            probe_timeout: parse_timeout(rest)?
                .unwrap_or(self.runtime.limits().probe_timeout),
            drop_managed_unreachable: has_flag(rest, "--drop-managed-unreachable"),
        };
        let report = self.runtime.session_prune(&options).await?;
        Ok(report_outcome(&report))
    }

    fn cmd_target_list(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let document = self.runtime.store().read().map_err(Error::from)?;
        let targets: Vec<&TargetRecord> = match flag_value(rest, "--session") {
            Some(session_id) => document.session_targets(session_id),
            None => {
                let mut all: Vec<&TargetRecord> = document.targets.values().collect();
                all.sort_by(|a, b| a.target_id.cmp(&b.target_id));
                all
            }
        };
        Ok(RunOutcome::success(json!({
            "ok": true,
            "targets": targets,
            "count": targets.len(),
        })))
    }

    async fn cmd_target_prune(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let options = TargetPruneOptions {
            max_age_hours: parse_u64_flag(rest, "--max-age-hours")?,
            max_per_session: parse_u64_flag(rest, "--max-per-session")?.map(|n| n as usize),
        };
        let report = self.runtime.target_prune(&options).await?;
        Ok(report_outcome(&report))
    }

    async fn cmd_network_export(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let capture_id = flag_value(rest, "--capture")
            .ok_or_else(|| Error::query_invalid("network export requires --capture <id>"))?
            .to_string();

        let document = self.runtime.store().read().map_err(Error::from)?;
        let capture = document
            .network_captures
            .get(&capture_id)
            .cloned()
            .ok_or_else(|| Error::query_invalid(format!("no such capture: {capture_id}")))?;
        let raw = std::fs::read(&capture.result_path).map_err(|e| {
            Error::query_invalid(format!(
                "capture {capture_id} has no readable result: {e}"
            ))
        })?;
        let entries = serde_json::from_slice::<serde_json::Value>(&raw)
            .ok()
            .and_then(|v| v.as_array().map(|a| a.len() as u64))
            .unwrap_or(0);

        let artifact_id = self
            .runtime
            .store()
            .mutate(|doc| Ok(doc.allocate_artifact_id()))
            .map_err(Error::from)?;
        let path = self.runtime.paths().artifact_file(&artifact_id)?;
        std::fs::write(&path, &raw)
            .map_err(|e| Error::internal(format!("artifact write failed: {e}")))?;

        let record = NetworkArtifactRecord {
            artifact_id: artifact_id.clone(),
            created_at: chrono::Utc::now(),
            format: "har".to_string(),
            path: path.clone(),
            session_id: capture.session_id.clone(),
            target_id: capture.target_id.clone(),
            capture_id: Some(capture_id),
            entries,
            bytes: raw.len() as u64,
        };
        self.runtime
            .store()
            .mutate(|doc| {
                doc.network_artifacts
                    .insert(artifact_id.clone(), record.clone());
                Ok(())
            })
            .map_err(Error::from)?;

        Ok(RunOutcome::success(json!({"ok": true, "artifact": record})))
    }

    fn cmd_network_tail(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let capture_id = flag_value(rest, "--capture")
            .ok_or_else(|| Error::query_invalid("network tail requires --capture <id>"))?;
        let document = self.runtime.store().read().map_err(Error::from)?;
        let capture = document
            .network_captures
            .get(capture_id)
            .ok_or_else(|| Error::query_invalid(format!("no such capture: {capture_id}")))?;
        let content = std::fs::read_to_string(&capture.result_path).unwrap_or_default();
        Ok(RunOutcome {
            code: 0,
            stdout: content,
            stderr: String::new(),
        })
    }

    async fn cmd_state_reconcile(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let session_options = SessionPruneOptions {
            probe_timeout: parse_timeout(rest)?
                .unwrap_or(self.runtime.limits().probe_timeout),
            drop_managed_unreachable: has_flag(rest, "--drop-managed-unreachable"),
        };
        let target_options = TargetPruneOptions {
            max_age_hours: parse_u64_flag(rest, "--max-age-hours")?,
            max_per_session: parse_u64_flag(rest, "--max-per-session")?.map(|n| n as usize),
        };
        let report = self
            .runtime
            .state_reconcile(&session_options, &target_options)
            .await?;
        Ok(report_outcome(&report))
    }

    async fn cmd_capture_prune(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let options = CapturePruneOptions {
            max_age_hours: parse_u64_flag(rest, "--max-age-hours")?,
            max_count: parse_u64_flag(rest, "--max-count")?.map(|n| n as usize),
            max_total_bytes: parse_u64_flag(rest, "--max-total-bytes")?,
        };
        let report = self.runtime.capture_retention(&options).await?;
        Ok(report_outcome(&report))
    }

    async fn cmd_disk_prune(&self, rest: &[String]) -> Result<RunOutcome, Error> {
        let report = self.runtime.disk_prune(has_flag(rest, "--dry-run")).await?;
        Ok(RunOutcome::success(json!({
            "ok": true,
            "dryRun": report.dry_run,
            "removed": report.removed,
            "count": report.removed.len(),
        })))
    }
}

#[async_trait]
impl CommandDispatcher for EngineDispatcher {
    async fn dispatch(&self, argv: &[String], cancel: CancellationToken) -> RunOutcome {
        match self.run(argv, cancel).await {
            Ok(outcome) => outcome,
            Err(error) => RunOutcome::failure(&error),
        }
    }
}

fn session_outcome(report: crate::session::SessionReport) -> RunOutcome {
    RunOutcome::success(json!({
        "ok": true,
        "session": report.session,
        "sessionSource": report.session_source,
        "restarted": report.restarted,
    }))
}

fn report_outcome(report: &crate::maintenance::PruneReport) -> RunOutcome {
    let mut value = serde_json::to_value(report).unwrap_or_else(|_| json!({}));
    value["ok"] = json!(true);
    RunOutcome::success(value)
}

fn cancelled() -> Error {
    Error::new(ErrorCode::DaemonRunFailed, "request cancelled")
}

fn uuid_hex() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn has_flag(rest: &[String], flag: &str) -> bool {
    rest.iter().any(|w| w == flag)
}

fn parse_timeout(rest: &[String]) -> Result<Option<Duration>, Error> {
    Ok(parse_u64_flag(rest, "--timeout-ms")?.map(Duration::from_millis))
}

fn parse_u64_flag(rest: &[String], flag: &str) -> Result<Option<u64>, Error> {
    match flag_value(rest, flag) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::query_invalid(format!("{flag} expects an integer, got {raw:?}"))),
    }
}

fn parse_policy(rest: &[String]) -> Result<Option<SessionPolicy>, Error> {
    match flag_value(rest, "--policy") {
        None => Ok(None),
        Some("persistent") => Ok(Some(SessionPolicy::Persistent)),
        Some("ephemeral") => Ok(Some(SessionPolicy::Ephemeral)),
        Some(other) => Err(Error::query_invalid(format!("unknown policy: {other}"))),
    }
}

fn parse_browser_mode(rest: &[String]) -> Result<Option<BrowserMode>, Error> {
    match flag_value(rest, "--browser-mode") {
        None => Ok(None),
        Some("headless") => Ok(Some(BrowserMode::Headless)),
        Some("headed") => Ok(Some(BrowserMode::Headed)),
        Some(other) => Err(Error::query_invalid(format!("unknown browser mode: {other}"))),
    }
}

fn allowed_flags(path: &[&str]) -> &'static [&'static str] {
    match path {
        ["ping"] => &[],
        ["open"] => &["--session", "--browser-mode", "--timeout-ms"],
        ["run"] => &["--session", "--profile", "--isolation", "--timeout-ms"],
        ["session", "new"] => &["--id", "--policy", "--lease-ttl-ms", "--browser-mode"],
        ["session", "attach"] => &["--id", "--cdp", "--lease-ttl-ms", "--policy"],
        ["session", "use"] => &["--session"],
        ["session", "list"] => &[],
        ["session", "ensure"] => &["--browser-mode"],
        ["session", "prune"] => &["--timeout-ms", "--drop-managed-unreachable"],
        ["target", "list"] => &["--session"],
        ["target", "prune"] => &["--max-age-hours", "--max-per-session"],
        ["target", "network", "export"] => &["--capture"],
        ["target", "network", "tail"] => &["--capture"],
        ["state", "reconcile"] => &[
            "--timeout-ms",
            "--drop-managed-unreachable",
            "--max-age-hours",
            "--max-per-session",
        ],
        ["capture", "prune"] => &["--max-age-hours", "--max-count", "--max-total-bytes"],
        ["disk", "prune"] => &["--dry-run"],
        _ => &[],
    }
}

/// First flag in `rest` that the command does not accept.
fn unknown_flag<'a>(rest: &'a [String], allowed: &[&str]) -> Option<&'a str> {
    rest.iter()
        .filter(|w| w.starts_with("--"))
        .map(|w| w.split('=').next().unwrap_or(w))
        .find(|flag| !allowed.contains(flag))
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
