// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client orchestrator.
//!
//! Flow per invocation: read daemon metadata, connect, send one `run`
//! request, retry transient queue failures with jittered backoff, spawn a
//! worker under an exclusive lock when none is reachable, and as a final
//! fallback execute in-process. The in-process path runs the same
//! dispatcher the daemon runs, so output is identical for a given argv.

use std::fs::OpenOptions;
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use rand::Rng;
use sw_adapters::ChromiumAdapter;
use sw_core::{CommandManifest, Error, ErrorCode};
use sw_daemon::{
    meta, wire, DaemonMetadata, FailureResponse, Request, RequestKind, Response, SuccessBody,
};
use sw_engine::{CommandDispatcher, EngineDispatcher, RunOutcome, Runtime, RuntimeLimits};
use sw_storage::StatePaths;
use thiserror::Error as ThisError;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::daemon_process;
use crate::env;
use crate::output;

/// Retries for transient queue backpressure.
const MAX_CLIENT_RETRIES: u32 = 2;
/// First backoff step; doubles per retry, with jitter.
const INITIAL_BACKOFF: Duration = Duration::from_millis(60);

/// Everything the orchestrator needs, captured from the environment once.
pub struct ClientConfig {
    pub paths: StatePaths,
    pub daemon_enabled: bool,
    pub connect_timeout: Duration,
    pub ipc_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> sw_core::Result<Self> {
        Ok(Self {
            paths: StatePaths::resolve()?,
            daemon_enabled: env::daemon_enabled(),
            connect_timeout: env::timeout_connect(),
            ipc_timeout: env::timeout_ipc(),
        })
    }
}

#[derive(Debug, ThisError)]
enum ClientError {
    /// Metadata missing/stale or connection failed; retryable by spawning.
    #[error("daemon unreachable: {0}")]
    Unreachable(String),

    /// The daemon answered with something that is not a valid response
    /// frame. Not retryable.
    #[error("invalid daemon response: {0}")]
    FrameInvalid(String),

    /// A typed failure envelope from the daemon.
    #[error("{0}")]
    Typed(Error),
}

pub struct Orchestrator {
    config: ClientConfig,
    manifest: Arc<CommandManifest>,
}

impl Orchestrator {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            manifest: Arc::new(CommandManifest::builtin()),
        }
    }

    /// Run one argv to completion, producing the printable outcome.
    pub async fn execute(&self, argv: Vec<String>) -> RunOutcome {
        // Streaming commands and daemon meta-commands never ride the
        // daemon. The bypass set comes from the manifest, not from here.
        if let Some(matched) = self.manifest.resolve(&argv) {
            if matched.spec.stream {
                debug!(command = matched.spec.path.join(" "), "bypass: streaming command");
                return self.run_in_process(&argv).await;
            }
            if matched.spec.path.first() == Some(&"daemon") {
                return self.daemon_command(matched.spec.path).await;
            }
        }

        if !self.config.daemon_enabled {
            return self.run_in_process(&argv).await;
        }

        match self.try_daemon_with_retries(&argv).await {
            Ok(outcome) => return outcome,
            Err(ClientError::Typed(e)) => return output::failure(&e),
            Err(ClientError::FrameInvalid(message)) => {
                return output::failure(&Error::new(
                    ErrorCode::DaemonRequestInvalid,
                    format!("daemon sent an invalid response: {message}"),
                ));
            }
            Err(ClientError::Unreachable(reason)) => {
                debug!(reason = %reason, "no reachable daemon, spawning");
            }
        }

        if let Some(outcome) = self.spawn_and_retry(&argv).await {
            return outcome;
        }

        // Final fallback: same dispatcher, no sharing.
        warn!("daemon unavailable, executing in-process");
        self.run_in_process(&argv).await
    }

    /// Steps 1-4: existing daemon with queue-backpressure retries.
    async fn try_daemon_with_retries(&self, argv: &[String]) -> Result<RunOutcome, ClientError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;
        loop {
            match self.try_daemon_once(argv).await {
                Err(ClientError::Typed(e))
                    if attempt < MAX_CLIENT_RETRIES && is_queue_backpressure(&e) =>
                {
                    attempt += 1;
                    debug!(attempt, code = %e.code, "transient backpressure, retrying");
                    tokio::time::sleep(jittered(backoff)).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }

    /// One metadata-connect-request round trip.
    async fn try_daemon_once(&self, argv: &[String]) -> Result<RunOutcome, ClientError> {
        let metadata = meta::read_valid(&self.config.paths)
            .ok_or_else(|| ClientError::Unreachable("no daemon metadata".to_string()))?;

        let request = Request {
            token: metadata.token.clone(),
            kind: RequestKind::Run {
                argv: argv.to_vec(),
            },
        };
        match self.round_trip(&metadata, &request).await? {
            Response::Success(success) => match success.body {
                SuccessBody::Run {
                    code,
                    stdout,
                    stderr,
                } => Ok(RunOutcome {
                    code,
                    stdout,
                    stderr,
                }),
                other => Err(ClientError::FrameInvalid(format!(
                    "unexpected response kind: {other:?}"
                ))),
            },
            Response::Failure(failure) => Err(typed(failure)),
        }
    }

    async fn round_trip(
        &self,
        metadata: &DaemonMetadata,
        request: &Request,
    ) -> Result<Response, ClientError> {
        let connect = TcpStream::connect((metadata.host.as_str(), metadata.port));
        let mut stream = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| ClientError::Unreachable("connect timeout".to_string()))?
            .map_err(|e| ClientError::Unreachable(format!("connect failed: {e}")))?;

        wire::write_message(&mut stream, request, self.config.connect_timeout)
            .await
            .map_err(|e| ClientError::Unreachable(format!("write failed: {e}")))?;

        wire::read_message(&mut stream, self.config.ipc_timeout)
            .await
            .map_err(|e| match e {
                wire::FrameError::InvalidJson(err) => ClientError::FrameInvalid(err.to_string()),
                wire::FrameError::Oversize { limit } => {
                    ClientError::FrameInvalid(format!("response frame over {limit} bytes"))
                }
                other => ClientError::Unreachable(format!("read failed: {other}")),
            })
    }

    /// Step 5: spawn a worker under the exclusive spawn lock, then
    /// reattempt once.
    async fn spawn_and_retry(&self, argv: &[String]) -> Option<RunOutcome> {
        let metadata = self.spawn_daemon().await?;
        debug!(port = metadata.port, "daemon up, reattempting");
        match self.try_daemon_once(argv).await {
            Ok(outcome) => Some(outcome),
            Err(ClientError::Typed(e)) => Some(output::failure(&e)),
            Err(e) => {
                warn!(error = %e, "fresh daemon did not serve the request");
                None
            }
        }
    }

    /// Only one of many concurrent clients actually forks a worker; the
    /// rest wait on the metadata file.
    async fn spawn_daemon(&self) -> Option<DaemonMetadata> {
        if self.config.paths.ensure_root().is_err() {
            return None;
        }
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.config.paths.spawn_lock())
            .ok()?;

        if lock_file.try_lock_exclusive().is_ok() {
            // Someone may have finished spawning while we raced for the lock.
            if let Some(metadata) = meta::read_valid(&self.config.paths) {
                return Some(metadata);
            }
            let child = match daemon_process::spawn_daemon_background() {
                Ok(child) => child,
                Err(e) => {
                    warn!(error = %e, "failed to spawn daemon");
                    return None;
                }
            };
            let metadata = daemon_process::wait_for_metadata(
                &self.config.paths,
                Some(child),
                self.config.connect_timeout,
            )
            .await;
            if metadata.is_none() {
                if let Some(log) = daemon_process::read_startup_error(&self.config.paths) {
                    warn!(log = %log, "daemon startup failed");
                }
            }
            metadata
        } else {
            // A concurrent client is spawning; wait for its worker.
            daemon_process::wait_for_metadata(
                &self.config.paths,
                None,
                self.config.connect_timeout,
            )
            .await
        }
    }

    /// The no-daemon path: identical observable output for the same argv.
    pub async fn run_in_process(&self, argv: &[String]) -> RunOutcome {
        let runtime = Arc::new(Runtime::new(
            self.config.paths.clone(),
            Arc::new(ChromiumAdapter::from_env()),
            RuntimeLimits::from_env(),
            env::agent_id(),
        ));
        let dispatcher = EngineDispatcher::new(runtime, Arc::clone(&self.manifest));
        dispatcher.dispatch(argv, CancellationToken::new()).await
    }

    /// `daemon status` / `daemon stop` talk to the worker directly.
    async fn daemon_command(&self, path: &[&str]) -> RunOutcome {
        match path {
            ["daemon", "status"] => match meta::read_valid(&self.config.paths) {
                None => RunOutcome::success(serde_json::json!({"ok": true, "running": false})),
                Some(metadata) => {
                    let request = Request {
                        token: metadata.token.clone(),
                        kind: RequestKind::Ping,
                    };
                    match self.round_trip(&metadata, &request).await {
                        Ok(Response::Success(_)) => {
                            RunOutcome::success(serde_json::json!({
                                "ok": true,
                                "running": true,
                                "pid": metadata.pid,
                                "port": metadata.port,
                                "startedAt": metadata.started_at,
                            }))
                        }
                        Ok(Response::Failure(failure)) => output::failure(&typed_error(failure)),
                        Err(_) => {
                            RunOutcome::success(serde_json::json!({"ok": true, "running": false}))
                        }
                    }
                }
            },
            ["daemon", "stop"] => match meta::read_valid(&self.config.paths) {
                None => RunOutcome::success(
                    serde_json::json!({"ok": true, "running": false, "stopped": false}),
                ),
                Some(metadata) => {
                    let request = Request {
                        token: metadata.token.clone(),
                        kind: RequestKind::Shutdown,
                    };
                    match self.round_trip(&metadata, &request).await {
                        Ok(Response::Success(_)) => {
                            RunOutcome::success(serde_json::json!({"ok": true, "stopped": true}))
                        }
                        Ok(Response::Failure(failure)) => output::failure(&typed_error(failure)),
                        Err(e) => output::failure(&Error::new(
                            ErrorCode::DaemonUnreachable,
                            format!("daemon did not accept shutdown: {e}"),
                        )),
                    }
                }
            },
            _ => output::misuse(&Error::query_invalid("unknown daemon subcommand")),
        }
    }
}

fn typed(failure: FailureResponse) -> ClientError {
    ClientError::Typed(typed_error(failure))
}

fn typed_error(failure: FailureResponse) -> Error {
    failure.to_error()
}

fn is_queue_backpressure(error: &Error) -> bool {
    matches!(
        error.code,
        ErrorCode::DaemonQueueSaturated | ErrorCode::DaemonQueueTimeout
    )
}

/// Backoff with ±50% jitter.
fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis().max(1) as u64;
    let jitter = rand::thread_rng().gen_range(0..=base_ms);
    Duration::from_millis(base_ms / 2 + jitter)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
