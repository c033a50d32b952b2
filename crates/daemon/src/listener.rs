// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for socket I/O.
//!
//! Connections are accepted and decoded in parallel; admitted work is
//! serialized through the lane scheduler. A client disconnect cancels its
//! in-flight request through the task's cancellation token.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use sw_core::ErrorCode;
use sw_engine::Runtime;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::lane::LaneResolver;
use crate::protocol::{Request, RequestKind, Response};
use crate::scheduler::LaneScheduler;
use crate::wire::{self, FrameError, DEFAULT_TIMEOUT};

/// Shared daemon context for all connection handlers.
pub(crate) struct ListenCtx {
    pub token: String,
    pub scheduler: LaneScheduler,
    pub resolver: LaneResolver,
    pub runtime: Arc<Runtime>,
    pub shutdown: Arc<Notify>,
    pub activity: Arc<ActivityTracker>,
    gc_last: Mutex<Option<Instant>>,
}

impl ListenCtx {
    pub fn new(
        token: String,
        scheduler: LaneScheduler,
        resolver: LaneResolver,
        runtime: Arc<Runtime>,
        shutdown: Arc<Notify>,
        activity: Arc<ActivityTracker>,
    ) -> Self {
        Self {
            token,
            scheduler,
            resolver,
            runtime,
            shutdown,
            activity,
            gc_last: Mutex::new(None),
        }
    }
}

/// Tracks accepts and in-flight requests for the idle-shutdown timer.
pub(crate) struct ActivityTracker {
    last: Mutex<Instant>,
    in_flight: AtomicUsize,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(Instant::now()),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn touch(&self) {
        *self.last.lock() = Instant::now();
    }

    pub fn begin(self: &Arc<Self>) -> ActivityGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        self.touch();
        ActivityGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Idle duration, or `None` while a request is in flight.
    pub fn idle_for(&self) -> Option<Duration> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            return None;
        }
        Some(self.last.lock().elapsed())
    }
}

pub(crate) struct ActivityGuard {
    tracker: Arc<ActivityTracker>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.tracker.touch();
    }
}

/// Listener task accepting loopback connections.
pub(crate) struct Listener {
    socket: TcpListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(socket: TcpListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Accept until the task is dropped at shutdown, spawning a handler
    /// per connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    self.ctx.activity.touch();
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                FrameError::ConnectionClosed => debug!("client disconnected"),
                                FrameError::Timeout => warn!("connection timeout"),
                                _ => error!("connection error: {e}"),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("accept error: {e}");
                }
            }
        }
    }
}

/// One-shot request/response per connection.
async fn handle_connection(stream: TcpStream, ctx: &Arc<ListenCtx>) -> Result<(), FrameError> {
    let _guard = ctx.activity.begin();
    let (mut reader, mut writer) = stream.into_split();

    let request: Request = match wire::read_message(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(request) => request,
        Err(e @ (FrameError::Oversize { .. } | FrameError::InvalidJson(_))) => {
            // Best effort: tell the peer why before the socket closes.
            let response =
                Response::failure_code(ErrorCode::DaemonRequestInvalid, e.to_string());
            let _ = wire::write_message(&mut writer, &response, DEFAULT_TIMEOUT).await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    if !token_matches(&request.token, &ctx.token) {
        warn!("request with invalid token rejected");
        let response = Response::failure_code(ErrorCode::DaemonTokenInvalid, "token mismatch");
        wire::write_message(&mut writer, &response, DEFAULT_TIMEOUT).await?;
        return Ok(());
    }

    let mut shutdown_after_reply = false;
    let response = match request.kind {
        RequestKind::Ping => Response::pong(),
        RequestKind::Shutdown => {
            shutdown_after_reply = true;
            Response::shutdown()
        }
        RequestKind::Run { argv } => handle_run(argv, reader, ctx).await,
    };

    wire::write_message(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    if shutdown_after_reply {
        ctx.shutdown.notify_one();
    }
    Ok(())
}

/// Route one argv through the scheduler and await its outcome.
async fn handle_run(argv: Vec<String>, reader: OwnedReadHalf, ctx: &Arc<ListenCtx>) -> Response {
    if argv.is_empty() {
        return Response::failure_code(ErrorCode::DaemonRequestInvalid, "empty argv");
    }

    let (lane_key, family) = ctx.resolver.resolve(&argv);
    debug!(lane = %lane_key, family = %family, "run request");

    let cancel = CancellationToken::new();
    let receiver = match ctx
        .scheduler
        .submit(argv, lane_key, family, cancel.clone())
    {
        Ok(receiver) => receiver,
        Err(e) => return Response::failure(&e),
    };

    // The protocol is one-shot: any further read on this connection only
    // ever sees EOF, which means the client went away.
    let watcher = tokio::spawn(watch_disconnect(reader, cancel.clone()));
    let result = receiver.await;
    watcher.abort();

    let response = match result {
        Ok(Ok(outcome)) => Response::run(outcome),
        Ok(Err(e)) => Response::failure(&e),
        Err(_) => Response::failure_code(
            ErrorCode::DaemonRunFailed,
            "worker dropped the task before completion",
        ),
    };
    maybe_spawn_maintenance(ctx);
    response
}

async fn watch_disconnect(mut reader: OwnedReadHalf, cancel: CancellationToken) {
    let mut scratch = [0u8; 64];
    loop {
        match reader.read(&mut scratch).await {
            Ok(0) | Err(_) => {
                debug!("client disconnected, cancelling in-flight request");
                cancel.cancel();
                return;
            }
            Ok(_) => {
                // Trailing bytes after the request frame are discarded.
            }
        }
    }
}

/// On request completion, maybe kick a background maintenance pass that
/// parks idle managed browsers. Gated by GC enablement and a minimum
/// interval between passes.
fn maybe_spawn_maintenance(ctx: &Arc<ListenCtx>) {
    let limits = ctx.runtime.limits();
    if !limits.gc_enabled {
        return;
    }
    {
        let mut last = ctx.gc_last.lock();
        let recent = last
            .map(|at| at.elapsed() < limits.gc_min_interval)
            .unwrap_or(false);
        if recent {
            return;
        }
        *last = Some(Instant::now());
    }
    let runtime = Arc::clone(&ctx.runtime);
    tokio::spawn(async move {
        if let Err(e) = runtime.park_idle_browsers().await {
            warn!(error = %e, "opportunistic maintenance failed");
        }
    });
}

/// Constant-time token equality: compare digests so neither content nor
/// length leaks through timing.
fn token_matches(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
