// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, idle shutdown, cleanup.

use std::sync::Arc;
use std::time::Duration;

use sw_adapters::ChromiumAdapter;
use sw_core::CommandManifest;
use sw_engine::{EngineDispatcher, Runtime, RuntimeLimits};
use sw_storage::StatePaths;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::env::DaemonLimits;
use crate::lane::LaneResolver;
use crate::listener::{ActivityTracker, ListenCtx, Listener};
use crate::meta::{self, DaemonMetadata};
use crate::scheduler::{LaneScheduler, SchedulerConfig};

/// Marker the worker writes to its log before anything else, so the
/// spawning client can locate startup errors.
pub const STARTUP_MARKER_PREFIX: &str = "--- swd: starting (pid: ";

/// Daemon configuration, resolved from the environment once.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub paths: StatePaths,
    pub limits: DaemonLimits,
}

impl DaemonConfig {
    pub fn load() -> Result<Self, LifecycleError> {
        let paths = StatePaths::resolve().map_err(|e| LifecycleError::NoStateDir(e.message))?;
        Ok(Self {
            paths,
            limits: DaemonLimits::from_env(),
        })
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory: {0}")]
    NoStateDir(String),

    #[error("failed to bind loopback listener: {0}")]
    BindFailed(std::io::Error),

    #[error("failed to publish daemon metadata: {0}")]
    PublishFailed(std::io::Error),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the worker until shutdown is requested or the idle timer fires.
pub async fn run_daemon(config: DaemonConfig) -> Result<(), LifecycleError> {
    config.paths.ensure_root()?;

    // Port 0: the OS picks; the metadata file advertises the real port.
    let socket = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(LifecycleError::BindFailed)?;
    let port = socket.local_addr().map_err(LifecycleError::BindFailed)?.port();

    let token = uuid::Uuid::new_v4().simple().to_string();
    let metadata = DaemonMetadata::new(port, token.clone());
    meta::publish(&config.paths, &metadata).map_err(LifecycleError::PublishFailed)?;

    let manifest = Arc::new(CommandManifest::builtin());
    let runtime = Arc::new(Runtime::new(
        config.paths.clone(),
        Arc::new(ChromiumAdapter::from_env()),
        RuntimeLimits::from_env(),
        agent_id(),
    ));
    let dispatcher = Arc::new(EngineDispatcher::new(
        Arc::clone(&runtime),
        Arc::clone(&manifest),
    ));
    let scheduler = LaneScheduler::new(dispatcher, SchedulerConfig::from(&config.limits));
    let resolver = LaneResolver::new(manifest, agent_id());

    let shutdown = Arc::new(Notify::new());
    let activity = Arc::new(ActivityTracker::new());
    let ctx = Arc::new(ListenCtx::new(
        token.clone(),
        scheduler.clone(),
        resolver,
        runtime,
        Arc::clone(&shutdown),
        Arc::clone(&activity),
    ));

    let listener_task = tokio::spawn(Listener::new(socket, ctx).run());
    let idle_task = tokio::spawn(idle_monitor(
        Arc::clone(&activity),
        Arc::clone(&shutdown),
        config.limits.idle_timeout,
    ));

    info!(port, pid = std::process::id(), "daemon ready");

    wait_for_shutdown(&shutdown).await;

    let gauges = scheduler.gauges();
    if gauges.active_total > 0 || gauges.queued_total > 0 {
        warn!(
            active = gauges.active_total,
            queued = gauges.queued_total,
            "shutting down with work in flight"
        );
    }

    listener_task.abort();
    idle_task.abort();
    meta::cleanup_if_owned(&config.paths, &token);
    info!("daemon shutdown complete");
    Ok(())
}

async fn wait_for_shutdown(shutdown: &Notify) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            shutdown.notified().await;
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(sig) => sig,
        Err(e) => {
            warn!(error = %e, "failed to install SIGINT handler");
            shutdown.notified().await;
            return;
        }
    };

    tokio::select! {
        _ = shutdown.notified() => info!("shutdown requested"),
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }
}

/// Shut down after `idle_timeout` with no accept and no in-flight work.
async fn idle_monitor(activity: Arc<ActivityTracker>, shutdown: Arc<Notify>, idle_timeout: Duration) {
    let tick = (idle_timeout / 4).max(Duration::from_millis(50));
    loop {
        tokio::time::sleep(tick).await;
        if let Some(idle) = activity.idle_for() {
            if idle >= idle_timeout {
                info!(idle_ms = idle.as_millis() as u64, "idle timeout, shutting down");
                shutdown.notify_one();
                return;
            }
        }
    }
}

/// `SURFWRIGHT_AGENT_ID`, sanitized, defaulting to `default`.
fn agent_id() -> String {
    std::env::var("SURFWRIGHT_AGENT_ID")
        .ok()
        .and_then(|raw| sw_core::sanitize_id(&raw))
        .unwrap_or_else(|| "default".to_string())
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
