// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chromium-family browser adapter.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sw_core::{origin_host_port, BrowserMode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{BrowserError, BrowserPort, LaunchedBrowser, StartSpec};
use crate::process;

/// Candidate binaries probed when no override is configured.
const BINARY_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// How long `start_managed` waits for the debug endpoint.
const LAUNCH_READY_TIMEOUT: Duration = Duration::from_secs(15);
const LAUNCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Launches Chromium-family browsers with a debug port.
#[derive(Debug, Clone)]
pub struct ChromiumAdapter {
    binary: Option<PathBuf>,
}

impl ChromiumAdapter {
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self { binary }
    }

    /// Honors `SURFWRIGHT_BROWSER_BINARY`; otherwise candidates are tried
    /// from `PATH` at launch time.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("SURFWRIGHT_BROWSER_BINARY").map(PathBuf::from))
    }

    fn launch_command(&self, spec: &StartSpec, binary: &Path) -> Command {
        let mut cmd = Command::new(binary);
        cmd.arg(format!("--remote-debugging-port={}", spec.debug_port))
            .arg(format!("--user-data-dir={}", spec.user_data_dir.display()))
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking");
        if spec.browser_mode == BrowserMode::Headless {
            cmd.arg("--headless=new");
        }
        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        cmd
    }

    fn binaries(&self) -> Vec<PathBuf> {
        match &self.binary {
            Some(binary) => vec![binary.clone()],
            None => BINARY_CANDIDATES.iter().map(PathBuf::from).collect(),
        }
    }
}

#[async_trait]
impl BrowserPort for ChromiumAdapter {
    async fn allocate_free_port(&self) -> Result<u16, BrowserError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        Ok(listener.local_addr()?.port())
    }

    async fn start_managed(&self, spec: &StartSpec) -> Result<LaunchedBrowser, BrowserError> {
        std::fs::create_dir_all(&spec.user_data_dir)?;

        let mut last_spawn_error = None;
        for binary in self.binaries() {
            let mut child = match self.launch_command(spec, &binary).spawn() {
                Ok(child) => child,
                Err(e) => {
                    last_spawn_error = Some(format!("{}: {e}", binary.display()));
                    continue;
                }
            };
            let Some(pid) = child.id() else {
                last_spawn_error = Some(format!("{}: exited before pid", binary.display()));
                continue;
            };

            let cdp_origin = format!("http://127.0.0.1:{}", spec.debug_port);
            let deadline = Instant::now() + LAUNCH_READY_TIMEOUT;
            loop {
                if self.probe(&cdp_origin, LAUNCH_POLL_INTERVAL).await {
                    info!(pid, origin = %cdp_origin, "managed browser ready");
                    return Ok(LaunchedBrowser {
                        cdp_origin,
                        debug_port: spec.debug_port,
                        browser_pid: pid,
                        browser_mode: spec.browser_mode,
                    });
                }
                if let Ok(Some(status)) = child.try_wait() {
                    last_spawn_error =
                        Some(format!("{}: exited during startup ({status})", binary.display()));
                    break;
                }
                if Instant::now() >= deadline {
                    warn!(pid, "browser never exposed its debug endpoint, killing");
                    let _ = process::terminate(pid, Duration::from_secs(2)).await;
                    return Err(BrowserError::EndpointNotReady(LAUNCH_READY_TIMEOUT));
                }
                tokio::time::sleep(LAUNCH_POLL_INTERVAL).await;
            }
        }

        match last_spawn_error {
            Some(reason) => Err(BrowserError::LaunchFailed(reason)),
            None => Err(BrowserError::BinaryNotFound(
                "no candidate browser binary on PATH".to_string(),
            )),
        }
    }

    async fn probe(&self, cdp_origin: &str, timeout: Duration) -> bool {
        let Some((host, port)) = origin_host_port(cdp_origin) else {
            return false;
        };
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port))).await,
            Ok(Ok(_))
        )
    }

    async fn attach_handshake(
        &self,
        cdp_origin: &str,
        timeout: Duration,
    ) -> Result<bool, BrowserError> {
        let Some((host, port)) = origin_host_port(cdp_origin) else {
            return Ok(false);
        };
        let handshake = async {
            let mut stream = TcpStream::connect((host.as_str(), port)).await?;
            let request = format!(
                "GET /json/version HTTP/1.1\r\nHost: {host}:{port}\r\nConnection: close\r\n\r\n"
            );
            stream.write_all(request.as_bytes()).await?;
            let mut buf = [0u8; 256];
            let n = stream.read(&mut buf).await?;
            Ok::<bool, std::io::Error>(n > 0)
        };
        match tokio::time::timeout(timeout, handshake).await {
            Ok(Ok(answered)) => Ok(answered),
            Ok(Err(e)) => {
                debug!(origin = %cdp_origin, error = %e, "attach handshake failed");
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }

    async fn kill_process(&self, pid: u32) -> Result<(), BrowserError> {
        process::terminate(pid, Duration::from_secs(2))
            .await
            .map_err(|reason| BrowserError::KillFailed { pid, reason })
    }
}

#[cfg(test)]
#[path = "chromium_tests.rs"]
mod tests;
