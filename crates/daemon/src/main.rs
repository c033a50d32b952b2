// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! surfwright daemon (swd)
//!
//! Long-lived worker that owns the lane scheduler and executes commands
//! for concurrent `sw` clients over loopback TCP.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::io::Write;
use std::path::Path;

use sw_daemon::{run_daemon, DaemonConfig, STARTUP_MARKER_PREFIX};
use tracing::{error, info};

/// Rotate the log once it passes 5 MiB.
const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("swd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("swd {}", env!("CARGO_PKG_VERSION"));
                println!("surfwright daemon - shares browser sessions across `sw` invocations");
                println!();
                println!("USAGE:");
                println!("    swd");
                println!();
                println!("The daemon is typically spawned by the `sw` CLI and should not");
                println!("be invoked directly. It listens on a loopback TCP port advertised");
                println!("in daemon.json under the state directory.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: swd [--help | --version]");
                std::process::exit(2);
            }
        }
    }

    let config = DaemonConfig::load()?;
    config.paths.ensure_root()?;

    let log_path = config.paths.daemon_log();
    rotate_log_if_needed(&log_path);
    write_startup_marker(&log_path)?;

    let _log_guard = setup_logging(&log_path)?;

    info!("starting surfwright daemon");
    if let Err(e) = run_daemon(config).await {
        error!("failed to start: {e}");
        eprintln!("swd: {e}");
        std::process::exit(1);
    }
    Ok(())
}

/// Marker line written before tracing is up, so the spawning client can
/// find startup errors for this run.
fn write_startup_marker(log_path: &Path) -> std::io::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{}{})", STARTUP_MARKER_PREFIX, std::process::id())
}

fn rotate_log_if_needed(log_path: &Path) {
    let too_big = log_path
        .metadata()
        .map(|m| m.len() > MAX_LOG_BYTES)
        .unwrap_or(false);
    if too_big {
        let rotated = log_path.with_extension("log.1");
        let _ = std::fs::rename(log_path, rotated);
    }
}

fn setup_logging(
    log_path: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::EnvFilter;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let filter = EnvFilter::try_from_env("SURFWRIGHT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}
