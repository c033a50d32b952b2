// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! surfwright CLI (sw)
//!
//! Thin client: each invocation forwards its argv to the shared daemon
//! (spawning one if needed) or runs it in-process, and prints the
//! captured result.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod daemon_process;
mod env;
mod output;

use client::{ClientConfig, Orchestrator};
use sw_core::Error;

#[tokio::main]
async fn main() {
    setup_logging();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    match argv.first().map(String::as_str) {
        None => {
            print_usage();
            output::emit(output::misuse(&Error::query_invalid("no command given")));
        }
        Some("--version" | "-V") => {
            println!("sw {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Some("--help" | "-h" | "help") => {
            print_usage();
            return;
        }
        Some(_) => {}
    }

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => output::emit(output::failure(&e)),
    };
    let outcome = Orchestrator::new(config).execute(argv).await;
    output::emit(outcome);
}

fn print_usage() {
    println!("sw {} - browser automation for agents", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("    sw <command> [args]");
    println!();
    println!("COMMANDS:");
    println!("    ping                      Round-trip smoke check");
    println!("    open <url>                Open a page in a session");
    println!("    session new|attach|use|list|ensure|prune");
    println!("    target list|prune");
    println!("    target network export|tail");
    println!("    state reconcile           Prune sessions and targets together");
    println!("    capture prune             Apply capture/artifact retention");
    println!("    disk prune [--dry-run]    Remove unindexed capture files");
    println!("    daemon status|stop        Inspect or stop the shared daemon");
    println!();
    println!("ENVIRONMENT:");
    println!("    SURFWRIGHT_STATE_DIR      State root (default ~/.local/state/surfwright)");
    println!("    SURFWRIGHT_DAEMON=0       Run in-process, without the shared daemon");
}

fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    let filter =
        EnvFilter::try_from_env("SURFWRIGHT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
