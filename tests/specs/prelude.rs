//! Shared helpers for the spec suite.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Fresh state root for one spec.
pub fn state_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("create temp state dir")
}

/// Locate (building if necessary) a binary from another workspace member.
///
/// `assert_cmd::Command::cargo_bin` only resolves `CARGO_BIN_EXE_<name>`,
/// which cargo only sets for binaries owned by the package under test. The
/// `sw`/`swd` binaries live in separate workspace packages, so we build them
/// via escargot instead.
fn workspace_bin(package: &str, bin: &str) -> PathBuf {
    escargot::CargoBuild::new()
        .package(package)
        .bin(bin)
        .current_target()
        .run()
        .unwrap_or_else(|e| panic!("failed to build {bin} binary: {e}"))
        .path()
        .to_path_buf()
}

fn sw_path() -> &'static Path {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| workspace_bin("sw", "sw"))
}

/// `sw` against an isolated state root, with a short daemon idle timer so
/// stray workers exit quickly.
pub fn sw(state_root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(sw_path());
    cmd.env("SURFWRIGHT_STATE_DIR", state_root)
        .env("SURFWRIGHT_DAEMON_BINARY", swd_path())
        .env("SURFWRIGHT_DAEMON_IDLE_MS", "10000")
        .env("SURFWRIGHT_TIMEOUT_CONNECT_MS", "10000")
        .env("SURFWRIGHT_GC_ENABLED", "0")
        .env_remove("SURFWRIGHT_DAEMON")
        .env_remove("SURFWRIGHT_AGENT_ID")
        .timeout(std::time::Duration::from_secs(30));
    cmd
}

/// Same, with the daemon path disabled.
pub fn sw_no_daemon(state_root: &Path) -> assert_cmd::Command {
    let mut cmd = sw(state_root);
    cmd.env("SURFWRIGHT_DAEMON", "0");
    cmd
}

pub fn swd_path() -> PathBuf {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| workspace_bin("sw-daemon", "swd")).clone()
}

/// Parse the final stdout line as the JSON the contract promises there.
pub fn last_json(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let line = text.lines().last().unwrap_or_else(|| {
        panic!("no stdout lines in {text:?}");
    });
    serde_json::from_str(line)
        .unwrap_or_else(|e| panic!("final stdout line is not JSON ({e}): {line:?}"))
}

/// Best-effort daemon stop at the end of a spec.
pub fn stop_daemon(state_root: &Path) {
    let _ = sw(state_root).args(["daemon", "stop"]).output();
}
