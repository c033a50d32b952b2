// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical on-disk locations under the state root.
//!
//! Every path handed out stays under the root: identifiers are sanitized
//! before any join, so `..` and path separators are unrepresentable.

use std::path::{Path, PathBuf};

use sw_core::{sanitize_id, Error};

/// Derives all canonical paths from one root directory.
#[derive(Debug, Clone)]
pub struct StatePaths {
    root: PathBuf,
}

impl StatePaths {
    /// Resolve the root: `SURFWRIGHT_STATE_DIR` >
    /// `$XDG_STATE_HOME/surfwright` > `~/.local/state/surfwright`.
    pub fn resolve() -> sw_core::Result<Self> {
        if let Ok(dir) = std::env::var("SURFWRIGHT_STATE_DIR") {
            return Ok(Self::from_root(PathBuf::from(dir)));
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return Ok(Self::from_root(PathBuf::from(xdg).join("surfwright")));
        }
        let home = std::env::var("HOME")
            .map_err(|_| Error::internal("could not determine state directory"))?;
        Ok(Self::from_root(
            PathBuf::from(home).join(".local/state/surfwright"),
        ))
    }

    pub fn from_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root and its fixed subdirectories, mode 0700 on POSIX.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        for dir in [
            self.root.clone(),
            self.profiles_root(),
            self.captures_root(),
            self.artifacts_root(),
        ] {
            std::fs::create_dir_all(&dir)?;
            restrict_dir_mode(&dir)?;
        }
        Ok(())
    }

    /// `state.json` — the canonical document.
    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    /// `state.json.lock` — lock sidecar.
    pub fn state_lock(&self) -> PathBuf {
        self.root.join("state.json.lock")
    }

    /// `daemon.json` — daemon metadata.
    pub fn daemon_meta(&self) -> PathBuf {
        self.root.join("daemon.json")
    }

    /// `daemon.spawn.lock` — exclusive spawn lock for concurrent clients.
    pub fn spawn_lock(&self) -> PathBuf {
        self.root.join("daemon.spawn.lock")
    }

    /// `daemon.log` — worker log file.
    pub fn daemon_log(&self) -> PathBuf {
        self.root.join("daemon.log")
    }

    pub fn profiles_root(&self) -> PathBuf {
        self.root.join("profiles")
    }

    /// Managed browser user-data dir for a session.
    pub fn profile_dir(&self, session_id: &str) -> sw_core::Result<PathBuf> {
        Ok(self.profiles_root().join(checked_id(session_id)?))
    }

    pub fn captures_root(&self) -> PathBuf {
        self.root.join("captures")
    }

    /// Stop-signal file watched by the capture worker.
    pub fn capture_signal(&self, capture_id: &str) -> sw_core::Result<PathBuf> {
        Ok(self
            .captures_root()
            .join(format!("{}.signal", checked_id(capture_id)?)))
    }

    /// Completion marker written by the capture worker.
    pub fn capture_done(&self, capture_id: &str) -> sw_core::Result<PathBuf> {
        Ok(self
            .captures_root()
            .join(format!("{}.done", checked_id(capture_id)?)))
    }

    /// Result document written by the capture worker.
    pub fn capture_result(&self, capture_id: &str) -> sw_core::Result<PathBuf> {
        Ok(self
            .captures_root()
            .join(format!("{}.result.json", checked_id(capture_id)?)))
    }

    pub fn artifacts_root(&self) -> PathBuf {
        self.root.join("artifacts").join("network")
    }

    /// HAR export location for an artifact.
    pub fn artifact_file(&self, artifact_id: &str) -> sw_core::Result<PathBuf> {
        Ok(self
            .artifacts_root()
            .join(format!("{}.har", checked_id(artifact_id)?)))
    }
}

/// Reject any identifier that sanitization would alter.
fn checked_id(raw: &str) -> sw_core::Result<String> {
    match sanitize_id(raw) {
        Some(clean) if clean == raw => Ok(clean),
        _ => Err(Error::query_invalid(format!("invalid identifier: {raw:?}"))),
    }
}

#[cfg(unix)]
fn restrict_dir_mode(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn restrict_dir_mode(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
