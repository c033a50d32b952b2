// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon metadata file: publish, validate, clean up.
//!
//! Every rule about `daemon.json` lives here. The launcher, the idle
//! shutdown path, and the client all call this module; nobody reimplements
//! the checks.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sw_storage::StatePaths;
use tracing::{debug, warn};

/// Current metadata schema version.
pub const META_VERSION: u32 = 1;

/// `{pid, port, token, startedAt}` advertisement of a live worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonMetadata {
    pub version: u32,
    pub pid: u32,
    pub host: String,
    pub port: u16,
    pub token: String,
    pub started_at: DateTime<Utc>,
}

impl DaemonMetadata {
    pub fn new(port: u16, token: String) -> Self {
        Self {
            version: META_VERSION,
            pid: std::process::id(),
            host: "127.0.0.1".to_string(),
            port,
            token,
            started_at: Utc::now(),
        }
    }
}

/// Write `daemon.json` with owner-only permissions (0600 on POSIX),
/// atomically via a temp file.
pub fn publish(paths: &StatePaths, meta: &DaemonMetadata) -> std::io::Result<()> {
    let path = paths.daemon_meta();
    let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
    let serialized = serde_json::to_string_pretty(meta).map_err(std::io::Error::other)?;

    std::fs::write(&tmp_path, serialized)?;
    restrict_file_mode(&tmp_path)?;
    if let Err(e) = std::fs::rename(&tmp_path, &path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

/// Read and validate the metadata file. Any failed check removes the file
/// and yields `None`: permissive mode, wrong version, non-positive
/// pid/port, empty token, non-loopback host, dead pid, or a pid owned by
/// another user.
pub fn read_valid(paths: &StatePaths) -> Option<DaemonMetadata> {
    let path = paths.daemon_meta();
    let raw = match std::fs::read(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable daemon metadata");
            return None;
        }
    };

    if let Some(reason) = validation_failure(&path, &raw) {
        debug!(path = %path.display(), reason, "removing stale daemon metadata");
        let _ = std::fs::remove_file(&path);
        return None;
    }

    serde_json::from_slice(&raw).ok()
}

/// Remove the metadata file only when this process owns it: its pid and
/// token both match.
pub fn cleanup_if_owned(paths: &StatePaths, token: &str) {
    let path = paths.daemon_meta();
    let Ok(raw) = std::fs::read(&path) else {
        return;
    };
    let Ok(meta) = serde_json::from_slice::<DaemonMetadata>(&raw) else {
        return;
    };
    if meta.pid == std::process::id() && meta.token == token {
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "failed to remove owned daemon metadata");
        }
    }
}

fn validation_failure(path: &Path, raw: &[u8]) -> Option<&'static str> {
    if mode_is_permissive(path) {
        return Some("group/other-readable mode");
    }
    let meta: DaemonMetadata = match serde_json::from_slice(raw) {
        Ok(meta) => meta,
        Err(_) => return Some("unparseable"),
    };
    if meta.version != META_VERSION {
        return Some("version mismatch");
    }
    if meta.port == 0 {
        return Some("port not positive");
    }
    if meta.pid == 0 {
        return Some("pid not positive");
    }
    if meta.token.is_empty() {
        return Some("empty token");
    }
    if meta.host != "127.0.0.1" {
        return Some("non-loopback host");
    }
    if !pid_is_ours(meta.pid) {
        return Some("pid not a live process of this user");
    }
    None
}

#[cfg(unix)]
fn mode_is_permissive(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match path.metadata() {
        Ok(metadata) => metadata.permissions().mode() & 0o077 != 0,
        Err(_) => true,
    }
}

#[cfg(not(unix))]
fn mode_is_permissive(_path: &Path) -> bool {
    false
}

/// The pid must be alive and, where the platform lets us check, owned by
/// the current user.
fn pid_is_ours(pid: u32) -> bool {
    if !sw_adapters::process::pid_alive(pid) {
        return false;
    }
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::fs::MetadataExt;
        match std::fs::metadata(format!("/proc/{pid}")) {
            Ok(metadata) => metadata.uid() == nix::unistd::geteuid().as_raw(),
            Err(_) => false,
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        true
    }
}

#[cfg(unix)]
fn restrict_file_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_file_mode(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
