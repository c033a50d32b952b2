// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transactional access to `state.json`.
//!
//! Every read or mutation happens under the cross-process file lock. A
//! present-but-unreadable document is a typed failure, never silently
//! replaced by an empty one; `read_or_fail` additionally moves the
//! offending file aside for inspection.

use std::cell::Cell;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sw_core::{Error, ErrorCode};
use thiserror::Error as ThisError;
use tracing::{debug, warn};

use crate::lock::{acquire_lock, LockError, LockOptions};
use crate::paths::StatePaths;
use crate::state::{StateDocument, STATE_VERSION};

/// Store failures, convertible into the central taxonomy.
#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("state file corrupt at {path}: {reason}")]
    Corrupt {
        path: PathBuf,
        reason: String,
        backup_path: Option<PathBuf>,
    },

    #[error("state file at {path} has version {found}, this binary supports {supported}")]
    VersionMismatch {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("state io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invariant violation: {0}")]
    Invariant(Error),

    #[error("nested mutate on the same thread")]
    Reentrant,
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Lock(LockError::Timeout {
                lock_path,
                timeout_ms,
                lock_age_ms,
                holder_pid,
            }) => Error::new(
                ErrorCode::StateLockTimeout,
                format!(
                    "state lock not acquired within {timeout_ms}ms: {}",
                    lock_path.display()
                ),
            )
            .with_hint_context(serde_json::json!({
                "lockPath": lock_path.display().to_string(),
                "lockAgeMs": lock_age_ms,
                "holderPid": holder_pid,
            })),
            StoreError::Lock(LockError::Io { lock_path, source }) => Error::new(
                ErrorCode::StateLockIo,
                format!("lock io failure at {}: {source}", lock_path.display()),
            ),
            StoreError::Corrupt {
                path,
                reason,
                backup_path,
            } => Error::new(
                ErrorCode::StateCorrupt,
                format!("state file unreadable at {}: {reason}", path.display()),
            )
            .with_hint_context(serde_json::json!({
                "path": path.display().to_string(),
                "reason": reason,
                "backupPath": backup_path.map(|p| p.display().to_string()),
            })),
            StoreError::VersionMismatch {
                path,
                found,
                supported,
            } => Error::new(
                ErrorCode::StateVersionMismatch,
                format!(
                    "state file {} written by a newer binary (version {found} > {supported})",
                    path.display()
                ),
            ),
            StoreError::Io(e) => Error::new(ErrorCode::StateLockIo, format!("state io: {e}")),
            StoreError::Invariant(e) => e,
            StoreError::Reentrant => Error::internal("nested state mutation on one thread"),
        }
    }
}

thread_local! {
    static IN_MUTATE: Cell<bool> = const { Cell::new(false) };
}

/// Handle to the state document. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: StatePaths,
    lock_options: LockOptions,
}

impl StateStore {
    pub fn new(paths: StatePaths) -> Self {
        Self {
            paths,
            lock_options: LockOptions::default(),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_options.timeout = timeout;
        self
    }

    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    /// Load a copy of the document under a brief lock hold.
    pub fn read(&self) -> Result<StateDocument, StoreError> {
        self.paths.ensure_root()?;
        let _guard = acquire_lock(&self.paths.state_lock(), &self.lock_options)?;
        self.load(false)
    }

    /// Like [`read`](Self::read), but a corrupt document is also moved
    /// aside to `state.json.quarantine.<millis>` before failing.
    pub fn read_or_fail(&self) -> Result<StateDocument, StoreError> {
        self.paths.ensure_root()?;
        let _guard = acquire_lock(&self.paths.state_lock(), &self.lock_options)?;
        self.load(true)
    }

    /// Read-modify-write transaction. Loads and normalizes the document,
    /// runs `mutate`, validates invariants, persists atomically.
    ///
    /// Related writes belong in one `mutate` call; nested calls on the
    /// same thread fail rather than deadlock on the file lock.
    pub fn mutate<R>(
        &self,
        mutate: impl FnOnce(&mut StateDocument) -> sw_core::Result<R>,
    ) -> Result<R, StoreError> {
        if IN_MUTATE.with(|flag| flag.get()) {
            return Err(StoreError::Reentrant);
        }
        IN_MUTATE.with(|flag| flag.set(true));
        let result = self.mutate_inner(mutate);
        IN_MUTATE.with(|flag| flag.set(false));
        result
    }

    fn mutate_inner<R>(
        &self,
        mutate: impl FnOnce(&mut StateDocument) -> sw_core::Result<R>,
    ) -> Result<R, StoreError> {
        self.paths.ensure_root()?;
        let _guard = acquire_lock(&self.paths.state_lock(), &self.lock_options)?;

        let mut document = self.load(true)?;
        for repair in document.normalize() {
            debug!(repair = %repair, "state normalization");
        }

        let value = mutate(&mut document).map_err(StoreError::Invariant)?;

        document.validate().map_err(StoreError::Invariant)?;
        self.persist(&document)?;
        Ok(value)
    }

    fn load(&self, quarantine: bool) -> Result<StateDocument, StoreError> {
        let path = self.paths.state_file();
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // First run: the document is created on first successful write.
                return Ok(StateDocument::default());
            }
            Err(e) => return Err(StoreError::Io(e)),
        };

        let document: StateDocument = match serde_json::from_slice(&raw) {
            Ok(document) => document,
            Err(e) => {
                let backup_path = if quarantine {
                    self.quarantine(&path)
                } else {
                    None
                };
                return Err(StoreError::Corrupt {
                    path,
                    reason: e.to_string(),
                    backup_path,
                });
            }
        };

        if document.version > STATE_VERSION {
            return Err(StoreError::VersionMismatch {
                path,
                found: document.version,
                supported: STATE_VERSION,
            });
        }

        Ok(document)
    }

    fn quarantine(&self, path: &Path) -> Option<PathBuf> {
        let stamp = chrono::Utc::now().timestamp_millis();
        let target = path.with_extension(format!("quarantine.{stamp}"));
        match std::fs::rename(path, &target) {
            Ok(()) => {
                warn!(
                    from = %path.display(),
                    to = %target.display(),
                    "quarantined corrupt state file"
                );
                Some(target)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to quarantine state file");
                None
            }
        }
    }

    /// Write `state.json` atomically: temp file, fsync, rename, fsync of
    /// the parent directory. The temp file is removed on rename failure.
    fn persist(&self, document: &StateDocument) -> Result<(), StoreError> {
        let path = self.paths.state_file();
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let tmp_path = self.paths.root().join(format!(
            "state.json.tmp.{}.{}",
            std::process::id(),
            &nonce[..8]
        ));

        let mut serialized = serde_json::to_string_pretty(document)
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?;
        serialized.push('\n');

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }

        if let Err(e) = std::fs::rename(&tmp_path, &path) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(StoreError::Io(e));
        }

        if let Ok(dir) = File::open(self.paths.root()) {
            let _ = dir.sync_all();
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
