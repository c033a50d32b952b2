// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory cross-process lock on a sidecar file.
//!
//! Acquisition waits with exponential backoff plus jitter up to a caller
//! deadline. The holder writes its pid into the sidecar; a holder pid
//! observed dead twice in succession is treated as stale, the sidecar is
//! removed, and acquisition retries once.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use rand::Rng;
use thiserror::Error;
use tracing::warn;

/// Lock acquisition failures.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock not acquired within {timeout_ms}ms: {lock_path}")]
    Timeout {
        lock_path: PathBuf,
        timeout_ms: u64,
        lock_age_ms: Option<u64>,
        holder_pid: Option<u32>,
    },

    #[error("lock io error at {lock_path}: {source}")]
    Io {
        lock_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Tuning for the acquisition wait loop.
#[derive(Debug, Clone)]
pub struct LockOptions {
    pub timeout: Duration,
    pub backoff_start: Duration,
    pub backoff_cap: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            backoff_start: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(200),
        }
    }
}

/// Held advisory lock. Released on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs2::FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release file lock");
        }
    }
}

/// Check whether a pid refers to a live process.
pub fn pid_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(raw), None).is_ok()
}

/// Acquire the lock at `path`, waiting up to `options.timeout`.
pub fn acquire_lock(path: &Path, options: &LockOptions) -> Result<LockGuard, LockError> {
    let deadline = Instant::now() + options.timeout;
    let mut backoff = options.backoff_start;
    let mut dead_observations = 0u32;
    let mut removed_stale = false;

    loop {
        // Open without truncating: the content belongs to the holder until
        // the lock is ours.
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::Io {
                lock_path: path.to_path_buf(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                file.set_len(0).map_err(|source| LockError::Io {
                    lock_path: path.to_path_buf(),
                    source,
                })?;
                file.seek(SeekFrom::Start(0)).map_err(|source| LockError::Io {
                    lock_path: path.to_path_buf(),
                    source,
                })?;
                writeln!(file, "{}", std::process::id()).map_err(|source| LockError::Io {
                    lock_path: path.to_path_buf(),
                    source,
                })?;
                return Ok(LockGuard {
                    file,
                    path: path.to_path_buf(),
                });
            }
            Err(_) => {
                let holder_pid = read_holder_pid(&mut file);
                match holder_pid {
                    Some(pid) if !pid_alive(pid) => dead_observations += 1,
                    _ => dead_observations = 0,
                }

                if dead_observations >= 2 && !removed_stale {
                    warn!(
                        path = %path.display(),
                        holder_pid = ?holder_pid,
                        "removing stale lock held by dead process"
                    );
                    let _ = std::fs::remove_file(path);
                    removed_stale = true;
                    dead_observations = 0;
                    continue;
                }

                if Instant::now() >= deadline {
                    return Err(LockError::Timeout {
                        lock_path: path.to_path_buf(),
                        timeout_ms: options.timeout.as_millis() as u64,
                        lock_age_ms: lock_age_ms(path),
                        holder_pid,
                    });
                }

                std::thread::sleep(jittered(backoff));
                backoff = (backoff * 2).min(options.backoff_cap);
            }
        }
    }
}

fn read_holder_pid(file: &mut File) -> Option<u32> {
    let mut content = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut content).ok()?;
    content.trim().parse::<u32>().ok()
}

fn lock_age_ms(path: &Path) -> Option<u64> {
    let modified = path.metadata().ok()?.modified().ok()?;
    let age = modified.elapsed().ok()?;
    Some(age.as_millis() as u64)
}

/// Backoff with ±50% jitter so concurrent waiters do not step in lockstep.
fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis().max(1) as u64;
    let jitter = rand::thread_rng().gen_range(0..=base_ms);
    Duration::from_millis(base_ms / 2 + jitter)
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
