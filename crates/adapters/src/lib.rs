// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for external I/O: the browser driver port and process helpers.

pub mod browser;
pub mod process;
mod reach_cache;

pub use browser::{BrowserError, BrowserPort, ChromiumAdapter, LaunchedBrowser, StartSpec};
pub use reach_cache::{ReachCache, DEFAULT_REACH_CACHE_CAPACITY, DEFAULT_REACH_CACHE_TTL};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use browser::{BrowserCall, FakeBrowserPort};
