//! Behavioral specifications for the sw CLI.
//!
//! These tests are black-box: they invoke the built binaries and verify
//! stdout, stderr, and exit codes against an isolated state directory.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/errors.rs"]
mod cli_errors;
#[path = "specs/cli/help.rs"]
mod cli_help;

// daemon/
#[path = "specs/daemon/fallback.rs"]
mod daemon_fallback;
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;

// session/
#[path = "specs/session/errors.rs"]
mod session_errors;
