// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result emission: captured stdout/stderr, exit codes, and the failure
//! envelope contract.
//!
//! Exit codes: 0 success, 1 typed failure, 2 misuse. On any failure path
//! the final line of stdout is one JSON envelope carrying `code` and
//! `retryable` from the central error table.

use sw_core::Error;
use sw_engine::RunOutcome;

/// Print the outcome and exit with its code.
pub fn emit(outcome: RunOutcome) -> ! {
    print!("{}", outcome.stdout);
    eprint!("{}", outcome.stderr);
    std::process::exit(outcome.code)
}

/// Typed failure (exit 1).
pub fn failure(error: &Error) -> RunOutcome {
    RunOutcome::failure(error)
}

/// Misuse (exit 2).
pub fn misuse(error: &Error) -> RunOutcome {
    RunOutcome::misuse(error)
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
