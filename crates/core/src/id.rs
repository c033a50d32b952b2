// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes and sanitization.

/// Maximum length of any surfwright identifier.
pub const MAX_ID_LEN: usize = 64;

/// Trait for truncating identifiers to a short prefix.
pub trait ShortId {
    /// Returns a string slice truncated to at most `n` characters.
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Reduce an arbitrary string to the identifier alphabet `[A-Za-z0-9._-]`,
/// truncated to [`MAX_ID_LEN`]. Disallowed characters become `-`.
///
/// Returns `None` when nothing usable remains (empty input or all-dash).
pub fn sanitize_id(raw: &str) -> Option<String> {
    let mapped: String = raw
        .chars()
        .take(MAX_ID_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    if mapped.is_empty() || mapped.chars().all(|c| c == '-') {
        None
    } else {
        Some(mapped)
    }
}

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `short()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, and `PartialEq<&str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a string slice truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                if self.0.len() <= n {
                    &self.0
                } else {
                    &self.0[..n]
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

define_id! {
    /// Identifier of a browser session (managed or attached).
    pub struct SessionId;
}

define_id! {
    /// Identifier of a single page handle within a session.
    pub struct TargetId;
}

define_id! {
    /// Identifier of a network capture.
    pub struct CaptureId;
}

define_id! {
    /// Identifier of a persisted network artifact.
    pub struct ArtifactId;
}

define_id! {
    /// Normalized agent identifier owning a session lease.
    pub struct OwnerId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
