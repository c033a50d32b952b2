// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command manifest and path trie.
//!
//! The manifest is the one authoritative description of recognized
//! command paths. The lane-key resolver, the dispatcher, and CLI
//! diagnostics all consume the same trie; nothing else parses command
//! words out of argv.

use std::collections::HashMap;

/// Coarse command classification, used only for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Open,
    Run,
    SessionAttach,
    Target,
    Control,
}

impl Family {
    pub fn as_str(self) -> &'static str {
        match self {
            Family::Open => "open",
            Family::Run => "run",
            Family::SessionAttach => "session.attach",
            Family::Target => "target",
            Family::Control => "control",
        }
    }
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recognized command path with its traits.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Leading positional words, e.g. `["target", "click"]`.
    pub path: &'static [&'static str],
    pub family: Family,
    /// Streaming commands bypass the daemon and always run in-process.
    pub stream: bool,
}

/// Result of matching argv against the manifest.
#[derive(Debug, Clone, Copy)]
pub struct CommandMatch<'m> {
    pub spec: &'m CommandSpec,
    /// Number of argv words consumed by the command path.
    pub consumed: usize,
}

#[derive(Default)]
struct TrieNode {
    spec: Option<usize>,
    children: HashMap<&'static str, TrieNode>,
}

/// Trie over the command paths, built once at construction.
pub struct CommandManifest {
    specs: Vec<CommandSpec>,
    root: TrieNode,
}

impl CommandManifest {
    /// Build a manifest from an injected spec list.
    pub fn new(specs: Vec<CommandSpec>) -> Self {
        let mut root = TrieNode::default();
        for (idx, spec) in specs.iter().enumerate() {
            let mut node = &mut root;
            for word in spec.path {
                node = node.children.entry(word).or_default();
            }
            node.spec = Some(idx);
        }
        Self { specs, root }
    }

    /// The built-in command surface.
    pub fn builtin() -> Self {
        use Family::*;
        let specs = vec![
            spec(&["ping"], Control, false),
            spec(&["open"], Open, false),
            spec(&["run"], Run, false),
            spec(&["session", "new"], Control, false),
            spec(&["session", "attach"], SessionAttach, false),
            spec(&["session", "use"], Control, false),
            spec(&["session", "list"], Control, false),
            spec(&["session", "ensure"], Control, false),
            spec(&["session", "prune"], Control, false),
            spec(&["target", "list"], Target, false),
            spec(&["target", "prune"], Target, false),
            spec(&["target", "network", "export"], Target, false),
            spec(&["target", "network", "tail"], Target, true),
            spec(&["state", "reconcile"], Control, false),
            spec(&["capture", "prune"], Control, false),
            spec(&["disk", "prune"], Control, false),
            spec(&["daemon", "status"], Control, false),
            spec(&["daemon", "stop"], Control, false),
        ];
        Self::new(specs)
    }

    /// Longest-path match of the leading argv words. Matching stops at the
    /// first word that is a flag or not in the trie.
    pub fn resolve<'m>(&'m self, argv: &[String]) -> Option<CommandMatch<'m>> {
        let mut node = &self.root;
        let mut best: Option<(usize, usize)> = None;
        for (depth, word) in argv.iter().enumerate() {
            if word.starts_with('-') {
                break;
            }
            match node.children.get(word.as_str()) {
                Some(child) => {
                    node = child;
                    if let Some(idx) = node.spec {
                        best = Some((idx, depth + 1));
                    }
                }
                None => break,
            }
        }
        best.map(|(idx, consumed)| CommandMatch {
            spec: &self.specs[idx],
            consumed,
        })
    }

    /// All recognized paths, for diagnostics.
    pub fn paths(&self) -> impl Iterator<Item = &'static [&'static str]> + '_ {
        self.specs.iter().map(|s| s.path)
    }
}

fn spec(path: &'static [&'static str], family: Family, stream: bool) -> CommandSpec {
    CommandSpec {
        path,
        family,
        stream,
    }
}

/// Value of `--flag v` or `--flag=v` in argv, first occurrence.
pub fn flag_value<'a>(argv: &'a [String], flag: &str) -> Option<&'a str> {
    let eq_prefix = format!("{flag}=");
    let mut words = argv.iter();
    while let Some(word) = words.next() {
        if word == flag {
            return words.next().map(String::as_str);
        }
        if let Some(value) = word.strip_prefix(&eq_prefix) {
            return Some(value);
        }
    }
    None
}

/// First positional argument after `skip` leading words, ignoring flags
/// and their space-separated values.
pub fn first_positional(argv: &[String], skip: usize) -> Option<&str> {
    let mut words = argv.iter().skip(skip);
    while let Some(word) = words.next() {
        if let Some(flag) = word.strip_prefix("--") {
            // `--flag value` consumes the value; `--flag=value` does not.
            if !flag.contains('=') {
                words.next();
            }
            continue;
        }
        if word.starts_with('-') {
            continue;
        }
        return Some(word);
    }
    None
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
