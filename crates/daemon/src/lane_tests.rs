// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;
use sw_core::CommandManifest;

fn resolver() -> LaneResolver {
    LaneResolver::new(Arc::new(CommandManifest::builtin()), "agent-7")
}

fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|s| s.to_string()).collect()
}

#[test]
fn explicit_session_wins_over_everything() {
    let resolver = resolver();
    let (key, family) = resolver.resolve(&argv(&[
        "open",
        "--session",
        "s-3",
        "--profile",
        "work",
        "https://example.com",
    ]));
    assert_eq!(key, "session:s-3");
    assert_eq!(family, Family::Open);

    let (key, family) = resolver.resolve(&argv(&["target", "prune", "--session", "s-3"]));
    assert_eq!(key, "session:s-3");
    assert_eq!(family, Family::Target);
}

#[test]
fn attach_partitions_by_endpoint_origin() {
    let resolver = resolver();
    let (key, family) = resolver.resolve(&argv(&[
        "session",
        "attach",
        "--cdp",
        "http://127.0.0.1:9222",
    ]));
    assert!(key.starts_with("origin:"), "{key}");
    assert_eq!(family, Family::SessionAttach);

    // Case-insensitive on the endpoint.
    let (upper, _) = resolver.resolve(&argv(&[
        "session",
        "attach",
        "--cdp",
        "HTTP://127.0.0.1:9222",
    ]));
    assert_eq!(key, upper);
}

#[test]
fn profile_and_shared_isolation_lanes() {
    let resolver = resolver();
    let (key, _) = resolver.resolve(&argv(&["open", "--profile", "Work", "https://a.example"]));
    assert_eq!(key, "origin:profile:work");

    let (key, _) = resolver.resolve(&argv(&["run", "--isolation=shared"]));
    assert_eq!(key, "origin:shared");
    let (key, _) = resolver.resolve(&argv(&["run", "--isolation", "shared"]));
    assert_eq!(key, "origin:shared");
}

#[test]
fn open_partitions_by_page_origin() {
    let resolver = resolver();
    let (key, family) = resolver.resolve(&argv(&["open", "https://Example.com/a/b"]));
    let (key2, _) = resolver.resolve(&argv(&["open", "https://example.com/other"]));
    assert!(key.starts_with("origin:url:"), "{key}");
    assert_eq!(key, key2, "same origin, same lane");
    assert_eq!(family, Family::Open);

    let (other, _) = resolver.resolve(&argv(&["open", "https://elsewhere.example"]));
    assert_ne!(key, other);
}

#[test]
fn control_lane_for_everything_else() {
    let resolver = resolver();
    let (key, family) = resolver.resolve(&argv(&["session", "list"]));
    assert!(key.starts_with("control:agent:"), "{key}");
    assert_eq!(family, Family::Control);

    let default_resolver = LaneResolver::new(Arc::new(CommandManifest::builtin()), "default");
    let (key, _) = default_resolver.resolve(&argv(&["ping"]));
    assert_eq!(key, "control:default");

    // `open` without a parseable url also falls through to control.
    let (key, _) = resolver.resolve(&argv(&["open", "not a url"]));
    assert!(key.starts_with("control:"), "{key}");
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    // Purity: the same argv always resolves identically, on any resolver
    // instance with the same construction inputs.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn resolution_is_pure(words in proptest::collection::vec("[ -~]{0,24}", 0..8)) {
            let argv: Vec<String> = words;
            let a = resolver().resolve(&argv);
            let b = resolver().resolve(&argv);
            prop_assert_eq!(a.0, b.0);
            prop_assert_eq!(a.1, b.1);
        }
    }
}
