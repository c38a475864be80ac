#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `discover` command.
//!
//! Discovery never touches the target directory; these tests check the
//! listing it produces and how it reports failures.

mod common;

use linkforge::cli::DiscoverOpts;
use linkforge::commands;
use linkforge::commands::discover::render_listing;
use linkforge::discovery::Discovery;

const MIXED_RULE: &str = r#"
[[rules]]
name = "mixed"
baseDirectory = "base"
targetDirectory = "target"
patterns = [
  { patternType = "glob", pattern = "**/*.txt" },
  { patternType = "glob", pattern = "secret/**", exclude = true },
  { patternType = "path", pattern = [{ sourcePath = "docs/guide.md", destinationPath = "manual/guide.md" }, "absent.txt"] },
  { patternType = "glob", pattern = "docs" },
]
linkOptions = { itemType = "file" }
"#;

fn mixed_workspace() -> common::Workspace {
    let ws = common::Workspace::new();
    ws.file("base/a.txt", "a")
        .file("base/b.log", "b")
        .file("base/docs/guide.md", "guide")
        .file("base/secret/key.txt", "key");
    ws.config(MIXED_RULE);
    ws
}

/// Listing shows kinds, mapped targets, missing paths and filtered items
/// in discovery order.
#[test]
fn listing_reflects_pattern_order() {
    let ws = mixed_workspace();
    let config = ws.load();
    let rule = &config.rules[0];
    let found = Discovery::new()
        .discover(&rule.base_directory, &rule.patterns)
        .expect("discovery succeeds");

    insta::assert_snapshot!(render_listing(rule, &found), @r"
    file      a.txt -> a.txt
    file      docs/guide.md -> manual/guide.md
    missing   absent.txt -> absent.txt
    directory docs -> docs (filtered)
    ");
}

/// The command succeeds and leaves the target directory alone.
#[test]
fn discover_does_not_touch_target() {
    let ws = mixed_workspace();
    let log = common::logger();

    commands::discover::run(&ws.global(), &DiscoverOpts { rules: Vec::new() }, &log)
        .expect("discover succeeds");

    assert!(!ws.exists("target"));
    let entries = log.rule_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message.as_deref(), Some("4 items"));
}

/// A rule whose ignore-rules file is missing makes the command fail.
#[test]
fn missing_ignore_file_fails_discovery() {
    let ws = common::Workspace::new();
    ws.file("base/a.txt", "a");
    ws.config(
        r#"
[[rules]]
name = "ignored"
baseDirectory = "base"
targetDirectory = "target"
patterns = [
  { patternType = "glob", pattern = "*" },
  { patternType = "ignoreRulesFile", pattern = ".linkignore" },
]
linkOptions = { itemType = "file" }
"#,
    );

    let opts = DiscoverOpts { rules: Vec::new() };
    let err = commands::discover::run(&ws.global(), &opts, &common::logger()).unwrap_err();
    assert_eq!(err.to_string(), "discovery failed for 1 rule(s)");
}

/// An ignore-rules file only ever removes items.
#[test]
fn ignore_rules_file_filters_listing() {
    let ws = common::Workspace::new();
    ws.file("base/keep.txt", "k")
        .file("base/drop.txt", "d")
        .file("base/build/out.txt", "o")
        .file("base/.linkignore", "drop.txt\nbuild/\n");
    ws.config(
        r#"
[[rules]]
name = "ignored"
baseDirectory = "base"
targetDirectory = "target"
patterns = [
  { patternType = "glob", pattern = "**/*.txt" },
  { patternType = "ignoreRulesFile", pattern = ".linkignore" },
]
linkOptions = { itemType = "file" }
"#,
    );
    let config = ws.load();
    let rule = &config.rules[0];
    let found = Discovery::new()
        .discover(&rule.base_directory, &rule.patterns)
        .expect("discovery succeeds");

    insta::assert_snapshot!(render_listing(rule, &found), @"file      keep.txt -> keep.txt");
}

/// Selecting an unknown rule is an error.
#[test]
fn unknown_rule_is_rejected() {
    let ws = mixed_workspace();
    let err = commands::discover::run(
        &ws.global(),
        &DiscoverOpts {
            rules: vec!["other".to_string()],
        },
        &common::logger(),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "unknown rule(s): other");
}
