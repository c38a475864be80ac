#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for the `run` command and the workflow it drives.
//!
//! Every test builds a workspace with source trees and a `linkforge.toml`,
//! then runs either the command handler or `run_workflow` directly.

mod common;

use linkforge::cli::{OverwriteMode, RunOpts};
use linkforge::commands;
use linkforge::error::{DomainError, DomainErrorKind};
use linkforge::workflow::{ItemStatus, WorkflowContext, run_workflow};

fn run_opts(only: &[&str], overwrite: OverwriteMode) -> RunOpts {
    RunOpts {
        only: only.iter().map(ToString::to_string).collect(),
        overwrite,
    }
}

fn run_all(ws: &common::Workspace, overwrite: OverwriteMode) -> anyhow::Result<()> {
    commands::run::run(&ws.global(), &run_opts(&[], overwrite), &common::logger())
}

const COPY_RULES: &str = r#"
[[rules]]
name = "configs"
baseDirectory = "shared"
targetDirectory = "out"
patterns = [
  { patternType = "glob", pattern = "**/*.json" },
  { patternType = "glob", pattern = "private/**", exclude = true },
  { patternType = "path", pattern = { sourcePath = "notes.md", destinationPath = "docs/notes.md" } },
]
linkOptions = { itemType = "file", action = "copy", createParentDirectories = true }
"#;

// ---------------------------------------------------------------------------
// Linking
// ---------------------------------------------------------------------------

/// Globs, exclusions and mappings combine into the copied tree.
#[test]
fn copies_matching_files_and_honours_mappings() {
    let ws = common::Workspace::new();
    ws.file("shared/settings.json", "{}")
        .file("shared/nested/extra.json", "[]")
        .file("shared/private/token.json", "secret")
        .file("shared/notes.md", "notes");
    ws.config(COPY_RULES);

    run_all(&ws, OverwriteMode::Skip).expect("run succeeds");

    assert_eq!(ws.read("out/settings.json"), "{}");
    assert_eq!(ws.read("out/nested/extra.json"), "[]");
    assert_eq!(ws.read("out/docs/notes.md"), "notes");
    assert!(!ws.exists("out/private/token.json"));
}

/// A second run keeps the existing copies and still succeeds.
#[test]
fn rerun_with_skip_mode_is_clean() {
    let ws = common::Workspace::new();
    ws.file("shared/settings.json", "{}")
        .file("shared/notes.md", "n");
    ws.config(COPY_RULES);

    run_all(&ws, OverwriteMode::Skip).expect("first run");
    ws.file("shared/settings.json", "{\"changed\":true}");
    run_all(&ws, OverwriteMode::Skip).expect("second run");

    assert_eq!(ws.read("out/settings.json"), "{}");
}

/// `--overwrite always` replaces existing targets.
#[test]
fn overwrite_always_replaces_targets() {
    let ws = common::Workspace::new();
    ws.file("shared/settings.json", "new")
        .file("shared/notes.md", "n")
        .file("out/settings.json", "old");
    ws.config(COPY_RULES);

    run_all(&ws, OverwriteMode::Always).expect("run succeeds");

    assert_eq!(ws.read("out/settings.json"), "new");
}

/// Without an overwrite callback an existing target is a failure, and the
/// following rule still runs.
#[test]
fn existing_target_without_callback_fails_only_that_item() {
    let ws = common::Workspace::new();
    ws.file("one/a.txt", "a")
        .file("two/b.txt", "b")
        .file("out/a.txt", "existing");
    ws.config(
        r#"
[[rules]]
name = "first"
baseDirectory = "one"
targetDirectory = "out"
patterns = [{ patternType = "glob", pattern = "*.txt" }]
linkOptions = { itemType = "file", action = "copy" }

[[rules]]
name = "second"
baseDirectory = "two"
targetDirectory = "out"
patterns = [{ patternType = "glob", pattern = "*.txt" }]
linkOptions = { itemType = "file", action = "copy" }
"#,
    );

    let ctx = WorkflowContext::new(common::logger());
    let result = run_workflow(&ws.load().rules, &ctx).expect("valid config");

    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.rules[0].count(ItemStatus::Failed), 1);
    assert_eq!(result.rules[1].count(ItemStatus::Linked), 1);
    assert_eq!(ws.read("out/a.txt"), "existing");
    assert_eq!(ws.read("out/b.txt"), "b");
}

/// An explicit path that does not exist is reported as a missing source.
#[test]
fn missing_explicit_path_is_link_source_missing() {
    let ws = common::Workspace::new();
    ws.dir("src").dir("out");
    ws.config(
        r#"
[[rules]]
baseDirectory = "src"
targetDirectory = "out"
patterns = [{ patternType = "path", pattern = "absent.conf" }]
linkOptions = { itemType = "file", action = "copy" }
"#,
    );

    let ctx = WorkflowContext::new(common::logger());
    let result = run_workflow(&ws.load().rules, &ctx).expect("valid config");

    let item = result.items().next().expect("one item");
    assert_eq!(item.status(), ItemStatus::Failed);
    assert_eq!(
        item.error().map(DomainError::kind),
        Some(DomainErrorKind::LinkSourceMissing)
    );
    assert_eq!(result.rules[0].name, "rule 1");
}

#[cfg(unix)]
#[test]
fn directories_are_symlinked() {
    let ws = common::Workspace::new();
    ws.file("src/nvim/init.lua", "-- init").dir("home");
    ws.config(
        r#"
[[rules]]
name = "dirs"
baseDirectory = "src"
targetDirectory = "home/.config"
patterns = [{ patternType = "glob", pattern = "*" }]
linkOptions = { itemType = "directory", createParentDirectories = true }
"#,
    );

    run_all(&ws, OverwriteMode::Skip).expect("run succeeds");

    let link = ws.path().join("home/.config/nvim");
    assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
    assert_eq!(ws.read("home/.config/nvim/init.lua"), "-- init");
}

// ---------------------------------------------------------------------------
// Post-commands
// ---------------------------------------------------------------------------

#[cfg(unix)]
const COMMAND_RULE: &str = r#"
[[rules]]
name = "build"
baseDirectory = "src"
targetDirectory = "out"
patterns = [{ patternType = "glob", pattern = "*.txt" }]
linkOptions = { itemType = "file", action = "copy", createParentDirectories = true }
postCommand = { command = "cat a.txt >> runs.log", skipIfPathExists = "done.marker" }
"#;

/// The post-command runs once per rule in the target directory.
#[cfg(unix)]
#[test]
fn post_command_runs_once_in_target_directory() {
    let ws = common::Workspace::new();
    ws.file("src/a.txt", "A").file("src/b.txt", "B");
    ws.config(COMMAND_RULE);

    run_all(&ws, OverwriteMode::Skip).expect("run succeeds");

    assert_eq!(ws.read("out/runs.log"), "A");
}

/// An existing `skipIfPathExists` path short-circuits the command.
#[cfg(unix)]
#[test]
fn post_command_skipped_when_marker_exists() {
    let ws = common::Workspace::new();
    ws.file("src/a.txt", "A").file("out/done.marker", "");
    ws.config(COMMAND_RULE);

    run_all(&ws, OverwriteMode::Skip).expect("run succeeds");

    assert!(!ws.exists("out/runs.log"));
    assert_eq!(ws.read("out/a.txt"), "A");
}

/// A failing post-command makes the run fail but keeps the links.
#[cfg(unix)]
#[test]
fn failing_post_command_fails_the_run() {
    let ws = common::Workspace::new();
    ws.file("src/a.txt", "A");
    ws.config(
        r#"
[[rules]]
baseDirectory = "src"
targetDirectory = "out"
patterns = [{ patternType = "glob", pattern = "*.txt" }]
linkOptions = { itemType = "file", action = "copy", createParentDirectories = true }
postCommand = { command = "exit 3" }
"#,
    );

    let err = run_all(&ws, OverwriteMode::Skip).unwrap_err();

    assert!(err.to_string().contains("1 failure(s)"));
    assert_eq!(ws.read("out/a.txt"), "A");
}

/// A command exceeding its timeout is killed and reported as a timeout.
#[cfg(unix)]
#[test]
fn post_command_timeout_is_reported() {
    let ws = common::Workspace::new();
    ws.dir("src").dir("out");
    ws.config(
        r#"
[[rules]]
baseDirectory = "src"
targetDirectory = "out"
patterns = []
linkOptions = { itemType = "file" }
postCommand = { command = "sleep 5", timeoutInMs = 100 }
"#,
    );

    let ctx = WorkflowContext::new(common::logger());
    let result = run_workflow(&ws.load().rules, &ctx).expect("valid config");

    let command = result.rules[0].command.as_ref().expect("command ran");
    assert_eq!(
        command.error.as_ref().map(DomainError::kind),
        Some(DomainErrorKind::ExecutionTimeout)
    );
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// A malformed rule aborts the run before anything is created.
#[test]
fn invalid_rule_aborts_run() {
    let ws = common::Workspace::new();
    ws.file("shared/a.json", "{}");
    ws.config(
        r#"
[[rules]]
baseDirectory = "shared"
targetDirectory = "out"
patterns = [{ patternType = "glob", pattern = "" }]
linkOptions = { itemType = "file", createParentDirectories = true }
"#,
    );

    let err = run_all(&ws, OverwriteMode::Skip).unwrap_err();

    assert!(format!("{err:#}").contains("rule 1"));
    assert!(!ws.exists("out"));
}

/// `--only` with an unknown rule name is rejected.
#[test]
fn unknown_only_rule_is_rejected() {
    let ws = common::Workspace::new();
    ws.config(COPY_RULES);

    let err = commands::run::run(
        &ws.global(),
        &run_opts(&["configs", "nope"], OverwriteMode::Skip),
        &common::logger(),
    )
    .unwrap_err();

    assert_eq!(err.to_string(), "unknown rule(s): nope");
}

/// A missing config file is reported with its path.
#[test]
fn missing_config_file_is_reported() {
    let ws = common::Workspace::new();
    let err = run_all(&ws, OverwriteMode::Skip).unwrap_err();
    assert!(err.to_string().contains("linkforge.toml"));
}

/// Rules selected with `--only` run alone.
#[test]
fn only_runs_selected_rules() {
    let ws = common::Workspace::new();
    ws.file("a/x.txt", "x").file("b/y.txt", "y");
    ws.config(
        r#"
[[rules]]
name = "a"
baseDirectory = "a"
targetDirectory = "out"
patterns = [{ patternType = "glob", pattern = "*.txt" }]
linkOptions = { itemType = "file", action = "copy", createParentDirectories = true }

[[rules]]
name = "b"
baseDirectory = "b"
targetDirectory = "out"
patterns = [{ patternType = "glob", pattern = "*.txt" }]
linkOptions = { itemType = "file", action = "copy", createParentDirectories = true }
"#,
    );

    let log = common::logger();
    commands::run::run(&ws.global(), &run_opts(&["b"], OverwriteMode::Skip), &log)
        .expect("run succeeds");

    assert!(!ws.exists("out/x.txt"));
    assert_eq!(ws.read("out/y.txt"), "y");
    let entries = log.rule_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "b");
}
