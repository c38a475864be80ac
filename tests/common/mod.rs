// Shared helpers for integration tests.
//
// Each test gets an isolated temporary workspace holding source trees and a
// `linkforge.toml`, plus the options the command handlers expect.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use linkforge::cli::GlobalOpts;
use linkforge::config::Config;
use linkforge::logging::Logger;

/// A temporary workspace backed by a [`tempfile::TempDir`].
pub struct Workspace {
    /// Temporary directory holding every file of the test.
    pub root: tempfile::TempDir,
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create temp dir"),
        }
    }

    /// Path to the workspace root.
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn file(&self, relative: &str, content: &str) -> &Self {
        let path = self.root.path().join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create parent dir");
        std::fs::write(&path, content).expect("write file");
        self
    }

    /// Create the directory `relative`.
    pub fn dir(&self, relative: &str) -> &Self {
        std::fs::create_dir_all(self.root.path().join(relative)).expect("create dir");
        self
    }

    /// Write `linkforge.toml` and return its path.
    pub fn config(&self, content: &str) -> PathBuf {
        let path = self.root.path().join("linkforge.toml");
        std::fs::write(&path, content).expect("write config");
        path
    }

    /// Load the config written by [`config`](Self::config).
    pub fn load(&self) -> Config {
        Config::load(&self.root.path().join("linkforge.toml")).expect("load config")
    }

    /// Global options pointing at this workspace's config.
    pub fn global(&self) -> GlobalOpts {
        GlobalOpts {
            verbose: false,
            config: Some(self.root.path().join("linkforge.toml")),
            parallel: true,
        }
    }

    /// Read `relative` as a string.
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.root.path().join(relative)).expect("read file")
    }

    /// Whether anything exists at `relative`, including a dangling link.
    pub fn exists(&self, relative: &str) -> bool {
        self.root.path().join(relative).symlink_metadata().is_ok()
    }
}

/// Logger used by command handlers under test.
pub fn logger() -> Arc<Logger> {
    Arc::new(Logger::new("integration"))
}
