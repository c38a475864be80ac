//! Gitignore-style rule files used as exclusion filters.
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{DomainError, DomainErrorKind};

/// Parsed, ordered ignore rules anchored at the directory of their file.
///
/// Later rules override earlier ones, so `!keep.log` after `*.log`
/// re-includes `keep.log`.
#[derive(Debug)]
pub struct IgnoreRuleSet {
    root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreRuleSet {
    /// Load the rules file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryAccess` if the file cannot be read.
    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let bytes =
            std::fs::read(path).map_err(|e| DomainError::new(DomainErrorKind::DiscoveryAccess, e))?;
        let root = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);
        Self::build(&root, Some(path), String::from_utf8_lossy(&bytes).lines())
    }

    /// Build a rule set from in-memory lines anchored at `root`.
    ///
    /// Lines that do not compile are skipped with a warning, the way git
    /// treats a malformed line in `.gitignore`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` if the accepted rules cannot be combined.
    pub fn from_lines<'a>(
        root: &Path,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, DomainError> {
        Self::build(root, None, lines)
    }

    fn build<'a>(
        root: &Path,
        source: Option<&Path>,
        lines: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, DomainError> {
        let mut builder = GitignoreBuilder::new(root);
        for (index, line) in lines.into_iter().enumerate() {
            if let Err(e) = builder.add_line(source.map(Path::to_path_buf), line) {
                let origin = source.map_or_else(|| root.display(), Path::display);
                tracing::warn!("{origin}:{}: skipping ignore rule: {e}", index + 1);
            }
        }
        let matcher = builder
            .build()
            .map_err(|e| DomainError::new(DomainErrorKind::InvalidPattern, e))?;
        Ok(Self {
            root: root.to_path_buf(),
            matcher,
        })
    }

    /// Whether `path` or any of its parents is ignored.
    ///
    /// Paths outside the directory the rules are anchored to are never
    /// ignored.
    #[must_use]
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

/// Per-run cache so each rules file is parsed once, even across concurrent
/// rules.
#[derive(Debug, Default)]
pub struct IgnoreCache {
    sets: Mutex<HashMap<PathBuf, Arc<IgnoreRuleSet>>>,
}

impl IgnoreCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached rule set for `path`, loading it on first use.
    ///
    /// # Errors
    ///
    /// Propagates [`IgnoreRuleSet::load`] failures; failures are not cached.
    pub fn get_or_load(&self, path: &Path) -> Result<Arc<IgnoreRuleSet>, DomainError> {
        if let Some(set) = self.lock().get(path) {
            return Ok(Arc::clone(set));
        }
        let set = Arc::new(IgnoreRuleSet::load(path)?);
        tracing::debug!("loaded ignore rules from {}", path.display());
        Ok(Arc::clone(
            self.lock().entry(path.to_path_buf()).or_insert(set),
        ))
    }

    /// Number of distinct rule files loaded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no rule file has been loaded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<IgnoreRuleSet>>> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn rules(lines: &[&str]) -> IgnoreRuleSet {
        IgnoreRuleSet::from_lines(Path::new("/base"), lines.iter().copied()).unwrap()
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let set = rules(&["# comment", "", "*.log"]);
        assert!(set.is_ignored(Path::new("/base/a.log"), false));
        assert!(!set.is_ignored(Path::new("/base/# comment"), false));
    }

    #[test]
    fn negation_overrides_earlier_rule() {
        let set = rules(&["*.log", "!keep.log"]);
        assert!(set.is_ignored(Path::new("/base/drop.log"), false));
        assert!(!set.is_ignored(Path::new("/base/keep.log"), false));
    }

    #[test]
    fn directory_only_rule_ignores_children() {
        let set = rules(&["build/"]);
        assert!(set.is_ignored(Path::new("/base/build"), true));
        assert!(!set.is_ignored(Path::new("/base/build"), false));
        assert!(set.is_ignored(Path::new("/base/build/out.o"), false));
    }

    #[test]
    fn anchored_rule_only_matches_at_root() {
        let set = rules(&["/top.txt"]);
        assert!(set.is_ignored(Path::new("/base/top.txt"), false));
        assert!(!set.is_ignored(Path::new("/base/sub/top.txt"), false));
    }

    #[test]
    fn paths_outside_root_are_never_ignored() {
        let set = rules(&["*"]);
        assert!(!set.is_ignored(Path::new("/elsewhere/a.txt"), false));
        assert!(!set.is_ignored(Path::new("/base"), true));
    }

    #[test]
    fn missing_file_is_discovery_access() {
        let dir = tempfile::tempdir().unwrap();
        let err = IgnoreRuleSet::load(&dir.path().join(".linkignore")).unwrap_err();
        assert_eq!(err.kind(), DomainErrorKind::DiscoveryAccess);
    }

    #[test]
    fn malformed_line_is_skipped_and_rest_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".linkignore");
        std::fs::write(&path, "*.tmp\nbad[\n!keep.tmp\n").unwrap();

        let set = IgnoreRuleSet::load(&path).unwrap();
        assert!(set.is_ignored(&dir.path().join("x.tmp"), false));
        assert!(!set.is_ignored(&dir.path().join("keep.tmp"), false));
    }

    #[test]
    fn cache_loads_each_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".linkignore");
        std::fs::write(&path, "*.tmp\n").unwrap();

        let cache = IgnoreCache::new();
        let first = cache.get_or_load(&path).unwrap();
        let second = cache.get_or_load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(first.is_ignored(&dir.path().join("x.tmp"), false));
    }
}
