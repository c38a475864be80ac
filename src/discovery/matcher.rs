//! Evaluation of a single [`SearchPattern`] against a base directory.
use globset::{Glob, GlobBuilder, GlobMatcher};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::ignore_rules::IgnoreCache;
use super::{DiscoveredItem, ItemKind};
use crate::config::rules::{PathPatternSpec, SearchPattern};
use crate::error::{DomainError, DomainErrorKind};
use crate::resources::helpers::fs::{relative_slash, resolve_against};

/// One entry of a recursive directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Absolute path.
    pub path: PathBuf,
    /// `/`-separated path relative to the walked base.
    pub relative: String,
    /// File or directory (links are classified by what they point to).
    pub kind: ItemKind,
}

/// Walk `base` depth-unbounded, sorted by file name, without following links.
///
/// # Errors
///
/// Returns `DiscoveryAccess` if the base or any entry below it cannot be read.
pub fn walk_tree(base: &Path) -> Result<Vec<TreeEntry>, DomainError> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(base)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| DomainError::new(DomainErrorKind::DiscoveryAccess, e))?;
        let Some(relative) = relative_slash(entry.path(), base) else {
            continue;
        };
        let kind = if entry.path().is_dir() {
            ItemKind::Directory
        } else {
            ItemKind::File
        };
        entries.push(TreeEntry {
            path: entry.into_path(),
            relative,
            kind,
        });
    }
    Ok(entries)
}

/// Compile a regular expression pattern.
///
/// # Errors
///
/// Returns `InvalidPattern` if the expression does not compile.
pub fn compile_regex(pattern: &str) -> Result<Regex, DomainError> {
    Regex::new(pattern).map_err(|e| DomainError::new(DomainErrorKind::InvalidPattern, e))
}

/// Compile a glob where `*` stays within one path segment and `**` spans
/// segments.
///
/// # Errors
///
/// Returns `InvalidPattern` if the glob does not compile.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher, DomainError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|glob: Glob| glob.compile_matcher())
        .map_err(|e| DomainError::new(DomainErrorKind::InvalidPattern, e))
}

/// Tree entries whose relative path the expression matches.
#[must_use]
pub fn match_regex(tree: &[TreeEntry], regex: &Regex) -> Vec<DiscoveredItem> {
    tree.iter()
        .filter(|entry| regex.is_match(&entry.relative))
        .map(DiscoveredItem::from)
        .collect()
}

/// Tree entries whose relative path the glob matches.
#[must_use]
pub fn match_glob(tree: &[TreeEntry], glob: &GlobMatcher) -> Vec<DiscoveredItem> {
    tree.iter()
        .filter(|entry| glob.is_match(&entry.relative))
        .map(DiscoveredItem::from)
        .collect()
}

/// Resolve explicit path entries against `base` and check each one directly.
///
/// Entries that do not exist are reported with [`ItemKind::Missing`].
///
/// # Errors
///
/// Returns `DiscoveryAccess` if an entry's existence cannot be determined.
pub fn match_paths(
    base: &Path,
    spec: &PathPatternSpec,
) -> Result<Vec<DiscoveredItem>, DomainError> {
    spec.entries()
        .into_iter()
        .map(|entry| {
            let path = resolve_against(base, entry.source());
            let kind = match std::fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => ItemKind::Directory,
                Ok(_) => ItemKind::File,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => ItemKind::Missing,
                Err(e) => return Err(DomainError::new(DomainErrorKind::DiscoveryAccess, e)),
            };
            Ok(DiscoveredItem {
                path,
                kind,
                destination: entry.destination().map(Path::to_path_buf),
            })
        })
        .collect()
}

/// Lazily computed listing of the base directory, shared by every
/// walking pattern of one discovery pass.
#[derive(Debug)]
pub(super) struct LazyTree<'a> {
    base: &'a Path,
    entries: Option<Vec<TreeEntry>>,
}

impl<'a> LazyTree<'a> {
    pub(super) const fn new(base: &'a Path) -> Self {
        Self {
            base,
            entries: None,
        }
    }

    pub(super) fn get(&mut self) -> Result<&[TreeEntry], DomainError> {
        let entries = match self.entries.take() {
            Some(entries) => entries,
            None => walk_tree(self.base)?,
        };
        Ok(self.entries.insert(entries).as_slice())
    }
}

/// Evaluate one inclusive pattern.
///
/// Exclusionary patterns contribute nothing here; they are applied by
/// [`Exclusion`].
pub(super) fn match_inclusive(
    base: &Path,
    pattern: &SearchPattern,
    tree: &mut LazyTree<'_>,
) -> Result<Vec<DiscoveredItem>, DomainError> {
    match pattern {
        SearchPattern::Regex { pattern } => {
            let regex = compile_regex(pattern)?;
            Ok(match_regex(tree.get()?, &regex))
        }
        SearchPattern::Glob {
            pattern,
            exclude: false,
        } => {
            let glob = compile_glob(pattern)?;
            Ok(match_glob(tree.get()?, &glob))
        }
        SearchPattern::Path { pattern } => match_paths(base, pattern),
        SearchPattern::Glob { exclude: true, .. } | SearchPattern::IgnoreRulesFile { .. } => {
            Ok(Vec::new())
        }
    }
}

/// A compiled exclusionary pattern.
#[derive(Debug)]
pub(super) enum Exclusion {
    Glob { base: PathBuf, matcher: GlobMatcher },
    Rules(std::sync::Arc<super::ignore_rules::IgnoreRuleSet>),
}

impl Exclusion {
    /// Compile `pattern` if it is exclusionary.
    pub(super) fn compile(
        base: &Path,
        pattern: &SearchPattern,
        cache: &IgnoreCache,
    ) -> Result<Option<Self>, DomainError> {
        match pattern {
            SearchPattern::Glob {
                pattern,
                exclude: true,
            } => Ok(Some(Self::Glob {
                base: base.to_path_buf(),
                matcher: compile_glob(pattern)?,
            })),
            SearchPattern::IgnoreRulesFile { pattern } => {
                let path = resolve_against(base, pattern);
                Ok(Some(Self::Rules(cache.get_or_load(&path)?)))
            }
            SearchPattern::Regex { .. }
            | SearchPattern::Glob { exclude: false, .. }
            | SearchPattern::Path { .. } => Ok(None),
        }
    }

    /// Whether `item` is removed by this exclusion.
    pub(super) fn excludes(&self, item: &DiscoveredItem) -> bool {
        match self {
            Self::Glob { base, matcher } => {
                relative_slash(&item.path, base).is_some_and(|relative| matcher.is_match(relative))
            }
            Self::Rules(rules) => rules.is_ignored(&item.path, item.kind == ItemKind::Directory),
        }
    }
}
