//! Pattern-based file discovery.
//!
//! Inclusive patterns (`regex`, `glob`, `path`) are evaluated in declared
//! order and unioned by normalized absolute path. Exclusionary patterns
//! (`glob` with `exclude`, `ignoreRulesFile`) are then applied as a
//! subtractive filter over the union.
pub mod ignore_rules;
pub mod matcher;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::rules::{ItemType, SearchPattern};
use crate::error::{DomainError, DomainErrorKind};
use crate::resources::helpers::fs::{absolutize, relative_slash, resolve_against};
use ignore_rules::IgnoreCache;
use matcher::{Exclusion, LazyTree, TreeEntry, match_inclusive};

/// What a discovered path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Regular file (or a link to one).
    File,
    /// Directory (or a link to one).
    Directory,
    /// An explicit path that does not exist.
    Missing,
}

impl ItemKind {
    /// Whether a rule of `item_type` links items of this kind.
    ///
    /// Missing explicit paths always go through so they surface as a
    /// missing source rather than disappearing.
    #[must_use]
    pub const fn is_linked_by(self, item_type: ItemType) -> bool {
        matches!(
            (item_type, self),
            (_, Self::Missing)
                | (ItemType::File, Self::File)
                | (ItemType::Directory, Self::Directory)
        )
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.pad("file"),
            Self::Directory => f.pad("directory"),
            Self::Missing => f.pad("missing"),
        }
    }
}

/// A single discovered path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredItem {
    /// Absolute, normalized path.
    pub path: PathBuf,
    /// Kind reported by the first pattern that matched the path.
    pub kind: ItemKind,
    /// Destination override from a mapping entry.
    pub destination: Option<PathBuf>,
}

impl DiscoveredItem {
    /// Where this item lands under `target_dir`.
    ///
    /// A destination override is resolved against `target_dir`; otherwise
    /// the item keeps its location relative to `base`. Paths outside `base`
    /// keep only their file name.
    #[must_use]
    pub fn target_path(&self, base: &Path, target_dir: &Path) -> PathBuf {
        if let Some(destination) = &self.destination {
            return resolve_against(target_dir, destination);
        }
        match self.path.strip_prefix(base) {
            Ok(relative) if !relative.as_os_str().is_empty() => target_dir.join(relative),
            _ => self
                .path
                .file_name()
                .map_or_else(|| target_dir.to_path_buf(), |name| target_dir.join(name)),
        }
    }
}

impl From<&TreeEntry> for DiscoveredItem {
    fn from(entry: &TreeEntry) -> Self {
        Self {
            path: entry.path.clone(),
            kind: entry.kind,
            destination: None,
        }
    }
}

/// Deduplicated, ordered discovery output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    base: PathBuf,
    items: Vec<DiscoveredItem>,
}

impl DiscoveryResult {
    /// The absolute base directory the patterns were evaluated against.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Items in discovery order.
    #[must_use]
    pub fn items(&self) -> &[DiscoveredItem] {
        &self.items
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing was discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Base-relative `/`-separated paths, falling back to the absolute path
    /// for items outside the base.
    #[must_use]
    pub fn relative_paths(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| {
                relative_slash(&item.path, &self.base)
                    .unwrap_or_else(|| item.path.display().to_string())
            })
            .collect()
    }
}

/// Discovery engine owning the per-run ignore-rule cache.
#[derive(Debug, Default)]
pub struct Discovery {
    ignore_cache: IgnoreCache,
}

impl Discovery {
    /// Create an engine with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The ignore-rule cache shared by every discovery on this engine.
    #[must_use]
    pub const fn ignore_cache(&self) -> &IgnoreCache {
        &self.ignore_cache
    }

    /// Evaluate `patterns` against `base`.
    ///
    /// The first pattern in declared order that reports a path fixes its
    /// position and kind. A destination override is taken from the first
    /// pattern that carries one, so explicit mappings win over walks.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryAccess` when the base or an ignore-rules file
    /// cannot be read and `InvalidPattern` when a pattern does not compile.
    pub fn discover(
        &self,
        base: &Path,
        patterns: &[SearchPattern],
    ) -> Result<DiscoveryResult, DomainError> {
        let base =
            absolutize(base).map_err(|e| DomainError::new(DomainErrorKind::DiscoveryAccess, e))?;
        if patterns.is_empty() {
            return Ok(DiscoveryResult {
                base,
                items: Vec::new(),
            });
        }

        let exclusions = patterns
            .iter()
            .filter_map(|pattern| {
                Exclusion::compile(&base, pattern, &self.ignore_cache).transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut tree = LazyTree::new(&base);
        let mut items: Vec<DiscoveredItem> = Vec::new();
        let mut positions: HashMap<PathBuf, usize> = HashMap::new();
        for pattern in patterns {
            let matched = match_inclusive(&base, pattern, &mut tree)?;
            tracing::trace!(
                "{} pattern matched {} path(s)",
                pattern.pattern_type(),
                matched.len()
            );
            for found in matched {
                if let Some(existing) = positions
                    .get(&found.path)
                    .and_then(|&index| items.get_mut(index))
                {
                    if existing.destination.is_none() {
                        existing.destination = found.destination;
                    }
                } else {
                    positions.insert(found.path.clone(), items.len());
                    items.push(found);
                }
            }
        }

        let before = items.len();
        items.retain(|item| !exclusions.iter().any(|exclusion| exclusion.excludes(item)));
        tracing::debug!(
            "discovered {} item(s) under {} ({} excluded)",
            items.len(),
            base.display(),
            before - items.len()
        );

        Ok(DiscoveryResult { base, items })
    }
}

/// Evaluate `patterns` against `base` with a fresh engine.
///
/// # Errors
///
/// See [`Discovery::discover`].
pub fn discover(base: &Path, patterns: &[SearchPattern]) -> Result<DiscoveryResult, DomainError> {
    Discovery::new().discover(base, patterns)
}
