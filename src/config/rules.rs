//! Rule configuration types: search patterns, link options and post-commands.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default post-command timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// One configured unit of work: discover items under `base_directory` and
/// link or copy them into `target_directory`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Rule {
    /// Display name; defaults to `rule N` when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Directory that patterns are evaluated against.
    pub base_directory: PathBuf,
    /// Directory under which links and copies are created.
    pub target_directory: PathBuf,
    /// Ordered search patterns.
    #[serde(default)]
    pub patterns: Vec<SearchPattern>,
    /// How each discovered item is materialized.
    pub link_options: LinkOptions,
    /// Command run once after all items of the rule are processed.
    #[serde(default)]
    pub post_command: Option<PostExecutionCommand>,
}

impl Rule {
    /// Name used in logs and the summary.
    #[must_use]
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("rule {}", index + 1))
    }
}

/// A declarative description of which files or directories to select.
///
/// The `patternType` discriminant decides which fields are read.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "patternType", rename_all = "camelCase")]
pub enum SearchPattern {
    /// Regular expression matched against base-relative paths.
    Regex {
        /// Expression source.
        pattern: String,
    },
    /// Glob matched against base-relative paths.
    Glob {
        /// Glob source.
        pattern: String,
        /// Subtract matches instead of adding them.
        #[serde(default)]
        exclude: bool,
    },
    /// Explicit paths, optionally with destination overrides.
    Path {
        /// One entry or a list of entries.
        pattern: PathPatternSpec,
    },
    /// A gitignore-style rules file used as an exclusion filter.
    IgnoreRulesFile {
        /// Path of the rules file (relative to the base directory).
        pattern: PathBuf,
    },
}

impl SearchPattern {
    /// Shorthand for an inclusive glob.
    #[must_use]
    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::Glob {
            pattern: pattern.into(),
            exclude: false,
        }
    }

    /// Shorthand for an excluding glob.
    #[must_use]
    pub fn exclude_glob(pattern: impl Into<String>) -> Self {
        Self::Glob {
            pattern: pattern.into(),
            exclude: true,
        }
    }

    /// Shorthand for a regex pattern.
    #[must_use]
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
        }
    }

    /// Shorthand for a list of explicit paths.
    #[must_use]
    pub fn paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathEntry>,
    {
        Self::Path {
            pattern: PathPatternSpec::Many(paths.into_iter().map(Into::into).collect()),
        }
    }

    /// Shorthand for an ignore-rules file.
    #[must_use]
    pub fn ignore_rules_file(path: impl Into<PathBuf>) -> Self {
        Self::IgnoreRulesFile {
            pattern: path.into(),
        }
    }

    /// The discriminant as written in configuration.
    #[must_use]
    pub const fn pattern_type(&self) -> &'static str {
        match self {
            Self::Regex { .. } => "regex",
            Self::Glob { .. } => "glob",
            Self::Path { .. } => "path",
            Self::IgnoreRulesFile { .. } => "ignoreRulesFile",
        }
    }

    /// Whether the pattern removes items rather than adding them.
    #[must_use]
    pub const fn is_exclusionary(&self) -> bool {
        match self {
            Self::Glob { exclude, .. } => *exclude,
            Self::IgnoreRulesFile { .. } => true,
            Self::Regex { .. } | Self::Path { .. } => false,
        }
    }
}

/// The `pattern` field of a path pattern: one entry or a list.
///
/// `Many` is tried first: a struct also deserializes from a sequence, so a
/// list of two strings would otherwise be read as one mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PathPatternSpec {
    /// A list of entries.
    Many(Vec<PathEntry>),
    /// A single entry.
    One(PathEntry),
}

impl PathPatternSpec {
    /// All entries in declared order.
    #[must_use]
    pub fn entries(&self) -> Vec<&PathEntry> {
        match self {
            Self::One(entry) => vec![entry],
            Self::Many(entries) => entries.iter().collect(),
        }
    }
}

/// A single explicit path: a plain path, or a `{ sourcePath, destinationPath }` pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum PathEntry {
    /// Plain path; the destination is derived from the base-relative location.
    Plain(PathBuf),
    /// Explicit destination override.
    Mapped(MappingEntry),
}

impl PathEntry {
    /// The source path as written.
    #[must_use]
    pub fn source(&self) -> &Path {
        match self {
            Self::Plain(path) => path,
            Self::Mapped(mapping) => &mapping.source_path,
        }
    }

    /// The destination override, if any.
    #[must_use]
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Plain(_) => None,
            Self::Mapped(mapping) => Some(&mapping.destination_path),
        }
    }
}

impl From<&str> for PathEntry {
    fn from(path: &str) -> Self {
        Self::Plain(PathBuf::from(path))
    }
}

impl From<MappingEntry> for PathEntry {
    fn from(mapping: MappingEntry) -> Self {
        Self::Mapped(mapping)
    }
}

/// Explicit override of the otherwise base-relative destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MappingEntry {
    /// Source path (relative to the base directory unless absolute).
    pub source_path: PathBuf,
    /// Destination path (relative to the target directory unless absolute).
    pub destination_path: PathBuf,
}

impl MappingEntry {
    /// Create a mapping entry.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source.into(),
            destination_path: destination.into(),
        }
    }
}

/// Kind of item a rule materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    /// Regular files.
    File,
    /// Directories (always symbolically linked).
    Directory,
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Directory => f.write_str("directory"),
        }
    }
}

/// How a file item is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FileAction {
    /// Symbolic link to the source.
    #[default]
    Symlink,
    /// Hard link to the source.
    Hardlink,
    /// Byte copy of the source.
    Copy,
}

impl std::fmt::Display for FileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symlink => f.write_str("symlink"),
            Self::Hardlink => f.write_str("hardlink"),
            Self::Copy => f.write_str("copy"),
        }
    }
}

/// Validated link kind: the only legal `itemType`/`action` combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// A file with its action.
    File(FileAction),
    /// A directory, always symlinked.
    Directory,
}

impl LinkKind {
    /// The item type of this kind.
    #[must_use]
    pub const fn item_type(self) -> ItemType {
        match self {
            Self::File(_) => ItemType::File,
            Self::Directory => ItemType::Directory,
        }
    }

    /// The effective action.
    #[must_use]
    pub const fn action(self) -> FileAction {
        match self {
            Self::File(action) => action,
            Self::Directory => FileAction::Symlink,
        }
    }
}

/// Link options as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkOptions {
    /// Which discovered items the rule materializes.
    pub item_type: ItemType,
    /// File action; must be absent or `symlink` for directories.
    #[serde(default)]
    pub action: Option<FileAction>,
    /// Create missing ancestors of each target.
    #[serde(default)]
    pub create_parent_directories: bool,
    /// Populate timing and conflict metadata on every result.
    #[serde(default)]
    pub verbose_metadata: bool,
    /// Attributes applied after each successful link or copy.
    #[serde(default)]
    pub attributes: Option<Attributes>,
}

impl LinkOptions {
    /// File options with the given action.
    #[must_use]
    pub const fn file(action: FileAction) -> Self {
        Self {
            item_type: ItemType::File,
            action: Some(action),
            create_parent_directories: false,
            verbose_metadata: false,
            attributes: None,
        }
    }

    /// Directory options.
    #[must_use]
    pub const fn directory() -> Self {
        Self {
            item_type: ItemType::Directory,
            action: None,
            create_parent_directories: false,
            verbose_metadata: false,
            attributes: None,
        }
    }

    /// Resolve the combination into a [`LinkKind`].
    ///
    /// Returns `None` for directories with a non-symlink action.
    #[must_use]
    pub fn link_kind(&self) -> Option<LinkKind> {
        match (self.item_type, self.action) {
            (ItemType::File, action) => Some(LinkKind::File(action.unwrap_or_default())),
            (ItemType::Directory, None | Some(FileAction::Symlink)) => Some(LinkKind::Directory),
            (ItemType::Directory, Some(FileAction::Hardlink | FileAction::Copy)) => None,
        }
    }
}

/// Permission attributes applied to created paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Attributes {
    /// Octal permission mode (e.g. `"644"`).
    #[serde(default)]
    pub mode: Option<String>,
    /// Clear (`true`) or restore owner (`false`) write permission.
    #[serde(default)]
    pub readonly: Option<bool>,
}

impl Attributes {
    /// Whether no attribute is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.mode.is_none() && self.readonly.is_none()
    }
}

/// A command run after a rule's items are processed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostExecutionCommand {
    /// Command line.
    pub command: String,
    /// Run through the platform shell.
    #[serde(default = "default_shell")]
    pub shell: bool,
    /// Hard timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_in_ms: u64,
    /// Working directory (relative to the target directory unless absolute).
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    /// Variables merged over the ambient environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Skip the command when this path exists.
    #[serde(default)]
    pub skip_if_path_exists: Option<PathBuf>,
}

impl PostExecutionCommand {
    /// A shell command with default settings.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            shell: default_shell(),
            timeout_in_ms: DEFAULT_TIMEOUT_MS,
            cwd: None,
            env: BTreeMap::new(),
            skip_if_path_exists: None,
        }
    }
}

const fn default_shell() -> bool {
    true
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patterns {
        patterns: Vec<SearchPattern>,
    }

    fn parse_patterns(toml_src: &str) -> Vec<SearchPattern> {
        toml::from_str::<Patterns>(toml_src).unwrap().patterns
    }

    #[test]
    fn pattern_type_selects_variant() {
        let patterns = parse_patterns(
            r#"patterns = [
  { patternType = "regex", pattern = "^a" },
  { patternType = "glob", pattern = "*.txt" },
  { patternType = "glob", pattern = "tmp/**", exclude = true },
  { patternType = "ignoreRulesFile", pattern = ".linkignore" },
]
"#,
        );
        assert_eq!(patterns[0], SearchPattern::regex("^a"));
        assert_eq!(patterns[1], SearchPattern::glob("*.txt"));
        assert_eq!(patterns[2], SearchPattern::exclude_glob("tmp/**"));
        assert_eq!(patterns[3], SearchPattern::ignore_rules_file(".linkignore"));
        let types: Vec<_> = patterns.iter().map(SearchPattern::pattern_type).collect();
        assert_eq!(types, ["regex", "glob", "glob", "ignoreRulesFile"]);
    }

    #[test]
    fn path_pattern_accepts_string_mapping_and_list() {
        let patterns = parse_patterns(
            r#"patterns = [
  { patternType = "path", pattern = "README.md" },
  { patternType = "path", pattern = { sourcePath = "a.txt", destinationPath = "docs/a.txt" } },
  { patternType = "path", pattern = ["b.log", { sourcePath = "c", destinationPath = "d" }] },
]
"#,
        );
        let SearchPattern::Path { pattern } = &patterns[0] else {
            panic!("expected path pattern");
        };
        assert_eq!(pattern.entries()[0].source(), Path::new("README.md"));
        assert!(pattern.entries()[0].destination().is_none());

        let SearchPattern::Path { pattern } = &patterns[1] else {
            panic!("expected path pattern");
        };
        assert_eq!(
            pattern.entries()[0].destination(),
            Some(Path::new("docs/a.txt"))
        );

        let SearchPattern::Path { pattern } = &patterns[2] else {
            panic!("expected path pattern");
        };
        assert_eq!(pattern.entries().len(), 2);
        assert_eq!(pattern.entries()[1].source(), Path::new("c"));
    }

    #[test]
    fn two_string_list_is_two_plain_paths() {
        let patterns = parse_patterns(
            r#"patterns = [{ patternType = "path", pattern = ["a.txt", "b.txt"] }]"#,
        );
        assert_eq!(patterns[0], SearchPattern::paths(["a.txt", "b.txt"]));
    }

    #[test]
    fn unknown_pattern_type_is_rejected() {
        let result = toml::from_str::<Patterns>(
            r#"patterns = [{ patternType = "fuzzy", pattern = "x" }]"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn exclusionary_patterns() {
        assert!(SearchPattern::exclude_glob("x").is_exclusionary());
        assert!(SearchPattern::ignore_rules_file(".gitignore").is_exclusionary());
        assert!(!SearchPattern::glob("x").is_exclusionary());
        assert!(!SearchPattern::regex("x").is_exclusionary());
        assert!(!SearchPattern::paths(["a"]).is_exclusionary());
    }

    #[test]
    fn post_command_defaults() {
        let cmd: PostExecutionCommand = toml::from_str(r#"command = "make""#).unwrap();
        assert!(cmd.shell);
        assert_eq!(cmd.timeout_in_ms, 300_000);
        assert!(cmd.env.is_empty());
        assert!(cmd.skip_if_path_exists.is_none());
    }

    #[test]
    fn link_kind_rejects_directory_hardlink() {
        let mut opts = LinkOptions::directory();
        assert_eq!(opts.link_kind(), Some(LinkKind::Directory));
        opts.action = Some(FileAction::Hardlink);
        assert_eq!(opts.link_kind(), None);
    }

    #[test]
    fn file_action_defaults_to_symlink() {
        let opts: LinkOptions = toml::from_str(r#"itemType = "file""#).unwrap();
        assert_eq!(opts.link_kind(), Some(LinkKind::File(FileAction::Symlink)));
    }

    #[test]
    fn link_options_reject_unknown_keys() {
        let result = toml::from_str::<LinkOptions>("itemType = \"file\"\nbogus = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn display_name_defaults_to_index() {
        let rule = Rule {
            name: None,
            base_directory: PathBuf::from("/a"),
            target_directory: PathBuf::from("/b"),
            patterns: vec![],
            link_options: LinkOptions::directory(),
            post_command: None,
        };
        assert_eq!(rule.display_name(2), "rule 3");
    }
}
