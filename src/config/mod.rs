//! Configuration loading.
//!
//! A config file holds an ordered list of `[[rules]]`. Relative base and
//! target directories are resolved against the directory containing the
//! file, and a leading `~` expands to the home directory.
pub mod rules;
pub mod toml_loader;
pub mod validation;

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use crate::error::ConfigError;
use crate::resources::helpers::fs::{absolutize, resolve_against};
use rules::Rule;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "LINKFORGE_CONFIG";

/// Default config file name in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "linkforge.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    rules: Vec<Rule>,
}

/// All loaded configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing the config file.
    pub root: PathBuf,
    /// Rules in declaration order, with resolved directories.
    pub rules: Vec<Rule>,
}

impl Config {
    /// Load and resolve the config file at `path`.
    ///
    /// Shape validation is separate; see [`validation::validate_rules`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml_loader::load_config(path)?;
        Ok(Self::from_raw(raw, path))
    }

    /// Parse config text as if it were read from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text cannot be parsed.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml_loader::parse_config(content, path)?;
        Ok(Self::from_raw(raw, path))
    }

    fn from_raw(raw: RawConfig, path: &Path) -> Self {
        let file = absolutize(path).unwrap_or_else(|_| path.to_path_buf());
        let root = file
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let home = home_dir();
        let rules = raw
            .rules
            .into_iter()
            .map(|mut rule| {
                rule.base_directory = resolve_dir(&root, &rule.base_directory, home.as_deref());
                rule.target_directory = resolve_dir(&root, &rule.target_directory, home.as_deref());
                rule
            })
            .collect();
        Self { root, rules }
    }

    /// Select rules by name, keeping declaration order.
    ///
    /// Unnamed rules are addressed as `rule N` and come back carrying that
    /// name, so a subset reports the same names as the full list. Returns
    /// the names that did not match any rule alongside the selection.
    #[must_use]
    pub fn select(&self, names: &[String]) -> (Vec<Rule>, Vec<String>) {
        let selected = self
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| (rule.display_name(index), rule))
            .filter(|(name, _)| names.is_empty() || names.contains(name))
            .map(|(name, rule)| Rule {
                name: Some(name),
                ..rule.clone()
            })
            .collect();
        let unknown = names
            .iter()
            .filter(|name| {
                !self
                    .rules
                    .iter()
                    .enumerate()
                    .any(|(index, rule)| &rule.display_name(index) == *name)
            })
            .cloned()
            .collect();
        (selected, unknown)
    }
}

/// Resolve the config file path: explicit flag, then [`CONFIG_ENV`], then
/// [`DEFAULT_CONFIG_FILE`] in the current directory.
#[must_use]
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(
        || {
            std::env::var_os(CONFIG_ENV)
                .filter(|value| !value.is_empty())
                .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
        },
        Path::to_path_buf,
    )
}

/// The user's home directory from `HOME` (or `USERPROFILE` on Windows).
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    let var = if cfg!(target_os = "windows") {
        std::env::var_os("USERPROFILE").or_else(|| std::env::var_os("HOME"))
    } else {
        std::env::var_os("HOME")
    };
    var.filter(|value| !value.is_empty()).map(PathBuf::from)
}

/// Expand a leading `~` and resolve relative paths against `root`.
fn resolve_dir(root: &Path, dir: &Path, home: Option<&Path>) -> PathBuf {
    if dir.as_os_str().is_empty() {
        return PathBuf::new();
    }
    let mut components = dir.components();
    if let (Some(Component::Normal(first)), Some(home)) = (components.next(), home)
        && first == "~"
    {
        return resolve_against(home, components.as_path());
    }
    resolve_against(root, dir)
}
