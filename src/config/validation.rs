//! Shape validation of rules before any rule executes.
use std::collections::HashSet;

use super::rules::{Attributes, FileAction, LinkKind, PathEntry, Rule, SearchPattern};
use crate::discovery::matcher::{compile_glob, compile_regex};
use crate::error::ConfigError;

/// Minimum length for octal mode strings.
const OCTAL_MODE_MIN_LEN: usize = 3;

/// Maximum length for octal mode strings.
const OCTAL_MODE_MAX_LEN: usize = 4;

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The rule can run but probably does not do what was intended.
    Warning,
    /// The rule is malformed; the run must not start.
    Error,
}

/// A finding produced while validating a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// How serious the finding is.
    pub severity: Severity,
    /// Display name of the rule.
    pub rule: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationWarning {
    fn error(rule: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            rule: rule.to_string(),
            message: message.into(),
        }
    }

    fn warning(rule: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.rule, self.message)
    }
}

/// Validators inspect configuration and report findings.
pub trait ConfigValidator {
    /// Validate and return every finding.
    fn validate(&self) -> Vec<ValidationWarning>;

    /// Short name of the validator, used in debug logs.
    fn name(&self) -> &'static str;
}

/// Validates a single rule.
#[derive(Debug)]
pub struct RuleValidator<'a> {
    rule: &'a Rule,
    name: String,
}

impl<'a> RuleValidator<'a> {
    /// Validator for the rule at `index`.
    #[must_use]
    pub fn new(rule: &'a Rule, index: usize) -> Self {
        Self {
            rule,
            name: rule.display_name(index),
        }
    }

    fn check_pattern(&self, pattern: &SearchPattern, out: &mut Vec<ValidationWarning>) {
        let name = &self.name;
        match pattern {
            SearchPattern::Regex { pattern } => {
                if pattern.is_empty() {
                    out.push(ValidationWarning::error(name, "regex pattern is empty"));
                } else if let Err(e) = compile_regex(pattern) {
                    out.push(ValidationWarning::error(name, e.to_string()));
                }
            }
            SearchPattern::Glob { pattern, .. } => {
                if pattern.is_empty() {
                    out.push(ValidationWarning::error(name, "glob pattern is empty"));
                } else if let Err(e) = compile_glob(pattern) {
                    out.push(ValidationWarning::error(name, e.to_string()));
                }
            }
            SearchPattern::Path { pattern } => {
                let entries = pattern.entries();
                if entries.is_empty() {
                    out.push(ValidationWarning::error(
                        name,
                        "path pattern has no entries",
                    ));
                }
                for entry in entries {
                    check_path_entry(name, entry, out);
                }
            }
            SearchPattern::IgnoreRulesFile { pattern } => {
                if pattern.as_os_str().is_empty() {
                    out.push(ValidationWarning::error(
                        name,
                        "ignoreRulesFile pattern is empty",
                    ));
                }
            }
        }
    }
}

impl ConfigValidator for RuleValidator<'_> {
    fn validate(&self) -> Vec<ValidationWarning> {
        let rule = self.rule;
        let name = &self.name;
        let mut out = Vec::new();

        if rule.base_directory.as_os_str().is_empty() {
            out.push(ValidationWarning::error(name, "baseDirectory is empty"));
        } else if !rule.base_directory.is_dir() {
            out.push(ValidationWarning::warning(
                name,
                format!(
                    "baseDirectory does not exist: {}",
                    rule.base_directory.display()
                ),
            ));
        }
        if rule.target_directory.as_os_str().is_empty() {
            out.push(ValidationWarning::error(name, "targetDirectory is empty"));
        }

        for pattern in &rule.patterns {
            self.check_pattern(pattern, &mut out);
        }
        if !rule.patterns.is_empty() && rule.patterns.iter().all(SearchPattern::is_exclusionary) {
            out.push(ValidationWarning::warning(
                name,
                "only exclusionary patterns; the rule will match nothing",
            ));
        }

        let options = &rule.link_options;
        match options.link_kind() {
            None => out.push(ValidationWarning::error(
                name,
                format!(
                    "directories are always symlinked; action '{}' is not allowed",
                    options.action.unwrap_or_default()
                ),
            )),
            Some(LinkKind::File(FileAction::Symlink) | LinkKind::Directory) => {
                if options.attributes.as_ref().is_some_and(|a| !a.is_empty()) {
                    out.push(ValidationWarning::warning(
                        name,
                        "attributes are not applied to symbolic links",
                    ));
                }
            }
            Some(LinkKind::File(FileAction::Hardlink | FileAction::Copy)) => {}
        }
        if let Some(attributes) = &options.attributes {
            check_attributes(name, attributes, &mut out);
        }

        if let Some(command) = &rule.post_command {
            if command.command.trim().is_empty() {
                out.push(ValidationWarning::error(
                    name,
                    "postCommand.command is empty",
                ));
            }
            if command.timeout_in_ms == 0 {
                out.push(ValidationWarning::error(
                    name,
                    "postCommand.timeoutInMs must be greater than zero",
                ));
            }
        }

        out
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

fn check_path_entry(rule: &str, entry: &PathEntry, out: &mut Vec<ValidationWarning>) {
    if entry.source().as_os_str().is_empty() {
        out.push(ValidationWarning::error(rule, "path entry is empty"));
    }
    if entry
        .destination()
        .is_some_and(|destination| destination.as_os_str().is_empty())
    {
        out.push(ValidationWarning::error(
            rule,
            format!("destinationPath is empty for {}", entry.source().display()),
        ));
    }
}

fn check_attributes(rule: &str, attributes: &Attributes, out: &mut Vec<ValidationWarning>) {
    if let Some(mode) = &attributes.mode
        && let Some(message) = validate_octal_mode(mode)
    {
        out.push(ValidationWarning::error(rule, message));
    }
}

/// Validate an octal permission mode string.
///
/// Returns a description of the problem, or `None` if the mode is valid.
#[must_use]
pub fn validate_octal_mode(mode: &str) -> Option<String> {
    if !mode.chars().all(|c| c.is_ascii_digit()) {
        return Some(format!(
            "invalid octal mode '{mode}': must contain only digits"
        ));
    }

    if mode.len() < OCTAL_MODE_MIN_LEN || mode.len() > OCTAL_MODE_MAX_LEN {
        return Some(format!(
            "invalid mode length '{mode}': must be {OCTAL_MODE_MIN_LEN} or {OCTAL_MODE_MAX_LEN} digits"
        ));
    }

    if let Some(c) = mode.chars().find(|&c| c > '7') {
        return Some(format!("invalid octal digit '{c}' in mode '{mode}'"));
    }

    None
}

/// Validate every rule, failing on the first error.
///
/// Warnings (including duplicate rule names) are returned for the caller
/// to log.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidRule`] for the first malformed rule.
pub fn validate_rules(rules: &[Rule]) -> Result<Vec<ValidationWarning>, ConfigError> {
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    for (index, rule) in rules.iter().enumerate() {
        let validator = RuleValidator::new(rule, index);
        tracing::debug!("validating {} '{}'", validator.name(), validator.name);
        for finding in validator.validate() {
            match finding.severity {
                Severity::Error => {
                    return Err(ConfigError::InvalidRule {
                        rule: finding.rule,
                        message: finding.message,
                    });
                }
                Severity::Warning => warnings.push(finding),
            }
        }
        if let Some(name) = &rule.name
            && !seen.insert(name.as_str())
        {
            warnings.push(ValidationWarning::warning(name, "duplicate rule name"));
        }
    }

    Ok(warnings)
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
    use crate::config::rules::{LinkOptions, PostExecutionCommand};
    use std::path::{Path, PathBuf};

    fn rule(base: &Path, patterns: Vec<SearchPattern>) -> Rule {
        Rule {
            name: Some("r".to_string()),
            base_directory: base.to_path_buf(),
            target_directory: PathBuf::from("/target"),
            patterns,
            link_options: LinkOptions::file(FileAction::Hardlink),
            post_command: None,
        }
    }

    fn error_message(rule: &Rule) -> String {
        match validate_rules(std::slice::from_ref(rule)).unwrap_err() {
            ConfigError::InvalidRule { message, .. } => message,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn valid_rule_passes_without_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let rule = rule(dir.path(), vec![SearchPattern::glob("*.txt")]);
        assert!(validate_rules(&[rule]).unwrap().is_empty());
    }

    #[test]
    fn invalid_regex_and_glob_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate_rules(&[rule(dir.path(), vec![SearchPattern::regex("(")])]).is_err());
        assert!(validate_rules(&[rule(dir.path(), vec![SearchPattern::glob("[")])]).is_err());
    }

    #[test]
    fn empty_pattern_strings_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let message = error_message(&rule(dir.path(), vec![SearchPattern::glob("")]));
        assert_eq!(message, "glob pattern is empty");
        let message = error_message(&rule(dir.path(), vec![SearchPattern::paths([""])]));
        assert_eq!(message, "path entry is empty");
    }

    #[test]
    fn directory_with_hardlink_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut rule = rule(dir.path(), vec![SearchPattern::glob("*")]);
        rule.link_options = LinkOptions::directory();
        rule.link_options.action = Some(FileAction::Hardlink);
        assert!(error_message(&rule).contains("always symlinked"));
    }

    #[test]
    fn empty_command_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut rule = rule(dir.path(), vec![SearchPattern::glob("*")]);
        rule.post_command = Some(PostExecutionCommand::new("  "));
        assert_eq!(error_message(&rule), "postCommand.command is empty");
    }

    #[test]
    fn bad_mode_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut rule = rule(dir.path(), vec![SearchPattern::glob("*")]);
        rule.link_options.attributes = Some(Attributes {
            mode: Some("999".to_string()),
            readonly: None,
        });
        assert!(error_message(&rule).contains("invalid octal digit"));
    }

    #[test]
    fn soft_problems_are_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let missing_base = rule(&dir.path().join("absent"), vec![SearchPattern::glob("*")]);
        let only_exclusions = rule(dir.path(), vec![SearchPattern::exclude_glob("*.tmp")]);
        let warnings = validate_rules(&[missing_base, only_exclusions]).unwrap();
        let messages: Vec<_> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].starts_with("baseDirectory does not exist"));
        assert!(messages[1].starts_with("only exclusionary patterns"));
        assert_eq!(messages[2], "duplicate rule name");
    }

    #[test]
    fn validate_octal_mode_accepts_valid_modes() {
        assert_eq!(validate_octal_mode("644"), None);
        assert_eq!(validate_octal_mode("0755"), None);
        assert!(validate_octal_mode("64").is_some());
        assert!(validate_octal_mode("rwx").is_some());
    }
}
