//! Top-level subcommand handlers.
pub mod discover;
pub mod run;
pub mod version;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::rules::Rule;
use crate::config::validation::validate_rules;
use crate::config::{Config, resolve_config_path};
use crate::logging::Log;

/// Resolve and load the config file named by `global`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(global: &GlobalOpts, log: &dyn Log) -> Result<Config> {
    let path = resolve_config_path(global.config.as_deref());
    log.stage("Loading configuration");
    let config = Config::load(&path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    log.info(&format!(
        "loaded {} rule(s) from {}",
        config.rules.len(),
        path.display()
    ));
    Ok(config)
}

/// Pick the rules named in `names` (all rules when empty).
///
/// # Errors
///
/// Returns an error naming every requested rule that does not exist.
pub fn select_rules(config: &Config, names: &[String]) -> Result<Vec<Rule>> {
    let (rules, unknown) = config.select(names);
    if !unknown.is_empty() {
        anyhow::bail!("unknown rule(s): {}", unknown.join(", "));
    }
    Ok(rules)
}

/// Validate `rules` ahead of discovery, logging every warning.
///
/// # Errors
///
/// Returns an error for the first malformed rule.
pub fn check_rules(rules: &[Rule], log: &dyn Log) -> Result<()> {
    let warnings = validate_rules(rules).context("invalid configuration")?;
    if !warnings.is_empty() {
        log.warn(&format!(
            "found {} configuration warning(s):",
            warnings.len()
        ));
        for warning in &warnings {
            log.warn(&format!("  {warning}"));
        }
    }
    Ok(())
}
