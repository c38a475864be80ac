//! Command: list what each rule would link.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{DiscoverOpts, GlobalOpts};
use crate::config::rules::Rule;
use crate::discovery::{Discovery, DiscoveryResult};
use crate::logging::{Logger, RuleStatus};
use crate::resources::helpers::fs::relative_slash;

/// Render one line per discovered item: kind, source relative to the base
/// directory, and target relative to the target directory. Items the rule
/// would not link are marked as filtered.
#[must_use]
pub fn render_listing(rule: &Rule, found: &DiscoveryResult) -> String {
    found
        .items()
        .iter()
        .map(|item| {
            let source = relative_slash(&item.path, found.base())
                .unwrap_or_else(|| item.path.display().to_string());
            let target_path = item.target_path(found.base(), &rule.target_directory);
            let target = relative_slash(&target_path, &rule.target_directory)
                .unwrap_or_else(|| target_path.display().to_string());
            let filtered = if item.kind.is_linked_by(rule.link_options.item_type) {
                ""
            } else {
                " (filtered)"
            };
            format!("{:<9} {source} -> {target}{filtered}", item.kind)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Discover every selected rule and log the listing.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or is invalid,
/// a requested rule does not exist, or discovery failed for any rule.
pub fn run(global: &GlobalOpts, opts: &DiscoverOpts, log: &Arc<Logger>) -> Result<()> {
    let config = super::load_config(global, log.as_ref())?;
    let rules = super::select_rules(&config, &opts.rules)?;
    super::check_rules(&rules, log.as_ref())?;

    let discovery = Discovery::new();
    for (index, rule) in rules.iter().enumerate() {
        let name = rule.display_name(index);
        log.stage(&format!("Rule {name}"));
        match discovery.discover(&rule.base_directory, &rule.patterns) {
            Ok(found) if found.is_empty() => {
                log.info("no items");
                log.record_rule(&name, RuleStatus::Skipped, Some("0 items"));
            }
            Ok(found) => {
                for line in render_listing(rule, &found).lines() {
                    log.info(line);
                }
                log.record_rule(
                    &name,
                    RuleStatus::Ok,
                    Some(&format!("{} items", found.len())),
                );
            }
            Err(e) => {
                log.error(&format!("{e}"));
                log.record_rule(&name, RuleStatus::Failed, Some(&e.to_string()));
            }
        }
    }

    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("discovery failed for {count} rule(s)");
    }
    Ok(())
}
