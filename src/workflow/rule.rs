//! Execution of a single rule.
use std::sync::Arc;

use super::{ItemOutcome, ItemStatus, RuleOutcome, WorkflowContext};
use crate::config::rules::{LinkOptions, Rule};
use crate::discovery::{DiscoveredItem, Discovery, DiscoveryResult};
use crate::error::{DomainError, DomainErrorKind};
use crate::logging::Log;
use crate::resources::attributes::adjust_attributes;
use crate::resources::command::execute_command;
use crate::resources::link::{LinkCreationOptions, LinkingOperationResult, create_link};

fn link_options(rule: &Rule, ctx: &WorkflowContext) -> Result<LinkCreationOptions, DomainError> {
    let options = LinkCreationOptions::from_config(&rule.link_options).ok_or_else(|| {
        DomainError::with_message(
            DomainErrorKind::Execution,
            format!(
                "cannot {} items of type {}",
                rule.link_options.action.unwrap_or_default(),
                rule.link_options.item_type
            ),
        )
    })?;
    Ok(match &ctx.overwrite {
        Some(decider) => options.with_overwrite(Arc::clone(decider)),
        None => options,
    })
}

/// Run discovery, links, attributes and the post-command of `rule`.
///
/// Never fails: every problem is recorded in the returned outcome and the
/// rule is recorded in the logger summary.
pub(super) fn run_rule(
    rule: &Rule,
    index: usize,
    discovery: &Discovery,
    ctx: &WorkflowContext,
    log: &dyn Log,
) -> RuleOutcome {
    let name = rule.display_name(index);
    log.stage(&format!("Rule {name}"));
    let mut outcome = RuleOutcome::new(name);

    let prepared = link_options(rule, ctx).and_then(|options| {
        discovery
            .discover(&rule.base_directory, &rule.patterns)
            .map(|found| (options, found))
    });
    match prepared {
        Ok((options, found)) => {
            log.debug(&format!(
                "{} item(s) discovered under {}",
                found.len(),
                found.base().display()
            ));
            link_items(rule, &options, &found, &mut outcome, log);
            if let Some(command) = &rule.post_command {
                log.debug(&format!("post-command: {}", command.command));
                let result =
                    execute_command(command, &rule.target_directory, ctx.executor.as_ref());
                if let Some(error) = &result.error {
                    log.error(&format!("post-command failed: {error}"));
                } else if result.skipped {
                    log.info("post-command skipped: precondition path exists");
                } else if !result.stdout.trim().is_empty() {
                    log.debug(result.stdout.trim_end());
                }
                outcome.command = Some(result);
            }
        }
        Err(error) => {
            log.error(&format!("{error}"));
            outcome.error = Some(error);
        }
    }

    let summary = outcome.summary();
    log.info(&summary);
    log.record_rule(&outcome.name, outcome.status(), Some(&summary));
    outcome
}

fn link_items(
    rule: &Rule,
    options: &LinkCreationOptions,
    found: &DiscoveryResult,
    outcome: &mut RuleOutcome,
    log: &dyn Log,
) {
    for item in found.items() {
        if !item.kind.is_linked_by(rule.link_options.item_type) {
            log.debug(&format!("filtered {} {}", item.kind, item.path.display()));
            outcome.filtered += 1;
            continue;
        }
        let target = item.target_path(found.base(), &rule.target_directory);
        let item_outcome = link_item(item, &target, options, &rule.link_options);
        match item_outcome.status() {
            ItemStatus::Linked => log.debug(&format!(
                "{} {} -> {}",
                item_outcome.link.action,
                item.path.display(),
                target.display()
            )),
            ItemStatus::Skipped => log.warn(&format!(
                "skipped {}: {}",
                target.display(),
                item_outcome.failure_message().unwrap_or_default()
            )),
            ItemStatus::Failed => log.error(&format!(
                "{}: {}",
                target.display(),
                item_outcome.failure_message().unwrap_or_default()
            )),
        }
        outcome.items.push(item_outcome);
    }
}

fn link_item(
    item: &DiscoveredItem,
    target: &std::path::Path,
    options: &LinkCreationOptions,
    config: &LinkOptions,
) -> ItemOutcome {
    let link = create_link(&item.path, target, options).unwrap_or_else(|usage| {
        LinkingOperationResult::rejected(
            &item.path,
            target,
            options.kind,
            DomainError::new(DomainErrorKind::Execution, usage),
        )
    });
    let attributes = config
        .attributes
        .as_ref()
        .filter(|attributes| link.success && !attributes.is_empty())
        .map(|attributes| adjust_attributes(target, attributes));
    ItemOutcome { link, attributes }
}
