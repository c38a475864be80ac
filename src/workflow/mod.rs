//! Workflow orchestration.
//!
//! A run validates every rule up front, then executes rules in declaration
//! order: discover, link each item, adjust its attributes, and finally run
//! the rule's post-command once. Failures are recorded per item and per
//! rule; only an invalid configuration stops the run before it starts.
mod context;
mod rule;

pub use context::WorkflowContext;

use std::sync::Arc;

use crate::config::rules::Rule;
use crate::config::validation::validate_rules;
use crate::discovery::Discovery;
use crate::error::{ConfigError, DomainError};
use crate::logging::{BufferedLog, RuleStatus};
use crate::resources::ResourceChange;
use crate::resources::command::CommandOutcome;
use crate::resources::link::{LinkingOperationResult, OVERWRITE_DECLINED};

/// Final state of one discovered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// The link or copy exists and attributes, if any, were applied.
    Linked,
    /// The overwrite callback declined to replace an existing target.
    Skipped,
    /// Link creation or attribute adjustment failed.
    Failed,
}

/// Link and attribute results of one discovered item.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// Result of the link or copy.
    pub link: LinkingOperationResult,
    /// Attribute adjustment, attempted only after a successful link.
    pub attributes: Option<Result<ResourceChange, DomainError>>,
}

impl ItemOutcome {
    /// Classify this item.
    ///
    /// An existing target without an overwrite callback is a failure; a
    /// target the callback chose to keep is a skip.
    #[must_use]
    pub fn status(&self) -> ItemStatus {
        if self.link.success {
            if matches!(self.attributes, Some(Err(_))) {
                ItemStatus::Failed
            } else {
                ItemStatus::Linked
            }
        } else if self.link.reason.as_deref() == Some(OVERWRITE_DECLINED) {
            ItemStatus::Skipped
        } else {
            ItemStatus::Failed
        }
    }

    /// The domain error of this item, from the link or the attributes.
    #[must_use]
    pub fn error(&self) -> Option<&DomainError> {
        self.link
            .error
            .as_ref()
            .or_else(|| self.attributes.as_ref().and_then(|a| a.as_ref().err()))
    }

    /// Human-readable reason the item did not succeed.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        self.error()
            .map(ToString::to_string)
            .or_else(|| self.link.reason.clone())
    }
}

/// Everything that happened while executing one rule.
#[derive(Debug, Clone)]
pub struct RuleOutcome {
    /// Display name of the rule.
    pub name: String,
    /// Failure that prevented the rule from linking anything.
    pub error: Option<DomainError>,
    /// Items in discovery order.
    pub items: Vec<ItemOutcome>,
    /// Discovered items whose kind did not match the rule's item type.
    pub filtered: usize,
    /// Post-command result, when one is configured and the rule got that far.
    pub command: Option<CommandOutcome>,
}

impl RuleOutcome {
    fn new(name: String) -> Self {
        Self {
            name,
            error: None,
            items: Vec::new(),
            filtered: 0,
            command: None,
        }
    }

    /// Number of items with `status`.
    #[must_use]
    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status() == status).count()
    }

    /// Number of failures: the rule error, failed items and a failed
    /// post-command.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        usize::from(self.error.is_some())
            + self.count(ItemStatus::Failed)
            + usize::from(self.command.as_ref().is_some_and(|c| !c.success))
    }

    /// Summary status of the rule.
    #[must_use]
    pub fn status(&self) -> RuleStatus {
        if self.failure_count() > 0 {
            RuleStatus::Failed
        } else if self.items.is_empty() && self.command.as_ref().is_none_or(|c| c.skipped) {
            RuleStatus::Skipped
        } else {
            RuleStatus::Ok
        }
    }

    /// One-line summary such as `2 linked, 1 skipped, 0 failed`.
    #[must_use]
    pub fn summary(&self) -> String {
        if let Some(error) = &self.error {
            return error.to_string();
        }
        let mut summary = format!(
            "{} linked, {} skipped, {} failed",
            self.count(ItemStatus::Linked),
            self.count(ItemStatus::Skipped),
            self.count(ItemStatus::Failed)
        );
        if self.filtered > 0 {
            summary.push_str(&format!(", {} filtered", self.filtered));
        }
        match &self.command {
            Some(c) if c.skipped => summary.push_str("; command skipped"),
            Some(c) if c.success => summary.push_str("; command ok"),
            Some(_) => summary.push_str("; command failed"),
            None => {}
        }
        summary
    }
}

/// Aggregated outcome of a workflow run, one entry per rule in
/// declaration order.
#[derive(Debug, Clone, Default)]
pub struct WorkflowResult {
    /// Per-rule outcomes.
    pub rules: Vec<RuleOutcome>,
}

impl WorkflowResult {
    /// Every item outcome across all rules.
    pub fn items(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.rules.iter().flat_map(|rule| rule.items.iter())
    }

    /// Total number of failures across all rules.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.rules.iter().map(RuleOutcome::failure_count).sum()
    }

    /// Whether nothing failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Validate and execute `rules`.
///
/// Validation warnings are logged. With [`WorkflowContext::parallel`] set
/// and more than one rule, rules run concurrently; each logs into its own
/// [`BufferedLog`] flushed when the rule finishes, and outcomes keep
/// declaration order.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidRule`] when any rule is malformed; no rule
/// runs in that case.
pub fn run_workflow(rules: &[Rule], ctx: &WorkflowContext) -> Result<WorkflowResult, ConfigError> {
    for warning in validate_rules(rules)? {
        ctx.log.warn(&warning.to_string());
    }

    let discovery = Discovery::new();
    let outcomes = if ctx.parallel && rules.len() > 1 {
        use rayon::prelude::*;
        rules
            .par_iter()
            .enumerate()
            .map(|(index, rule)| {
                let buf = BufferedLog::new(Arc::clone(&ctx.log));
                let outcome = rule::run_rule(rule, index, &discovery, ctx, &buf);
                buf.flush();
                outcome
            })
            .collect()
    } else {
        rules
            .iter()
            .enumerate()
            .map(|(index, rule)| rule::run_rule(rule, index, &discovery, ctx, ctx.log.as_ref()))
            .collect()
    };

    Ok(WorkflowResult { rules: outcomes })
}
