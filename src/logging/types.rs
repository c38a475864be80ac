//! Core logging types: rule entries, status, and the [`Log`] trait.

/// Rule result for summary reporting.
#[derive(Debug, Clone)]
pub struct RuleEntry {
    /// Rule name as shown in the summary.
    pub name: String,
    /// Final status of the rule.
    pub status: RuleStatus,
    /// Optional detail message (item counts or the failure description).
    pub message: Option<String>,
}

/// Status of a completed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStatus {
    /// Every item and the post-command succeeded.
    Ok,
    /// The rule produced nothing to do (no matching items, command skipped).
    Skipped,
    /// At least one item, the discovery or the post-command failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// Both [`Logger`](super::logger::Logger) (direct output) and
/// [`BufferedLog`](super::buffered::BufferedLog) (deferred output for
/// parallel rules) implement this trait, so workflow code can log without
/// knowing whether output is immediate or buffered.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Record a rule result for the summary.
    fn record_rule(&self, name: &str, status: RuleStatus, message: Option<&str>);
}
