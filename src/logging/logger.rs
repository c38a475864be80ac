//! Console logger with per-rule summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{Log, RuleEntry, RuleStatus};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
///
/// `record_rule` is not included because its signature differs from the
/// `fn(&self, &str)` shape shared by the display methods.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with summary collection.
///
/// Every message also lands in `$XDG_CACHE_HOME/linkforge/<command>.log`
/// through the [`FileLayer`](super::subscriber::FileLayer), regardless of
/// the verbose flag.
#[derive(Debug)]
pub struct Logger {
    rules: Mutex<Vec<RuleEntry>>,
    log_file: Option<PathBuf>,
    /// Serializes console output from parallel rule flushes.
    pub(super) flush_lock: Mutex<()>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// Only remembers the log file path for the summary; the file itself is
    /// created by [`init_subscriber`](super::subscriber::init_subscriber).
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
            flush_lock: Mutex::new(()),
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded rule entries.
    #[must_use]
    pub fn rule_entries(&self) -> Vec<RuleEntry> {
        self.rules.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: "linkforge::stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Record a rule result for the summary.
    pub fn record_rule(&self, name: &str, status: RuleStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.rules.lock() {
            guard.push(RuleEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the number of failed rules.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.rules.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|r| r.status == RuleStatus::Failed)
                .count()
        })
    }

    /// Print the summary of all recorded rules.
    pub fn print_summary(&self) {
        let rules = self.rule_entries();
        if rules.is_empty() {
            return;
        }

        self.stage("Summary");

        let mut ok = 0u32;
        let mut skipped = 0u32;
        let mut failed = 0u32;

        for rule in &rules {
            let (icon, color) = match rule.status {
                RuleStatus::Ok => {
                    ok += 1;
                    ("✓", "\x1b[32m")
                }
                RuleStatus::Skipped => {
                    skipped += 1;
                    ("○", "\x1b[33m")
                }
                RuleStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = rule
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", rule.name));
        }

        let total = ok + skipped + failed;
        self.info(&format!(
            "{total} rules: \x1b[32m{ok} ok\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error);

    fn record_rule(&self, name: &str, status: RuleStatus, message: Option<&str>) {
        self.record_rule(name, status, message);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    #[test]
    fn logger_starts_empty() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(log.rule_entries().is_empty());
        assert_eq!(log.failure_count(), 0);
    }

    #[test]
    fn record_rule_with_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_rule("configs", RuleStatus::Ok, Some("3 linked"));
        let rules = log.rule_entries();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].name, "configs");
        assert_eq!(rules[0].message.as_deref(), Some("3 linked"));
    }

    #[test]
    fn failure_count_only_counts_failed() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_rule("a", RuleStatus::Ok, None);
        log.record_rule("b", RuleStatus::Failed, Some("1 failed"));
        log.record_rule("c", RuleStatus::Skipped, None);
        log.record_rule("d", RuleStatus::Failed, None);
        assert_eq!(log.failure_count(), 2);
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let log_ref: &dyn Log = &log;
        log_ref.record_rule("via-trait", RuleStatus::Ok, None);
        assert_eq!(log.rule_entries().len(), 1);
    }

    #[test]
    fn messages_are_written_to_file_with_tags() {
        let (log, _tmp, _guard) = isolated_logger();
        let pid = std::process::id();
        log.stage(&format!("stage-{pid}"));
        log.debug(&format!("debug-{pid}"));
        log.warn(&format!("warn-{pid}"));
        log.error(&format!("error-{pid}"));

        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains(&format!("==> stage-{pid}")));
        assert!(contents.contains(&format!("[debug] debug-{pid}")));
        assert!(contents.contains(&format!("[warn] warn-{pid}")));
        assert!(contents.contains(&format!("[error] error-{pid}")));
    }

    #[test]
    fn summary_lists_rules_without_ansi_in_file() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_rule("configs", RuleStatus::Ok, Some("2 linked"));
        log.record_rule("scripts", RuleStatus::Failed, Some("1 failed"));
        log.print_summary();

        let contents = fs::read_to_string(log.log_path().expect("log path")).unwrap();
        assert!(contents.contains("✓ configs (2 linked)"));
        assert!(contents.contains("✗ scripts (1 failed)"));
        assert!(contents.contains("2 rules: 1 ok, 0 skipped, 1 failed"));
        assert!(!contents.contains('\x1b'));
    }
}
