//! Buffered logger for rules executing in parallel.
use std::sync::{Arc, Mutex};

use super::logger::Logger;
use super::types::{Log, RuleStatus};

/// A single buffered log entry, replayed when flushed.
#[derive(Debug, Clone)]
enum LogEntry {
    Stage(String),
    Info(String),
    Debug(String),
    Warn(String),
    Error(String),
}

impl LogEntry {
    /// Replay this entry to the console and log file via tracing.
    fn replay(&self) {
        match self {
            Self::Stage(msg) => tracing::info!(target: "linkforge::stage", "{msg}"),
            Self::Info(msg) => tracing::info!("{msg}"),
            Self::Debug(msg) => tracing::debug!("{msg}"),
            Self::Warn(msg) => tracing::warn!("{msg}"),
            Self::Error(msg) => tracing::error!("{msg}"),
        }
    }
}

/// Implement the display methods of [`Log`] by pushing each message into
/// `self.entries` as the corresponding [`LogEntry`] variant.
macro_rules! buffer_log_methods {
    ($($method:ident => $variant:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                if let Ok(mut guard) = self.entries.lock() {
                    guard.push(LogEntry::$variant(msg.to_string()));
                }
            }
        )+
    };
}

/// Buffered logger for one rule of a parallel run.
///
/// Captures display output in memory so concurrently running rules do not
/// interleave their console output. Entries are replayed in order by
/// [`flush`](Self::flush).
///
/// [`record_rule`](Log::record_rule) goes straight to the underlying
/// [`Logger`], whose summary collection is already thread-safe.
#[derive(Debug)]
pub struct BufferedLog {
    inner: Arc<Logger>,
    entries: Mutex<Vec<LogEntry>>,
}

impl BufferedLog {
    /// Create a new buffered logger backed by the given [`Logger`].
    #[must_use]
    pub const fn new(inner: Arc<Logger>) -> Self {
        Self {
            inner,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Replay and clear all buffered entries.
    ///
    /// Holds the flush lock of the backing [`Logger`] so two rules finishing
    /// at the same time cannot interleave their blocks.
    pub fn flush(&self) {
        let _guard = self
            .inner
            .flush_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entries = match self.entries.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for entry in &entries {
            entry.replay();
        }
    }
}

impl Log for BufferedLog {
    buffer_log_methods! {
        stage => Stage,
        info  => Info,
        debug => Debug,
        warn  => Warn,
        error => Error,
    }

    fn record_rule(&self, name: &str, status: RuleStatus, message: Option<&str>) {
        self.inner.record_rule(name, status, message);
    }
}
