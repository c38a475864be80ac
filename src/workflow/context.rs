use std::sync::Arc;

use crate::exec::{Executor, SystemExecutor};
use crate::logging::Logger;
use crate::resources::link::OverwriteDecider;

/// Shared context for one workflow run.
pub struct WorkflowContext {
    /// Logger for output and rule recording.
    pub log: Arc<Logger>,
    /// Runs post-commands.
    pub executor: Arc<dyn Executor>,
    /// Conflict callback handed to every link creation.
    pub overwrite: Option<Arc<dyn OverwriteDecider>>,
    /// Whether independent rules run concurrently on rayon.
    pub parallel: bool,
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("log", &self.log)
            .field("executor", &"<dyn Executor>")
            .field("overwrite", &self.overwrite.is_some())
            .field("parallel", &self.parallel)
            .finish()
    }
}

impl WorkflowContext {
    /// Sequential context running real processes with no conflict callback.
    #[must_use]
    pub fn new(log: Arc<Logger>) -> Self {
        Self {
            log,
            executor: Arc::new(SystemExecutor),
            overwrite: None,
            parallel: false,
        }
    }

    /// Replace the command executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Set the conflict callback.
    #[must_use]
    pub fn with_overwrite(mut self, decider: Arc<dyn OverwriteDecider>) -> Self {
        self.overwrite = Some(decider);
        self
    }

    /// Run independent rules concurrently.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
