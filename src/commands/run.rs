//! Command: execute the workflow.
use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::cli::{GlobalOpts, OverwriteMode, RunOpts};
use crate::logging::Logger;
use crate::resources::link::{OverwriteContext, OverwriteDecider, OverwriteDecision};
use crate::workflow::{WorkflowContext, run_workflow};

/// Asks a yes/no question for every conflicting target.
///
/// Questions are serialized so concurrent rules never interleave prompts.
/// Anything other than `y` or `yes`, including end of input, keeps the
/// existing target.
#[derive(Debug)]
pub struct Prompt<R, W> {
    io: Mutex<(R, W)>,
}

impl<R, W> Prompt<R, W> {
    /// Prompt reading answers from `reader` and writing questions to `writer`.
    #[must_use]
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }
}

impl Prompt<BufReader<io::Stdin>, io::Stdout> {
    /// Prompt on the terminal.
    #[must_use]
    pub fn terminal() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R, W> OverwriteDecider for Prompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn decide(&self, context: &OverwriteContext<'_>) -> OverwriteDecision {
        let mut guard = self
            .io
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let (reader, writer) = &mut *guard;
        let asked = write!(
            writer,
            "overwrite {} ({}) with {}? [y/N] ",
            context.target.display(),
            context.current,
            context.source.display()
        )
        .and_then(|()| writer.flush());
        let mut answer = String::new();
        if asked.is_err() || reader.read_line(&mut answer).is_err() {
            return OverwriteDecision::Skip;
        }
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => OverwriteDecision::Overwrite,
            _ => OverwriteDecision::Skip,
        }
    }
}

/// Decider implementing `mode`.
#[must_use]
pub fn overwrite_decider(mode: OverwriteMode) -> Arc<dyn OverwriteDecider> {
    match mode {
        OverwriteMode::Skip => Arc::new(|_: &OverwriteContext<'_>| OverwriteDecision::Skip),
        OverwriteMode::Always => Arc::new(|_: &OverwriteContext<'_>| OverwriteDecision::Overwrite),
        OverwriteMode::Prompt => Arc::new(Prompt::terminal()),
    }
}

/// Run the workflow for the selected rules and print the summary.
///
/// Prompting forces sequential execution so questions follow rule order.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or is invalid,
/// a requested rule does not exist, or anything failed during the run.
pub fn run(global: &GlobalOpts, opts: &RunOpts, log: &Arc<Logger>) -> Result<()> {
    log.info(&format!("linkforge {}", super::version::version()));
    let config = super::load_config(global, log.as_ref())?;
    let rules = super::select_rules(&config, &opts.only)?;

    let ctx = WorkflowContext::new(Arc::clone(log))
        .with_overwrite(overwrite_decider(opts.overwrite))
        .with_parallel(global.parallel && opts.overwrite != OverwriteMode::Prompt);
    let result = run_workflow(&rules, &ctx)?;

    log.print_summary();

    let count = result.failure_count();
    if count > 0 {
        anyhow::bail!("{count} failure(s) across {} rule(s)", result.rules.len());
    }
    Ok(())
}
