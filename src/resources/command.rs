//! Post-execution commands run once per rule.
use std::path::Path;
use std::time::Duration;

use crate::config::rules::PostExecutionCommand;
use crate::error::{DomainError, DomainErrorKind};
use crate::exec::{Executor, ProcessSpec, shell_invocation, split_words};
use crate::resources::helpers::fs::resolve_against;

/// Outcome of one post-command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutcome {
    /// Whether the command succeeded or was skipped.
    pub success: bool,
    /// Whether the skip precondition short-circuited execution.
    pub skipped: bool,
    /// The failure, if any.
    pub error: Option<DomainError>,
    /// Exit code, when the process ran to completion.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutcome {
    fn skipped() -> Self {
        Self {
            success: true,
            skipped: true,
            ..Self::default()
        }
    }

    fn failed(error: DomainError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Resolve `command` into a process description. Relative `cwd` values
/// resolve against `target_dir`, which is also the default.
///
/// # Errors
///
/// Returns an `Execution` error when a non-shell command line is empty
/// or cannot be split.
pub fn build_spec(
    command: &PostExecutionCommand,
    target_dir: &Path,
) -> Result<ProcessSpec, DomainError> {
    let (program, args) = if command.shell {
        shell_invocation(&command.command)
    } else {
        let mut words = split_words(&command.command)?.into_iter();
        let program = words.next().ok_or_else(|| {
            DomainError::with_message(DomainErrorKind::Execution, "command is empty")
        })?;
        (program, words.collect())
    };
    let cwd = command.cwd.as_ref().map_or_else(
        || target_dir.to_path_buf(),
        |cwd| resolve_against(target_dir, cwd),
    );
    Ok(ProcessSpec {
        program,
        args,
        cwd,
        env: command.env.clone(),
        timeout: Duration::from_millis(command.timeout_in_ms),
    })
}

/// Run `command` for a rule whose links live under `target_dir`.
///
/// When `skipIfPathExists` names an existing path the executor is never
/// invoked and the outcome is a skipped success. Failures are recorded in
/// the outcome rather than returned.
pub fn execute_command(
    command: &PostExecutionCommand,
    target_dir: &Path,
    executor: &dyn Executor,
) -> CommandOutcome {
    if let Some(skip_path) = &command.skip_if_path_exists {
        let resolved = resolve_against(target_dir, skip_path);
        match resolved.try_exists() {
            Ok(true) => {
                tracing::debug!(
                    "skipping '{}': {} exists",
                    command.command,
                    resolved.display()
                );
                return CommandOutcome::skipped();
            }
            Ok(false) => {}
            Err(e) => {
                return CommandOutcome::failed(DomainError::new(
                    DomainErrorKind::ExecutionAccessPathExistsCheck,
                    e,
                ));
            }
        }
    }

    let spec = match build_spec(command, target_dir) {
        Ok(spec) => spec,
        Err(e) => return CommandOutcome::failed(e),
    };
    tracing::debug!("running '{}' in {}", spec.display(), spec.cwd.display());

    match executor.run(&spec) {
        Ok(result) if result.success => CommandOutcome {
            success: true,
            skipped: false,
            error: None,
            exit_code: result.code,
            stdout: result.stdout,
            stderr: result.stderr,
        },
        Ok(result) => {
            let code = result
                .code
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            let error = DomainError::with_message(
                DomainErrorKind::Execution,
                format!(
                    "'{}' exited with {code}: {}",
                    command.command,
                    result.stderr.trim()
                ),
            );
            CommandOutcome {
                success: false,
                skipped: false,
                error: Some(error),
                exit_code: result.code,
                stdout: result.stdout,
                stderr: result.stderr,
            }
        }
        Err(e) => CommandOutcome::failed(e),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::SystemError;
    use crate::exec::{ExecResult, MockExecutor};
    use std::path::PathBuf;

    fn ok_result(stdout: &str) -> ExecResult {
        ExecResult {
            stdout: stdout.to_string(),
            stderr: String::new(),
            success: true,
            code: Some(0),
        }
    }

    #[test]
    fn existing_skip_path_never_invokes_executor() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        let mut command = PostExecutionCommand::new("npm install");
        command.skip_if_path_exists = Some(PathBuf::from("node_modules"));

        let mut executor = MockExecutor::new();
        executor.expect_run().never();

        let outcome = execute_command(&command, dir.path(), &executor);
        assert!(outcome.success);
        assert!(outcome.skipped);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn absent_skip_path_runs_once_in_target_dir() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().to_path_buf();
        let mut command = PostExecutionCommand::new("make all");
        command.skip_if_path_exists = Some(PathBuf::from("built.marker"));

        let expected_cwd = target.clone();
        let mut executor = MockExecutor::new();
        executor
            .expect_run()
            .withf(move |spec| {
                spec.cwd == expected_cwd && spec.args.last().is_some_and(|a| a == "make all")
            })
            .times(1)
            .returning(|_| Ok(ok_result("done")));

        let outcome = execute_command(&command, &target, &executor);
        assert!(outcome.success);
        assert!(!outcome.skipped);
        assert_eq!(outcome.stdout, "done");
    }

    #[test]
    fn failing_existence_check_is_path_exists_check_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), "x").unwrap();
        let mut command = PostExecutionCommand::new("true");
        command.skip_if_path_exists = Some(PathBuf::from("file/child"));

        let mut executor = MockExecutor::new();
        executor.expect_run().never();

        let outcome = execute_command(&command, dir.path(), &executor);
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.unwrap().kind(),
            DomainErrorKind::ExecutionAccessPathExistsCheck
        );
    }

    #[test]
    fn non_zero_exit_is_execution_with_stderr() {
        let mut executor = MockExecutor::new();
        executor.expect_run().returning(|_| {
            Ok(ExecResult {
                stdout: String::new(),
                stderr: "boom\n".to_string(),
                success: false,
                code: Some(2),
            })
        });

        let outcome = execute_command(&PostExecutionCommand::new("x"), Path::new("/t"), &executor);
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(2));
        let error = outcome.error.unwrap();
        assert_eq!(error.kind(), DomainErrorKind::Execution);
        assert!(error.to_string().contains("boom"));
    }

    #[test]
    fn executor_errors_are_recorded() {
        let mut executor = MockExecutor::new();
        executor.expect_run().returning(|_| {
            Err(crate::error::create_execution_error(
                std::sync::Arc::new(SystemError::with_code("ETIMEDOUT", "timed out")),
                DomainErrorKind::Execution,
            ))
        });
        let outcome = execute_command(&PostExecutionCommand::new("x"), Path::new("/t"), &executor);
        assert_eq!(
            outcome.error.unwrap().kind(),
            DomainErrorKind::ExecutionTimeout
        );
    }

    #[test]
    fn non_shell_command_is_split_into_words() {
        let mut command = PostExecutionCommand::new(r#"git commit -m "two words""#);
        command.shell = false;
        command.cwd = Some(PathBuf::from("sub"));
        command.timeout_in_ms = 1500;
        command.env.insert("CI".to_string(), "1".to_string());

        let spec = build_spec(&command, Path::new("/target")).unwrap();
        assert_eq!(spec.program, "git");
        assert_eq!(spec.args, ["commit", "-m", "two words"]);
        assert_eq!(spec.cwd, PathBuf::from("/target/sub"));
        assert_eq!(spec.timeout, Duration::from_millis(1500));
        assert_eq!(spec.env.get("CI").map(String::as_str), Some("1"));
    }

    #[test]
    fn shell_command_defaults_cwd_to_target() {
        let spec = build_spec(
            &PostExecutionCommand::new("echo $HOME"),
            Path::new("/target"),
        )
        .unwrap();
        assert_eq!(spec.cwd, PathBuf::from("/target"));
        assert_eq!(spec.args.last().map(String::as_str), Some("echo $HOME"));
    }

    #[test]
    fn empty_non_shell_command_is_rejected() {
        let mut command = PostExecutionCommand::new("   ");
        command.shell = false;
        assert!(build_spec(&command, Path::new("/t")).is_err());
    }
}
