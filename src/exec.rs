//! Child process execution with a hard timeout.
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::error::{DomainError, DomainErrorKind, SystemError, create_execution_error};

/// Upper bound on the sleep between exit-status polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Fully resolved description of a process to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed verbatim.
    pub args: Vec<String>,
    /// Working directory.
    pub cwd: PathBuf,
    /// Variables set on top of the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Hard timeout after which the child is killed.
    pub timeout: Duration,
}

impl ProcessSpec {
    /// Human-readable command line for logs.
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
}

/// Runs processes. Abstracted so command handling can be tested without
/// spawning anything.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    /// Run `spec` to completion or until its timeout.
    ///
    /// A non-zero exit is reported through [`ExecResult::success`], not as
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns a domain error when the process cannot be spawned or is
    /// killed on timeout.
    fn run(&self, spec: &ProcessSpec) -> Result<ExecResult, DomainError>;
}

/// [`Executor`] backed by [`std::process::Command`].
///
/// On Unix the child leads its own process group, so a timeout kills
/// anything it started in the background as well. Output collection shares
/// the same deadline: a background job that keeps the pipes open past it
/// counts as a timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, spec: &ProcessSpec) -> Result<ExecResult, DomainError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .map_err(|e| create_execution_error(Arc::new(e), DomainErrorKind::Execution))?;

        // Drain both pipes concurrently so a chatty child cannot block on a
        // full pipe while we poll for its exit.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + spec.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    kill_tree(&mut child);
                    return Err(create_execution_error(
                        Arc::new(e),
                        DomainErrorKind::Execution,
                    ));
                }
            }
            let now = Instant::now();
            if now >= deadline {
                kill_tree(&mut child);
                return Err(timeout_error(spec));
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        };

        match (collect(stdout, deadline), collect(stderr, deadline)) {
            (Some(stdout), Some(stderr)) => Ok(ExecResult {
                stdout,
                stderr,
                success: status.success(),
                code: status.code(),
            }),
            _ => {
                kill_tree(&mut child);
                Err(timeout_error(spec))
            }
        }
    }
}

fn timeout_error(spec: &ProcessSpec) -> DomainError {
    tracing::debug!("killed '{}' after {:?}", spec.display(), spec.timeout);
    create_execution_error(
        Arc::new(SystemError::with_code(
            "ETIMEDOUT",
            format!(
                "'{}' timed out after {} ms",
                spec.display(),
                spec.timeout.as_millis()
            ),
        )),
        DomainErrorKind::Execution,
    )
}

/// Kill the child together with everything it spawned.
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        if let Ok(pid) = i32::try_from(child.id())
            && let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL)
        {
            tracing::debug!("failed to kill process group {pid}: {e}");
        }
    }
    #[cfg(windows)]
    {
        let _ = Command::new("taskkill")
            .args(["/pid", &child.id().to_string(), "/f", "/t"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: std::io::Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

/// Wait for a drained pipe until `deadline`. `None` means the pipe was
/// still open when the deadline passed.
fn collect(pipe: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<String> {
    let Some(rx) = pipe else {
        return Some(String::new());
    };
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

/// Split a command line into words.
///
/// Single quotes preserve everything literally; double quotes allow `\"`
/// and `\\` escapes; outside quotes a backslash escapes the next character.
/// No variable or glob expansion takes place.
///
/// # Errors
///
/// Returns an `Execution` error for an unterminated quote or a trailing
/// backslash.
pub fn split_words(line: &str) -> Result<Vec<String>, DomainError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (Quote::None, '\'') => {
                quote = Quote::Single;
                in_word = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                in_word = true;
            }
            (Quote::None, '\\') => {
                let escaped = chars.next().ok_or_else(|| {
                    DomainError::with_message(DomainErrorKind::Execution, "trailing backslash")
                })?;
                current.push(escaped);
                in_word = true;
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::Double, '\\') => match chars.next() {
                Some(escaped @ ('"' | '\\')) => current.push(escaped),
                Some(other) => {
                    current.push('\\');
                    current.push(other);
                }
                None => break,
            },
            (_, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote != Quote::None {
        return Err(DomainError::with_message(
            DomainErrorKind::Execution,
            format!("unterminated quote in command: {line}"),
        ));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Program and arguments that run `line` through the platform shell.
#[must_use]
pub fn shell_invocation(line: &str) -> (String, Vec<String>) {
    if cfg!(target_os = "windows") {
        ("cmd".to_string(), vec!["/C".to_string(), line.to_string()])
    } else {
        ("sh".to_string(), vec!["-c".to_string(), line.to_string()])
    }
}
