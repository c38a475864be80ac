//! Domain error taxonomy for the linkforge engine.
//!
//! Discovery, linking, attribute and command failures are reported as
//! [`DomainError`] values: a stable [`DomainErrorKind`] (with a `key` suitable
//! for programmatic handling) plus the original cause.  They travel inside
//! result records and never abort a workflow run.
//!
//! Configuration problems detected before any rule executes are reported as
//! [`ConfigError`]; command handlers at the CLI boundary convert them to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! ```text
//! DomainError { kind, cause }   per item or per command, captured in results
//! ConfigError                   loading and shape validation, raised
//! LinkUsageError                misuse of `create_link`, raised
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Closed set of domain error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainErrorKind {
    /// Generic execution failure.
    Execution,
    /// A path needed by the operation could not be accessed.
    ExecutionAccess,
    /// The `skipIfPathExists` precondition could not be evaluated.
    ExecutionAccessPathExistsCheck,
    /// The operation was denied by the operating system.
    ExecutionPermission,
    /// The operation exceeded its time budget.
    ExecutionTimeout,
    /// A discovery input (base directory, ignore-rules file) could not be read.
    DiscoveryAccess,
    /// A regex or glob pattern failed to compile.
    InvalidPattern,
    /// The link source does not exist.
    LinkSourceMissing,
    /// A hard link was requested across filesystems.
    CrossDevice,
}

/// Static description attached to every [`DomainErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainErrorInfo {
    /// Stable identifier for programmatic handling.
    pub key: &'static str,
    /// Short human-readable summary.
    pub message: &'static str,
    /// Longer explanation of what usually causes the error.
    pub description: &'static str,
}

impl DomainErrorKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Execution,
        Self::ExecutionAccess,
        Self::ExecutionAccessPathExistsCheck,
        Self::ExecutionPermission,
        Self::ExecutionTimeout,
        Self::DiscoveryAccess,
        Self::InvalidPattern,
        Self::LinkSourceMissing,
        Self::CrossDevice,
    ];

    /// Return the key, message and description for this kind.
    #[must_use]
    pub const fn info(self) -> DomainErrorInfo {
        match self {
            Self::Execution => DomainErrorInfo {
                key: "execution",
                message: "Execution failed",
                description: "The operation could not be completed.",
            },
            Self::ExecutionAccess => DomainErrorInfo {
                key: "execution-access",
                message: "Path not accessible",
                description: "A file or directory required by the operation does not exist or is of the wrong type.",
            },
            Self::ExecutionAccessPathExistsCheck => DomainErrorInfo {
                key: "execution-access-path-exists-check",
                message: "Path existence check failed",
                description: "The skip-if-path-exists precondition could not be evaluated.",
            },
            Self::ExecutionPermission => DomainErrorInfo {
                key: "execution-permission",
                message: "Permission denied",
                description: "The operating system refused the operation for the current user.",
            },
            Self::ExecutionTimeout => DomainErrorInfo {
                key: "execution-timeout",
                message: "Execution timed out",
                description: "The operation did not finish within its time limit and was terminated.",
            },
            Self::DiscoveryAccess => DomainErrorInfo {
                key: "discovery-access",
                message: "Discovery input not accessible",
                description: "The base directory or an ignore-rules file could not be read.",
            },
            Self::InvalidPattern => DomainErrorInfo {
                key: "invalid-pattern",
                message: "Invalid search pattern",
                description: "A regular expression or glob pattern could not be compiled.",
            },
            Self::LinkSourceMissing => DomainErrorInfo {
                key: "link-source-missing",
                message: "Link source missing",
                description: "The file or directory to link does not exist.",
            },
            Self::CrossDevice => DomainErrorInfo {
                key: "cross-device",
                message: "Cross-device link",
                description: "Hard links cannot span filesystems; use a symbolic link or a copy instead.",
            },
        }
    }

    /// Stable key for this kind.
    #[must_use]
    pub const fn key(self) -> &'static str {
        self.info().key
    }

    /// Short message for this kind.
    #[must_use]
    pub const fn message(self) -> &'static str {
        self.info().message
    }
}

impl fmt::Display for DomainErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Shared, thread-safe error cause.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// A low-level failure described by an optional system error code
/// (e.g. `"ENOENT"`) and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemError {
    /// Symbolic error code, when one is known.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: String,
}

impl SystemError {
    /// Create a system error with a code.
    #[must_use]
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Create a system error carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// The synthesized cause used when nothing better is known.
    #[must_use]
    pub fn unknown() -> Self {
        Self::message("Unknown error")
    }
}

impl fmt::Display for SystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SystemError {}

/// A taxonomy-keyed error that always carries its original cause.
#[derive(Debug, Clone)]
pub struct DomainError {
    kind: DomainErrorKind,
    cause: Cause,
}

impl DomainError {
    /// Wrap `cause` under `kind`.
    pub fn new<E>(kind: DomainErrorKind, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind,
            cause: Arc::new(cause),
        }
    }

    /// Create an error whose cause is a plain message.
    #[must_use]
    pub fn with_message(kind: DomainErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, SystemError::message(message))
    }

    /// Create an error whose cause is the synthesized "Unknown error".
    #[must_use]
    pub fn unknown(kind: DomainErrorKind) -> Self {
        Self::new(kind, SystemError::unknown())
    }

    /// The error kind.
    #[must_use]
    pub const fn kind(&self) -> DomainErrorKind {
        self.kind
    }

    /// The stable key of the error kind.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.kind.key()
    }

    /// Key, message and description of the error kind.
    #[must_use]
    pub const fn info(&self) -> DomainErrorInfo {
        self.kind.info()
    }

    /// The original cause.
    #[must_use]
    pub fn cause(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.cause.as_ref()
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.message(), self.cause)
    }
}

impl std::error::Error for DomainError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Map a symbolic system error code to a domain kind.
///
/// Returns `None` for codes without a dedicated mapping.
#[must_use]
pub fn kind_for_code(code: &str) -> Option<DomainErrorKind> {
    match code {
        "ENOENT" | "EISDIR" => Some(DomainErrorKind::ExecutionAccess),
        "EACCES" | "EPERM" => Some(DomainErrorKind::ExecutionPermission),
        "ETIME" | "ETIMEDOUT" | "ENOTDIR" => Some(DomainErrorKind::ExecutionTimeout),
        _ => None,
    }
}

/// Derive the symbolic code of an [`io::Error`].
///
/// Raw OS numbers are consulted first (on Unix) so `EPERM` and `EACCES`
/// stay distinguishable; the portable [`io::ErrorKind`] is the fallback.
#[must_use]
pub fn io_error_code(err: &io::Error) -> Option<&'static str> {
    #[cfg(unix)]
    {
        if let Some(code) = err.raw_os_error().and_then(unix_errno_code) {
            return Some(code);
        }
    }
    match err.kind() {
        io::ErrorKind::NotFound => Some("ENOENT"),
        io::ErrorKind::PermissionDenied => Some("EACCES"),
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::NotADirectory => Some("ENOTDIR"),
        io::ErrorKind::IsADirectory => Some("EISDIR"),
        io::ErrorKind::CrossesDevices => Some("EXDEV"),
        _ => None,
    }
}

/// Symbolic name of a raw Unix errno, for the codes the engine cares about.
#[cfg(unix)]
const fn unix_errno_code(raw: i32) -> Option<&'static str> {
    match raw {
        1 => Some("EPERM"),
        2 => Some("ENOENT"),
        13 => Some("EACCES"),
        18 => Some("EXDEV"),
        20 => Some("ENOTDIR"),
        21 => Some("EISDIR"),
        #[cfg(target_os = "linux")]
        62 => Some("ETIME"),
        #[cfg(target_os = "linux")]
        110 => Some("ETIMEDOUT"),
        #[cfg(target_os = "macos")]
        60 => Some("ETIMEDOUT"),
        _ => None,
    }
}

/// Classify an execution failure into a [`DomainError`].
///
/// The code of the cause (an [`io::Error`] or a [`SystemError`]) decides the
/// kind; a message mentioning "timeout" always maps to
/// [`DomainErrorKind::ExecutionTimeout`]; everything else falls back to
/// `default_kind`.  The cause is preserved unchanged.
#[must_use]
pub fn create_execution_error(cause: Cause, default_kind: DomainErrorKind) -> DomainError {
    let code = if let Some(io_err) = cause.downcast_ref::<io::Error>() {
        io_error_code(io_err).map(str::to_string)
    } else if let Some(sys) = cause.downcast_ref::<SystemError>() {
        sys.code.clone()
    } else {
        None
    };

    let kind = code
        .as_deref()
        .and_then(kind_for_code)
        .or_else(|| {
            cause
                .to_string()
                .to_lowercase()
                .contains("timeout")
                .then_some(DomainErrorKind::ExecutionTimeout)
        })
        .unwrap_or(default_kind);

    DomainError { kind, cause }
}

/// Classify an [`io::Error`]; shorthand for [`create_execution_error`].
#[must_use]
pub fn from_io_error(err: io::Error, default_kind: DomainErrorKind) -> DomainError {
    create_execution_error(Arc::new(err), default_kind)
}

/// Errors that arise from configuration loading and shape validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The configuration file is not valid TOML or does not match the schema.
    #[error("Invalid config file {path}: {source}")]
    Parse {
        /// Path to the file that failed to parse.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A rule is malformed.
    #[error("Invalid rule '{rule}': {message}")]
    InvalidRule {
        /// Name of the offending rule.
        rule: String,
        /// Human-readable reason.
        message: String,
    },
}

/// Misuse of [`create_link`](crate::resources::link::create_link).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkUsageError {
    /// The target path is empty.
    #[error("target path is empty")]
    EmptyTarget,

    /// Source and target resolve to the same path.
    #[error("source and target are the same path: {0}")]
    SameSourceAndTarget(PathBuf),
}
