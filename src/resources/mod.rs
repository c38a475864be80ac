//! Filesystem and process primitives applied per discovered item and per
//! rule: link/copy creation, attribute adjustment, post-commands.
pub mod attributes;
pub mod command;
pub mod helpers;
pub mod link;

use crate::error::DomainError;

/// State of a resource relative to its desired configuration.
///
/// # Examples
///
/// ```
/// use linkforge::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let wrong = ResourceState::Incorrect { current: "644".into() };
///
/// assert_ne!(missing, ResourceState::Correct);
/// assert_eq!(wrong, ResourceState::Incorrect { current: "644".into() });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Resource exists but does not match.
    Incorrect {
        /// Description of the current value.
        current: String,
    },
    /// Resource cannot be applied (e.g. a symbolic link whose permissions
    /// would change the link's source).
    Invalid {
        /// Reason why the resource cannot be applied.
        reason: String,
    },
}

/// Result of applying a resource change.
///
/// # Examples
///
/// ```
/// use linkforge::resources::ResourceChange;
///
/// let applied = ResourceChange::Applied;
/// let skipped = ResourceChange::Skipped { reason: "symbolic link".into() };
///
/// assert_ne!(applied, ResourceChange::AlreadyCorrect);
/// assert!(matches!(skipped, ResourceChange::Skipped { .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created or updated.
    Applied,
    /// Resource was already correct (no change needed).
    AlreadyCorrect,
    /// Resource was skipped.
    Skipped {
        /// Reason why the resource was skipped.
        reason: String,
    },
}

impl std::fmt::Display for ResourceChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => f.write_str("applied"),
            Self::AlreadyCorrect => f.write_str("already correct"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
        }
    }
}

/// Check-then-apply interface for resources that can determine their own
/// state.
pub trait Resource {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Check the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined.
    fn current_state(&self) -> Result<ResourceState, DomainError>;

    /// Apply the change unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be applied.
    fn apply(&self) -> Result<ResourceChange, DomainError>;

    /// Apply only when the current state differs from the desired one.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`current_state`](Self::current_state) and
    /// [`apply`](Self::apply).
    fn reconcile(&self) -> Result<ResourceChange, DomainError> {
        match self.current_state()? {
            ResourceState::Correct => Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Invalid { reason } => Ok(ResourceChange::Skipped { reason }),
            ResourceState::Missing | ResourceState::Incorrect { .. } => self.apply(),
        }
    }
}
