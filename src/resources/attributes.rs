//! Permission adjustment of created paths.
use std::path::{Path, PathBuf};

use super::{Resource, ResourceChange, ResourceState};
use crate::config::rules::Attributes;
use crate::error::{DomainError, DomainErrorKind, from_io_error};

/// Owner, group and other write bits.
#[cfg(unix)]
const WRITE_BITS: u32 = 0o222;

/// Owner write bit.
#[cfg(unix)]
const OWNER_WRITE: u32 = 0o200;

/// Desired attributes of one path.
#[derive(Debug, Clone)]
pub struct AttributesResource {
    /// Path whose permissions are adjusted.
    pub path: PathBuf,
    /// Attributes to apply.
    pub attributes: Attributes,
}

impl AttributesResource {
    /// Create a new attributes resource.
    #[must_use]
    pub const fn new(path: PathBuf, attributes: Attributes) -> Self {
        Self { path, attributes }
    }

    fn metadata(&self) -> Result<std::fs::Metadata, DomainError> {
        std::fs::symlink_metadata(&self.path)
            .map_err(|e| from_io_error(e, DomainErrorKind::ExecutionAccess))
    }

    /// Compute the desired permission bits from the current ones.
    #[cfg(unix)]
    fn desired_mode(&self, current: u32) -> Result<u32, DomainError> {
        let mut mode = match &self.attributes.mode {
            Some(text) => u32::from_str_radix(text, 8)
                .map_err(|e| DomainError::new(DomainErrorKind::Execution, e))?,
            None => current,
        };
        match self.attributes.readonly {
            Some(true) => mode &= !WRITE_BITS,
            Some(false) => mode |= OWNER_WRITE,
            None => {}
        }
        Ok(mode & 0o7777)
    }
}

impl Resource for AttributesResource {
    fn description(&self) -> String {
        let mut parts = Vec::new();
        if let Some(mode) = &self.attributes.mode {
            parts.push(format!("mode {mode}"));
        }
        if let Some(readonly) = self.attributes.readonly {
            parts.push(if readonly { "readonly" } else { "writable" }.to_string());
        }
        format!("{} {}", parts.join(", "), self.path.display())
    }

    fn current_state(&self) -> Result<ResourceState, DomainError> {
        let meta = self.metadata()?;
        if meta.is_symlink() {
            return Ok(ResourceState::Invalid {
                reason: "symbolic link".to_string(),
            });
        }
        if self.attributes.is_empty() {
            return Ok(ResourceState::Correct);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let current = meta.permissions().mode() & 0o7777;
            if current == self.desired_mode(current)? {
                Ok(ResourceState::Correct)
            } else {
                Ok(ResourceState::Incorrect {
                    current: format!("{current:o}"),
                })
            }
        }

        #[cfg(not(unix))]
        {
            match self.attributes.readonly {
                Some(readonly) if meta.permissions().readonly() != readonly => {
                    Ok(ResourceState::Incorrect {
                        current: format!("readonly={}", meta.permissions().readonly()),
                    })
                }
                _ => Ok(ResourceState::Correct),
            }
        }
    }

    fn apply(&self) -> Result<ResourceChange, DomainError> {
        let meta = self.metadata()?;

        #[cfg(unix)]
        let permissions = {
            use std::os::unix::fs::PermissionsExt;
            let current = meta.permissions().mode() & 0o7777;
            std::fs::Permissions::from_mode(self.desired_mode(current)?)
        };

        #[cfg(not(unix))]
        let permissions = {
            let mut permissions = meta.permissions();
            if let Some(readonly) = self.attributes.readonly {
                permissions.set_readonly(readonly);
            }
            permissions
        };

        std::fs::set_permissions(&self.path, permissions)
            .map_err(|e| from_io_error(e, DomainErrorKind::ExecutionPermission))?;
        Ok(ResourceChange::Applied)
    }
}

/// Apply `attributes` to `path`.
///
/// Re-applying the same attributes is a no-op returning
/// [`ResourceChange::AlreadyCorrect`]. Symbolic links are never adjusted
/// because permission changes would follow the link to its source.
///
/// # Errors
///
/// Returns `ExecutionAccess` when `path` does not exist and
/// `ExecutionPermission` when permissions cannot be changed.
pub fn adjust_attributes(
    path: &Path,
    attributes: &Attributes,
) -> Result<ResourceChange, DomainError> {
    AttributesResource::new(path.to_path_buf(), attributes.clone()).reconcile()
}
