//! Symbolic link, hard link and copy creation for one source/target pair.
//!
//! Every call walks the same steps: check the source, check the target,
//! resolve a conflict, create parents, create the link, record the result.
//! Filesystem failures are recorded in the returned
//! [`LinkingOperationResult`]; only misuse is returned as an error.
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::helpers::fs::{
    create_symlink, ensure_parent_dir, entry_exists, is_real_dir, normalize, remove_existing,
};
use crate::config::rules::{FileAction, ItemType, LinkKind, LinkOptions};
use crate::error::{DomainError, DomainErrorKind, LinkUsageError, from_io_error, io_error_code};

/// Reason recorded when an existing target is left alone.
pub const TARGET_EXISTS: &str = "target exists";

/// Reason recorded when the overwrite callback declines.
pub const OVERWRITE_DECLINED: &str = "overwrite declined";

/// Answer of an [`OverwriteDecider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteDecision {
    /// Replace the existing target.
    Overwrite,
    /// Leave the existing target untouched.
    Skip,
}

/// What the callback sees when a target already exists.
#[derive(Debug, Clone)]
pub struct OverwriteContext<'a> {
    /// Source of the pending link.
    pub source: &'a Path,
    /// The existing target.
    pub target: &'a Path,
    /// Item type being linked.
    pub item_type: ItemType,
    /// Description of what currently occupies the target.
    pub current: String,
}

/// Decides whether an existing target is replaced. Called at most once per
/// conflicting target.
pub trait OverwriteDecider: Send + Sync {
    /// Decide for one conflict.
    fn decide(&self, context: &OverwriteContext<'_>) -> OverwriteDecision;
}

impl<F> OverwriteDecider for F
where
    F: Fn(&OverwriteContext<'_>) -> OverwriteDecision + Send + Sync,
{
    fn decide(&self, context: &OverwriteContext<'_>) -> OverwriteDecision {
        self(context)
    }
}

/// Options of a single link creation.
#[derive(Clone)]
pub struct LinkCreationOptions {
    /// What to create.
    pub kind: LinkKind,
    /// Create missing ancestors of the target.
    pub create_parent_directories: bool,
    /// Record timing and conflict metadata.
    pub verbose_metadata: bool,
    /// Conflict callback; without one, existing targets are skipped.
    pub overwrite: Option<Arc<dyn OverwriteDecider>>,
}

impl fmt::Debug for LinkCreationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkCreationOptions")
            .field("kind", &self.kind)
            .field("create_parent_directories", &self.create_parent_directories)
            .field("verbose_metadata", &self.verbose_metadata)
            .field("overwrite", &self.overwrite.is_some())
            .finish()
    }
}

impl LinkCreationOptions {
    /// Options for `kind` with every flag off and no callback.
    #[must_use]
    pub const fn new(kind: LinkKind) -> Self {
        Self {
            kind,
            create_parent_directories: false,
            verbose_metadata: false,
            overwrite: None,
        }
    }

    /// Build from configured link options; `None` for an invalid
    /// item type and action combination.
    #[must_use]
    pub fn from_config(options: &LinkOptions) -> Option<Self> {
        Some(Self {
            kind: options.link_kind()?,
            create_parent_directories: options.create_parent_directories,
            verbose_metadata: options.verbose_metadata,
            overwrite: None,
        })
    }

    /// Set the conflict callback.
    #[must_use]
    pub fn with_overwrite(mut self, decider: Arc<dyn OverwriteDecider>) -> Self {
        self.overwrite = Some(decider);
        self
    }

    /// Create missing parent directories.
    #[must_use]
    pub const fn with_parents(mut self) -> Self {
        self.create_parent_directories = true;
        self
    }

    /// Record metadata on every result.
    #[must_use]
    pub const fn with_metadata(mut self) -> Self {
        self.verbose_metadata = true;
        self
    }
}

/// Whether a link or a copy was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Symbolic or hard link.
    Link,
    /// Byte copy.
    Copy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link => f.write_str("link"),
            Self::Copy => f.write_str("copy"),
        }
    }
}

/// Timing and conflict details, recorded only when requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMetadata {
    /// When the operation started.
    pub timestamp: DateTime<Utc>,
    /// Whether something already existed at the target.
    pub target_existed: bool,
    /// Whether missing parent directories were created.
    pub parent_directories_created: bool,
    /// Whether an existing target was replaced.
    pub overwrite_performed: bool,
}

/// Outcome of one link or copy attempt.
#[derive(Debug, Clone)]
pub struct LinkingOperationResult {
    /// Whether the link or copy now exists.
    pub success: bool,
    /// Source path.
    pub source_path: PathBuf,
    /// Target path.
    pub target_path: PathBuf,
    /// Link or copy.
    pub operation: Operation,
    /// Item type.
    pub item_type: ItemType,
    /// Effective action.
    pub action: FileAction,
    /// Present only with verbose metadata.
    pub metadata: Option<LinkMetadata>,
    /// The failure, if any.
    pub error: Option<DomainError>,
    /// Why nothing was done, for skipped conflicts.
    pub reason: Option<String>,
}

impl LinkingOperationResult {
    /// Whether the target was left alone because of a conflict.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        !self.success && self.error.is_none() && self.reason.is_some()
    }

    /// A failed result for a pair that was never attempted, such as one
    /// rejected by [`create_link`] as misuse.
    #[must_use]
    pub fn rejected(source: &Path, target: &Path, kind: LinkKind, error: DomainError) -> Self {
        Attempt {
            source,
            target,
            kind,
            started: None,
            target_existed: false,
            parent_directories_created: false,
            overwrite_performed: false,
        }
        .fail(error)
    }
}

/// Progress of one call, turned into a result when it ends.
struct Attempt<'a> {
    source: &'a Path,
    target: &'a Path,
    kind: LinkKind,
    started: Option<DateTime<Utc>>,
    target_existed: bool,
    parent_directories_created: bool,
    overwrite_performed: bool,
}

impl Attempt<'_> {
    fn finish(self, error: Option<DomainError>, reason: Option<&str>) -> LinkingOperationResult {
        let action = self.kind.action();
        LinkingOperationResult {
            success: error.is_none() && reason.is_none(),
            source_path: self.source.to_path_buf(),
            target_path: self.target.to_path_buf(),
            operation: if action == FileAction::Copy {
                Operation::Copy
            } else {
                Operation::Link
            },
            item_type: self.kind.item_type(),
            action,
            metadata: self.started.map(|timestamp| LinkMetadata {
                timestamp,
                target_existed: self.target_existed,
                parent_directories_created: self.parent_directories_created,
                overwrite_performed: self.overwrite_performed,
            }),
            error,
            reason: reason.map(str::to_string),
        }
    }

    fn fail(self, error: DomainError) -> LinkingOperationResult {
        self.finish(Some(error), None)
    }
}

/// Create a link or copy of `source` at `target`.
///
/// # Errors
///
/// Returns a [`LinkUsageError`] for an empty target or a target that is
/// the source itself. Every other failure is recorded in the result.
pub fn create_link(
    source: &Path,
    target: &Path,
    options: &LinkCreationOptions,
) -> Result<LinkingOperationResult, LinkUsageError> {
    if target.as_os_str().is_empty() {
        return Err(LinkUsageError::EmptyTarget);
    }
    if normalize(source) == normalize(target) {
        return Err(LinkUsageError::SameSourceAndTarget(target.to_path_buf()));
    }

    let mut attempt = Attempt {
        source,
        target,
        kind: options.kind,
        started: options.verbose_metadata.then(Utc::now),
        target_existed: false,
        parent_directories_created: false,
        overwrite_performed: false,
    };

    let source_is_dir = match std::fs::metadata(source) {
        Ok(meta) => meta.is_dir(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(attempt.fail(DomainError::new(DomainErrorKind::LinkSourceMissing, e)));
        }
        Err(e) => {
            return Ok(attempt.fail(from_io_error(e, DomainErrorKind::ExecutionAccess)));
        }
    };
    if source_is_dir
        && matches!(
            options.kind,
            LinkKind::File(FileAction::Hardlink | FileAction::Copy)
        )
    {
        return Ok(attempt.fail(DomainError::with_message(
            DomainErrorKind::Execution,
            format!(
                "cannot {} a directory: {}",
                options.kind.action(),
                source.display()
            ),
        )));
    }

    if entry_exists(target) {
        attempt.target_existed = true;
        let Some(decider) = &options.overwrite else {
            return Ok(attempt.finish(None, Some(TARGET_EXISTS)));
        };
        let context = OverwriteContext {
            source,
            target,
            item_type: options.kind.item_type(),
            current: describe_existing(target),
        };
        if decider.decide(&context) == OverwriteDecision::Skip {
            return Ok(attempt.finish(None, Some(OVERWRITE_DECLINED)));
        }
        if is_real_dir(target) {
            return Ok(attempt.fail(DomainError::with_message(
                DomainErrorKind::Execution,
                format!("refusing to replace directory {}", target.display()),
            )));
        }
        if let Err(e) = remove_existing(target) {
            return Ok(attempt.fail(from_io_error(e, DomainErrorKind::Execution)));
        }
        attempt.overwrite_performed = true;
    }

    if options.create_parent_directories {
        match ensure_parent_dir(target) {
            Ok(created) => attempt.parent_directories_created = created,
            Err(e) => return Ok(attempt.fail(creation_error(e))),
        }
    }

    let created = match options.kind {
        LinkKind::Directory | LinkKind::File(FileAction::Symlink) => {
            create_symlink(source, target, source_is_dir)
        }
        LinkKind::File(FileAction::Hardlink) => std::fs::hard_link(source, target),
        LinkKind::File(FileAction::Copy) => std::fs::copy(source, target).map(|_| ()),
    };
    if let Err(e) = created {
        return Ok(attempt.fail(creation_error(e)));
    }

    Ok(attempt.finish(None, None))
}

/// Creation failures keep the `Execution` key, except cross-device hard
/// links.
fn creation_error(err: std::io::Error) -> DomainError {
    let kind = if io_error_code(&err) == Some("EXDEV") {
        DomainErrorKind::CrossDevice
    } else {
        DomainErrorKind::Execution
    };
    DomainError::new(kind, err)
}

fn describe_existing(target: &Path) -> String {
    if let Ok(points_to) = std::fs::read_link(target) {
        return format!("symbolic link to {}", points_to.display());
    }
    if target.is_dir() {
        "directory".to_string()
    } else {
        "file".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    struct Fixture {
        _dir: tempfile::TempDir,
        source: PathBuf,
        dst: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src").join("f.txt");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, "source").unwrap();
        let dst = dir.path().join("dst");
        fs::create_dir_all(&dst).unwrap();
        Fixture {
            _dir: dir,
            source,
            dst,
        }
    }

    fn file(action: FileAction) -> LinkCreationOptions {
        LinkCreationOptions::new(LinkKind::File(action))
    }

    #[test]
    fn hardlink_to_new_target_succeeds() {
        let fx = fixture();
        let target = fx.dst.join("f.txt");
        let result = create_link(&fx.source, &target, &file(FileAction::Hardlink)).unwrap();
        assert!(result.success);
        assert_eq!(result.action, FileAction::Hardlink);
        assert_eq!(result.operation, Operation::Link);
        assert!(result.metadata.is_none());
        assert_eq!(fs::read_to_string(&target).unwrap(), "source");

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            assert_eq!(
                fs::metadata(&target).unwrap().ino(),
                fs::metadata(&fx.source).unwrap().ino()
            );
        }
    }

    #[test]
    fn second_call_without_callback_leaves_target_unchanged() {
        let fx = fixture();
        let target = fx.dst.join("f.txt");
        let options = file(FileAction::Copy);
        assert!(create_link(&fx.source, &target, &options).unwrap().success);
        fs::write(&target, "edited").unwrap();

        let second = create_link(&fx.source, &target, &options).unwrap();
        assert!(!second.success);
        assert!(second.is_skipped());
        assert_eq!(second.reason.as_deref(), Some(TARGET_EXISTS));
        assert_eq!(fs::read_to_string(&target).unwrap(), "edited");
    }

    #[cfg(unix)]
    #[test]
    fn second_symlink_call_keeps_link() {
        let fx = fixture();
        let target = fx.dst.join("f.txt");
        let options = file(FileAction::Symlink);
        assert!(create_link(&fx.source, &target, &options).unwrap().success);
        let second = create_link(&fx.source, &target, &options).unwrap();
        assert!(!second.success);
        assert_eq!(fs::read_link(&target).unwrap(), fx.source);
    }

    #[test]
    fn missing_source_is_link_source_missing() {
        let fx = fixture();
        let result = create_link(
            &fx.source.with_file_name("absent"),
            &fx.dst.join("x"),
            &file(FileAction::Symlink),
        )
        .unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.unwrap().kind(),
            DomainErrorKind::LinkSourceMissing
        );
    }

    #[test]
    fn usage_errors_are_raised() {
        let fx = fixture();
        let options = file(FileAction::Symlink);
        assert_eq!(
            create_link(&fx.source, Path::new(""), &options).unwrap_err(),
            LinkUsageError::EmptyTarget
        );
        assert!(matches!(
            create_link(&fx.source, &fx.source, &options).unwrap_err(),
            LinkUsageError::SameSourceAndTarget(_)
        ));
    }

    #[test]
    fn overwrite_callback_replaces_file() {
        let fx = fixture();
        let target = fx.dst.join("f.txt");
        fs::write(&target, "old").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let decider = move |ctx: &OverwriteContext<'_>| {
            recorder.lock().unwrap().push(ctx.current.clone());
            OverwriteDecision::Overwrite
        };
        let options = file(FileAction::Copy)
            .with_overwrite(Arc::new(decider))
            .with_metadata();

        let result = create_link(&fx.source, &target, &options).unwrap();
        assert!(result.success);
        assert_eq!(fs::read_to_string(&target).unwrap(), "source");
        assert_eq!(*seen.lock().unwrap(), ["file"]);
        let metadata = result.metadata.unwrap();
        assert!(metadata.target_existed);
        assert!(metadata.overwrite_performed);
        assert!(!metadata.parent_directories_created);
    }

    #[test]
    fn overwrite_callback_can_skip() {
        let fx = fixture();
        let target = fx.dst.join("f.txt");
        fs::write(&target, "old").unwrap();
        let options = file(FileAction::Copy)
            .with_overwrite(Arc::new(|_: &OverwriteContext<'_>| OverwriteDecision::Skip));

        let result = create_link(&fx.source, &target, &options).unwrap();
        assert!(result.is_skipped());
        assert_eq!(result.reason.as_deref(), Some(OVERWRITE_DECLINED));
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");
    }

    #[test]
    fn real_directory_target_is_never_removed() {
        let fx = fixture();
        let target = fx.dst.join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "k").unwrap();
        let overwrite = |_: &OverwriteContext<'_>| OverwriteDecision::Overwrite;
        let options = file(FileAction::Symlink).with_overwrite(Arc::new(overwrite));

        let result = create_link(&fx.source, &target, &options).unwrap();
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind(), DomainErrorKind::Execution);
        assert!(target.join("keep").exists());
    }

    #[test]
    fn missing_parent_without_flag_is_execution_failure() {
        let fx = fixture();
        let target = fx.dst.join("a").join("b").join("f.txt");
        let result = create_link(&fx.source, &target, &file(FileAction::Copy)).unwrap();
        assert!(!result.success);
        assert_eq!(result.error.unwrap().key(), "execution");
    }

    #[test]
    fn parents_are_created_when_requested() {
        let fx = fixture();
        let target = fx.dst.join("a").join("b").join("f.txt");
        let options = file(FileAction::Copy).with_parents().with_metadata();
        let result = create_link(&fx.source, &target, &options).unwrap();
        assert!(result.success);
        assert_eq!(result.operation, Operation::Copy);
        assert!(result.metadata.unwrap().parent_directories_created);
        assert!(target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn directory_is_symlinked() {
        let fx = fixture();
        let source_dir = fx.source.parent().unwrap().to_path_buf();
        let target = fx.dst.join("linked");
        let result = create_link(
            &source_dir,
            &target,
            &LinkCreationOptions::new(LinkKind::Directory),
        )
        .unwrap();
        assert!(result.success);
        assert_eq!(result.item_type, ItemType::Directory);
        assert_eq!(result.action, FileAction::Symlink);
        assert!(target.join("f.txt").exists());
    }

    #[test]
    fn directory_source_is_never_hard_linked() {
        let fx = fixture();
        let source_dir = fx.source.parent().unwrap().to_path_buf();
        let result = create_link(
            &source_dir,
            &fx.dst.join("linked"),
            &file(FileAction::Hardlink),
        )
        .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.unwrap().kind(), DomainErrorKind::Execution);
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_target_is_a_conflict() {
        let fx = fixture();
        let target = fx.dst.join("dangling");
        std::os::unix::fs::symlink("/nonexistent/linkforge", &target).unwrap();
        let result = create_link(&fx.source, &target, &file(FileAction::Symlink)).unwrap();
        assert!(result.is_skipped());
    }

    #[test]
    fn from_config_rejects_directory_copy() {
        let mut options = LinkOptions::directory();
        options.action = Some(FileAction::Copy);
        assert!(LinkCreationOptions::from_config(&options).is_none());
        let options = LinkOptions::file(FileAction::Hardlink);
        assert_eq!(
            LinkCreationOptions::from_config(&options).unwrap().kind,
            LinkKind::File(FileAction::Hardlink)
        );
    }

    #[test]
    fn cross_device_failure_maps_to_cross_device() {
        let err = creation_error(std::io::Error::from(std::io::ErrorKind::CrossesDevices));
        assert_eq!(err.kind(), DomainErrorKind::CrossDevice);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn creation_error_classifies_raw_errno() {
        assert_eq!(
            creation_error(std::io::Error::from_raw_os_error(18)).kind(),
            DomainErrorKind::CrossDevice
        );
        // EEXIST
        assert_eq!(
            creation_error(std::io::Error::from_raw_os_error(17)).kind(),
            DomainErrorKind::Execution
        );
    }
}
