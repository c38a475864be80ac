//! File-system helpers shared by discovery and the link executor.
use std::io;
use std::path::{Component, Path, PathBuf};

/// Lexically normalize `path`: drop `.` components and fold `..` into the
/// preceding component. Does not touch the filesystem or resolve links.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push(component);
                }
            }
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component);
            }
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Make `path` absolute (against the current directory) and normalize it.
///
/// On Windows the verbatim `\\?\` prefix is removed where possible.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    Ok(dunce::simplified(&normalize(&absolute)).to_path_buf())
}

/// Resolve `path` against `base` unless it is already absolute.
#[must_use]
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&base.join(path))
    }
}

/// The `/`-separated form of `path` relative to `base`, or `None` when
/// `path` is not under `base`.
#[must_use]
pub fn relative_slash(path: &Path, base: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(parts.join("/"))
}

/// Whether anything (including a dangling symlink) exists at `path`.
#[must_use]
pub fn entry_exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// Whether `path` is a real directory rather than a link to one.
#[must_use]
pub fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|meta| meta.is_dir() && !meta.is_symlink())
}

/// Create the missing ancestors of `path`.
///
/// Returns whether the parent directory had to be created.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> io::Result<bool> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Remove the file or link at `path`, including broken symlinks.
///
/// Directory links are removed with `remove_dir` where the platform
/// requires it. Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> io::Result<()> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if is_dir_like(&meta) {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    }
}

/// Create a symbolic link at `link` pointing to `source`.
///
/// # Errors
///
/// Returns the OS error if the link cannot be created.
pub fn create_symlink(source: &Path, link: &Path, is_dir: bool) -> io::Result<()> {
    #[cfg(unix)]
    {
        let _ = is_dir;
        std::os::unix::fs::symlink(source, link)
    }

    #[cfg(windows)]
    {
        if is_dir {
            std::os::windows::fs::symlink_dir(source, link)
        } else {
            std::os::windows::fs::symlink_file(source, link)
        }
    }
}

/// On Windows `symlink_metadata().is_dir()` is `false` for directory links,
/// so the raw `FILE_ATTRIBUTE_DIRECTORY` bit is checked instead.
fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}
