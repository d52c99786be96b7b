//! Path helpers for locating script files.

use std::env;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Returns `true` if the path exists and is a file, following symlinks.
#[must_use]
pub fn is_existing_file(path: &Path) -> bool {
    path.metadata().map(|m| m.is_file()).unwrap_or(false)
}

/// Resolve `path` to an absolute path using the current working directory.
pub(crate) fn resolve_absolute(path: &Path) -> io::Result<PathBuf> {
    let cwd = env::current_dir()?;
    Ok(resolve_against(&cwd, path))
}

/// Join `path` onto `base` (unless already absolute) and lexically
/// normalize `.` and `..` components. Symlinks are not consulted.
#[must_use]
pub(crate) fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pop past the root.
                if out.parent().is_some() {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
