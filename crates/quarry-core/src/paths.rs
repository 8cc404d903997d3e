use std::path::{Component, Path, PathBuf};

/// Resolve a compile command's file name to an absolute path.
///
/// The file name is either already absolute or relative to the command's
/// working directory, which need not match the process working directory, so
/// plain `canonicalize` is the wrong tool here (and would also fail for files
/// that no longer exist on disk).
pub fn resolve_command_path(filename: &Path, directory: &Path) -> PathBuf {
    if filename.is_absolute() {
        normalize_dots(filename)
    } else {
        normalize_dots(&directory.join(filename))
    }
}

/// Lexically remove `.` and `..` components without touching the filesystem.
///
/// `..` at the root is dropped rather than preserved.
fn normalize_dots(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping past the root is a no-op; `PathBuf::pop` keeps the prefix.
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
