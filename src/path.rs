//! Entry name handling
//!
//! Names inside an archive are relative, forward-slash separated strings.
//! Everything here is pure path computation with no I/O, so that the
//! writer's naming and the reader's extraction targets can be tested
//! directly.

use crate::error::{ArchiveError, Result};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Normalize a caller-supplied entry name.
///
/// Converts backslashes to forward slashes, strips drive letters, leading
/// slashes and `./`, and collapses `.` and empty components. Names that are
/// empty after normalization, end with a separator, or climb out with `..`
/// are rejected.
pub fn normalize_name(name: &str) -> Result<String> {
    let unified = name.replace('\\', "/");
    if unified.ends_with('/') {
        return Err(ArchiveError::InvalidArgument(format!(
            "Entry name must not end with a separator: {}",
            name
        )));
    }

    let mut parts = Vec::new();
    for part in strip_drive(&unified).split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(ArchiveError::PathError(format!(
                    "Entry name escapes the archive root: {}",
                    name
                )))
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(ArchiveError::InvalidArgument(format!(
            "Entry name is empty after normalization: {:?}",
            name
        )));
    }

    Ok(parts.join("/"))
}

/// Compute the entry name for `full_path` relative to `base_path`.
///
/// With an empty `base_path` the name is the file's base name. Otherwise the
/// base is stripped component-wise (so `tmp` strips `tmp/a.txt` but not
/// `tmpdir/a.txt`) and the remainder is joined with forward slashes.
pub fn relativize(full_path: &Path, base_path: &Path) -> Result<String> {
    if base_path.as_os_str().is_empty() {
        let file_name = full_path.file_name().ok_or_else(|| {
            ArchiveError::PathError(format!("Path has no file name: {}", full_path.display()))
        })?;
        return normalize_name(&file_name.to_string_lossy());
    }

    let full: Vec<Component> = meaningful_components(full_path);
    let base: Vec<Component> = meaningful_components(base_path);

    if full.len() <= base.len() || full[..base.len()] != base[..] {
        return Err(ArchiveError::PathError(format!(
            "{} is not inside {}",
            full_path.display(),
            base_path.display()
        )));
    }

    let mut parts = Vec::with_capacity(full.len() - base.len());
    for component in &full[base.len()..] {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy()),
            _ => {
                return Err(ArchiveError::PathError(format!(
                    "Unexpected component in {}",
                    full_path.display()
                )))
            }
        }
    }

    normalize_name(&parts.join("/"))
}

/// Render an entry name with the host's preferred separator
pub fn to_host_separators(name: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        name.to_string()
    } else {
        name.replace('/', &MAIN_SEPARATOR.to_string())
    }
}

/// Resolve an entry name to a destination under `root`.
///
/// Refuses names that are absolute, carry a drive letter, or contain `..`,
/// so extraction can never write outside `root`.
pub fn safe_join(root: &Path, name: &str) -> Result<PathBuf> {
    let unified = name.replace('\\', "/");
    if unified.starts_with('/') || strip_drive(&unified).len() != unified.len() {
        return Err(ArchiveError::PathError(format!(
            "Refusing absolute entry name: {}",
            name
        )));
    }

    let mut target = root.to_path_buf();
    let mut depth = 0;
    for part in unified.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(ArchiveError::PathError(format!(
                    "Refusing entry name that escapes the output folder: {}",
                    name
                )))
            }
            other => {
                target.push(other);
                depth += 1;
            }
        }
    }

    if depth == 0 {
        return Err(ArchiveError::PathError(format!(
            "Entry name has no path components: {:?}",
            name
        )));
    }

    Ok(target)
}

/// Drop a leading `C:` style drive prefix
fn strip_drive(name: &str) -> &str {
    let bytes = name.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        &name[2..]
    } else {
        name
    }
}

fn meaningful_components(path: &Path) -> Vec<Component<'_>> {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
