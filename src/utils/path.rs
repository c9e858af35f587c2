//! Relative path handling.
//!
//! Manifest entries and archive entry names are untrusted relative paths.
//! They are only ever joined onto a root through [`safe_join`].

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Join a relative, slash-separated path onto `root`.
///
/// Rejects empty paths and paths with `..`, root, or drive-prefix
/// components so the result always stays below `root`.
pub(crate) fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel);
    let mut has_normal = false;
    for component in rel_path.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::UnsafePath(rel.to_string()));
            }
        }
    }
    if !has_normal {
        return Err(Error::UnsafePath(rel.to_string()));
    }
    Ok(root.join(rel_path))
}

/// Fail if any existing ancestor of `rel` below `root` is a symlink.
///
/// The final component is not checked. Ancestors that do not exist yet stop
/// the scan, since nothing below them exists either.
pub(crate) fn reject_symlinked_parents(root: &Path, rel: &str) -> Result<()> {
    let Some(parent) = parent_of(rel) else {
        return Ok(());
    };
    let mut current = root.to_path_buf();
    for component in Path::new(parent).components() {
        let Component::Normal(name) = component else {
            continue;
        };
        current.push(name);
        match std::fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                return Err(Error::UnsafePath(rel.to_string()));
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }
    Ok(())
}

/// Fail unless `path` is an existing directory.
pub(crate) fn require_dir(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path).map_err(|_| Error::SourceNotFound(path.to_path_buf()))?;
    if !meta.is_dir() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }
    Ok(())
}

/// Parent directory of a normalized relative path, if it has one.
#[inline]
pub(crate) fn parent_of(rel: &str) -> Option<&str> {
    rel.rsplit_once('/').map(|(parent, _)| parent)
}
