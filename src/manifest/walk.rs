//! Manifest generation by walking a directory tree.

use super::Manifest;
use crate::error::Result;
use crate::utils::path::require_dir;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Walk `root` and return a manifest of every regular file reachable from it.
///
/// Symbolic links are followed. Each node is resolved to its real path and
/// skipped if that real path was already visited, so symlink cycles end the
/// walk instead of looping, and a file reachable through several links is
/// listed once. Unreadable entries and broken links are skipped silently.
///
/// Children are visited in name order, so a static tree always yields the
/// same manifest.
///
/// # Errors
///
/// Returns [`Error::SourceNotFound`](crate::Error::SourceNotFound) or
/// [`Error::NotADirectory`](crate::Error::NotADirectory) if `root`
/// is not an existing directory. Nothing below the root is fatal.
///
/// # Example
///
/// ```no_run
/// let manifest = partar::generate("project".as_ref())?;
/// println!("{} files", manifest.len());
/// # Ok::<(), partar::Error>(())
/// ```
pub fn generate(root: &Path) -> Result<Manifest> {
    require_dir(root)?;

    let mut walker = Walker {
        visited: HashSet::new(),
        manifest: Manifest::new(),
    };
    let real_root = real_path(root).unwrap_or_else(|| root.to_path_buf());
    walker.visited.insert(real_root);
    walker.descend(root, "");
    Ok(walker.manifest)
}

struct Walker {
    visited: HashSet<PathBuf>,
    manifest: Manifest,
}

impl Walker {
    fn descend(&mut self, dir: &Path, rel: &str) {
        let Ok(read_dir) = fs::read_dir(dir) else {
            return;
        };
        let mut names: Vec<_> = read_dir
            .filter_map(|entry| entry.ok().map(|e| e.file_name()))
            .collect();
        names.sort();

        for name in names {
            let Some(name) = name.to_str().map(str::to_owned) else {
                // Manifest lines are UTF-8 only
                continue;
            };
            let path = dir.join(&name);
            let Some(real) = real_path(&path) else {
                continue;
            };
            if !self.visited.insert(real) {
                continue;
            }
            let Ok(meta) = fs::metadata(&path) else {
                continue;
            };

            let child_rel = if rel.is_empty() {
                name
            } else {
                format!("{rel}/{name}")
            };
            if meta.is_dir() {
                self.descend(&path, &child_rel);
            } else if meta.is_file() {
                self.manifest.push(&child_rel);
            }
        }
    }
}

fn real_path(path: &Path) -> Option<PathBuf> {
    fs::canonicalize(path).ok()
}
