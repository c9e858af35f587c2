//! Filesystem helpers shared by the copier and the extractors.
//!
//! This module contains the concurrent directory-creation cache, the
//! first-writer-wins claim set used across archive parts, directory
//! pre-creation, and best-effort metadata application.

use super::lock;
use super::path::safe_join;
use filetime::{FileTime, set_file_times};
use std::collections::{HashMap, HashSet};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

// =============================================================================
// Directory creation
// =============================================================================

/// Concurrent set of destination directories already created.
///
/// Each directory gets one slot. The first worker to touch a directory
/// holds the slot's lock while it calls `create_dir_all`; concurrent
/// workers for the same directory block on the slot and then see the
/// result. A failed creation leaves the slot unset so a later worker
/// retries it.
#[derive(Debug, Default)]
pub(crate) struct DirCache {
    slots: Mutex<HashMap<PathBuf, Arc<Mutex<bool>>>>,
}

impl DirCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark directories that already exist, e.g. after pre-creation.
    pub(crate) fn seed<I: IntoIterator<Item = PathBuf>>(&self, dirs: I) {
        let mut slots = lock(&self.slots);
        for dir in dirs {
            slots.insert(dir, Arc::new(Mutex::new(true)));
        }
    }

    /// Make sure `dir` exists, creating it at most once across all workers.
    pub(crate) fn ensure(&self, dir: &Path) -> io::Result<()> {
        let slot = {
            let mut slots = lock(&self.slots);
            Arc::clone(slots.entry(dir.to_path_buf()).or_default())
        };
        let mut created = lock(&slot);
        if *created {
            return Ok(());
        }
        fs::create_dir_all(dir)?;
        *created = true;
        Ok(())
    }
}

/// Create `root/dir` for every relative directory in `dirs`.
///
/// Directories are created shortest first, then lexicographically. Unsafe
/// relative paths are left out; the item owning them fails on its own.
/// Returns the absolute paths created so they can be fed to
/// [`DirCache::seed`].
pub(crate) fn precreate_dirs<'a, I>(root: &Path, dirs: I) -> io::Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = &'a str>,
{
    let unique: HashSet<&str> = dirs.into_iter().filter(|d| !d.is_empty()).collect();
    let mut sorted: Vec<&str> = unique.into_iter().collect();
    sorted.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

    let mut created = Vec::with_capacity(sorted.len());
    for rel in sorted {
        let Ok(dir) = safe_join(root, rel) else {
            continue;
        };
        fs::create_dir_all(&dir)?;
        created.push(dir);
    }
    Ok(created)
}

// =============================================================================
// Claim set
// =============================================================================

/// Concurrent "insert if absent" set of relative paths.
///
/// Used by the multi-part merger: the first part to claim a path writes
/// it, every later occurrence is discarded.
#[derive(Debug, Default)]
pub(crate) struct ClaimSet {
    claimed: Mutex<HashSet<String>>,
}

impl ClaimSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Atomically claim `path`. Returns `true` only for the first caller.
    pub(crate) fn claim(&self, path: &str) -> bool {
        lock(&self.claimed).insert(path.to_string())
    }
}

// =============================================================================
// Links and replacement
// =============================================================================

#[cfg(unix)]
pub(crate) use std::os::unix::fs::symlink;

#[cfg(not(unix))]
pub(crate) fn symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "Symlinks not supported on this platform",
    ))
}

/// Run `create`, and if the path is already taken, remove whatever is
/// there and run it once more.
pub(crate) fn replace_with<F>(path: &Path, create: F) -> io::Result<()>
where
    F: Fn() -> io::Result<()>,
{
    match create() {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let meta = fs::symlink_metadata(path)?;
            remove_existing(path, &meta)?;
            create()
        }
        other => other,
    }
}

/// Remove an existing file, symlink, or empty directory at the given path
#[inline]
pub(crate) fn remove_existing(path: &Path, meta: &Metadata) -> io::Result<()> {
    let ft = meta.file_type();
    if ft.is_dir() {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Apply permission bits. A no-op on platforms without Unix modes.
#[cfg(unix)]
pub(crate) fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
pub(crate) fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Permission bits of `meta` in Unix form.
#[cfg(unix)]
pub(crate) fn mode_of(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
pub(crate) fn mode_of(meta: &Metadata) -> u32 {
    match (meta.is_dir(), meta.permissions().readonly()) {
        (true, _) => 0o755,
        (false, true) => 0o444,
        (false, false) => 0o644,
    }
}

/// Set modification and access times.
pub(crate) fn apply_times(path: &Path, mtime: FileTime, atime: FileTime) -> io::Result<()> {
    set_file_times(path, atime, mtime)
}

/// Copy mtime/atime from source metadata onto `dst`.
pub(crate) fn preserve_timestamps(src_meta: &Metadata, dst: &Path) -> io::Result<()> {
    let mtime = FileTime::from_last_modification_time(src_meta);
    let atime = FileTime::from_last_access_time(src_meta);
    set_file_times(dst, atime, mtime)
}

// =============================================================================
// Tests
// =============================================================================
