//! Archive entry metadata and materialization.
//!
//! Shared by the two-phase extractor (content buffered in memory) and the
//! streaming multi-part merger (content read straight from the tar entry).

use super::READ_BUFFER_SIZE;
use crate::error::{Error, Result};
use crate::manifest::normalize_entry;
use crate::options::JobOptions;
use crate::utils::fs::{DirCache, apply_mode, apply_times, replace_with, symlink};
use crate::utils::path::{reject_symlinked_parents, safe_join};
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tar::{Entry, EntryType};

/// What an archive entry materializes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    Regular,
    Directory,
    Symlink,
    Hardlink,
    /// Any other tar type flag
    Other(char),
}

/// Header fields needed to recreate an entry.
#[derive(Debug, Clone)]
pub(crate) struct EntryMeta {
    pub(crate) kind: EntryKind,
    pub(crate) mode: u32,
    pub(crate) mtime: u64,
    pub(crate) atime: Option<u64>,
    pub(crate) link_target: Option<PathBuf>,
    pub(crate) size: u64,
}

impl EntryMeta {
    /// Read the header of a tar entry. Returns the normalized entry name too.
    pub(crate) fn from_entry<R: Read>(entry: &Entry<'_, R>) -> io::Result<(String, Self)> {
        let rel = normalize_entry(&entry.path()?.to_string_lossy());
        let header = entry.header();
        let kind = match header.entry_type() {
            EntryType::Regular | EntryType::Continuous => EntryKind::Regular,
            EntryType::Directory => EntryKind::Directory,
            EntryType::Symlink => EntryKind::Symlink,
            EntryType::Link => EntryKind::Hardlink,
            other => EntryKind::Other(char::from(other.as_byte())),
        };
        let link_target = match kind {
            EntryKind::Symlink | EntryKind::Hardlink => {
                entry.link_name()?.map(|name| name.into_owned())
            }
            _ => None,
        };
        let meta = Self {
            kind,
            mode: header.mode().unwrap_or(0o644),
            mtime: header.mtime().unwrap_or(0),
            atime: header.as_gnu().and_then(|gnu| gnu.atime().ok()),
            link_target,
            size: entry.size(),
        };
        Ok((rel, meta))
    }
}

/// Write one entry below `dest_root`.
///
/// Parent directories go through `dirs` so each is created once. An entry
/// whose existing parent is a symlink is refused with [`Error::UnsafePath`]. Mode and
/// timestamps are applied best-effort: failures become warnings. Returns
/// the number of content bytes written.
pub(crate) fn materialize<R: Read>(
    dest_root: &Path,
    rel: &str,
    meta: &EntryMeta,
    content: R,
    dirs: &DirCache,
    options: &JobOptions,
) -> Result<u64> {
    let target = safe_join(dest_root, rel)?;
    reject_symlinked_parents(dest_root, rel)?;

    if meta.kind == EntryKind::Directory {
        dirs.ensure(&target)?;
        apply_metadata(&target, meta, options);
        return Ok(0);
    }

    if let Some(parent) = target.parent() {
        dirs.ensure(parent)?;
    }

    match meta.kind {
        EntryKind::Regular => {
            let bytes = write_regular(&target, content)?;
            apply_metadata(&target, meta, options);
            Ok(bytes)
        }
        EntryKind::Symlink => {
            let link_target = link_target(rel, meta)?;
            replace_with(&target, || symlink(link_target, &target))?;
            Ok(0)
        }
        EntryKind::Hardlink => {
            let linked = link_target(rel, meta)?;
            let linked = normalize_entry(&linked.to_string_lossy());
            let source = safe_join(dest_root, &linked)?;
            reject_symlinked_parents(dest_root, &linked)?;
            replace_with(&target, || fs::hard_link(&source, &target))?;
            Ok(0)
        }
        EntryKind::Directory => Ok(0),
        EntryKind::Other(kind) => Err(Error::UnsupportedEntryType {
            path: rel.to_string(),
            kind,
        }),
    }
}

fn link_target<'m>(rel: &str, meta: &'m EntryMeta) -> Result<&'m Path> {
    meta.link_target.as_deref().ok_or_else(|| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{rel}: link entry without target"),
        ))
    })
}

fn write_regular<R: Read>(target: &Path, mut content: R) -> io::Result<u64> {
    let file = File::create(target)?;
    let mut writer = BufWriter::with_capacity(READ_BUFFER_SIZE, file);
    let bytes = io::copy(&mut content, &mut writer)?;
    writer.flush()?;
    Ok(bytes)
}

fn apply_metadata(target: &Path, meta: &EntryMeta, options: &JobOptions) {
    if options.preserve_permissions {
        if let Err(e) = apply_mode(target, meta.mode) {
            options.warn(&format!(
                "Failed to set permissions on {}: {e}",
                target.display()
            ));
        }
    }
    if options.preserve_timestamps {
        let mtime = FileTime::from_unix_time(clamp_secs(meta.mtime), 0);
        let atime = meta
            .atime
            .map_or(mtime, |secs| FileTime::from_unix_time(clamp_secs(secs), 0));
        if let Err(e) = apply_times(target, mtime, atime) {
            options.warn(&format!(
                "Failed to set timestamps on {}: {e}",
                target.display()
            ));
        }
    }
}

fn clamp_secs(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}
