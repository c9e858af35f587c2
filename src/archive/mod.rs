//! Tar archive construction and extraction.
//!
//! Every archive written by partar carries its own manifest as the last
//! entry, under [`MANIFEST_ENTRY_NAME`]. Extraction is driven by that
//! embedded manifest, never by the order of entries in the stream, because
//! the writer emits entries in whatever order its workers win the write
//! lock.
//!
//! Multi-archive mode splits a manifest into parts named
//! `part-0001.tar`, `part-0002.tar`, ... inside one directory, next to a
//! plain-text [`MANIFEST_FILE_NAME`] listing the whole set.

mod entry;
mod extract;
mod merge;
mod multi;
mod writer;

pub use extract::{extract_archive, extract_archive_with_progress};
pub use merge::{extract_parts, extract_parts_with_progress};
pub use multi::{create_archive_parts, create_archive_parts_with_progress};
pub use writer::{create_archive, create_archive_with_progress, write_archive};

use crate::error::Result;
use crate::utils::path::require_dir;
use std::fs;
use std::path::{Path, PathBuf};

/// Reserved entry name of the embedded manifest.
pub const MANIFEST_ENTRY_NAME: &str = ".__partar-manifest__.txt";

/// Name of the manifest written next to multi-archive parts.
pub const MANIFEST_FILE_NAME: &str = "manifest.txt";

/// Buffer used when reading file content.
pub(crate) const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Buffer around archive output and input streams.
pub(crate) const STREAM_BUFFER_SIZE: usize = 256 * 1024;

/// File name of the part at zero-based `index`: `part-0001.tar` for 0.
#[must_use]
pub fn part_file_name(index: usize) -> String {
    format!("part-{:04}.tar", index + 1)
}

/// List the `part-*.tar` files in `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`Error::SourceNotFound`](crate::Error::SourceNotFound) or
/// [`Error::NotADirectory`](crate::Error::NotADirectory) if `dir`
/// is not a readable directory.
pub fn discover_parts(dir: &Path) -> Result<Vec<PathBuf>> {
    require_dir(dir)?;

    let mut parts: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|ft| !ft.is_dir()))
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("part-") && name.ends_with(".tar"))
        })
        .map(|entry| entry.path())
        .collect();
    parts.sort();
    Ok(parts)
}

/// Whether a normalized entry name is the embedded manifest.
pub(crate) fn is_manifest_entry(rel: &str) -> bool {
    rel == MANIFEST_ENTRY_NAME
        || rel
            .strip_suffix(MANIFEST_ENTRY_NAME)
            .is_some_and(|prefix| prefix.ends_with('/'))
}
