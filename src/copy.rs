//! Manifest-driven parallel file copy.
//!
//! Copies exactly the files a [`Manifest`] names from one root to another,
//! without archiving. Destination directories are pre-created up front;
//! anything pre-creation missed goes through a shared [`DirCache`] so each
//! directory is created once even when several workers need it at the same
//! moment.

use crate::archive::READ_BUFFER_SIZE;
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::options::JobOptions;
use crate::pool;
use crate::progress::ProgressCounters;
use crate::stats::{JobStats, Tally};
use crate::utils::fs::{DirCache, precreate_dirs, preserve_timestamps};
use crate::utils::path::{parent_of, require_dir, safe_join};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

/// Copy every file in `manifest` from `src_root` to `dst_root`.
///
/// Files not named in the manifest are never touched. Missing or unreadable
/// sources are per-file failures: the rest of the batch still runs.
///
/// # Errors
///
/// - [`Error::SourceNotFound`] / [`Error::NotADirectory`] for a bad `src_root`
/// - [`Error::EmptyManifest`] if there is nothing to copy
/// - [`Error::CreateOutput`] if `dst_root` cannot be created
/// - [`Error::PartialFailure`] if one or more files failed
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use partar::{JobOptions, Manifest, copy_files};
///
/// let manifest = Manifest::from_paths(["a.txt", "sub/b.txt"]);
/// let stats = copy_files(Path::new("src"), Path::new("dst"), &manifest, &JobOptions::default())?;
/// assert_eq!(stats.succeeded, 2);
/// # Ok::<(), partar::Error>(())
/// ```
pub fn copy_files(
    src_root: &Path,
    dst_root: &Path,
    manifest: &Manifest,
    options: &JobOptions,
) -> Result<JobStats> {
    copy_files_with_progress(src_root, dst_root, manifest, options, &ProgressCounters::new())
}

/// [`copy_files`] that also reports into shared progress counters.
pub fn copy_files_with_progress(
    src_root: &Path,
    dst_root: &Path,
    manifest: &Manifest,
    options: &JobOptions,
    progress: &ProgressCounters,
) -> Result<JobStats> {
    require_dir(src_root)?;
    if manifest.is_empty() {
        return Err(Error::EmptyManifest);
    }
    fs::create_dir_all(dst_root).map_err(|source| Error::CreateOutput {
        path: dst_root.to_path_buf(),
        source,
    })?;

    let tally = Tally::new(progress);
    tally.add_files(manifest.len() as u64);

    let dirs = DirCache::new();
    match precreate_dirs(dst_root, manifest.iter().filter_map(|rel| parent_of(rel))) {
        Ok(created) => dirs.seed(created),
        Err(e) => options.warn(&format!(
            "Failed to pre-create directories ({e}), creating them on demand"
        )),
    }

    pool::run(manifest.iter(), options.workers(), |rel| {
        match copy_one(src_root, dst_root, rel, &dirs, options) {
            Ok(bytes) => {
                tally.succeed(bytes);
                options.verbose(&format!("{rel} ({bytes} bytes)"));
            }
            Err(e) => {
                options.warn(&format!("Failed to copy {rel}: {e}"));
                tally.fail();
            }
        }
    });

    tally.finish()
}

fn copy_one(
    src_root: &Path,
    dst_root: &Path,
    rel: &str,
    dirs: &DirCache,
    options: &JobOptions,
) -> Result<u64> {
    let src = safe_join(src_root, rel)?;
    let dst = safe_join(dst_root, rel)?;

    let meta = fs::metadata(&src).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::SourceNotFound(src.clone()),
        _ => Error::Io(e),
    })?;
    if meta.is_dir() {
        dirs.ensure(&dst)?;
        return Ok(0);
    }
    if !meta.is_file() {
        return Err(Error::UnsupportedEntryType {
            path: rel.to_string(),
            kind: '?',
        });
    }

    if let Some(parent) = dst.parent() {
        dirs.ensure(parent)?;
    }
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, File::open(&src)?);
    let mut writer = BufWriter::with_capacity(READ_BUFFER_SIZE, File::create(&dst)?);
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;

    if options.preserve_permissions {
        if let Err(e) = fs::set_permissions(&dst, meta.permissions()) {
            options.warn(&format!(
                "Failed to set permissions on {}: {e}",
                dst.display()
            ));
        }
    }
    if options.preserve_timestamps {
        if let Err(e) = preserve_timestamps(&meta, &dst) {
            options.warn(&format!(
                "Failed to set timestamps on {}: {e}",
                dst.display()
            ));
        }
    }
    Ok(bytes)
}
