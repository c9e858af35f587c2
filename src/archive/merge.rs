//! Concurrent extraction of multi-archive parts into one destination.
//!
//! Each part is streamed once by its own task. Paths are claimed in a
//! shared [`ClaimSet`]: the first part to reach a path writes it, every
//! later occurrence in any part is skipped. Directory entries bypass the
//! claim set since creating them is idempotent.

use super::entry::{EntryKind, EntryMeta, materialize};
use super::{STREAM_BUFFER_SIZE, discover_parts, is_manifest_entry};
use crate::error::{Error, Result};
use crate::options::JobOptions;
use crate::progress::ProgressCounters;
use crate::stats::{JobStats, Tally, count};
use crate::utils::fs::{ClaimSet, DirCache};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tar::Archive;

/// State shared by every part task.
struct MergeContext<'a> {
    dest: &'a Path,
    claims: ClaimSet,
    dirs: DirCache,
    tally: Tally<'a>,
    options: &'a JobOptions,
}

/// Extract every `part-*.tar` in `parts_dir` into `dest`.
///
/// Parts are processed concurrently. A path present in several parts is
/// written exactly once, by whichever part reaches it first. Hard links
/// whose target lives in a part that has not been extracted yet fail.
///
/// # Errors
///
/// - [`Error::NoParts`] if `parts_dir` holds no parts
/// - [`Error::CreateOutput`] if `dest` cannot be created
/// - [`Error::PartialParts`] if one or more parts could not be read; the
///   other parts are still extracted
/// - [`Error::PartialFailure`] if every part was read but some entries failed
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use partar::{JobOptions, extract_parts};
///
/// let stats = extract_parts(Path::new("parts"), Path::new("restore"), &JobOptions::default())?;
/// println!("{} files from {} parts", stats.succeeded, stats.parts);
/// # Ok::<(), partar::Error>(())
/// ```
pub fn extract_parts(parts_dir: &Path, dest: &Path, options: &JobOptions) -> Result<JobStats> {
    extract_parts_with_progress(parts_dir, dest, options, &ProgressCounters::new())
}

/// [`extract_parts`] that also reports into shared progress counters.
pub fn extract_parts_with_progress(
    parts_dir: &Path,
    dest: &Path,
    options: &JobOptions,
    progress: &ProgressCounters,
) -> Result<JobStats> {
    let parts = discover_parts(parts_dir)?;
    if parts.is_empty() {
        return Err(Error::NoParts(parts_dir.to_path_buf()));
    }
    fs::create_dir_all(dest).map_err(|source| Error::CreateOutput {
        path: dest.to_path_buf(),
        source,
    })?;

    let ctx = MergeContext {
        dest,
        claims: ClaimSet::new(),
        dirs: DirCache::new(),
        tally: Tally::new(progress),
        options,
    };

    let run_all = || -> Vec<(PathBuf, Result<u64>)> {
        parts
            .par_iter()
            .map(|part| (part.clone(), extract_one_part(&ctx, part)))
            .collect()
    };
    // One thread per part
    let outcomes = match rayon::ThreadPoolBuilder::new()
        .num_threads(parts.len())
        .build()
    {
        Ok(pool) => pool.install(run_all),
        Err(e) => {
            options.warn(&format!(
                "Failed to create thread pool ({e}), using global pool"
            ));
            run_all()
        }
    };

    let mut failed_parts = 0;
    for (part, outcome) in &outcomes {
        match outcome {
            Ok(written) => options.verbose(&format!("{}: {written} files", part.display())),
            Err(e) => {
                failed_parts += 1;
                options.warn(&format!("Failed to extract {}: {e}", part.display()));
            }
        }
    }

    let mut stats = ctx.tally.stats();
    stats.parts = parts.len() as u64;
    if failed_parts > 0 {
        return Err(Error::PartialParts {
            failed: failed_parts,
            total: parts.len(),
        });
    }
    if stats.failed > 0 {
        return Err(Error::PartialFailure {
            failed: count(stats.failed),
            total: count(stats.files),
        });
    }
    Ok(stats)
}

/// Stream one part, writing every entry it wins. Returns how many entries
/// this part wrote. Per-entry failures are counted, not returned.
fn extract_one_part(ctx: &MergeContext<'_>, part: &Path) -> Result<u64> {
    let read_error = |source| Error::ReadArchive {
        path: part.to_path_buf(),
        source,
    };
    let file = File::open(part).map_err(|source| Error::OpenArchive {
        path: part.to_path_buf(),
        source,
    })?;
    let mut archive = Archive::new(BufReader::with_capacity(STREAM_BUFFER_SIZE, file));

    let mut written = 0;
    for entry in archive.entries().map_err(read_error)? {
        let mut entry = entry.map_err(read_error)?;
        let (rel, meta) = EntryMeta::from_entry(&entry).map_err(read_error)?;
        if rel.is_empty() || is_manifest_entry(&rel) {
            continue;
        }

        if meta.kind == EntryKind::Directory {
            if let Err(e) = materialize(ctx.dest, &rel, &meta, &mut entry, &ctx.dirs, ctx.options)
            {
                ctx.options.warn(&format!("Failed to create directory {rel}: {e}"));
            }
            continue;
        }

        // Losers are skipped; the tar reader discards unread content
        if !ctx.claims.claim(&rel) {
            continue;
        }
        ctx.tally.add_files(1);
        match materialize(ctx.dest, &rel, &meta, &mut entry, &ctx.dirs, ctx.options) {
            Ok(bytes) => {
                written += 1;
                ctx.tally.succeed(bytes);
                ctx.options.verbose(&format!("x {rel}"));
            }
            Err(e) => {
                ctx.options.warn(&format!("Failed to extract {rel}: {e}"));
                ctx.tally.fail();
            }
        }
    }
    Ok(written)
}
