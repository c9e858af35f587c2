//! Multi-archive construction: one manifest split across several parts.

use super::writer::create_archive_with_progress;
use super::{MANIFEST_FILE_NAME, part_file_name};
use crate::error::{Error, Result};
use crate::manifest::{Manifest, partition};
use crate::options::JobOptions;
use crate::progress::ProgressCounters;
use crate::stats::{JobStats, count};
use crate::utils::path::require_dir;
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Split `manifest` into `parts` archives written to `out_dir`.
///
/// `parts` defaults to [`JobOptions::concurrency`] and is clamped to the
/// number of manifest entries. Parts are named `part-0001.tar`, ... and
/// written concurrently, each with its own share of the worker threads.
/// The full manifest is also written to `out_dir/manifest.txt`.
///
/// # Errors
///
/// - [`Error::EmptyManifest`] if there is nothing to archive
/// - [`Error::CreateOutput`] if `out_dir` cannot be created
/// - [`Error::PartialParts`] if one or more parts failed fatally; the
///   other parts are complete
/// - [`Error::PartialFailure`] if all parts were written but some source
///   files could not be read
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use partar::{JobOptions, create_archive_parts, generate};
///
/// let manifest = generate(Path::new("data"))?;
/// let stats = create_archive_parts(Path::new("data"), Path::new("parts"), &manifest, Some(4), &JobOptions::default())?;
/// assert!(stats.parts <= 4);
/// # Ok::<(), partar::Error>(())
/// ```
pub fn create_archive_parts(
    src_root: &Path,
    out_dir: &Path,
    manifest: &Manifest,
    parts: Option<usize>,
    options: &JobOptions,
) -> Result<JobStats> {
    create_archive_parts_with_progress(
        src_root,
        out_dir,
        manifest,
        parts,
        options,
        &ProgressCounters::new(),
    )
}

/// [`create_archive_parts`] that also reports into shared progress counters.
pub fn create_archive_parts_with_progress(
    src_root: &Path,
    out_dir: &Path,
    manifest: &Manifest,
    parts: Option<usize>,
    options: &JobOptions,
    progress: &ProgressCounters,
) -> Result<JobStats> {
    let started = Instant::now();
    require_dir(src_root)?;
    if manifest.is_empty() {
        return Err(Error::EmptyManifest);
    }
    fs::create_dir_all(out_dir).map_err(|source| Error::CreateOutput {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let chunks = partition(manifest, parts.unwrap_or(options.concurrency));
    let per_part = options.clone().with_concurrency(options.workers() / chunks.len());
    options.verbose(&format!(
        "splitting {} files into {} parts, {} workers each",
        manifest.len(),
        chunks.len(),
        per_part.concurrency
    ));

    let run_all = || -> Vec<Result<JobStats>> {
        chunks
            .par_iter()
            .enumerate()
            .map(|(index, chunk)| {
                let output = out_dir.join(part_file_name(index));
                create_archive_with_progress(src_root, &output, chunk, &per_part, progress)
            })
            .collect()
    };
    let outcomes = match rayon::ThreadPoolBuilder::new()
        .num_threads(chunks.len())
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

    manifest.write_to(&out_dir.join(MANIFEST_FILE_NAME))?;

    let mut stats = JobStats {
        files: manifest.len() as u64,
        parts: chunks.len() as u64,
        ..JobStats::default()
    };
    let mut failed_parts = 0;
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(part) => {
                stats.succeeded += part.succeeded;
                stats.bytes += part.bytes;
            }
            Err(Error::PartialFailure { failed, total }) => {
                let failed = failed as u64;
                stats.failed += failed;
                stats.succeeded += (total as u64).saturating_sub(failed);
            }
            Err(e) => {
                failed_parts += 1;
                stats.failed += chunks[index].len() as u64;
                options.warn(&format!("Failed to write {}: {e}", part_file_name(index)));
            }
        }
    }
    stats.duration = started.elapsed();

    if failed_parts > 0 {
        return Err(Error::PartialParts {
            failed: failed_parts,
            total: chunks.len(),
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
