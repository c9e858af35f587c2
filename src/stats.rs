//! Per-job statistics.

use crate::error::{Error, Result};
use crate::progress::ProgressCounters;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Statistics from a completed partar job.
///
/// # Example
///
/// ```no_run
/// use partar::JobBuilder;
///
/// let stats = JobBuilder::new("src").copy_to("dst")?;
/// println!("{} of {} files, {} bytes", stats.succeeded, stats.files, stats.bytes);
/// # Ok::<(), partar::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Number of items the job was asked to process
    pub files: u64,
    /// Number of items written successfully
    pub succeeded: u64,
    /// Number of items that failed
    pub failed: u64,
    /// Content bytes written
    pub bytes: u64,
    /// Number of archive parts written or read (0 for single-archive jobs)
    pub parts: u64,
    /// Duration of the job
    pub duration: Duration,
}

/// Outcome counters for one job, mirrored into the caller's
/// [`ProgressCounters`].
///
/// The caller's counters may be shared by several jobs, so each job keeps
/// its own tally to decide whether it failed.
pub(crate) struct Tally<'a> {
    progress: &'a ProgressCounters,
    files: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
    started: Instant,
}

impl<'a> Tally<'a> {
    pub(crate) fn new(progress: &'a ProgressCounters) -> Self {
        Self {
            progress,
            files: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub(crate) fn add_files(&self, n: u64) {
        self.files.fetch_add(n, Ordering::Relaxed);
        self.progress.add_total(n);
    }

    pub(crate) fn succeed(&self, bytes: u64) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        self.progress.add_bytes(bytes);
        self.progress.inc_processed();
    }

    pub(crate) fn fail(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.progress.inc_failed();
        self.progress.inc_processed();
    }

    /// An item that was neither written nor failed, e.g. skipped after a
    /// fatal error.
    pub(crate) fn skip(&self) {
        self.progress.inc_processed();
    }

    pub(crate) fn stats(&self) -> JobStats {
        JobStats {
            files: self.files.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            parts: 0,
            duration: self.started.elapsed(),
        }
    }

    /// `Ok(stats)` if nothing failed, otherwise [`Error::PartialFailure`].
    pub(crate) fn finish(&self) -> Result<JobStats> {
        let stats = self.stats();
        if stats.failed > 0 {
            return Err(Error::PartialFailure {
                failed: count(stats.failed),
                total: count(stats.files),
            });
        }
        Ok(stats)
    }
}

pub(crate) fn count(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
