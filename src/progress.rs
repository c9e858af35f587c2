//! Progress counters and the polling tracker.
//!
//! Operations update a shared [`ProgressCounters`] with atomic increments
//! only. A [`ProgressTracker`] reads them from its own thread on a fixed
//! tick and hands a [`ProgressSnapshot`] to a callback, then performs one
//! final read when the operation is done.
//!
//! ```no_run
//! use std::sync::Arc;
//! use partar::{JobBuilder, ProgressCounters, ProgressTracker};
//!
//! let counters = Arc::new(ProgressCounters::new());
//! let tracker = ProgressTracker::spawn(
//!     Arc::clone(&counters),
//!     ProgressTracker::DEFAULT_INTERVAL,
//!     |snap| eprintln!("{}/{} files", snap.processed, snap.total),
//! );
//! let result = JobBuilder::new("src").progress(Arc::clone(&counters)).copy_to("dst");
//! let last = tracker.finish();
//! eprintln!("done: {} failed", last.failed);
//! result?;
//! # Ok::<(), partar::Error>(())
//! ```

use crossbeam_channel::{Sender, bounded, select, tick};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Shared counters updated by workers.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    total: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
}

/// A point-in-time read of [`ProgressCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Items known so far
    pub total: u64,
    /// Items finished, successfully or not
    pub processed: u64,
    /// Items that failed
    pub failed: u64,
    /// Content bytes written
    pub bytes: u64,
}

impl ProgressCounters {
    /// Create zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` to the number of known items.
    pub fn add_total(&self, n: u64) {
        self.total.fetch_add(n, Ordering::Relaxed);
    }

    /// Record one finished item.
    pub fn inc_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one failed item. Does not touch `processed`.
    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Add written content bytes.
    pub fn add_bytes(&self, n: u64) {
        self.bytes.fetch_add(n, Ordering::Relaxed);
    }

    /// Read all counters.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// Background thread that polls [`ProgressCounters`] on a timer.
#[derive(Debug)]
pub struct ProgressTracker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
    counters: Arc<ProgressCounters>,
}

impl ProgressTracker {
    /// Tick used by the CLI.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

    /// Start polling `counters` every `interval`.
    ///
    /// The callback runs on the tracker thread for every tick and once more
    /// with the final values when [`finish`](Self::finish) is called.
    pub fn spawn<F>(counters: Arc<ProgressCounters>, interval: Duration, mut callback: F) -> Self
    where
        F: FnMut(ProgressSnapshot) + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker = tick(interval);
        let polled = Arc::clone(&counters);

        let handle = thread::spawn(move || {
            loop {
                select! {
                    recv(ticker) -> _ => callback(polled.snapshot()),
                    recv(stop_rx) -> _ => break,
                }
            }
            callback(polled.snapshot());
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
            counters,
        }
    }

    /// Stop the tracker, deliver the final snapshot, and return it.
    pub fn finish(mut self) -> ProgressSnapshot {
        self.shutdown();
        self.counters.snapshot()
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel and wakes the select
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Create a default progress bar for partar jobs (requires `progress` feature)
#[cfg(feature = "progress")]
#[must_use]
pub fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pb
}
