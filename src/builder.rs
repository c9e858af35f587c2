//! Builder API for partar jobs.
//!
//! [`JobBuilder`] collects the source, an optional pre-built manifest file,
//! worker count and progress counters, then runs one operation. Operations
//! that read a source tree resolve their manifest first: the given manifest
//! file if any, otherwise a fresh walk of the source.
//!
//! # Examples
//!
//! ## Copy
//!
//! ```no_run
//! use partar::JobBuilder;
//!
//! let stats = JobBuilder::new("src").concurrency(8).copy_to("dst")?;
//! println!("Copied {} files", stats.succeeded);
//! # Ok::<(), partar::Error>(())
//! ```
//!
//! ## Archive with a pre-built manifest
//!
//! ```no_run
//! use partar::JobBuilder;
//!
//! let stats = JobBuilder::new("data")
//!     .manifest_file("data.manifest")
//!     .archive_to("data.tar")?;
//! # Ok::<(), partar::Error>(())
//! ```
//!
//! ## Multi-archive round trip
//!
//! ```no_run
//! use partar::JobBuilder;
//!
//! JobBuilder::new("data").archive_parts_to("parts", Some(4))?;
//! JobBuilder::new("parts").extract_parts_to("restore")?;
//! # Ok::<(), partar::Error>(())
//! ```

use crate::archive::{
    create_archive_parts_with_progress, create_archive_with_progress,
    extract_archive_with_progress, extract_parts_with_progress,
};
use crate::copy::copy_files_with_progress;
use crate::error::{Error, Result};
use crate::manifest::{Manifest, generate};
use crate::options::JobOptions;
use crate::progress::ProgressCounters;
use crate::stats::JobStats;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A builder for configuring and running partar jobs.
///
/// # Example
///
/// ```no_run
/// use partar::JobBuilder;
///
/// let stats = JobBuilder::new("/data/project")
///     .concurrency(16)
///     .no_timestamps()
///     .archive_to("/backup/project.tar")?;
/// # Ok::<(), partar::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct JobBuilder {
    source: PathBuf,
    manifest_file: Option<PathBuf>,
    options: JobOptions,
    progress: Option<Arc<ProgressCounters>>,
}

impl JobBuilder {
    /// Create a builder for `source`.
    ///
    /// `source` is the directory to read for copy/archive operations, the
    /// archive file for [`extract_to`](Self::extract_to), or the parts
    /// directory for [`extract_parts_to`](Self::extract_parts_to).
    pub fn new<P: AsRef<Path>>(source: P) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            manifest_file: None,
            options: JobOptions::default(),
            progress: None,
        }
    }

    /// Set the number of worker threads.
    ///
    /// Default is the CPU count. Values below 1 are treated as 1.
    #[must_use]
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.options = self.options.with_concurrency(workers);
        self
    }

    /// Use an existing manifest file instead of walking the source.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use partar::JobBuilder;
    ///
    /// let stats = JobBuilder::new("src")
    ///     .manifest_file("files.txt")
    ///     .copy_to("dst")?;
    /// # Ok::<(), partar::Error>(())
    /// ```
    #[must_use]
    pub fn manifest_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.manifest_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Don't apply permission bits to written files.
    #[must_use]
    pub fn no_permissions(mut self) -> Self {
        self.options = self.options.without_permissions();
        self
    }

    /// Don't apply timestamps to written files.
    #[must_use]
    pub fn no_timestamps(mut self) -> Self {
        self.options = self.options.without_timestamps();
        self
    }

    /// Set a warning handler.
    ///
    /// Called for every per-item failure and for metadata that could not be
    /// applied.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use partar::JobBuilder;
    ///
    /// let stats = JobBuilder::new("src")
    ///     .on_warning(|msg| eprintln!("warning: {msg}"))
    ///     .copy_to("dst")?;
    /// # Ok::<(), partar::Error>(())
    /// ```
    #[must_use]
    pub fn on_warning(mut self, handler: fn(&str)) -> Self {
        self.options = self.options.with_warn_handler(handler);
        self
    }

    /// Set a handler for per-file verbose messages.
    #[must_use]
    pub fn verbose(mut self, handler: fn(&str)) -> Self {
        self.options = self.options.with_verbose_handler(handler);
        self
    }

    /// Report into shared progress counters, e.g. polled by a
    /// [`ProgressTracker`](crate::ProgressTracker).
    #[must_use]
    pub fn progress(mut self, counters: Arc<ProgressCounters>) -> Self {
        self.progress = Some(counters);
        self
    }

    /// Replace all options at once.
    #[must_use]
    pub fn with_options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    /// Get the current options.
    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Load the manifest file if one was given, otherwise walk the source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadManifest`] if the manifest file cannot be read,
    /// the walk's root errors, or [`Error::EmptyManifest`] if the result
    /// lists nothing.
    pub fn resolve_manifest(&self) -> Result<Manifest> {
        let manifest = match &self.manifest_file {
            Some(path) => Manifest::read_from(path)?,
            None => generate(&self.source)?,
        };
        if manifest.is_empty() {
            return Err(Error::EmptyManifest);
        }
        self.options.verbose(&format!("manifest: {} files", manifest.len()));
        Ok(manifest)
    }

    /// Copy the manifest's files from the source into `dest`.
    pub fn copy_to<P: AsRef<Path>>(self, dest: P) -> Result<JobStats> {
        let manifest = self.resolve_manifest()?;
        copy_files_with_progress(
            &self.source,
            dest.as_ref(),
            &manifest,
            &self.options,
            &self.counters(),
        )
    }

    /// Write one archive of the source to `output`.
    pub fn archive_to<P: AsRef<Path>>(self, output: P) -> Result<JobStats> {
        let manifest = self.resolve_manifest()?;
        create_archive_with_progress(
            &self.source,
            output.as_ref(),
            &manifest,
            &self.options,
            &self.counters(),
        )
    }

    /// Write the source as `parts` archives into `out_dir`.
    ///
    /// `None` uses the worker count.
    pub fn archive_parts_to<P: AsRef<Path>>(self, out_dir: P, parts: Option<usize>) -> Result<JobStats> {
        let manifest = self.resolve_manifest()?;
        create_archive_parts_with_progress(
            &self.source,
            out_dir.as_ref(),
            &manifest,
            parts,
            &self.options,
            &self.counters(),
        )
    }

    /// Extract the source archive into `dest`.
    pub fn extract_to<P: AsRef<Path>>(self, dest: P) -> Result<JobStats> {
        extract_archive_with_progress(&self.source, dest.as_ref(), &self.options, &self.counters())
    }

    /// Extract every part in the source directory into `dest`.
    pub fn extract_parts_to<P: AsRef<Path>>(self, dest: P) -> Result<JobStats> {
        extract_parts_with_progress(&self.source, dest.as_ref(), &self.options, &self.counters())
    }

    /// Generate the source's manifest and write it to `path`.
    ///
    /// Returns the manifest that was written.
    pub fn write_manifest_to<P: AsRef<Path>>(self, path: P) -> Result<Manifest> {
        let manifest = generate(&self.source)?;
        manifest.write_to(path.as_ref())?;
        Ok(manifest)
    }

    fn counters(&self) -> Arc<ProgressCounters> {
        self.progress
            .clone()
            .unwrap_or_else(|| Arc::new(ProgressCounters::new()))
    }
}
