//! Configuration options for partar jobs.
//!
//! This module provides [`JobOptions`], shared by the copier, the archive
//! writer, the extractor and the multi-part merger.
//!
//! # Example
//!
//! ```
//! use partar::JobOptions;
//!
//! let options = JobOptions::default()
//!     .with_concurrency(8)
//!     .without_timestamps();
//! assert_eq!(options.concurrency, 8);
//! ```

/// Options for a partar job.
///
/// Use [`Default::default()`] to get sensible defaults, then customize
/// using the builder methods.
///
/// # Default Values
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `concurrency` | CPU count | Worker threads per operation |
/// | `preserve_permissions` | `true` | Apply mode bits to written files |
/// | `preserve_timestamps` | `true` | Apply mtime/atime to written files |
/// | `warn_handler` | `None` | Receives per-item warnings |
/// | `verbose_handler` | `None` | Receives per-file progress messages |
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobOptions {
    /// Number of worker threads (default: CPU count)
    ///
    /// Also the default number of parts for multi-archive mode.
    pub concurrency: usize,

    /// Whether to apply permission bits on copy and extraction (default: true)
    pub preserve_permissions: bool,

    /// Whether to apply modification and access times (default: true)
    ///
    /// Timestamp failures are reported as warnings, never as item failures.
    pub preserve_timestamps: bool,

    /// Callback for warnings (optional)
    ///
    /// If not set and `tracing` feature is enabled, warnings are logged via tracing.
    /// Otherwise, warnings are silently ignored.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub warn_handler: Option<fn(&str)>,

    /// Callback for verbose per-file messages (optional)
    ///
    /// Falls back to `tracing::debug!` when the `tracing` feature is enabled.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub verbose_handler: Option<fn(&str)>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            preserve_permissions: true,
            preserve_timestamps: true,
            warn_handler: None,
            verbose_handler: None,
        }
    }
}

/// Number of logical CPUs, never less than 1.
#[must_use]
pub fn default_concurrency() -> usize {
    num_cpus::get().max(1)
}

impl JobOptions {
    /// Create options with a warning handler
    #[must_use]
    pub fn with_warn_handler(mut self, handler: fn(&str)) -> Self {
        self.warn_handler = Some(handler);
        self
    }

    /// Create options with a verbose handler
    #[must_use]
    pub fn with_verbose_handler(mut self, handler: fn(&str)) -> Self {
        self.verbose_handler = Some(handler);
        self
    }

    /// Set the number of worker threads
    ///
    /// Value is clamped to at least 1.
    #[must_use]
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// Disable timestamp preservation
    #[must_use]
    pub fn without_timestamps(mut self) -> Self {
        self.preserve_timestamps = false;
        self
    }

    /// Disable permission preservation
    ///
    /// Written files then use the default umask permissions.
    #[must_use]
    pub fn without_permissions(mut self) -> Self {
        self.preserve_permissions = false;
        self
    }

    /// Effective worker count, never 0 even if the field was set directly.
    pub(crate) fn workers(&self) -> usize {
        self.concurrency.max(1)
    }

    pub(crate) fn warn(&self, msg: &str) {
        if let Some(handler) = self.warn_handler {
            handler(msg);
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!("{}", msg);
        }
    }

    pub(crate) fn verbose(&self, msg: &str) {
        if let Some(handler) = self.verbose_handler {
            handler(msg);
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!("{}", msg);
        }
    }
}
