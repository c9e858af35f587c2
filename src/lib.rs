//! # partar
//!
//! Manifest-driven parallel tar archiving and copying for Rust.
//!
//! ## Core Features
//!
//! - **Manifests**: An ordered list of relative paths drives every
//!   operation, generated by a symlink-aware walk or loaded from a file
//! - **Parallel archiving**: A bounded worker pool reads files concurrently
//!   and feeds one serialized tar writer
//! - **Self-describing archives**: Each archive embeds its manifest as the
//!   last entry, so extraction never depends on entry order
//! - **Two-phase extraction**: Read the archive once, then materialize files
//!   in parallel with every destination directory created exactly once
//! - **Multi-archive mode**: Split a manifest across `part-NNNN.tar` files
//!   and merge them back concurrently, writing each path once
//! - **Parallel copy**: Copy exactly the manifest's files between trees
//! - **Progress**: Atomic counters polled by a background tracker
//!
//! ## Quick Start with Builder API
//!
//! The easiest way to use partar is with the [`JobBuilder`]:
//!
//! ```no_run
//! use partar::JobBuilder;
//!
//! let stats = JobBuilder::new("project").archive_to("project.tar")?;
//! println!("Archived {} files ({} bytes)", stats.succeeded, stats.bytes);
//!
//! let stats = JobBuilder::new("project.tar").extract_to("restore")?;
//! # Ok::<(), partar::Error>(())
//! ```
//!
//! ### Multi-Archive
//!
//! ```no_run
//! use partar::JobBuilder;
//!
//! let stats = JobBuilder::new("data")
//!     .concurrency(16)
//!     .archive_parts_to("parts", Some(8))?;
//! println!("{} parts", stats.parts);
//!
//! JobBuilder::new("parts").extract_parts_to("restore")?;
//! # Ok::<(), partar::Error>(())
//! ```
//!
//! ## Function API
//!
//! For more control, use the function API with [`JobOptions`]:
//!
//! ```no_run
//! use partar::{JobOptions, copy_files, generate, partition};
//! use std::path::Path;
//!
//! let manifest = generate(Path::new("src"))?;
//! let options = JobOptions::default()
//!     .with_concurrency(8)
//!     .without_permissions();
//!
//! for (i, chunk) in partition(&manifest, 2).iter().enumerate() {
//!     copy_files(Path::new("src"), Path::new(&format!("dst{i}")), chunk, &options)?;
//! }
//! # Ok::<(), partar::Error>(())
//! ```
//!
//! ## Failure Model
//!
//! A file that cannot be read or written is a per-item failure: it is
//! reported through the warning handler and counted, and the rest of the
//! batch still runs. A job with any such failure returns
//! [`Error::PartialFailure`]. Failing to write the archive stream itself is
//! fatal for that archive; in multi-archive mode the other parts still
//! complete and the job returns [`Error::PartialParts`].
//!
//! ## Path Safety
//!
//! Manifest paths and archive entry names are always relative to a root.
//! Paths that are absolute or contain `..` are rejected with
//! [`Error::UnsafePath`] before anything is written. Extraction also refuses
//! to write an entry whose parent directory already exists as a symlink, so
//! a symlink entry cannot redirect later entries outside the destination.
//! Symlink targets themselves are recreated verbatim.
//!
//! ## Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `progress` | Progress bar support with indicatif |
//! | `tracing` | Structured logging with tracing crate |
//! | `serde` | Serialize/Deserialize for [`JobOptions`] |
//! | `full` | Enable all optional features |

#![cfg_attr(docsrs, feature(doc_cfg))]

mod archive;
mod builder;
mod copy;
mod error;
mod manifest;
mod options;
mod pool;
mod progress;
mod stats;
mod utils;

pub use archive::{
    MANIFEST_ENTRY_NAME, MANIFEST_FILE_NAME, create_archive, create_archive_parts,
    create_archive_parts_with_progress, create_archive_with_progress, discover_parts,
    extract_archive, extract_archive_with_progress, extract_parts, extract_parts_with_progress,
    part_file_name, write_archive,
};
pub use builder::JobBuilder;
pub use copy::{copy_files, copy_files_with_progress};
pub use error::{Error, ErrorCode, Result, is_no_space_error};
pub use manifest::{Manifest, generate, partition};
pub use options::{JobOptions, default_concurrency};
pub use progress::{ProgressCounters, ProgressSnapshot, ProgressTracker};
pub use stats::JobStats;

#[cfg(feature = "progress")]
#[cfg_attr(docsrs, doc(cfg(feature = "progress")))]
pub use progress::create_progress_bar;
