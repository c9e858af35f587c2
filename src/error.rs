//! Error types for partar.
//!
//! This module provides the [`Error`] enum containing all possible errors
//! that can occur while generating manifests, building or extracting
//! archives, and copying files, plus the [`Result`] type alias.
//!
//! # Error Categories
//!
//! | Category | Errors |
//! |----------|--------|
//! | Path | [`Error::Io`], [`Error::SourceNotFound`], [`Error::NotADirectory`], [`Error::IsADirectory`], [`Error::CreateOutput`], [`Error::OpenArchive`], [`Error::ReadManifest`], [`Error::UnsafePath`] |
//! | Format | [`Error::MissingManifest`], [`Error::EmptyManifest`], [`Error::ReadArchive`] |
//! | Write frame | [`Error::WriteFrame`] |
//! | Partial | [`Error::PartialFailure`], [`Error::PartialParts`], [`Error::NoParts`] |
//! | Entry | [`Error::UnsupportedEntryType`] |
//!
//! Per-item errors inside a batch are reported through the warning channel
//! and counted; only the aggregate [`Error::PartialFailure`] reaches the
//! caller. Setup errors are returned immediately.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for partar operations.
///
/// This is a type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Check if an IO error indicates "no space left on device".
///
/// # Platform Support
///
/// | Platform | Error Detection |
/// |----------|-----------------|
/// | Unix | `ENOSPC` (errno 28) |
/// | Windows | `ERROR_DISK_FULL` (0x70) |
///
/// # Example
///
/// ```no_run
/// use std::io;
/// use partar::is_no_space_error;
///
/// let error = io::Error::new(io::ErrorKind::StorageFull, "disk full");
/// assert!(is_no_space_error(&error));
/// ```
pub fn is_no_space_error(error: &io::Error) -> bool {
    if error.kind() == io::ErrorKind::StorageFull {
        return true;
    }

    #[cfg(unix)]
    {
        if let Some(raw_error) = error.raw_os_error() {
            const ENOSPC: i32 = 28;
            return raw_error == ENOSPC;
        }
    }

    #[cfg(windows)]
    {
        if let Some(raw_error) = error.raw_os_error() {
            const ERROR_DISK_FULL: i32 = 112;
            return raw_error == ERROR_DISK_FULL;
        }
    }

    false
}

/// Stable, machine-readable classification of an [`Error`].
///
/// The CLI prints these in `error[code]: message` form and maps them to
/// process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Caller passed something unusable (bad path, empty manifest)
    InvalidInput,
    /// A source path does not exist
    SourceNotFound,
    /// The OS denied access
    PermissionDenied,
    /// Destination storage is full
    NoSpace,
    /// Any other IO failure
    IoError,
    /// An archive is malformed or lacks its embedded manifest
    FormatError,
    /// The batch completed but some items failed
    PartialFailure,
    /// Should not happen
    Internal,
}

impl ErrorCode {
    /// The snake_case name of this code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::SourceNotFound => "source_not_found",
            Self::PermissionDenied => "permission_denied",
            Self::NoSpace => "no_space",
            Self::IoError => "io_error",
            Self::FormatError => "format_error",
            Self::PartialFailure => "partial_failure",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during partar operations.
///
/// All errors include relevant path information to aid debugging.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Source path does not exist
    #[error("Source path does not exist: {0}")]
    SourceNotFound(PathBuf),

    /// Source is not a directory
    #[error("Source is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Expected a file but found a directory
    #[error("Expected a file but found a directory: {0}")]
    IsADirectory(PathBuf),

    /// Failed to create an output file or destination root
    #[error("Failed to create {path}: {source}")]
    CreateOutput {
        /// Path that could not be created
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Failed to open an archive for reading
    #[error("Failed to open archive {path}: {source}")]
    OpenArchive {
        /// Archive path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Failed to read or write a manifest file
    #[error("Failed to access manifest {path}: {source}")]
    ReadManifest {
        /// Manifest file path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The archive stream could not be read
    #[error("Failed to read archive {path}: {source}")]
    ReadArchive {
        /// Archive path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The archive ended without an embedded manifest entry
    #[error("No embedded manifest found in archive: {0}")]
    MissingManifest(PathBuf),

    /// A manifest resolved to zero entries
    #[error("Manifest is empty")]
    EmptyManifest,

    /// Writing an archive header or content block failed
    ///
    /// This is fatal for the archive being written but not for sibling
    /// archive parts.
    #[error("Failed to write archive entry {entry}: {source}")]
    WriteFrame {
        /// Relative path of the entry being written
        entry: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// One or more items of a batch failed
    #[error("Failed to process {failed} of {total} files")]
    PartialFailure {
        /// Number of items that failed
        failed: usize,
        /// Total number of items
        total: usize,
    },

    /// One or more archive parts failed
    #[error("Failed to process {failed} of {total} archive parts")]
    PartialParts {
        /// Number of parts that failed
        failed: usize,
        /// Total number of parts
        total: usize,
    },

    /// A directory contains no archive parts
    #[error("No part-*.tar files found in {0}")]
    NoParts(PathBuf),

    /// An archive entry has a type that cannot be materialized
    #[error("Unsupported entry type '{kind}' for {path}")]
    UnsupportedEntryType {
        /// Relative path of the entry
        path: String,
        /// Raw tar type flag
        kind: char,
    },

    /// A relative path would escape its root (`..`, absolute, empty, or
    /// below a symlink)
    #[error("Refusing unsafe relative path: {0:?}")]
    UnsafePath(String),
}

impl Error {
    /// Classify this error into a stable [`ErrorCode`].
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io(e)
            | Self::CreateOutput { source: e, .. }
            | Self::OpenArchive { source: e, .. }
            | Self::ReadManifest { source: e, .. }
            | Self::WriteFrame { source: e, .. } => io_code(e),
            Self::SourceNotFound(_) | Self::NoParts(_) => ErrorCode::SourceNotFound,
            Self::NotADirectory(_)
            | Self::IsADirectory(_)
            | Self::EmptyManifest
            | Self::UnsafePath(_) => ErrorCode::InvalidInput,
            Self::ReadArchive { .. }
            | Self::MissingManifest(_)
            | Self::UnsupportedEntryType { .. } => ErrorCode::FormatError,
            Self::PartialFailure { .. } | Self::PartialParts { .. } => ErrorCode::PartialFailure,
        }
    }
}

fn io_code(error: &io::Error) -> ErrorCode {
    if is_no_space_error(error) {
        return ErrorCode::NoSpace;
    }
    match error.kind() {
        io::ErrorKind::NotFound => ErrorCode::SourceNotFound,
        io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
        _ => ErrorCode::IoError,
    }
}
