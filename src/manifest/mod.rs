//! The manifest: an ordered list of relative file paths.
//!
//! A [`Manifest`] describes the exact file set an operation processes. It
//! is built once (by [`generate`] or by reading a manifest file), never
//! mutated afterwards, and shared read-only by every worker.
//!
//! # Text format
//!
//! UTF-8, one path per line, `/` separators, each line prefixed with `./`.
//! Blank lines are ignored when reading and the `./` prefix is optional.
//! There is no escaping, so paths containing newlines cannot be
//! represented.
//!
//! ```
//! use partar::Manifest;
//!
//! let manifest = Manifest::parse("./a.txt\n\n./sub/b.txt\n");
//! assert_eq!(manifest.as_slice(), ["a.txt", "sub/b.txt"]);
//! assert_eq!(manifest.to_text(), "./a.txt\n./sub/b.txt\n");
//! ```

mod chunk;
mod walk;

pub use chunk::partition;
pub use walk::generate;

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Ordered list of relative paths.
///
/// Entries are stored normalized: forward slashes, no leading `./`.
/// Uniqueness is assumed, not enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<String>,
}

impl Manifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a manifest from relative paths, normalizing each one.
    ///
    /// Paths that normalize to nothing (`""`, `"./"`) are dropped.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut manifest = Self::new();
        for path in paths {
            manifest.push(path.as_ref());
        }
        manifest
    }

    /// Append one relative path, normalizing it.
    pub fn push(&mut self, path: &str) {
        let entry = normalize_entry(path);
        if !entry.is_empty() {
            self.entries.push(entry);
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the normalized entries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.entries.iter()
    }

    /// The normalized entries in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    /// Parse manifest text. Never fails; blank lines are skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        Self::from_paths(text.lines().map(str::trim).filter(|l| !l.is_empty()))
    }

    /// Serialize to the `./path` line format.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.entries.iter().map(|e| e.len() + 3).sum());
        for entry in &self.entries {
            out.push_str("./");
            out.push_str(entry);
            out.push('\n');
        }
        out
    }

    /// Read a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadManifest`] if the file cannot be read or is not UTF-8.
    pub fn read_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ReadManifest {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Write the manifest to a file.
    ///
    /// The text goes to a temporary file in the target directory which is
    /// then renamed over `path`, so readers never observe a partial manifest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadManifest`] if the temp file cannot be created,
    /// written, or persisted.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let wrap = |source| Error::ReadManifest {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(wrap)?;
        temp.write_all(self.to_text().as_bytes()).map_err(wrap)?;
        temp.flush().map_err(wrap)?;
        temp.persist(path).map_err(|e| wrap(e.error))?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<String> for Manifest {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self::from_paths(iter)
    }
}

/// Normalize a relative path: `\` becomes `/`, leading `./` and `/`
/// are stripped, and empty or `.` segments are dropped.
pub(crate) fn normalize_entry(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut trimmed = unified.as_str();
    loop {
        if let Some(rest) = trimmed.strip_prefix("./") {
            trimmed = rest;
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            trimmed = rest;
        } else {
            break;
        }
    }
    trimmed
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}
