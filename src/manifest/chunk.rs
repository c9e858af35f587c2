//! Manifest partitioning for multi-archive mode.

use super::Manifest;

/// Split a manifest into `parts` contiguous chunks for multi-archive mode.
///
/// `parts` is clamped to `[1, manifest.len()]`. Chunk sizes differ by at
/// most one, the larger chunks come first, and concatenating the chunks in
/// order reproduces `manifest` exactly. An empty manifest yields no chunks.
///
/// # Example
///
/// ```
/// use partar::{Manifest, partition};
///
/// let manifest = Manifest::from_paths(["a", "b", "c", "d", "e"]);
/// let chunks = partition(&manifest, 3);
/// let sizes: Vec<_> = chunks.iter().map(Manifest::len).collect();
/// assert_eq!(sizes, [2, 2, 1]);
/// ```
#[must_use]
pub fn partition(manifest: &Manifest, parts: usize) -> Vec<Manifest> {
    let len = manifest.len();
    if len == 0 {
        return Vec::new();
    }
    let parts = parts.clamp(1, len);
    let base = len / parts;
    let remainder = len % parts;

    let mut chunks = Vec::with_capacity(parts);
    let mut start = 0;
    for index in 0..parts {
        let size = base + usize::from(index < remainder);
        chunks.push(Manifest {
            entries: manifest.entries[start..start + size].to_vec(),
        });
        start += size;
    }
    chunks
}
