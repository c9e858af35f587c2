//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test fixture with a source tree and a scratch directory for outputs.
pub struct TestFixture {
    pub src: TempDir,
    pub work: TempDir,
}

impl TestFixture {
    /// Create a new fixture with fresh source and scratch directories.
    pub fn new() -> Self {
        Self {
            src: TempDir::new().expect("Failed to create temp source dir"),
            work: TempDir::new().expect("Failed to create temp work dir"),
        }
    }

    /// Path inside the scratch directory.
    pub fn out(&self, name: &str) -> PathBuf {
        self.work.path().join(name)
    }

    /// Create a specified number of files with the given size (in bytes).
    pub fn create_files(&self, count: usize, size: usize) {
        for i in 0..count {
            let content = "x".repeat(size);
            fs::write(self.src.path().join(format!("file{}.txt", i)), content)
                .expect("Failed to write file");
        }
    }

    /// Create a nested directory structure with files.
    pub fn create_nested_structure(&self, depth: usize, files_per_level: usize) {
        let mut current_path = self.src.path().to_path_buf();
        for level in 0..depth {
            current_path = current_path.join(format!("level{}", level));
            fs::create_dir_all(&current_path).expect("Failed to create directory");
            for i in 0..files_per_level {
                fs::write(
                    current_path.join(format!("file{}.txt", i)),
                    format!("content at level {} file {}", level, i),
                )
                .expect("Failed to write file");
            }
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Map every regular file under `root` to its content, keyed by relative path.
pub fn tree_contents(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    collect(root, root, &mut files);
    files
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) {
    for entry in fs::read_dir(dir).expect("Failed to read directory") {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let rel = path
                .strip_prefix(root)
                .expect("Entry outside root")
                .to_string_lossy()
                .replace('\\', "/");
            files.insert(rel, fs::read(&path).expect("Failed to read file"));
        }
    }
}

/// Assert that two trees hold the same files with the same content.
pub fn assert_same_tree(expected: &Path, actual: &Path) {
    let expected = tree_contents(expected);
    let actual = tree_contents(actual);
    assert_eq!(
        expected.keys().collect::<Vec<_>>(),
        actual.keys().collect::<Vec<_>>(),
        "File lists differ"
    );
    assert_eq!(expected, actual, "File contents differ");
}
