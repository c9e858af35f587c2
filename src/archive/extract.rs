//! Two-phase single-archive extraction.
//!
//! Phase 1 streams the archive once, capturing the embedded manifest and
//! buffering every other entry in memory keyed by its normalized path.
//! Phase 2 materializes the manifest's paths with the worker pool. The whole
//! archive's content is held in memory between the phases.

use super::entry::{EntryKind, EntryMeta, materialize};
use super::{STREAM_BUFFER_SIZE, is_manifest_entry};
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::options::JobOptions;
use crate::pool;
use crate::progress::ProgressCounters;
use crate::stats::{JobStats, Tally};
use crate::utils::fs::{DirCache, precreate_dirs};
use crate::utils::path::parent_of;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tar::Archive;

/// Upper bound on the buffer reserved up front from a header's size field.
const MAX_PREALLOC: u64 = 1 << 20;

struct BufferedEntry {
    meta: EntryMeta,
    content: Vec<u8>,
}

/// Everything phase 1 learned from the stream.
struct Collected {
    manifest_text: Option<String>,
    entries: HashMap<String, BufferedEntry>,
    dir_entries: Vec<String>,
}

/// Extract one archive into `dest`, driven by its embedded manifest.
///
/// Only paths listed in the embedded manifest are written; other entries
/// are ignored. Entry order inside the archive does not matter.
///
/// # Errors
///
/// - [`Error::OpenArchive`] / [`Error::ReadArchive`] if the stream cannot be read
/// - [`Error::MissingManifest`] if no embedded manifest entry exists
/// - [`Error::EmptyManifest`] if the embedded manifest lists nothing
/// - [`Error::CreateOutput`] if `dest` cannot be created
/// - [`Error::PartialFailure`] if some paths could not be written; all
///   other paths are still extracted
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use partar::{JobOptions, extract_archive};
///
/// let stats = extract_archive(Path::new("data.tar"), Path::new("restore"), &JobOptions::default())?;
/// println!("restored {} files", stats.succeeded);
/// # Ok::<(), partar::Error>(())
/// ```
pub fn extract_archive(archive: &Path, dest: &Path, options: &JobOptions) -> Result<JobStats> {
    extract_archive_with_progress(archive, dest, options, &ProgressCounters::new())
}

/// [`extract_archive`] that also reports into shared progress counters.
pub fn extract_archive_with_progress(
    archive: &Path,
    dest: &Path,
    options: &JobOptions,
    progress: &ProgressCounters,
) -> Result<JobStats> {
    if archive.is_dir() {
        return Err(Error::IsADirectory(archive.to_path_buf()));
    }
    let file = File::open(archive).map_err(|source| Error::OpenArchive {
        path: archive.to_path_buf(),
        source,
    })?;
    let collected = collect(BufReader::with_capacity(STREAM_BUFFER_SIZE, file), archive)?;

    let text = collected
        .manifest_text
        .ok_or_else(|| Error::MissingManifest(archive.to_path_buf()))?;
    let manifest = Manifest::parse(&text);
    if manifest.is_empty() {
        return Err(Error::EmptyManifest);
    }
    options.verbose(&format!(
        "{}: {} manifest paths, {} buffered entries",
        archive.display(),
        manifest.len(),
        collected.entries.len()
    ));

    fs::create_dir_all(dest).map_err(|source| Error::CreateOutput {
        path: dest.to_path_buf(),
        source,
    })?;
    materialize_all(
        dest,
        &manifest,
        &collected.entries,
        &collected.dir_entries,
        options,
        progress,
    )
}

/// Phase 1: read the whole stream once.
fn collect<R: Read>(reader: R, archive_path: &Path) -> Result<Collected> {
    let read_error = |source| Error::ReadArchive {
        path: archive_path.to_path_buf(),
        source,
    };

    let mut archive = Archive::new(reader);
    let mut collected = Collected {
        manifest_text: None,
        entries: HashMap::new(),
        dir_entries: Vec::new(),
    };

    for entry in archive.entries().map_err(read_error)? {
        let mut entry = entry.map_err(read_error)?;
        let (rel, meta) = EntryMeta::from_entry(&entry).map_err(read_error)?;
        if rel.is_empty() {
            continue;
        }

        if is_manifest_entry(&rel) {
            let mut text = String::new();
            entry.read_to_string(&mut text).map_err(read_error)?;
            collected.manifest_text = Some(text);
            continue;
        }

        let mut content = Vec::new();
        match meta.kind {
            EntryKind::Regular => {
                content.reserve(usize::try_from(meta.size.min(MAX_PREALLOC)).unwrap_or(0));
                entry.read_to_end(&mut content).map_err(read_error)?;
            }
            EntryKind::Directory => collected.dir_entries.push(rel.clone()),
            _ => {}
        }
        collected.entries.insert(rel, BufferedEntry { meta, content });
    }
    Ok(collected)
}

/// Phase 2: pre-create directories, then write every manifest path.
///
/// Hard links go in a second pass so their targets exist first.
fn materialize_all(
    dest: &Path,
    manifest: &Manifest,
    entries: &HashMap<String, BufferedEntry>,
    dir_entries: &[String],
    options: &JobOptions,
    progress: &ProgressCounters,
) -> Result<JobStats> {
    let tally = Tally::new(progress);
    tally.add_files(manifest.len() as u64);

    let dirs = DirCache::new();
    let wanted = manifest
        .iter()
        .filter_map(|rel| parent_of(rel))
        .chain(dir_entries.iter().map(String::as_str));
    match precreate_dirs(dest, wanted) {
        Ok(created) => dirs.seed(created),
        Err(e) => options.warn(&format!(
            "Failed to pre-create directories ({e}), creating them on demand"
        )),
    }

    let (links, others): (Vec<&String>, Vec<&String>) = manifest.iter().partition(|rel| {
        entries
            .get(rel.as_str())
            .is_some_and(|buffered| buffered.meta.kind == EntryKind::Hardlink)
    });

    let work = |rel: &String| match entries.get(rel.as_str()) {
        None => {
            options.warn(&format!("{rel}: listed in manifest but not in archive"));
            tally.fail();
        }
        Some(buffered) => {
            match materialize(dest, rel, &buffered.meta, &buffered.content[..], &dirs, options) {
                Ok(bytes) => {
                    tally.succeed(bytes);
                    options.verbose(&format!("x {rel}"));
                }
                Err(e) => {
                    options.warn(&format!("Failed to extract {rel}: {e}"));
                    tally.fail();
                }
            }
        }
    };
    pool::run(others, options.workers(), &work);
    pool::run(links, options.workers(), &work);

    tally.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{MANIFEST_ENTRY_NAME, create_archive};
    use std::collections::BTreeSet;
    use tar::{Builder, EntryType, Header};
    use tempfile::tempdir;

    fn files_under(root: &Path) -> BTreeSet<String> {
        let manifest = crate::manifest::generate(root).unwrap();
        manifest.iter().cloned().collect()
    }

    fn regular(builder: &mut Builder<Vec<u8>>, name: &str, data: &[u8]) {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        builder.append_data(&mut header, name, data).unwrap();
    }

    fn write_tar(path: &Path, fill: impl FnOnce(&mut Builder<Vec<u8>>)) {
        let mut builder = Builder::new(Vec::new());
        fill(&mut builder);
        fs::write(path, builder.into_inner().unwrap()).unwrap();
    }

    #[test]
    fn test_round_trip_preserves_content() {
        let src = tempdir().unwrap();
        fs::create_dir_all(src.path().join("sub/deep")).unwrap();
        fs::write(src.path().join("a.txt"), "alpha").unwrap();
        fs::write(src.path().join("sub/b.txt"), "beta").unwrap();
        fs::write(src.path().join("sub/deep/c.bin"), vec![1u8; 200_000]).unwrap();
        let manifest = crate::manifest::generate(src.path()).unwrap();

        let work = tempdir().unwrap();
        let tar_path = work.path().join("out.tar");
        create_archive(src.path(), &tar_path, &manifest, &JobOptions::default()).unwrap();

        let dest = work.path().join("restore");
        let stats = extract_archive(&tar_path, &dest, &JobOptions::default()).unwrap();
        assert_eq!(stats.succeeded, 3);
        assert_eq!(files_under(&dest), files_under(src.path()));
        assert_eq!(fs::read(dest.join("sub/deep/c.bin")).unwrap(), vec![1u8; 200_000]);
    }

    #[cfg(unix)]
    #[test]
    fn test_round_trip_preserves_permissions() {
        use crate::utils::fs::{apply_mode, mode_of};

        let src = tempdir().unwrap();
        fs::write(src.path().join("script.sh"), "#!/bin/sh\n").unwrap();
        fs::write(src.path().join("secret"), "s").unwrap();
        apply_mode(&src.path().join("script.sh"), 0o751).unwrap();
        apply_mode(&src.path().join("secret"), 0o600).unwrap();
        let manifest = crate::manifest::generate(src.path()).unwrap();

        let work = tempdir().unwrap();
        let tar_path = work.path().join("perm.tar");
        create_archive(src.path(), &tar_path, &manifest, &JobOptions::default()).unwrap();
        let dest = work.path().join("out");
        extract_archive(&tar_path, &dest, &JobOptions::default()).unwrap();

        let mode = |p: &str| mode_of(&fs::metadata(dest.join(p)).unwrap());
        assert_eq!(mode("script.sh"), 0o751);
        assert_eq!(mode("secret"), 0o600);
    }

    #[test]
    fn test_concurrency_does_not_change_result() {
        let src = tempdir().unwrap();
        for i in 0..40 {
            let dir = src.path().join(format!("d{}", i % 5));
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("f{i}")), format!("content {i}")).unwrap();
        }
        let manifest = crate::manifest::generate(src.path()).unwrap();
        let work = tempdir().unwrap();

        let mut results = Vec::new();
        for workers in [1, 8] {
            let options = JobOptions::default().with_concurrency(workers);
            let tar_path = work.path().join(format!("c{workers}.tar"));
            let dest = work.path().join(format!("out{workers}"));
            create_archive(src.path(), &tar_path, &manifest, &options).unwrap();
            extract_archive(&tar_path, &dest, &options).unwrap();
            let contents: Vec<_> = manifest
                .iter()
                .map(|rel| fs::read(dest.join(rel)).unwrap())
                .collect();
            results.push((files_under(&dest), contents));
        }
        assert_eq!(results[0], results[1]);
    }

    #[test]
    fn test_missing_manifest_is_fatal() {
        let work = tempdir().unwrap();
        let tar_path = work.path().join("plain.tar");
        write_tar(&tar_path, |b| regular(b, "a.txt", b"a"));

        let err = extract_archive(&tar_path, &work.path().join("out"), &JobOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingManifest(_)));
        assert!(!work.path().join("out").exists());
    }

    #[test]
    fn test_empty_manifest_is_fatal() {
        let work = tempdir().unwrap();
        let tar_path = work.path().join("empty.tar");
        write_tar(&tar_path, |b| regular(b, MANIFEST_ENTRY_NAME, b"\n\n"));

        let err = extract_archive(&tar_path, &work.path().join("out"), &JobOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyManifest));
    }

    #[test]
    fn test_oversized_header_is_read_error() {
        let work = tempdir().unwrap();
        let tar_path = work.path().join("huge.tar");
        let mut header = Header::new_gnu();
        header.set_path("big.bin").unwrap();
        header.set_entry_type(EntryType::Regular);
        header.set_size(1 << 46);
        header.set_mode(0o644);
        header.set_cksum();
        let mut bytes = header.as_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 1024]);
        fs::write(&tar_path, bytes).unwrap();

        let err = extract_archive(&tar_path, &work.path().join("out"), &JobOptions::default())
            .unwrap_err();
        assert!(
            matches!(err, Error::ReadArchive { .. } | Error::MissingManifest(_)),
            "got {err:?}"
        );
    }

    #[test]
    fn test_manifest_path_missing_from_archive() {
        let work = tempdir().unwrap();
        let tar_path = work.path().join("partial.tar");
        write_tar(&tar_path, |b| {
            regular(b, "./kept.txt", b"kept");
            regular(b, "ignored.txt", b"not in manifest");
            regular(b, MANIFEST_ENTRY_NAME, b"./kept.txt\n./lost.txt\n");
        });

        let dest = work.path().join("out");
        let err = extract_archive(&tar_path, &dest, &JobOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::PartialFailure {
                failed: 1,
                total: 2
            }
        ));
        assert_eq!(fs::read_to_string(dest.join("kept.txt")).unwrap(), "kept");
        assert!(!dest.join("ignored.txt").exists());
    }

    #[test]
    fn test_manifest_found_anywhere_in_stream() {
        let work = tempdir().unwrap();
        let tar_path = work.path().join("first.tar");
        write_tar(&tar_path, |b| {
            regular(b, &format!("./{MANIFEST_ENTRY_NAME}"), b"./x/y.txt\n");
            regular(b, "x/y.txt", b"why");
        });

        let dest = work.path().join("out");
        extract_archive(&tar_path, &dest, &JobOptions::default()).unwrap();
        assert_eq!(fs::read_to_string(dest.join("x/y.txt")).unwrap(), "why");
    }

    #[cfg(unix)]
    #[test]
    fn test_links_and_directories() {
        let work = tempdir().unwrap();
        let tar_path = work.path().join("links.tar");
        write_tar(&tar_path, |b| {
            // Hard link first: extraction must still find its target
            let mut hard = Header::new_gnu();
            hard.set_entry_type(EntryType::Link);
            hard.set_size(0);
            b.append_link(&mut hard, "data/hard.txt", "data/orig.txt").unwrap();

            let mut soft = Header::new_gnu();
            soft.set_entry_type(EntryType::Symlink);
            soft.set_size(0);
            b.append_link(&mut soft, "data/soft", "orig.txt").unwrap();

            let mut dir = Header::new_gnu();
            dir.set_entry_type(EntryType::Directory);
            dir.set_size(0);
            dir.set_mode(0o755);
            b.append_data(&mut dir, "empty/", std::io::empty()).unwrap();

            regular(b, "data/orig.txt", b"original");
            regular(
                b,
                MANIFEST_ENTRY_NAME,
                b"./data/hard.txt\n./data/soft\n./empty\n./data/orig.txt\n",
            );
        });

        let dest = work.path().join("out");
        let stats = extract_archive(&tar_path, &dest, &JobOptions::default()).unwrap();
        assert_eq!(stats.succeeded, 4);
        assert_eq!(fs::read_to_string(dest.join("data/hard.txt")).unwrap(), "original");
        assert_eq!(
            fs::read_link(dest.join("data/soft")).unwrap(),
            Path::new("orig.txt")
        );
        assert!(dest.join("empty").is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_parent_is_not_followed() {
        let work = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let tar_path = work.path().join("escape.tar");
        write_tar(&tar_path, |b| {
            let mut soft = Header::new_gnu();
            soft.set_entry_type(EntryType::Symlink);
            soft.set_size(0);
            b.append_link(&mut soft, "evil", outside.path()).unwrap();
            regular(b, "evil/x.txt", b"payload");
            regular(b, "fine.txt", b"fine");
            regular(b, MANIFEST_ENTRY_NAME, b"./evil\n./evil/x.txt\n./fine.txt\n");
        });

        let dest = work.path().join("out");
        let options = JobOptions::default().with_concurrency(1);
        let err = extract_archive(&tar_path, &dest, &options).unwrap_err();
        assert!(matches!(
            err,
            Error::PartialFailure {
                failed: 1,
                total: 3
            }
        ));
        assert!(!outside.path().join("x.txt").exists());
        assert!(fs::symlink_metadata(dest.join("evil")).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(dest.join("fine.txt")).unwrap(), "fine");
    }

    #[test]
    fn test_unsupported_entry_fails_alone() {
        let work = tempdir().unwrap();
        let tar_path = work.path().join("fifo.tar");
        write_tar(&tar_path, |b| {
            let mut fifo = Header::new_gnu();
            fifo.set_entry_type(EntryType::Fifo);
            fifo.set_size(0);
            b.append_data(&mut fifo, "pipe", std::io::empty()).unwrap();
            regular(b, "ok.txt", b"ok");
            regular(b, MANIFEST_ENTRY_NAME, b"./pipe\n./ok.txt\n");
        });

        let dest = work.path().join("out");
        let err = extract_archive(&tar_path, &dest, &JobOptions::default()).unwrap_err();
        assert!(matches!(err, Error::PartialFailure { failed: 1, .. }));
        assert!(dest.join("ok.txt").exists());
    }
}
