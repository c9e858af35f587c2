//! Single-archive writer: parallel readers, one serialized frame writer.
//!
//! A tar stream is a sequence of header + content frames that must not
//! interleave. Workers stat and open their files concurrently, then take
//! the [`SerializedWriter`] lock for exactly one frame. The first frame
//! write error is kept as the archive's fatal error; once it is set, every
//! remaining queued item is drained without touching the stream.

use super::{MANIFEST_ENTRY_NAME, READ_BUFFER_SIZE, STREAM_BUFFER_SIZE};
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::options::JobOptions;
use crate::pool;
use crate::progress::ProgressCounters;
use crate::stats::{JobStats, Tally};
use crate::utils::fs::mode_of;
use crate::utils::lock;
use crate::utils::path::{require_dir, safe_join};
use filetime::FileTime;
use std::fs::{self, File, Metadata};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tar::{Builder, EntryType, Header};

/// Build one archive at `output` from the files named in `manifest`.
///
/// `src_root` is the directory manifest paths are relative to. The
/// manifest is embedded as the last entry.
///
/// # Errors
///
/// - [`Error::SourceNotFound`] / [`Error::NotADirectory`] for a bad `src_root`
/// - [`Error::EmptyManifest`] if there is nothing to archive
/// - [`Error::CreateOutput`] if `output` cannot be created
/// - [`Error::WriteFrame`] if writing any frame failed
/// - [`Error::PartialFailure`] if some source files could not be read; the
///   archive is still complete and carries the full manifest
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use partar::{JobOptions, create_archive, generate};
///
/// let manifest = generate(Path::new("data"))?;
/// let stats = create_archive(Path::new("data"), Path::new("data.tar"), &manifest, &JobOptions::default())?;
/// println!("archived {} files", stats.succeeded);
/// # Ok::<(), partar::Error>(())
/// ```
pub fn create_archive(
    src_root: &Path,
    output: &Path,
    manifest: &Manifest,
    options: &JobOptions,
) -> Result<JobStats> {
    create_archive_with_progress(src_root, output, manifest, options, &ProgressCounters::new())
}

/// [`create_archive`] that also reports into shared progress counters.
pub fn create_archive_with_progress(
    src_root: &Path,
    output: &Path,
    manifest: &Manifest,
    options: &JobOptions,
    progress: &ProgressCounters,
) -> Result<JobStats> {
    require_dir(src_root)?;
    if manifest.is_empty() {
        return Err(Error::EmptyManifest);
    }
    if output.is_dir() {
        return Err(Error::IsADirectory(output.to_path_buf()));
    }

    let file = File::create(output).map_err(|source| Error::CreateOutput {
        path: output.to_path_buf(),
        source,
    })?;
    let buffered = BufWriter::with_capacity(STREAM_BUFFER_SIZE, file);
    let (buffered, outcome) = write_frames(src_root, buffered, manifest, options, progress)?;
    // The tail of the archive may still be buffered even when some files failed
    let file = buffered
        .into_inner()
        .map_err(|e| frame_error(MANIFEST_ENTRY_NAME, e.into_error()))?;
    file.sync_all()
        .map_err(|e| frame_error(MANIFEST_ENTRY_NAME, e))?;
    let stats = outcome?;

    options.verbose(&format!(
        "wrote {} ({} files, {} bytes)",
        output.display(),
        stats.succeeded,
        stats.bytes
    ));
    Ok(stats)
}

/// Write an archive of `manifest` into any writer and hand the writer back.
///
/// Same semantics as [`create_archive`] minus the output file handling.
pub fn write_archive<W: Write + Send>(
    src_root: &Path,
    writer: W,
    manifest: &Manifest,
    options: &JobOptions,
    progress: &ProgressCounters,
) -> Result<(W, JobStats)> {
    let (writer, outcome) = write_frames(src_root, writer, manifest, options, progress)?;
    outcome.map(|stats| (writer, stats))
}

/// Write every frame plus the manifest. The outer error is a fatal stream
/// failure; otherwise the writer comes back alongside the tally outcome, so
/// callers can still flush it when some files failed.
fn write_frames<W: Write + Send>(
    src_root: &Path,
    writer: W,
    manifest: &Manifest,
    options: &JobOptions,
    progress: &ProgressCounters,
) -> Result<(W, Result<JobStats>)> {
    let tally = Tally::new(progress);
    tally.add_files(manifest.len() as u64);

    let archive = SerializedWriter::new(writer);
    pool::run(manifest.iter(), options.workers(), |rel| {
        if archive.has_failed() {
            tally.skip();
            return;
        }
        match archive_one(&archive, src_root, rel) {
            Ok(Some(bytes)) => {
                tally.succeed(bytes);
                options.verbose(&format!("a {rel}"));
            }
            Ok(None) => tally.skip(),
            Err(e) => {
                tally.fail();
                if !matches!(e, Error::WriteFrame { .. }) {
                    options.warn(&format!("Skipping {rel}: {e}"));
                }
            }
        }
    });

    archive.append_manifest(manifest);
    let writer = archive.finish()?;
    Ok((writer, tally.finish()))
}

/// Archive one file. `Ok(None)` means the frame was skipped because the
/// archive already failed.
fn archive_one<W: Write>(
    archive: &SerializedWriter<W>,
    src_root: &Path,
    rel: &str,
) -> Result<Option<u64>> {
    let src = safe_join(src_root, rel)?;
    let meta = fs::metadata(&src).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::SourceNotFound(src.clone()),
        _ => Error::Io(e),
    })?;

    let mut header = header_for(&meta);
    if meta.is_dir() {
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        return Ok(archive.append(rel, &mut header, io::empty())?.then_some(0));
    }
    if !meta.is_file() {
        return Err(Error::UnsupportedEntryType {
            path: rel.to_string(),
            kind: '?',
        });
    }

    let size = meta.len();
    header.set_entry_type(EntryType::Regular);
    header.set_size(size);
    let file = File::open(&src)?;
    let reader = BufReader::with_capacity(READ_BUFFER_SIZE, ExactReader::new(file, size));
    Ok(archive.append(rel, &mut header, reader)?.then_some(size))
}

fn header_for(meta: &Metadata) -> Header {
    let mut header = Header::new_gnu();
    header.set_mode(mode_of(meta));
    header.set_mtime(unix_secs(FileTime::from_last_modification_time(meta)));
    if let Some(gnu) = header.as_gnu_mut() {
        gnu.set_atime(unix_secs(FileTime::from_last_access_time(meta)));
    }
    header
}

fn unix_secs(time: FileTime) -> u64 {
    u64::try_from(time.unix_seconds()).unwrap_or(0)
}

fn frame_error(entry: &str, source: io::Error) -> Error {
    Error::WriteFrame {
        entry: entry.to_string(),
        source,
    }
}

/// One tar builder shared by all workers, plus the archive's fatal error.
pub(crate) struct SerializedWriter<W: Write> {
    builder: Mutex<Builder<W>>,
    fatal: Mutex<Option<Error>>,
}

impl<W: Write> SerializedWriter<W> {
    pub(crate) fn new(writer: W) -> Self {
        Self {
            builder: Mutex::new(Builder::new(writer)),
            fatal: Mutex::new(None),
        }
    }

    pub(crate) fn has_failed(&self) -> bool {
        lock(&self.fatal).is_some()
    }

    /// Write one header + content frame.
    ///
    /// Returns `Ok(false)` without writing if an earlier frame failed. A
    /// failure of this frame is recorded as the fatal error and returned.
    pub(crate) fn append<R: Read>(
        &self,
        rel: &str,
        header: &mut Header,
        content: R,
    ) -> Result<bool> {
        let mut builder = lock(&self.builder);
        if self.has_failed() {
            return Ok(false);
        }
        match builder.append_data(header, rel, content) {
            Ok(()) => Ok(true),
            Err(source) => {
                let mut fatal = lock(&self.fatal);
                if fatal.is_none() {
                    *fatal = Some(frame_error(rel, source));
                }
                Err(frame_error(rel, io::Error::other("archive stream failed")))
            }
        }
    }

    /// Append the manifest as the final entry, unless a frame already failed.
    ///
    /// A failure here lands in the fatal slot and surfaces from [`finish`](Self::finish).
    pub(crate) fn append_manifest(&self, manifest: &Manifest) {
        let text = manifest.to_text();
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(text.len() as u64);
        header.set_mtime(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
        );
        let _ = self.append(MANIFEST_ENTRY_NAME, &mut header, text.as_bytes());
    }

    /// Write the end-of-archive marker and return the inner writer, or the
    /// fatal error if any frame failed.
    pub(crate) fn finish(self) -> Result<W> {
        let fatal = self
            .fatal
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(error) = fatal {
            return Err(error);
        }
        let builder = self
            .builder
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        builder
            .into_inner()
            .map_err(|e| frame_error("end-of-archive marker", e))
    }
}

/// Reads exactly `size` bytes from a file, failing if it shrank since it
/// was stat'ed. Extra bytes from a file that grew are ignored.
struct ExactReader<R> {
    inner: io::Take<R>,
}

impl<R: Read> ExactReader<R> {
    fn new(inner: R, size: u64) -> Self {
        Self {
            inner: inner.take(size),
        }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() && self.inner.limit() > 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank while being archived",
            ));
        }
        Ok(n)
    }
}
