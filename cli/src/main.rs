//! ptar - Parallel Tar
//!
//! Manifest-driven parallel archiving, extraction and copying powered by
//! partar.

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;
use partar::{
    Error as PartarError, ErrorCode, JobBuilder, JobStats, ProgressCounters, ProgressTracker,
    create_progress_bar,
};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// ptar - Parallel manifest-driven tar
///
/// Archive, extract and copy directory trees with many concurrent workers
/// driven by a precomputed file manifest.
///
/// Usage:
///   ptar tar SOURCE ARCHIVE
///   ptar untar ARCHIVE DEST
///   ptar tar-multi SOURCE OUT_DIR
///   ptar untar-multi PARTS_DIR DEST
///   ptar cp SOURCE DEST
///   ptar manifest SOURCE FILE
#[derive(Parser, Debug)]
#[command(name = "ptar", version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Number of concurrent workers (default: CPU count)
    #[arg(short = 'j', long, global = true)]
    concurrency: Option<usize>,

    /// Do not preserve file permissions
    #[arg(long, global = true)]
    no_perms: bool,

    /// Do not preserve file timestamps
    #[arg(long, global = true)]
    no_times: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    output: OutputMode,

    /// Disable progress bar
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the manifest of a directory to a file
    Manifest {
        /// Directory to walk
        source: PathBuf,
        /// Manifest file to write
        file: PathBuf,
    },
    /// Copy the files of a directory tree in parallel
    Cp {
        /// Source directory
        source: PathBuf,
        /// Destination directory (created if missing)
        dest: PathBuf,
        #[command(flatten)]
        manifest: ManifestArg,
    },
    /// Archive a directory into one tar file
    Tar {
        /// Source directory
        source: PathBuf,
        /// Archive file to write
        archive: PathBuf,
        #[command(flatten)]
        manifest: ManifestArg,
    },
    /// Extract a tar file written by `ptar tar`
    Untar {
        /// Archive file
        archive: PathBuf,
        /// Destination directory (created if missing)
        dest: PathBuf,
    },
    /// Archive a directory into several part-NNNN.tar files
    TarMulti {
        /// Source directory
        source: PathBuf,
        /// Directory receiving the parts
        out_dir: PathBuf,
        /// Number of parts (default: concurrency, at most one per file)
        #[arg(short = 'n', long)]
        count: Option<usize>,
        #[command(flatten)]
        manifest: ManifestArg,
    },
    /// Extract every part-NNNN.tar in a directory
    UntarMulti {
        /// Directory holding the parts
        parts_dir: PathBuf,
        /// Destination directory (created if missing)
        dest: PathBuf,
    },
}

impl Command {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Manifest { .. } => "manifest",
            Self::Cp { .. } => "cp",
            Self::Tar { .. } => "tar",
            Self::Untar { .. } => "untar",
            Self::TarMulti { .. } => "tar-multi",
            Self::UntarMulti { .. } => "untar-multi",
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
struct ManifestArg {
    /// Use an existing manifest instead of walking SOURCE
    #[arg(short = 'm', long = "manifest-file", value_name = "FILE")]
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

type CliResult<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
enum CliError {
    #[error("Part count must be at least 1")]
    InvalidPartCount,

    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("{command} failed: {source}")]
    Job {
        command: &'static str,
        source: PartarError,
    },

    #[error("Failed to serialize JSON output: {source}")]
    JsonSerialize { source: serde_json::Error },
}

impl CliError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPartCount | Self::InvalidConcurrency => ErrorCode::InvalidInput,
            Self::Job { source, .. } => source.code(),
            Self::JsonSerialize { .. } => ErrorCode::Internal,
        }
    }
}

/// What a finished command reports.
enum Outcome {
    Manifest { files: usize, file: PathBuf },
    Job(JobStats),
}

fn exit_code_for(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::InvalidInput => 2,
        _ => 1,
    }
}

fn main() {
    let args = Args::parse();
    let output = args.output;
    let command = args.command.as_str();

    if let Err(error) = run(args) {
        if output == OutputMode::Json {
            let payload = json!({
                "schema_version": "1.0",
                "command": command,
                "status": "error",
                "error_code": error.code().as_str(),
                "error_message": error.to_string(),
            });
            let _ = print_json_value(&payload);
        }
        eprintln!("error[{}]: {}", error.code(), error);
        std::process::exit(exit_code_for(error.code()));
    }
}

fn run(args: Args) -> CliResult<()> {
    if args.concurrency == Some(0) {
        return Err(CliError::InvalidConcurrency);
    }
    if let Command::TarMulti { count: Some(0), .. } = &args.command {
        return Err(CliError::InvalidPartCount);
    }

    let counters = Arc::new(ProgressCounters::new());
    let builder = |source: &PathBuf| configure(&args, source, Arc::clone(&counters));
    let show_progress = args.output == OutputMode::Human && !args.quiet;
    let command = args.command.as_str();

    let tracker = show_progress.then(|| spawn_progress(Arc::clone(&counters)));

    let result = match &args.command {
        Command::Manifest { source, file } => builder(source)
            .write_manifest_to(file)
            .map(|manifest| Outcome::Manifest {
                files: manifest.len(),
                file: file.clone(),
            }),
        Command::Cp {
            source,
            dest,
            manifest,
        } => with_manifest(builder(source), manifest)
            .copy_to(dest)
            .map(Outcome::Job),
        Command::Tar {
            source,
            archive,
            manifest,
        } => with_manifest(builder(source), manifest)
            .archive_to(archive)
            .map(Outcome::Job),
        Command::Untar { archive, dest } => builder(archive).extract_to(dest).map(Outcome::Job),
        Command::TarMulti {
            source,
            out_dir,
            count,
            manifest,
        } => with_manifest(builder(source), manifest)
            .archive_parts_to(out_dir, *count)
            .map(Outcome::Job),
        Command::UntarMulti { parts_dir, dest } => {
            builder(parts_dir).extract_parts_to(dest).map(Outcome::Job)
        }
    };

    if let Some((tracker, pb)) = tracker {
        tracker.finish();
        pb.finish_and_clear();
    }

    let outcome = result.map_err(|source| CliError::Job { command, source })?;
    match args.output {
        OutputMode::Human => print_outcome(command, &outcome, args.verbose),
        OutputMode::Json => emit_json(command, &outcome)?,
    }
    Ok(())
}

fn configure(args: &Args, source: &Path, counters: Arc<ProgressCounters>) -> JobBuilder {
    let mut builder = JobBuilder::new(source).progress(counters);
    if let Some(workers) = args.concurrency {
        builder = builder.concurrency(workers);
    }
    if args.no_perms {
        builder = builder.no_permissions();
    }
    if args.no_times {
        builder = builder.no_timestamps();
    }
    if args.output == OutputMode::Human {
        builder = builder.on_warning(|msg| {
            eprintln!("warning: {}", msg);
        });
        if args.verbose {
            builder = builder.verbose(|msg| {
                eprintln!("{}", msg);
            });
        }
    }
    builder
}

fn with_manifest(builder: JobBuilder, manifest: &ManifestArg) -> JobBuilder {
    match &manifest.path {
        Some(path) => builder.manifest_file(path),
        None => builder,
    }
}

fn spawn_progress(counters: Arc<ProgressCounters>) -> (ProgressTracker, ProgressBar) {
    let pb = create_progress_bar(0);
    let bar = pb.clone();
    let tracker = ProgressTracker::spawn(counters, ProgressTracker::DEFAULT_INTERVAL, move |snap| {
        bar.set_length(snap.total);
        bar.set_position(snap.processed);
    });
    (tracker, pb)
}

fn print_outcome(command: &str, outcome: &Outcome, verbose: bool) {
    let stats = match outcome {
        Outcome::Manifest { files, file } => {
            println!("Wrote manifest of {} files to {}", files, file.display());
            return;
        }
        Outcome::Job(stats) => stats,
    };

    let bytes_str = format_bytes(stats.bytes);
    if verbose {
        println!("{} completed in {:?}", command, stats.duration);
        println!("  Files:          {}", stats.files);
        println!("  Succeeded:      {}", stats.succeeded);
        println!("  Failed:         {}", stats.failed);
        if stats.parts > 0 {
            println!("  Parts:          {}", stats.parts);
        }
        println!("  Total size:     {}", bytes_str);
        if stats.duration.as_secs_f64() > 0.0 {
            let speed = stats.bytes as f64 / stats.duration.as_secs_f64();
            println!("  Speed:          {}/s", format_bytes(speed as u64));
        }
        return;
    }

    let verb = match command {
        "cp" => "Copied",
        "tar" | "tar-multi" => "Archived",
        _ => "Extracted",
    };
    if stats.parts > 0 {
        println!(
            "{} {} files ({}) across {} parts",
            verb, stats.succeeded, bytes_str, stats.parts
        );
    } else {
        println!("{} {} files ({})", verb, stats.succeeded, bytes_str);
    }
}

fn emit_json(command: &str, outcome: &Outcome) -> CliResult<()> {
    let payload = match outcome {
        Outcome::Manifest { files, file } => json!({
            "schema_version": "1.0",
            "command": command,
            "status": "ok",
            "files": files,
            "manifest": file.display().to_string(),
        }),
        Outcome::Job(stats) => json!({
            "schema_version": "1.0",
            "command": command,
            "status": "ok",
            "files": stats.files,
            "succeeded": stats.succeeded,
            "failed": stats.failed,
            "bytes": stats.bytes,
            "parts": stats.parts,
            "duration_ms": u64::try_from(stats.duration.as_millis()).unwrap_or(u64::MAX),
        }),
    };
    print_json_value(&payload)
}

fn print_json_value(value: &Value) -> CliResult<()> {
    let serialized =
        serde_json::to_string(value).map_err(|source| CliError::JsonSerialize { source })?;
    println!("{serialized}");
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
