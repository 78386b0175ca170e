//! Preprocessing: MIDI files → per-file compound artifacts
//!
//! Each file is one unit of work. A unit either writes exactly one
//! `<file>.compound.txt` or writes nothing and reports failure; no failure
//! ever escapes the unit.

use crate::compound::{compound_path, CompoundStream};
use crate::config::Config;
use crate::drums::{add_drum_track, DrumGrid};
use crate::error::{PrepError, Result as PrepResult};
use crate::midi::midi_to_compound;
use crate::progress::ProgressHandle;
use crate::stats::PreprocessSummary;
use crate::worker_pool;
use log::{info, warn};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

/// Per-run switches for the conversion worker
#[derive(Debug, Clone, Copy, Default)]
pub struct PreprocessOptions {
    /// Merge a synthetic kick/hi-hat grid into every file
    pub add_drum: bool,
    /// Log failing paths with full error detail
    pub debug: bool,
}

/// Result of converting one file
#[derive(Debug)]
pub enum FileOutcome {
    Converted { path: PathBuf, events: usize },
    Failed { path: PathBuf, reason: PrepError },
}

impl FileOutcome {
    /// 0 on success, 1 on failure
    pub fn status(&self) -> u8 {
        match self {
            FileOutcome::Converted { .. } => 0,
            FileOutcome::Failed { .. } => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == 0
    }

    /// Source MIDI path
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Converted { path, .. } | FileOutcome::Failed { path, .. } => path,
        }
    }
}

/// Convert one file and persist its compound stream
///
/// Returns the number of events written.
pub fn convert_file(path: &Path, options: PreprocessOptions, config: &Config) -> PrepResult<usize> {
    let mut stream: CompoundStream = midi_to_compound(path, options.debug, config)?;
    if options.add_drum {
        let grid = DrumGrid::from_config(config)?;
        stream = add_drum_track(&stream, &grid)?;
    }

    // Only reached once the stream is complete
    stream.write(compound_path(path))?;
    Ok(stream.len())
}

/// Worker entry point: never fails, never panics past this frame
pub fn convert_midi(
    path: &Path,
    options: PreprocessOptions,
    config: &Config,
    progress: &ProgressHandle,
) -> FileOutcome {
    run_isolated(path, options.debug, progress, || convert_file(path, options, config))
}

/// Run one unit of work for `path`, turning errors and panics into `Failed`
pub fn run_isolated<F>(
    path: &Path,
    debug: bool,
    progress: &ProgressHandle,
    work: F,
) -> FileOutcome
where
    F: FnOnce() -> PrepResult<usize>,
{
    let result = panic::catch_unwind(AssertUnwindSafe(work)).unwrap_or_else(|payload| {
        Err(PrepError::WorkerPanicked {
            path: path.to_path_buf(),
            message: panic_message(payload.as_ref()),
        })
    });

    match result {
        Ok(events) => FileOutcome::Converted {
            path: path.to_path_buf(),
            events,
        },
        Err(reason) => {
            if debug {
                progress.suspend(|| {
                    warn!("Failed to process: {}", path.display());
                    warn!("{}", reason);
                });
            }
            FileOutcome::Failed {
                path: path.to_path_buf(),
                reason,
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Recursively find files with any of `extensions` under `root`
pub fn discover_midi_files(root: &Path, extensions: &[String]) -> PrepResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(PrepError::Discovery(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let base = glob::Pattern::escape(&root.to_string_lossy());
    let mut files = Vec::new();
    for ext in extensions {
        let pattern = format!("{}/**/*.{}", base, ext);
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            if path.is_file() {
                files.push(path);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Convert `files` on a pool of `config.preprocess.workers` threads
///
/// Every file is attempted exactly once; the returned outcomes cover all of
/// them, in input order.
pub fn preprocess_files(
    files: &[PathBuf],
    options: PreprocessOptions,
    config: &Config,
    progress: &ProgressHandle,
) -> PrepResult<Vec<FileOutcome>> {
    let pool = worker_pool(config.preprocess.workers)?;
    let bar = progress.bar(files.len() as u64, "Preprocess");

    let outcomes = pool.install(|| {
        files
            .par_iter()
            .map(|path| {
                let outcome = convert_midi(path, options, config, progress);
                bar.inc(1);
                outcome
            })
            .collect::<Vec<_>>()
    });

    bar.finish();
    Ok(outcomes)
}

/// Discover and convert every MIDI file under `root`
pub fn preprocess_dir(
    root: &Path,
    options: PreprocessOptions,
    config: &Config,
    progress: &ProgressHandle,
) -> PrepResult<PreprocessSummary> {
    let files = discover_midi_files(root, &config.preprocess.extensions)?;
    info!(
        "Preprocessing {} files with {} workers",
        files.len(),
        config.preprocess.workers
    );

    let outcomes = preprocess_files(&files, options, config, progress)?;
    Ok(PreprocessSummary::from_statuses(
        outcomes.iter().map(FileOutcome::status),
    ))
}
