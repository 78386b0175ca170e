//! Tokenization: per-split compound artifacts → training sequences
//!
//! One job per dataset split. Each job reads every compound artifact of its
//! split, writes one consolidated `tokenized-events-<Split>.txt`, and returns
//! that split's statistics. A failing job fails the whole run.

pub mod arrival;
pub mod interarrival;
pub mod ops;
pub mod vocab;

use crate::compound::{CompoundStream, COMPOUND_SUFFIX};
use crate::config::Config;
use crate::error::Result as PrepResult;
use crate::progress::ProgressHandle;
use crate::stats::{SplitStats, TokenizationReport};
use crate::worker_pool;
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};

pub use arrival::tokenize;
pub use interarrival::tokenize_ia;

/// Signature shared by both tokenizers
pub type TokenizeFn =
    fn(&[PathBuf], &Path, u32, usize, &Config, &ProgressHandle) -> PrepResult<SplitStats>;

/// Event encoding produced by the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Arrival,
    Interarrival,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Arrival => "arrival",
            Encoding::Interarrival => "interarrival",
        }
    }

    /// What a truncation means under this encoding
    pub fn truncation_kind(&self) -> &'static str {
        match self {
            Encoding::Arrival => "duration",
            Encoding::Interarrival => "interarrival",
        }
    }

    pub fn tokenizer(&self) -> TokenizeFn {
        match self {
            Encoding::Arrival => tokenize,
            Encoding::Interarrival => tokenize_ia,
        }
    }
}

/// The three fixed dataset splits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Test,
    Validation,
}

impl Split {
    /// Splits in dispatch (and display slot) order
    pub const ALL: [Split; 3] = [Split::Train, Split::Test, Split::Validation];

    /// Directory name under the dataset root
    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "Train",
            Split::Test => "Test",
            Split::Validation => "Validation",
        }
    }

    pub fn is_training(&self) -> bool {
        matches!(self, Split::Train)
    }

    pub fn dir(&self, datadir: &Path) -> PathBuf {
        datadir.join(self.name())
    }

    pub fn output_path(&self, datadir: &Path) -> PathBuf {
        datadir.join(format!("tokenized-events-{}.txt", self.name()))
    }

    /// Only the training split is augmented
    pub fn augment_factor(&self, augment: u32) -> u32 {
        if self.is_training() {
            augment
        } else {
            1
        }
    }
}

/// Filter verdict for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    Accepted,
    TooShort,
    TooLong,
    TooManyInstruments,
}

/// Apply the length and instrument-count bounds to a compound stream
pub fn filter_track(stream: &CompoundStream, config: &Config) -> TrackStatus {
    let tok = &config.tokenize;
    let tr = config.time_resolution();

    if stream.len() < tok.min_track_events {
        return TrackStatus::TooShort;
    }

    let end_time = stream.end_time();
    if end_time < tr * tok.min_track_time_seconds {
        return TrackStatus::TooShort;
    }
    if end_time > tr * tok.max_track_time_seconds {
        return TrackStatus::TooLong;
    }

    if stream.instruments().len() > tok.max_track_instruments {
        return TrackStatus::TooManyInstruments;
    }

    TrackStatus::Accepted
}

impl SplitStats {
    /// Count a filtered track; returns false when the track was accepted
    pub fn record_discard(&mut self, status: TrackStatus) -> bool {
        match status {
            TrackStatus::Accepted => return false,
            TrackStatus::TooShort => self.too_short += 1,
            TrackStatus::TooLong => self.too_long += 1,
            TrackStatus::TooManyInstruments => self.too_many_instruments += 1,
        }
        true
    }
}

/// Everything one split job needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitJob {
    pub split: Split,
    pub files: Vec<PathBuf>,
    pub output: PathBuf,
    pub augment_factor: u32,
    /// Progress display row; carries no data
    pub slot: usize,
}

/// Compound artifacts directly inside `dir`, sorted; empty if `dir` is missing
pub fn split_files(dir: &Path) -> PrepResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let pattern = format!(
        "{}/*{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        COMPOUND_SUFFIX
    );
    let mut files = glob::glob(&pattern)?.collect::<Result<Vec<_>, _>>()?;
    files.sort();
    Ok(files)
}

/// Build the three split jobs for `datadir`
pub fn plan_jobs(datadir: &Path, augment: u32) -> PrepResult<Vec<SplitJob>> {
    Split::ALL
        .iter()
        .enumerate()
        .map(|(slot, split)| {
            Ok(SplitJob {
                split: *split,
                files: split_files(&split.dir(datadir))?,
                output: split.output_path(datadir),
                augment_factor: split.augment_factor(augment),
                slot,
            })
        })
        .collect()
}

/// Run one split job with the tokenizer for `encoding`
pub fn run_job(
    job: &SplitJob,
    encoding: Encoding,
    config: &Config,
    progress: &ProgressHandle,
) -> PrepResult<SplitStats> {
    let tokenizer = encoding.tokenizer();
    tokenizer(
        &job.files,
        &job.output,
        job.augment_factor,
        job.slot,
        config,
        progress,
    )
}

/// Tokenize all three splits in parallel and aggregate their statistics
pub fn tokenize_dataset(
    datadir: &Path,
    augment: u32,
    encoding: Encoding,
    config: &Config,
    progress: &ProgressHandle,
) -> PrepResult<TokenizationReport> {
    let jobs = plan_jobs(datadir, augment)?;
    let pool = worker_pool(config.preprocess.workers)?;

    let results = pool.install(|| {
        jobs.par_iter()
            .map(|job| run_job(job, encoding, config, progress))
            .collect::<PrepResult<Vec<_>>>()
    })?;

    Ok(TokenizationReport::aggregate(
        results,
        encoding,
        config.tokenize.context_events as u64,
    ))
}

/// Write one sequence as a line of space-separated tokens
pub(crate) fn write_sequence<W, I>(writer: &mut W, tokens: I) -> std::io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = u32>,
{
    let mut first = true;
    for token in tokens {
        if first {
            write!(writer, "{}", token)?;
            first = false;
        } else {
            write!(writer, " {}", token)?;
        }
    }
    writeln!(writer)
}
