//! MIDI → token dataset preparation
//!
//! Converts a corpus of MIDI files into per-file compound token artifacts
//! (optionally with a synthetic drum grid), then tokenizes the Train / Test /
//! Validation splits into arrival-time or interarrival-time sequences.

pub mod compound;
pub mod config;
pub mod drums;
pub mod error;
pub mod midi;
pub mod preprocess;
pub mod progress;
pub mod stats;
pub mod tokenize;

pub use compound::{CompoundEvent, CompoundStream};
pub use config::Config;
pub use error::{PrepError, Result as PrepResult};
pub use preprocess::{FileOutcome, PreprocessOptions};
pub use progress::ProgressHandle;
pub use stats::{PreprocessSummary, SplitStats, TokenizationReport};
pub use tokenize::{Encoding, Split};

use std::path::{Path, PathBuf};

/// Main entry point for both pipeline stages
pub struct Pipeline {
    config: Config,
    progress: ProgressHandle,
}

impl Pipeline {
    /// Create a pipeline drawing progress to stderr
    pub fn new(config: Config) -> Self {
        Self::with_progress(config, ProgressHandle::new())
    }

    /// Create a pipeline with an explicit progress handle
    pub fn with_progress(config: Config, progress: ProgressHandle) -> Self {
        Self { config, progress }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// MIDI files that `preprocess` would convert
    pub fn discover<P: AsRef<Path>>(&self, root: P) -> PrepResult<Vec<PathBuf>> {
        preprocess::discover_midi_files(root.as_ref(), &self.config.preprocess.extensions)
    }

    /// Convert the given MIDI files to compound artifacts
    pub fn preprocess(
        &self,
        files: &[PathBuf],
        options: PreprocessOptions,
    ) -> PrepResult<PreprocessSummary> {
        let outcomes = preprocess::preprocess_files(files, options, &self.config, &self.progress)?;
        Ok(PreprocessSummary::from_statuses(
            outcomes.iter().map(FileOutcome::status),
        ))
    }

    /// Tokenize the three splits under `datadir`
    pub fn tokenize<P: AsRef<Path>>(
        &self,
        datadir: P,
        augment: u32,
        encoding: Encoding,
    ) -> PrepResult<TokenizationReport> {
        tokenize::tokenize_dataset(datadir.as_ref(), augment, encoding, &self.config, &self.progress)
    }
}

/// Validate configuration and the input directory
pub fn validate_input<P: AsRef<Path>>(input_dir: P, config: &Config) -> PrepResult<()> {
    if !input_dir.as_ref().is_dir() {
        return Err(PrepError::Discovery(format!(
            "{} is not a directory",
            input_dir.as_ref().display()
        )));
    }

    config::validate_config(config)
        .map_err(|err| PrepError::ConfigValidationFailed(err.to_string()))?;

    Ok(())
}

/// Name prefix of every pool thread
pub const WORKER_THREAD_PREFIX: &str = "midi2tokens-worker-";

/// Fixed-size pool shared by the per-file and per-split fan-outs
pub fn worker_pool(workers: usize) -> PrepResult<rayon::ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("{}{}", WORKER_THREAD_PREFIX, i))
        .build()?;
    Ok(pool)
}

/// Send panic reports from pool threads to the debug log
///
/// Panics on any other thread keep the previous hook.
pub fn quiet_worker_panics() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let on_worker = std::thread::current()
            .name()
            .map_or(false, |name| name.starts_with(WORKER_THREAD_PREFIX));
        if on_worker {
            log::debug!("{}", info);
        } else {
            previous(info);
        }
    }));
}
