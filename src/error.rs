//! Error types for the MIDI tokenization pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for preprocessing and tokenization
#[derive(Debug, Error)]
pub enum PrepError {
    /// E001: MIDI file could not be parsed
    #[error("E001: MIDI parse error - {0}")]
    MidiParse(String),
    /// E002: MIDI file parsed but uses a feature we cannot convert
    #[error("E002: Unsupported MIDI content - {0}")]
    UnsupportedMidi(String),
    /// E003: Compound artifact is malformed
    #[error("E003: Malformed compound stream - {0}")]
    CompoundFormat(String),
    /// E004: Compound stream onsets are not non-decreasing
    #[error("E004: Unsorted compound stream - event {index} at tick {time} follows tick {previous}")]
    UnsortedStream { index: usize, time: u32, previous: u32 },
    /// E005: File I/O error
    #[error("E005: File I/O error - {0}")]
    Io(#[from] std::io::Error),
    /// E006: Configuration validation failed
    #[error("E006: Configuration validation failed - {0}")]
    ConfigValidationFailed(String),
    /// E007: Augmentation factor not usable with the requested encoding
    #[error("E007: Invalid augmentation - {0}")]
    InvalidAugmentation(String),
    /// E008: Worker pool could not be created
    #[error("E008: Worker pool error - {0}")]
    WorkerPool(String),
    /// E009: Input discovery failed
    #[error("E009: File discovery error - {0}")]
    Discovery(String),
    /// E010: A worker panicked while processing one unit
    #[error("E010: Worker panicked on {path} - {message}")]
    WorkerPanicked { path: PathBuf, message: String },
}

impl From<midly::Error> for PrepError {
    fn from(err: midly::Error) -> Self {
        PrepError::MidiParse(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for PrepError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        PrepError::WorkerPool(err.to_string())
    }
}

impl From<glob::PatternError> for PrepError {
    fn from(err: glob::PatternError) -> Self {
        PrepError::Discovery(format!("Invalid pattern: {}", err))
    }
}

impl From<glob::GlobError> for PrepError {
    fn from(err: glob::GlobError) -> Self {
        PrepError::Discovery(format!("Unreadable path: {}", err))
    }
}

impl From<std::num::ParseIntError> for PrepError {
    fn from(err: std::num::ParseIntError) -> Self {
        PrepError::CompoundFormat(format!("Non-integer token: {}", err))
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PrepError>;
