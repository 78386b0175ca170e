//! Interarrival-time (MIDI-like) tokenizer

use super::vocab::{note_index, InterarrivalVocab};
use super::{filter_track, write_sequence};
use crate::compound::CompoundStream;
use crate::config::Config;
use crate::error::{PrepError, Result as PrepResult};
use crate::progress::ProgressHandle;
use crate::stats::SplitStats;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Ordering of simultaneous note edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum EdgeRank {
    /// Release of a note that started earlier
    Release,
    Onset,
    /// Release of a zero-length note, after its own onset
    ZeroLengthRelease,
}

/// Convert a compound stream to interarrival tokens
///
/// Every note contributes an onset at its start and a release at its end.
/// Positive gaps between consecutive edges become time-shift tokens, clipped
/// to `max_interarrival - 1`; the second value counts clipped gaps.
pub fn compound_to_interarrival(stream: &CompoundStream, vocab: &InterarrivalVocab) -> (Vec<u32>, u64) {
    let mut edges: Vec<(u64, EdgeRank, u32)> = Vec::with_capacity(2 * stream.len());
    for event in stream {
        let note = note_index(event.instrument, event.note);
        let onset = u64::from(event.time);
        let release = onset + u64::from(event.duration);
        let release_rank = if event.duration == 0 {
            EdgeRank::ZeroLengthRelease
        } else {
            EdgeRank::Release
        };

        edges.push((onset, EdgeRank::Onset, vocab.start_offset + note));
        edges.push((release, release_rank, vocab.end_offset + note));
    }
    // stable: ties keep stream order
    edges.sort_by_key(|(tick, rank, _)| (*tick, *rank));

    let max_shift = u64::from(vocab.max_interarrival - 1);
    let mut tokens = Vec::with_capacity(edges.len() * 2);
    let mut truncations = 0u64;
    let mut last_tick = 0u64;

    for (tick, _, token) in edges {
        let gap = tick - last_tick;
        if gap > 0 {
            let shift = gap.min(max_shift);
            if shift != gap {
                truncations += 1;
            }
            tokens.push(vocab.time_offset + shift as u32);
        }
        tokens.push(token);
        last_tick = tick;
    }

    (tokens, truncations)
}

/// Tokenize one split into interarrival sequences
///
/// Accepted tracks are concatenated behind a separator token and cut into
/// lines of `context_size` tokens. This encoding has no augmentation, so any
/// factor other than 1 is an error.
pub fn tokenize_ia(
    files: &[PathBuf],
    output: &Path,
    augment_factor: u32,
    slot: usize,
    config: &Config,
    progress: &ProgressHandle,
) -> PrepResult<SplitStats> {
    if augment_factor != 1 {
        return Err(PrepError::InvalidAugmentation(format!(
            "interarrival encoding cannot be augmented (factor {})",
            augment_factor
        )));
    }

    let vocab = InterarrivalVocab::from_config(config);
    let context_size = config.tokenize.context_size;
    let mut stats = SplitStats::default();

    let mut writer = BufWriter::new(File::create(output)?);
    let bar = progress.slot_bar(slot, files.len() as u64, &format!("#{}", slot));

    let mut concatenated: Vec<u32> = Vec::new();

    for path in files {
        let stream = CompoundStream::read(path)?;
        if !stats.record_discard(filter_track(&stream, config)) {
            let (tokens, truncations) = compound_to_interarrival(&stream, &vocab);
            concatenated.push(vocab.separator);
            concatenated.extend(tokens);
            stats.truncations += truncations;

            while concatenated.len() >= context_size {
                write_sequence(&mut writer, concatenated.drain(..context_size))?;
                stats.sequences += 1;
            }
        }
        bar.inc(1);
    }

    writer.flush()?;
    bar.finish();

    debug!(
        "{}: {} sequences, {} tracks discarded, {} truncations",
        output.display(),
        stats.sequences,
        stats.out_of_bounds(),
        stats.truncations
    );
    Ok(stats)
}
