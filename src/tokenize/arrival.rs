//! Arrival-time tokenizer with anticipation augmentation

use super::ops::{
    anticipate, compound_to_events, extract_instruments, extract_random, extract_spans, flatten,
    instruments, max_time, pad, segment_min_time, translate, Triple,
};
use super::vocab::Vocab;
use super::{filter_track, write_sequence};
use crate::compound::CompoundStream;
use crate::config::Config;
use crate::error::Result as PrepResult;
use crate::progress::ProgressHandle;
use crate::stats::SplitStats;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// How one copy of a track is split into events and controls
#[derive(Debug, Clone, PartialEq)]
pub enum Augmentation {
    /// Plain autoregressive copy
    None,
    /// Anticipated spans at exponential gaps
    Spans,
    /// Each event anticipated with probability `1 / rate`
    Random { rate: u32 },
    /// Every note of the chosen instruments anticipated
    Instruments(BTreeSet<u32>),
}

impl Augmentation {
    /// Pick the augmentation for copy `k` of a track
    ///
    /// Copies cycle in blocks of ten: one plain, one span, four random,
    /// four instrument copies.
    pub fn choose<R: Rng>(k: u32, track_instruments: &[u32], rng: &mut R, config: &Config) -> Self {
        match k % 10 {
            0 => Augmentation::None,
            1 => Augmentation::Spans,
            2..=5 => Augmentation::Random {
                rate: rng.gen_range(1..config.tokenize.anticipation_rates),
            },
            _ if track_instruments.len() > 1 => {
                // at least one instrument, never all of them
                let count = rng.gen_range(1..track_instruments.len());
                let subset = track_instruments
                    .choose_multiple(rng, count)
                    .copied()
                    .collect();
                Augmentation::Instruments(subset)
            }
            _ => Augmentation::None,
        }
    }

    pub fn apply<R: Rng>(
        &self,
        all_events: &[Triple],
        rng: &mut R,
        config: &Config,
        vocab: &Vocab,
    ) -> (Vec<Triple>, Vec<Triple>) {
        match self {
            Augmentation::None => (all_events.to_vec(), Vec::new()),
            Augmentation::Spans => {
                extract_spans(all_events, config.tokenize.span_rate, rng, vocab)
            }
            Augmentation::Random { rate } => extract_random(all_events, *rate, rng, vocab),
            Augmentation::Instruments(subset) => extract_instruments(all_events, subset, vocab),
        }
    }
}

/// Global control token prefixed to sequences from copy `k`
fn global_control(k: u32, vocab: &Vocab) -> u32 {
    if k % 10 == 0 {
        vocab.autoregress
    } else {
        vocab.anticipate
    }
}

/// Tokenize one split into arrival-time sequences
///
/// Each accepted track is emitted `augment_factor` times. Tracks are
/// concatenated behind separator triples and cut into sequences of
/// `context_events` triples, each relativized to start at time 0 and
/// prefixed with a global control token.
pub fn tokenize(
    files: &[PathBuf],
    output: &Path,
    augment_factor: u32,
    slot: usize,
    config: &Config,
    progress: &ProgressHandle,
) -> PrepResult<SplitStats> {
    let vocab = Vocab::from_config(config);
    let seq_events = config.tokenize.context_events;
    let mut rng = StdRng::seed_from_u64(config.tokenize.seed);
    let mut stats = SplitStats::default();

    let mut writer = BufWriter::new(File::create(output)?);
    let bar = progress.slot_bar(slot, files.len() as u64, &format!("#{}", slot));

    let mut concatenated: Vec<Triple> = Vec::new();
    let mut z = vocab.autoregress;

    for path in files {
        let stream = CompoundStream::read(path)?;
        if stats.record_discard(filter_track(&stream, config)) {
            bar.inc(1);
            continue;
        }

        let (all_events, truncations) = compound_to_events(&stream, &vocab);
        let track_instruments: Vec<u32> = instruments(&all_events, &vocab).into_keys().collect();
        let end_time = max_time(&all_events, &vocab);

        for k in 0..augment_factor {
            let augmentation = Augmentation::choose(k, &track_instruments, &mut rng, config);
            let (events, controls) = augmentation.apply(&all_events, &mut rng, config, &vocab);

            if concatenated.is_empty() {
                z = global_control(k, &vocab);
            }

            stats.truncations += truncations;
            let events = pad(&events, end_time, &vocab);
            stats.rest_tokens += events.iter().filter(|t| t.is_rest(&vocab)).count() as u64;

            concatenated.push(Triple::separator(&vocab));
            concatenated.extend(anticipate(&events, &controls, &vocab));

            while concatenated.len() >= seq_events {
                let seq: Vec<Triple> = concatenated.drain(..seq_events).collect();
                let start = segment_min_time(&seq, &vocab).unwrap_or(0);
                let seq = translate(&seq, -i64::from(start), &vocab);

                // relative times must stay inside the time vocabulary
                if max_time(&seq, &vocab) >= vocab.max_time {
                    stats.discarded_other += 1;
                    continue;
                }

                write_sequence(&mut writer, std::iter::once(z).chain(flatten(&seq)))?;
                stats.sequences += 1;

                z = global_control(k, &vocab);
            }
        }
        bar.inc(1);
    }

    writer.flush()?;
    bar.finish();

    debug!(
        "{}: {} sequences, {} tracks discarded, {} sequences discarded, {} rest tokens",
        output.display(),
        stats.sequences,
        stats.out_of_bounds(),
        stats.discarded_other,
        stats.rest_tokens
    );
    Ok(stats)
}
