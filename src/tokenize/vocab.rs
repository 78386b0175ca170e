//! Token vocabularies for the arrival-time and interarrival-time encodings

use crate::config::Config;

/// Distinct pitches per instrument
pub const MAX_PITCH: u32 = 128;

/// 128 General MIDI programs plus the drum kit
pub const MAX_INSTR: u32 = 129;

/// Distinct (instrument, pitch) pairs
pub const MAX_NOTE: u32 = MAX_PITCH * MAX_INSTR;

/// Tokens per arrival-time event triple
pub const EVENT_SIZE: usize = 3;

/// Joint (instrument, pitch) index
pub fn note_index(instrument: u8, pitch: u8) -> u32 {
    MAX_PITCH * u32::from(instrument) + u32::from(pitch)
}

/// Instrument of a joint note index
pub fn instrument_of(note: u32) -> u32 {
    note / MAX_PITCH
}

/// Arrival-time vocabulary
///
/// Layout: event block (time, duration, note, REST), control block (the same
/// three fields again), then SEPARATOR / AUTOREGRESS / ANTICIPATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocab {
    pub time_resolution: u32,
    pub max_time: u32,
    pub max_dur: u32,
    pub time_offset: u32,
    pub dur_offset: u32,
    pub note_offset: u32,
    pub rest: u32,
    pub control_offset: u32,
    pub atime_offset: u32,
    pub adur_offset: u32,
    pub anote_offset: u32,
    pub separator: u32,
    pub autoregress: u32,
    pub anticipate: u32,
    /// Anticipation interval in ticks
    pub delta: u32,
}

impl Vocab {
    pub fn from_config(config: &Config) -> Self {
        let tr = config.time_resolution();
        let max_time = tr * config.tokenize.max_time_seconds;
        let max_dur = tr * config.tokenize.max_duration_seconds;

        let time_offset = 0;
        let dur_offset = time_offset + max_time;
        let note_offset = dur_offset + max_dur;
        let rest = note_offset + MAX_NOTE;

        let control_offset = rest + 1;
        let atime_offset = control_offset;
        let adur_offset = atime_offset + max_time;
        let anote_offset = adur_offset + max_dur;

        let separator = anote_offset + MAX_NOTE;

        Self {
            time_resolution: tr,
            max_time,
            max_dur,
            time_offset,
            dur_offset,
            note_offset,
            rest,
            control_offset,
            atime_offset,
            adur_offset,
            anote_offset,
            separator,
            autoregress: separator + 1,
            anticipate: separator + 2,
            delta: tr * config.tokenize.anticipation_interval_seconds,
        }
    }

    pub fn size(&self) -> u32 {
        self.anticipate + 1
    }

    pub fn is_control(&self, note: u32) -> bool {
        note >= self.control_offset && note < self.separator
    }
}

/// Interarrival-time (MIDI-like) vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterarrivalVocab {
    pub max_interarrival: u32,
    pub time_offset: u32,
    pub start_offset: u32,
    pub end_offset: u32,
    pub separator: u32,
}

impl InterarrivalVocab {
    pub fn from_config(config: &Config) -> Self {
        let max_interarrival = config.time_resolution() * config.tokenize.max_interarrival_seconds;
        let time_offset = 0;
        let start_offset = time_offset + max_interarrival;
        let end_offset = start_offset + MAX_NOTE;

        Self {
            max_interarrival,
            time_offset,
            start_offset,
            end_offset,
            separator: end_offset + MAX_NOTE,
        }
    }

    pub fn size(&self) -> u32 {
        self.separator + 1
    }
}
