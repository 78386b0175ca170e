//! Synthetic drum track: a kick on every bar and a closed hi-hat on every beat
//!
//! The grid is walked lazily: markers are only emitted for grid points at or
//! before the onset of a real event, so nothing is added past the last note.

use crate::compound::{CompoundEvent, CompoundStream, DRUM_KIT};
use crate::config::Config;
use crate::error::{PrepError, Result as PrepResult};

/// Velocity of every synthetic marker
pub const MARKER_VELOCITY: u8 = 100;

/// The two voices of the synthetic track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridVoice {
    /// Bass drum on each bar line
    Bar,
    /// Closed hi-hat on each beat
    Beat,
}

impl GridVoice {
    /// General MIDI percussion key
    pub fn midi_note(&self) -> u8 {
        match self {
            GridVoice::Bar => 36,  // C2 (bass drum)
            GridVoice::Beat => 42, // F#2 (closed hi-hat)
        }
    }
}

/// Beat/bar lengths in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrumGrid {
    beat_length: u32,
    bar_length: u32,
}

impl DrumGrid {
    /// Grid with four beats to the bar
    pub fn new(beat_length: u32) -> PrepResult<Self> {
        if beat_length == 0 {
            return Err(PrepError::ConfigValidationFailed(
                "beat length must be at least one tick".to_string(),
            ));
        }
        let bar_length = beat_length.checked_mul(4).ok_or_else(|| {
            PrepError::ConfigValidationFailed(format!(
                "beat length {} ticks overflows a four-beat bar",
                beat_length
            ))
        })?;
        Ok(Self {
            beat_length,
            bar_length,
        })
    }

    /// Grid derived from the configured time resolution
    pub fn from_config(config: &Config) -> PrepResult<Self> {
        Self::new(config.beat_length())
    }

    pub fn beat_length(&self) -> u32 {
        self.beat_length
    }

    pub fn bar_length(&self) -> u32 {
        self.bar_length
    }

    /// Marker event for `voice` at tick `time`
    pub fn marker(&self, voice: GridVoice, time: u32) -> CompoundEvent {
        let duration = match voice {
            GridVoice::Bar => self.bar_length - 1,
            GridVoice::Beat => self.beat_length - 1,
        };
        CompoundEvent::new(time, duration, voice.midi_note(), DRUM_KIT, MARKER_VELOCITY)
    }
}

/// Merge a synthetic drum track into `stream`
///
/// Every original event is emitted unchanged and in order. Before each one,
/// all grid points at or before its onset that have not been emitted yet are
/// inserted (bar marker first when the point is a bar line).
pub fn add_drum_track(stream: &CompoundStream, grid: &DrumGrid) -> PrepResult<CompoundStream> {
    stream.check_sorted()?;

    let beat = u64::from(grid.beat_length());
    let bar = u64::from(grid.bar_length());

    let mut output = CompoundStream::with_capacity(stream.len() * 2);
    let mut next_beat: u64 = 0;

    for event in stream {
        while u64::from(event.time) >= next_beat {
            // next_beat <= event.time, so it fits in u32
            let tick = next_beat as u32;
            if next_beat % bar == 0 {
                output.push(grid.marker(GridVoice::Bar, tick));
            }
            output.push(grid.marker(GridVoice::Beat, tick));
            next_beat += beat;
        }
        output.push(*event);
    }

    Ok(output)
}
