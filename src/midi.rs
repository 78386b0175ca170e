//! MIDI import: Standard MIDI File → compound token stream

use crate::compound::{CompoundEvent, CompoundStream, DRUM_KIT};
use crate::config::Config;
use crate::error::{PrepError, Result as PrepResult};
use log::warn;
use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

/// Zero-based channel reserved for percussion in General MIDI
const DRUM_CHANNEL: u8 = 9;

/// Tempo assumed until the first tempo event (µs per quarter note)
const DEFAULT_TEMPO_US: u32 = 500_000;

/// Converts tick deltas to seconds
#[derive(Debug, Clone, Copy)]
enum Clock {
    Metrical { ticks_per_beat: f64, tempo_us: f64 },
    Timecode { seconds_per_tick: f64 },
}

impl Clock {
    fn from_timing(timing: Timing) -> PrepResult<Self> {
        match timing {
            Timing::Metrical(ppq) => {
                let ppq = ppq.as_int();
                if ppq == 0 {
                    return Err(PrepError::UnsupportedMidi(
                        "zero ticks per beat".to_string(),
                    ));
                }
                Ok(Clock::Metrical {
                    ticks_per_beat: f64::from(ppq),
                    tempo_us: f64::from(DEFAULT_TEMPO_US),
                })
            }
            Timing::Timecode(fps, subframes) => {
                let ticks_per_second = f64::from(fps.as_f32()) * f64::from(subframes);
                if ticks_per_second <= 0.0 {
                    return Err(PrepError::UnsupportedMidi(
                        "zero SMPTE subframe resolution".to_string(),
                    ));
                }
                Ok(Clock::Timecode {
                    seconds_per_tick: 1.0 / ticks_per_second,
                })
            }
        }
    }

    fn seconds(&self, ticks: u64) -> f64 {
        match *self {
            Clock::Metrical {
                ticks_per_beat,
                tempo_us,
            } => ticks as f64 * tempo_us / (1_000_000.0 * ticks_per_beat),
            Clock::Timecode { seconds_per_tick } => ticks as f64 * seconds_per_tick,
        }
    }

    fn set_tempo(&mut self, tempo: u32) {
        // SMPTE files keep absolute time; tempo events do not apply
        if let Clock::Metrical { tempo_us, .. } = self {
            *tempo_us = f64::from(tempo);
        }
    }
}

/// Note that has sounded but not yet been released
#[derive(Debug, Clone, Copy)]
struct OpenNote {
    index: usize,
    onset_sec: f64,
}

/// Load a MIDI file and convert it to a compound stream
pub fn midi_to_compound<P: AsRef<Path>>(
    path: P,
    debug: bool,
    config: &Config,
) -> PrepResult<CompoundStream> {
    let bytes = std::fs::read(path.as_ref())?;
    let smf = Smf::parse(&bytes)?;
    let stream = smf_to_compound(&smf, debug, config)?;

    if debug && stream.is_empty() {
        warn!("{}: no notes found", path.as_ref().display());
    }
    Ok(stream)
}

/// Convert an already-parsed file
///
/// All tracks are merged into a single timeline; simultaneous events keep
/// their track order. Wall-clock time follows the tempo map of the merged
/// timeline and is quantized to `time_resolution` ticks per second.
pub fn smf_to_compound(smf: &Smf, debug: bool, config: &Config) -> PrepResult<CompoundStream> {
    if matches!(smf.header.format, Format::Sequential) {
        return Err(PrepError::UnsupportedMidi(
            "sequential (type 2) files have no shared timeline".to_string(),
        ));
    }

    let resolution = f64::from(config.time_resolution());
    let mut clock = Clock::from_timing(smf.header.timing)?;

    // Merge tracks by absolute tick; sort_by_key is stable
    let mut merged = Vec::new();
    for track in &smf.tracks {
        let mut tick: u64 = 0;
        for event in track {
            tick += u64::from(event.delta.as_int());
            merged.push((tick, &event.kind));
        }
    }
    merged.sort_by_key(|(tick, _)| *tick);

    let mut events: Vec<CompoundEvent> = Vec::new();
    let mut closed: Vec<bool> = Vec::new();
    let mut open_notes: HashMap<(u8, u8, u8), VecDeque<OpenNote>> = HashMap::new();
    let mut programs = [0u8; 16];
    let mut bad_offsets = 0usize;

    let mut last_tick: u64 = 0;
    let mut now_sec = 0.0f64;

    for (tick, kind) in merged {
        now_sec += clock.seconds(tick - last_tick);
        last_tick = tick;

        match kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => clock.set_tempo(tempo.as_int()),
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                match *message {
                    MidiMessage::ProgramChange { program } => {
                        programs[channel as usize] = program.as_int();
                    }
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        let instrument = instrument_for(channel, &programs);
                        let key = key.as_int();

                        open_notes
                            .entry((instrument, key, channel))
                            .or_default()
                            .push_back(OpenNote {
                                index: events.len(),
                                onset_sec: now_sec,
                            });
                        events.push(CompoundEvent::new(
                            quantize(now_sec, resolution),
                            0,
                            key,
                            instrument,
                            vel.as_int(),
                        ));
                        closed.push(false);
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        let instrument = instrument_for(channel, &programs);
                        let open = open_notes
                            .get_mut(&(instrument, key.as_int(), channel))
                            .and_then(|queue| queue.pop_front());

                        match open {
                            Some(note) => {
                                events[note.index].duration =
                                    quantize(now_sec - note.onset_sec, resolution);
                                closed[note.index] = true;
                            }
                            None => bad_offsets += 1,
                        }
                    }
                    // Pedal, pitch bend and aftertouch are not modelled
                    _ => {}
                }
            }
            _ => {}
        }
    }

    // Notes never released get a quarter-second duration
    let default_duration = config.time_resolution() / 4;
    let mut unclosed = 0usize;
    for (event, is_closed) in events.iter_mut().zip(&closed) {
        if !is_closed {
            event.duration = default_duration;
            unclosed += 1;
        }
    }

    if debug {
        if bad_offsets > 0 {
            warn!("ignored {} note-off events without a matching onset", bad_offsets);
        }
        if unclosed > 0 {
            warn!(
                "{} unclosed notes given the default duration of {} ticks",
                unclosed, default_duration
            );
        }
    }

    Ok(CompoundStream::from_events(events))
}

fn instrument_for(channel: u8, programs: &[u8; 16]) -> u8 {
    if channel == DRUM_CHANNEL {
        DRUM_KIT
    } else {
        programs[channel as usize]
    }
}

fn quantize(seconds: f64, resolution: f64) -> u32 {
    (seconds * resolution).round().max(0.0) as u32
}
