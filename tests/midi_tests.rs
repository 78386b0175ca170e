//! Tests for MIDI import

use midi2tokens::compound::CompoundEvent;
use midi2tokens::config::Config;
use midi2tokens::midi::{midi_to_compound, smf_to_compound};
use midi2tokens::PrepError;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Fps, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};
use std::fs;
use tempfile::TempDir;

/// Build a track from `(absolute tick, event)` pairs
fn track(events: Vec<(u32, TrackEventKind<'static>)>) -> Track<'static> {
    let mut last = 0;
    let mut track: Track<'static> = events
        .into_iter()
        .map(|(tick, kind)| {
            let delta = tick - last;
            last = tick;
            TrackEvent {
                delta: u28::new(delta),
                kind,
            }
        })
        .collect();
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

fn note_on(channel: u8, key: u8, vel: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::new(channel),
        message: MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(vel),
        },
    }
}

fn note_off(channel: u8, key: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::new(channel),
        message: MidiMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(0),
        },
    }
}

fn program(channel: u8, program: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::new(channel),
        message: MidiMessage::ProgramChange {
            program: u7::new(program),
        },
    }
}

fn tempo(us_per_beat: u32) -> TrackEventKind<'static> {
    TrackEventKind::Meta(MetaMessage::Tempo(u24::new(us_per_beat)))
}

fn metrical(format: Format, tracks: Vec<Track<'static>>) -> Smf<'static> {
    Smf {
        header: Header::new(format, Timing::Metrical(u15::new(480))),
        tracks,
    }
}

fn smf_bytes(smf: &Smf) -> Vec<u8> {
    let mut bytes = Vec::new();
    smf.write(&mut bytes).unwrap();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo_changes_apply_across_tracks() {
        let smf = metrical(
            Format::Parallel,
            vec![
                track(vec![(0, tempo(500_000)), (960, tempo(1_000_000))]),
                track(vec![
                    (0, note_on(0, 60, 80)),
                    (480, note_off(0, 60)),
                    (960, note_on(0, 62, 80)),
                    (1440, note_off(0, 62)),
                ]),
            ],
        );

        let stream = smf_to_compound(&smf, false, &Config::default()).unwrap();
        assert_eq!(
            stream.events(),
            &[
                CompoundEvent::new(0, 50, 60, 0, 80),
                CompoundEvent::new(100, 100, 62, 0, 80),
            ]
        );
    }

    #[test]
    fn test_programs_drums_and_unclosed_notes() {
        let smf = metrical(
            Format::SingleTrack,
            vec![track(vec![
                (0, program(1, 33)),
                (0, note_on(1, 40, 90)),
                (240, note_on(9, 36, 100)),
                (480, note_off(1, 40)),
            ])],
        );

        let stream = smf_to_compound(&smf, false, &Config::default()).unwrap();
        assert_eq!(
            stream.events(),
            &[
                CompoundEvent::new(0, 50, 40, 33, 90),
                // never released: a quarter second
                CompoundEvent::new(25, 25, 36, 128, 100),
            ]
        );
    }

    #[test]
    fn test_zero_velocity_note_on_releases() {
        let smf = metrical(
            Format::SingleTrack,
            vec![track(vec![
                (0, note_on(0, 60, 70)),
                (0, note_on(0, 60, 75)),
                (240, note_on(0, 60, 0)),
                (480, note_on(0, 60, 0)),
            ])],
        );

        let stream = smf_to_compound(&smf, false, &Config::default()).unwrap();
        // same key re-struck: releases pair with onsets first in, first out
        assert_eq!(
            stream.events(),
            &[
                CompoundEvent::new(0, 25, 60, 0, 70),
                CompoundEvent::new(0, 50, 60, 0, 75),
            ]
        );
    }

    #[test]
    fn test_timecode_timing() {
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Timecode(Fps::Fps25, 40)),
            tracks: vec![track(vec![
                (0, tempo(2_000_000)),
                (250, note_on(0, 64, 90)),
                (750, note_off(0, 64)),
            ])],
        };

        let stream = smf_to_compound(&smf, false, &Config::default()).unwrap();
        assert_eq!(stream.events(), &[CompoundEvent::new(25, 50, 64, 0, 90)]);
    }

    #[test]
    fn test_sequential_format_rejected() {
        let smf = metrical(
            Format::Sequential,
            vec![
                track(vec![(0, note_on(0, 60, 80)), (480, note_off(0, 60))]),
                track(vec![(0, note_on(0, 62, 80)), (480, note_off(0, 62))]),
            ],
        );

        let err = smf_to_compound(&smf, false, &Config::default()).unwrap_err();
        assert!(matches!(err, PrepError::UnsupportedMidi(_)));
    }

    #[test]
    fn test_file_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.mid");
        let smf = metrical(
            Format::SingleTrack,
            vec![track(vec![(0, note_on(0, 60, 80)), (480, note_off(0, 60))])],
        );
        fs::write(&path, smf_bytes(&smf)).unwrap();

        let stream = midi_to_compound(&path, true, &Config::default()).unwrap();
        assert_eq!(stream.events(), &[CompoundEvent::new(0, 50, 60, 0, 80)]);
    }

    #[test]
    fn test_garbage_bytes_fail_to_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.mid");
        fs::write(&path, b"definitely not a midi file").unwrap();

        let err = midi_to_compound(&path, false, &Config::default()).unwrap_err();
        assert!(matches!(err, PrepError::MidiParse(_)));
    }

    #[test]
    fn test_resolution_follows_config() {
        let mut config = Config::default();
        config.timing.time_resolution = 1000;
        let smf = metrical(
            Format::SingleTrack,
            vec![track(vec![(120, note_on(0, 60, 80)), (480, note_off(0, 60))])],
        );

        let stream = smf_to_compound(&smf, false, &config).unwrap();
        assert_eq!(stream.events(), &[CompoundEvent::new(125, 375, 60, 0, 80)]);
    }
}
