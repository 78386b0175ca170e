//! Compound token stream: the on-disk intermediate between MIDI and event tokens
//!
//! A compound stream is a time-ordered list of notes, each a 5-tuple
//! `(time, duration, note, instrument, velocity)`. In memory the tuples are
//! typed records; on disk they are flattened into one line of
//! space-separated decimal integers.

use crate::error::{PrepError, Result as PrepResult};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of integers per event in the flat form
pub const COMPOUND_SIZE: usize = 5;

/// Instrument id of the General MIDI drum kit (channel 10)
pub const DRUM_KIT: u8 = 128;

/// Suffix appended to a source MIDI path to name its compound artifact
pub const COMPOUND_SUFFIX: &str = ".compound.txt";

/// A single note event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompoundEvent {
    /// Onset in ticks
    pub time: u32,
    /// Duration in ticks
    pub duration: u32,
    /// MIDI pitch (0-127)
    pub note: u8,
    /// Program number (0-127) or `DRUM_KIT`
    pub instrument: u8,
    /// Onset velocity (0-127)
    pub velocity: u8,
}

impl CompoundEvent {
    pub fn new(time: u32, duration: u32, note: u8, instrument: u8, velocity: u8) -> Self {
        Self {
            time,
            duration,
            note,
            instrument,
            velocity,
        }
    }

    pub fn is_drum(&self) -> bool {
        self.instrument == DRUM_KIT
    }

    /// Flat 5-integer form
    pub fn to_tuple(&self) -> [u32; COMPOUND_SIZE] {
        [
            self.time,
            self.duration,
            u32::from(self.note),
            u32::from(self.instrument),
            u32::from(self.velocity),
        ]
    }

    /// Build an event from its flat form, checking field ranges
    pub fn from_tuple(tuple: [i64; COMPOUND_SIZE]) -> PrepResult<Self> {
        let [time, duration, note, instrument, velocity] = tuple;
        Ok(Self {
            time: field_in_range("time", time, u32::MAX as i64)? as u32,
            duration: field_in_range("duration", duration, u32::MAX as i64)? as u32,
            note: field_in_range("note", note, 127)? as u8,
            instrument: field_in_range("instrument", instrument, DRUM_KIT as i64)? as u8,
            velocity: field_in_range("velocity", velocity, 127)? as u8,
        })
    }
}

fn field_in_range(name: &str, value: i64, max: i64) -> PrepResult<i64> {
    if (0..=max).contains(&value) {
        Ok(value)
    } else {
        Err(PrepError::CompoundFormat(format!(
            "{} {} outside [0, {}]",
            name, value, max
        )))
    }
}

/// An ordered sequence of compound events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundStream {
    events: Vec<CompoundEvent>,
}

impl CompoundStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    pub fn from_events(events: Vec<CompoundEvent>) -> Self {
        Self { events }
    }

    pub fn events(&self) -> &[CompoundEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<CompoundEvent> {
        self.events
    }

    pub fn push(&mut self, event: CompoundEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompoundEvent> {
        self.events.iter()
    }

    /// Latest onset in ticks (0 for an empty stream)
    pub fn end_time(&self) -> u32 {
        self.events.iter().map(|e| e.time).max().unwrap_or(0)
    }

    /// Distinct instruments present in the stream
    pub fn instruments(&self) -> BTreeSet<u8> {
        self.events.iter().map(|e| e.instrument).collect()
    }

    /// Verify onsets are non-decreasing
    pub fn check_sorted(&self) -> PrepResult<()> {
        for (index, pair) in self.events.windows(2).enumerate() {
            if pair[1].time < pair[0].time {
                return Err(PrepError::UnsortedStream {
                    index: index + 1,
                    time: pair[1].time,
                    previous: pair[0].time,
                });
            }
        }
        Ok(())
    }

    /// Build a stream from its flat integer form
    pub fn from_flat(tokens: &[i64]) -> PrepResult<Self> {
        if tokens.len() % COMPOUND_SIZE != 0 {
            return Err(PrepError::CompoundFormat(format!(
                "{} tokens is not a multiple of {}",
                tokens.len(),
                COMPOUND_SIZE
            )));
        }

        let events = tokens
            .chunks_exact(COMPOUND_SIZE)
            .map(|chunk| CompoundEvent::from_tuple([chunk[0], chunk[1], chunk[2], chunk[3], chunk[4]]))
            .collect::<PrepResult<Vec<_>>>()?;

        Ok(Self { events })
    }

    /// Flatten to the persisted integer form
    pub fn to_flat(&self) -> Vec<u32> {
        self.events.iter().flat_map(|e| e.to_tuple()).collect()
    }

    /// Parse whitespace-separated integers
    pub fn parse(text: &str) -> PrepResult<Self> {
        let tokens = text
            .split_whitespace()
            .map(str::parse::<i64>)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::from_flat(&tokens)
    }

    /// Serialize as a single line of space-separated integers
    pub fn to_text(&self) -> String {
        self.to_flat()
            .iter()
            .map(|tok| tok.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Load a compound artifact from disk
    pub fn read<P: AsRef<Path>>(path: P) -> PrepResult<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::parse(&text).map_err(|err| match err {
            PrepError::CompoundFormat(msg) => {
                PrepError::CompoundFormat(format!("{}: {}", path.as_ref().display(), msg))
            }
            other => other,
        })
    }

    /// Persist the stream to `path`
    pub fn write<P: AsRef<Path>>(&self, path: P) -> PrepResult<()> {
        fs::write(path, self.to_text())?;
        Ok(())
    }
}

impl FromIterator<CompoundEvent> for CompoundStream {
    fn from_iter<I: IntoIterator<Item = CompoundEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CompoundStream {
    type Item = &'a CompoundEvent;
    type IntoIter = std::slice::Iter<'a, CompoundEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Artifact path for a source MIDI file: `<path>.compound.txt`
pub fn compound_path(source: &Path) -> PathBuf {
    let mut name = source.as_os_str().to_os_string();
    name.push(COMPOUND_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_length_must_be_multiple_of_five() {
        let err = CompoundStream::from_flat(&[0, 10, 60, 0]).unwrap_err();
        assert!(matches!(err, PrepError::CompoundFormat(_)));
    }

    #[test]
    fn test_out_of_range_fields_rejected() {
        assert!(CompoundStream::from_flat(&[0, 10, 128, 0, 80]).is_err());
        assert!(CompoundStream::from_flat(&[0, 10, 60, 129, 80]).is_err());
        assert!(CompoundStream::from_flat(&[-1, 10, 60, 0, 80]).is_err());
        assert!(CompoundStream::from_flat(&[0, 10, 60, 128, 127]).is_ok());
    }

    #[test]
    fn test_text_is_single_line() {
        let stream = CompoundStream::from_events(vec![
            CompoundEvent::new(0, 10, 60, 0, 80),
            CompoundEvent::new(700, 5, 62, 0, 80),
        ]);
        assert_eq!(stream.to_text(), "0 10 60 0 80 700 5 62 0 80");
        assert_eq!(CompoundStream::parse("0 10 60 0 80\n700 5 62 0 80\n").unwrap(), stream);
    }

    #[test]
    fn test_empty_text() {
        let stream = CompoundStream::parse("").unwrap();
        assert!(stream.is_empty());
        assert_eq!(stream.to_text(), "");
    }

    #[test]
    fn test_compound_path_appends_suffix() {
        let path = compound_path(Path::new("data/Train/song.mid"));
        assert_eq!(path, PathBuf::from("data/Train/song.mid.compound.txt"));
    }

    #[test]
    fn test_check_sorted_reports_first_violation() {
        let stream = CompoundStream::from_events(vec![
            CompoundEvent::new(0, 1, 60, 0, 80),
            CompoundEvent::new(50, 1, 60, 0, 80),
            CompoundEvent::new(20, 1, 60, 0, 80),
        ]);
        match stream.check_sorted() {
            Err(PrepError::UnsortedStream { index, time, previous }) => {
                assert_eq!((index, time, previous), (2, 20, 50));
            }
            other => panic!("expected unsorted error, got {:?}", other),
        }
    }
}
