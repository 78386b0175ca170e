//! Operations on arrival-time event triples

use super::vocab::{instrument_of, note_index, Vocab, MAX_PITCH};
use crate::compound::CompoundStream;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

/// One `(time, duration, note)` token triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Triple {
    pub time: u32,
    pub dur: u32,
    pub note: u32,
}

impl Triple {
    pub fn new(time: u32, dur: u32, note: u32) -> Self {
        Self { time, dur, note }
    }

    /// The `[SEPARATOR; 3]` boundary between concatenated tracks
    pub fn separator(vocab: &Vocab) -> Self {
        Self::new(vocab.separator, vocab.separator, vocab.separator)
    }

    pub fn is_separator(&self, vocab: &Vocab) -> bool {
        self.note == vocab.separator
    }

    pub fn is_rest(&self, vocab: &Vocab) -> bool {
        self.note == vocab.rest
    }

    /// Onset in ticks, for events and controls alike
    pub fn onset(&self, vocab: &Vocab) -> u32 {
        if self.note < vocab.control_offset {
            self.time - vocab.time_offset
        } else {
            self.time - vocab.atime_offset
        }
    }

    /// Joint (instrument, pitch) index, for events and controls alike
    pub fn note_value(&self, vocab: &Vocab) -> u32 {
        if self.note < vocab.control_offset {
            self.note - vocab.note_offset
        } else {
            self.note - vocab.anote_offset
        }
    }

    /// Move an event into the control block
    pub fn to_control(&self, vocab: &Vocab) -> Self {
        Self::new(
            vocab.control_offset + self.time,
            vocab.control_offset + self.dur,
            vocab.control_offset + self.note,
        )
    }
}

/// Flatten triples into the written token order
pub fn flatten(tokens: &[Triple]) -> impl Iterator<Item = u32> + '_ {
    tokens.iter().flat_map(|t| [t.time, t.dur, t.note])
}

/// Convert a compound stream to event triples, dropping velocity
///
/// Durations of `max_dur` or more are clamped; the second value counts them.
pub fn compound_to_events(stream: &CompoundStream, vocab: &Vocab) -> (Vec<Triple>, u64) {
    let mut truncations = 0u64;
    let events = stream
        .iter()
        .map(|event| {
            let duration = if event.duration >= vocab.max_dur {
                truncations += 1;
                vocab.max_dur - 1
            } else {
                event.duration
            };
            Triple::new(
                vocab.time_offset + event.time,
                vocab.dur_offset + duration,
                vocab.note_offset + note_index(event.instrument, event.note),
            )
        })
        .collect();
    (events, truncations)
}

/// Latest onset, ignoring separators (0 when there is none)
pub fn max_time(tokens: &[Triple], vocab: &Vocab) -> u32 {
    tokens
        .iter()
        .filter(|t| !t.is_separator(vocab))
        .map(|t| t.onset(vocab))
        .max()
        .unwrap_or(0)
}

/// Earliest onset, ignoring separators
pub fn min_time(tokens: &[Triple], vocab: &Vocab) -> Option<u32> {
    tokens
        .iter()
        .filter(|t| !t.is_separator(vocab))
        .map(|t| t.onset(vocab))
        .min()
}

/// Triples that `translate` shifts: past any leading separators, up to the next one
fn leading_segment<'a>(
    tokens: &'a [Triple],
    vocab: &'a Vocab,
) -> impl Iterator<Item = &'a Triple> + 'a {
    tokens
        .iter()
        .skip_while(move |t| t.is_separator(vocab))
        .take_while(move |t| !t.is_separator(vocab))
}

/// Earliest onset of the leading track segment
///
/// Later tracks in the same window keep their own clock, so only this
/// segment decides how far a window is shifted.
pub fn segment_min_time(tokens: &[Triple], vocab: &Vocab) -> Option<u32> {
    leading_segment(tokens, vocab).map(|t| t.onset(vocab)).min()
}

/// Note count per instrument, ignoring separators and REST
pub fn instruments(tokens: &[Triple], vocab: &Vocab) -> BTreeMap<u32, usize> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        if token.is_separator(vocab) || token.is_rest(vocab) {
            continue;
        }
        *counts.entry(instrument_of(token.note_value(vocab))).or_insert(0) += 1;
    }
    counts
}

/// Insert REST triples so no gap exceeds one second
///
/// Gaps are checked between consecutive events and from the last event up to
/// `end_time`.
pub fn pad(events: &[Triple], end_time: u32, vocab: &Vocab) -> Vec<Triple> {
    let density = vocab.time_resolution;
    let end = vocab.time_offset + end_time;
    let rest = |time: u32| Triple::new(time, vocab.dur_offset, vocab.rest);

    let mut padded = Vec::with_capacity(events.len());
    let mut previous = vocab.time_offset;
    for event in events {
        debug_assert!(event.note < vocab.control_offset);
        while event.time > previous + density {
            previous += density;
            padded.push(rest(previous));
        }
        padded.push(*event);
        previous = event.time;
    }
    while end > previous + density {
        previous += density;
        padded.push(rest(previous));
    }
    padded
}

/// Shift onsets by `dt` ticks, up to the first separator after an event
///
/// Leading separators are skipped, so the shifted segment is always the one
/// `segment_min_time` measures.
pub fn translate(tokens: &[Triple], dt: i64, vocab: &Vocab) -> Vec<Triple> {
    let mut dt = dt;
    let mut in_segment = false;
    tokens
        .iter()
        .map(|token| {
            if token.is_separator(vocab) {
                // later tracks keep their own clock
                if in_segment {
                    dt = 0;
                }
                return *token;
            }
            in_segment = true;
            let time = (i64::from(token.time) + dt).max(0) as u32;
            Triple::new(time, token.dur, token.note)
        })
        .collect()
}

/// Interleave controls into the event stream
///
/// A control is placed as soon as the preceding event's onset is within
/// `delta` ticks of the control's onset. Controls still pending after the
/// last event are appended.
pub fn anticipate(events: &[Triple], controls: &[Triple], vocab: &Vocab) -> Vec<Triple> {
    if controls.is_empty() {
        return events.to_vec();
    }

    let delta = i64::from(vocab.delta);
    let mut tokens = Vec::with_capacity(events.len() + controls.len());
    let mut pending = controls.iter().peekable();
    let mut event_time: i64 = 0;

    for event in events {
        while let Some(control) = pending.peek() {
            let control_time = i64::from(control.time - vocab.atime_offset);
            if event_time < control_time - delta {
                break;
            }
            tokens.push(**control);
            pending.next();
        }
        event_time = i64::from(event.time - vocab.time_offset);
        tokens.push(*event);
    }
    tokens.extend(pending.copied());
    tokens
}

/// Anticipate spans of `delta` ticks separated by exponential gaps
///
/// `rate` is the expected number of spans per second.
pub fn extract_spans<R: Rng>(
    all_events: &[Triple],
    rate: f64,
    rng: &mut R,
    vocab: &Vocab,
) -> (Vec<Triple>, Vec<Triple>) {
    let mut events = Vec::new();
    let mut controls = Vec::new();

    let mut span = true;
    let mut next_span = vocab.time_offset;
    let mut end_span = vocab.time_offset;

    for event in all_events {
        if span && event.time >= end_span {
            span = false;
            let gap_sec = -(1.0 - rng.gen::<f64>()).ln() / rate;
            next_span = event.time + (f64::from(vocab.time_resolution) * gap_sec) as u32;
        }

        if !span && event.time >= next_span {
            span = true;
            end_span = event.time + vocab.delta;
        }

        if span {
            controls.push(event.to_control(vocab));
        } else {
            events.push(*event);
        }
    }

    (events, controls)
}

/// Anticipate each event independently with probability `1 / rate`
pub fn extract_random<R: Rng>(
    all_events: &[Triple],
    rate: u32,
    rng: &mut R,
    vocab: &Vocab,
) -> (Vec<Triple>, Vec<Triple>) {
    let threshold = 1.0 / f64::from(rate.max(1));
    let mut events = Vec::new();
    let mut controls = Vec::new();

    for event in all_events {
        if rng.gen::<f64>() < threshold {
            controls.push(event.to_control(vocab));
        } else {
            events.push(*event);
        }
    }

    (events, controls)
}

/// Anticipate every event played by one of `subset`
pub fn extract_instruments(
    all_events: &[Triple],
    subset: &BTreeSet<u32>,
    vocab: &Vocab,
) -> (Vec<Triple>, Vec<Triple>) {
    let mut events = Vec::new();
    let mut controls = Vec::new();

    for event in all_events {
        let instrument = (event.note - vocab.note_offset) / MAX_PITCH;
        if subset.contains(&instrument) {
            controls.push(event.to_control(vocab));
        } else {
            events.push(*event);
        }
    }

    (events, controls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::CompoundEvent;
    use crate::config::Config;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn vocab() -> Vocab {
        Vocab::from_config(&Config::default())
    }

    fn event(vocab: &Vocab, time: u32, dur: u32, instrument: u8, pitch: u8) -> Triple {
        Triple::new(
            vocab.time_offset + time,
            vocab.dur_offset + dur,
            vocab.note_offset + note_index(instrument, pitch),
        )
    }

    #[test]
    fn test_compound_to_events_clamps_durations() {
        let v = vocab();
        let stream = CompoundStream::from_events(vec![
            CompoundEvent::new(0, 10, 60, 0, 80),
            CompoundEvent::new(5, 5000, 62, 128, 90),
        ]);
        let (events, truncations) = compound_to_events(&stream, &v);
        assert_eq!(truncations, 1);
        assert_eq!(events[0], event(&v, 0, 10, 0, 60));
        assert_eq!(events[1], event(&v, 5, v.max_dur - 1, 128, 62));
    }

    #[test]
    fn test_pad_fills_gaps_and_tail() {
        let v = vocab();
        let events = vec![event(&v, 0, 10, 0, 60), event(&v, 350, 10, 0, 60)];
        let padded = pad(&events, 600, &v);
        let rest_times: Vec<u32> = padded
            .iter()
            .filter(|t| t.is_rest(&v))
            .map(|t| t.time)
            .collect();
        assert_eq!(rest_times, vec![100, 200, 300, 450, 550]);
        assert_eq!(padded.len(), 7);
    }

    #[test]
    fn test_pad_keeps_dense_events_untouched() {
        let v = vocab();
        let events = vec![event(&v, 0, 10, 0, 60), event(&v, 100, 10, 0, 60)];
        assert_eq!(pad(&events, 100, &v), events);
    }

    #[test]
    fn test_translate_stops_at_separator() {
        let v = vocab();
        let tokens = vec![
            event(&v, 300, 1, 0, 60),
            Triple::separator(&v),
            event(&v, 20, 1, 0, 60),
        ];
        let shifted = translate(&tokens, -300, &v);
        assert_eq!(shifted[0].time, 0);
        assert!(shifted[1].is_separator(&v));
        assert_eq!(shifted[2].time, 20);
    }

    #[test]
    fn test_translate_skips_leading_separator() {
        let v = vocab();
        let tokens = vec![
            Triple::separator(&v),
            event(&v, 400, 1, 0, 60),
            Triple::separator(&v),
            event(&v, 30, 1, 0, 60),
        ];
        let shifted = translate(&tokens, -400, &v);
        assert!(shifted[0].is_separator(&v));
        assert_eq!(shifted[1].time, 0);
        assert_eq!(shifted[3].time, 30);
    }

    #[test]
    fn test_segment_min_time_ignores_later_tracks() {
        let v = vocab();
        let tokens = vec![
            event(&v, 9_900, 1, 0, 60),
            event(&v, 15_000, 1, 0, 60),
            Triple::separator(&v),
            event(&v, 0, 1, 0, 62),
        ];
        assert_eq!(min_time(&tokens, &v), Some(0));
        assert_eq!(segment_min_time(&tokens, &v), Some(9_900));

        let shifted = translate(&tokens, -9_900, &v);
        assert_eq!(max_time(&shifted, &v), 5_100);

        let leading = vec![Triple::separator(&v), event(&v, 250, 1, 0, 60)];
        assert_eq!(segment_min_time(&leading, &v), Some(250));
        assert_eq!(segment_min_time(&[Triple::separator(&v)], &v), None);
    }

    #[test]
    fn test_anticipate_places_controls_within_delta() {
        let v = vocab();
        let events: Vec<Triple> = (0..10).map(|i| event(&v, i * 100, 1, 0, 60)).collect();
        let control = event(&v, 700, 1, 1, 64).to_control(&v);
        let tokens = anticipate(&events, &[control], &v);

        assert_eq!(tokens.len(), 11);
        let position = tokens.iter().position(|t| *t == control).unwrap();
        // placed once the previous event (t=200) is within 500 ticks of 700
        assert_eq!(tokens[position - 1].time, 200);
    }

    #[test]
    fn test_anticipate_appends_late_controls() {
        let v = vocab();
        let events = vec![event(&v, 0, 1, 0, 60)];
        let control = event(&v, 5000, 1, 1, 64).to_control(&v);
        let tokens = anticipate(&events, &[control], &v);
        assert_eq!(tokens, vec![events[0], control]);
    }

    #[test]
    fn test_extract_instruments_partitions_events() {
        let v = vocab();
        let all = vec![
            event(&v, 0, 1, 0, 60),
            event(&v, 10, 1, 33, 40),
            event(&v, 20, 1, 0, 62),
        ];
        let subset: BTreeSet<u32> = [33].into_iter().collect();
        let (events, controls) = extract_instruments(&all, &subset, &v);
        assert_eq!(events, vec![all[0], all[2]]);
        assert_eq!(controls, vec![all[1].to_control(&v)]);
        assert_eq!(controls[0].onset(&v), 10);
    }

    #[test]
    fn test_extraction_preserves_event_count() {
        let v = vocab();
        let all: Vec<Triple> = (0..200).map(|i| event(&v, i * 37, 5, 0, 60)).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let (events, controls) = extract_spans(&all, 0.05, &mut rng, &v);
        assert_eq!(events.len() + controls.len(), all.len());

        let (events, controls) = extract_random(&all, 3, &mut rng, &v);
        assert_eq!(events.len() + controls.len(), all.len());
        assert!(controls.iter().all(|c| v.is_control(c.note)));
    }

    #[test]
    fn test_instruments_skip_rest_and_separator() {
        let v = vocab();
        let tokens = vec![
            event(&v, 0, 1, 0, 60),
            Triple::new(100, v.dur_offset, v.rest),
            event(&v, 150, 1, 128, 36).to_control(&v),
            Triple::separator(&v),
        ];
        let counts = instruments(&tokens, &v);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&0], 1);
        assert_eq!(counts[&128], 1);
        assert_eq!(max_time(&tokens, &v), 150);
        assert_eq!(min_time(&tokens, &v), Some(0));
    }
}
