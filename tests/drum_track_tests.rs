//! Tests for the synthetic drum track merge

use midi2tokens::compound::{CompoundEvent, CompoundStream, DRUM_KIT};
use midi2tokens::drums::{add_drum_track, DrumGrid, GridVoice, MARKER_VELOCITY};
use midi2tokens::PrepError;

fn piano(time: u32) -> CompoundEvent {
    CompoundEvent::new(time, 30, 60, 0, 80)
}

fn is_marker(event: &CompoundEvent) -> bool {
    event.instrument == DRUM_KIT
        && event.velocity == MARKER_VELOCITY
        && (event.note == GridVoice::Bar.midi_note() || event.note == GridVoice::Beat.midi_note())
}

/// True when `needle` appears in `haystack` in order (not necessarily contiguous)
fn is_subsequence(needle: &[CompoundEvent], haystack: &[CompoundEvent]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|wanted| rest.any(|e| e == wanted))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worked_example() {
        let grid = DrumGrid::new(240).unwrap();
        let input: CompoundStream = [0, 100, 500, 1000].into_iter().map(piano).collect();

        let output = add_drum_track(&input, &grid).unwrap();

        let expected = vec![
            grid.marker(GridVoice::Bar, 0),
            grid.marker(GridVoice::Beat, 0),
            piano(0),
            piano(100),
            grid.marker(GridVoice::Beat, 240),
            grid.marker(GridVoice::Beat, 480),
            piano(500),
            grid.marker(GridVoice::Beat, 720),
            grid.marker(GridVoice::Bar, 960),
            grid.marker(GridVoice::Beat, 960),
            piano(1000),
        ];
        assert_eq!(output.events(), expected.as_slice());
    }

    #[test]
    fn test_two_note_flat_example() {
        let grid = DrumGrid::new(240).unwrap();
        let input = CompoundStream::from_flat(&[0, 10, 60, 0, 80, 700, 5, 62, 0, 80]).unwrap();

        let output = add_drum_track(&input, &grid).unwrap();

        assert_eq!(
            output.to_text(),
            "0 959 36 128 100 0 239 42 128 100 0 10 60 0 80 \
             240 239 42 128 100 480 239 42 128 100 700 5 62 0 80"
        );
    }

    #[test]
    fn test_empty_stream_stays_empty() {
        let grid = DrumGrid::new(50).unwrap();
        let output = add_drum_track(&CompoundStream::new(), &grid).unwrap();
        assert!(output.is_empty());
    }

    #[test]
    fn test_original_events_preserved_in_order() {
        let grid = DrumGrid::new(50).unwrap();
        let input: CompoundStream = [3, 3, 47, 200, 201, 777, 1500]
            .into_iter()
            .enumerate()
            .map(|(i, t)| CompoundEvent::new(t, 10 + i as u32, 60 + i as u8, 0, 70))
            .collect();

        let output = add_drum_track(&input, &grid).unwrap();

        assert!(is_subsequence(input.events(), output.events()));
        let markers = output.iter().filter(|e| is_marker(e)).count();
        assert_eq!(output.len(), input.len() + markers);
    }

    #[test]
    fn test_markers_cover_grid_up_to_last_onset() {
        let grid = DrumGrid::new(50).unwrap();
        let input: CompoundStream = [10, 260, 430].into_iter().map(piano).collect();

        let output = add_drum_track(&input, &grid).unwrap();

        let beats: Vec<u32> = output
            .iter()
            .filter(|e| e.note == GridVoice::Beat.midi_note() && is_marker(e))
            .map(|e| e.time)
            .collect();
        let bars: Vec<u32> = output
            .iter()
            .filter(|e| e.note == GridVoice::Bar.midi_note() && is_marker(e))
            .map(|e| e.time)
            .collect();

        assert_eq!(beats, vec![0, 50, 100, 150, 200, 250, 300, 350, 400]);
        assert_eq!(bars, vec![0, 200, 400]);
        // nothing past the last real onset
        assert!(output.iter().all(|e| e.time <= 430));
    }

    #[test]
    fn test_output_onsets_non_decreasing() {
        let grid = DrumGrid::new(50).unwrap();
        let input: CompoundStream = [0, 0, 120, 121, 900].into_iter().map(piano).collect();

        let output = add_drum_track(&input, &grid).unwrap();
        assert!(output.check_sorted().is_ok());
    }

    #[test]
    fn test_marker_durations_fill_their_slot() {
        let grid = DrumGrid::new(50).unwrap();
        let input = CompoundStream::from_events(vec![piano(0)]);
        let output = add_drum_track(&input, &grid).unwrap();

        let bar = output.events()[0];
        let beat = output.events()[1];
        assert_eq!((bar.note, bar.duration), (36, 199));
        assert_eq!((beat.note, beat.duration), (42, 49));
    }

    #[test]
    fn test_unsorted_input_rejected() {
        let grid = DrumGrid::new(50).unwrap();
        let input: CompoundStream = [100, 20].into_iter().map(piano).collect();

        let err = add_drum_track(&input, &grid).unwrap_err();
        assert!(matches!(err, PrepError::UnsortedStream { index: 1, .. }));
    }
}
