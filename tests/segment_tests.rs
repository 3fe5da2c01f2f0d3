//! Validation tests for note segmentation

use pitch2midi::config::SegmentConfig;
use pitch2midi::postprocess::FrameNote;
use pitch2midi::segment::{expand_to_frames, segment_notes, NoteEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn frames_of(runs: &[(Option<u8>, u8, usize)]) -> Vec<FrameNote> {
    runs.iter()
        .flat_map(|&(note, velocity, len)| std::iter::repeat(FrameNote { note, velocity }).take(len))
        .collect()
}

fn config(min_note_frames: usize) -> SegmentConfig {
    SegmentConfig {
        min_note_frames,
        velocity_tolerance: None,
    }
}

/// Random runs of notes and silence
fn random_frames(rng: &mut StdRng, n_runs: usize) -> Vec<FrameNote> {
    let mut frames = Vec::new();
    for _ in 0..n_runs {
        let note = if rng.random_bool(0.25) {
            None
        } else {
            Some(rng.random_range(55..60u8))
        };
        let len = rng.random_range(1..8usize);
        for _ in 0..len {
            frames.push(FrameNote {
                note,
                velocity: rng.random_range(0..=127u8),
            });
        }
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimum_duration_boundary() {
        let min = 4;
        let frames = frames_of(&[
            (Some(60), 80, min - 1),
            (None, 0, 2),
            (Some(62), 80, min),
        ]);
        let events = segment_notes(&frames, &config(min));
        assert_eq!(
            events,
            vec![NoteEvent {
                note: 62,
                start_frame: min + 1,
                duration_frames: min,
                velocity: 80,
            }]
        );
    }

    #[test]
    fn test_silence_never_emits() {
        let frames = frames_of(&[(None, 0, 100)]);
        for min in [1, 3, 50] {
            assert!(segment_notes(&frames, &config(min)).is_empty());
        }
        assert!(segment_notes(&[], &config(1)).is_empty());
    }

    #[test]
    fn test_velocity_is_run_mean_clamped_to_audible() {
        let frames = vec![
            FrameNote { note: Some(64), velocity: 10 },
            FrameNote { note: Some(64), velocity: 20 },
            FrameNote { note: Some(64), velocity: 31 },
            FrameNote { note: Some(65), velocity: 0 },
            FrameNote { note: Some(65), velocity: 0 },
        ];
        let events = segment_notes(&frames, &config(2));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].velocity, 20);
        assert_eq!(events[1].velocity, 1);
    }

    #[test]
    fn test_final_run_is_flushed() {
        let frames = frames_of(&[(None, 0, 3), (Some(70), 100, 5)]);
        let events = segment_notes(&frames, &config(5));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_frame, 3);
        assert_eq!(events[0].end_frame(), 8);
    }

    #[test]
    fn test_note_change_splits_without_gap() {
        let frames = frames_of(&[(Some(60), 90, 4), (Some(61), 90, 4)]);
        let events = segment_notes(&frames, &config(3));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].end_frame(), events[1].start_frame);
    }

    #[test]
    fn test_velocity_tolerance_splits_runs() {
        let frames = frames_of(&[(Some(60), 50, 4), (Some(60), 90, 4)]);
        let merged = segment_notes(&frames, &config(3));
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].duration_frames, 8);

        let strict = SegmentConfig {
            min_note_frames: 3,
            velocity_tolerance: Some(5),
        };
        let split = segment_notes(&frames, &strict);
        assert_eq!(split.len(), 2);
        assert_eq!(split[0].velocity, 50);
        assert_eq!(split[1].velocity, 90);
    }

    #[test]
    fn test_velocity_tolerance_measured_from_run_start() {
        // Drifts by 3 per frame: within 5 of the previous frame but not of the first
        let frames: Vec<FrameNote> = (0..4)
            .map(|i| FrameNote { note: Some(60), velocity: 50 + 3 * i })
            .collect();
        let strict = SegmentConfig {
            min_note_frames: 1,
            velocity_tolerance: Some(5),
        };
        let events = segment_notes(&frames, &strict);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].duration_frames, 2);
        assert_eq!(events[1].start_frame, 2);
    }

    #[test]
    fn test_expand_to_frames() {
        let events = [NoteEvent {
            note: 60,
            start_frame: 2,
            duration_frames: 3,
            velocity: 70,
        }];
        let frames = expand_to_frames(&events, 6);
        assert_eq!(frames[1], FrameNote { note: None, velocity: 0 });
        assert_eq!(frames[2], FrameNote { note: Some(60), velocity: 70 });
        assert_eq!(frames[4], FrameNote { note: Some(60), velocity: 70 });
        assert_eq!(frames[5], FrameNote { note: None, velocity: 0 });
    }

    #[test]
    fn test_segmenter_idempotent_on_reconstruction() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for round in 0..200 {
            let frames = random_frames(&mut rng, 30);
            let min = rng.random_range(1..5usize);
            let events = segment_notes(&frames, &config(min));
            let rebuilt = expand_to_frames(&events, frames.len());
            assert_eq!(
                segment_notes(&rebuilt, &config(min)),
                events,
                "round {} (min_note_frames {})",
                round,
                min
            );
        }
    }

    #[test]
    fn test_events_are_ordered_and_disjoint() {
        let mut rng = StdRng::seed_from_u64(42);
        let frames = random_frames(&mut rng, 200);
        let events = segment_notes(&frames, &config(2));
        for pair in events.windows(2) {
            assert!(pair[0].end_frame() <= pair[1].start_frame);
        }
        assert!(events.iter().all(|e| e.duration_frames >= 2 && e.velocity >= 1));
    }
}
