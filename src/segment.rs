//! Note segmentation: merge runs of equal quantized notes into note events

use crate::config::SegmentConfig;
use crate::postprocess::FrameNote;
use serde::{Deserialize, Serialize};

/// One sustained note, timed in analysis frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub note: u8,
    pub start_frame: usize,
    pub duration_frames: usize,
    pub velocity: u8,
}

impl NoteEvent {
    pub fn end_frame(&self) -> usize {
        self.start_frame + self.duration_frames
    }
}

#[derive(Debug)]
struct Run {
    note: Option<u8>,
    start: usize,
    first_velocity: u8,
    velocity_sum: u64,
}

impl Run {
    fn start(index: usize, frame: &FrameNote) -> Self {
        Self {
            note: frame.note,
            start: index,
            first_velocity: frame.velocity,
            velocity_sum: frame.velocity as u64,
        }
    }

    fn continues(&self, frame: &FrameNote, velocity_tolerance: Option<u8>) -> bool {
        if frame.note != self.note {
            return false;
        }
        match (self.note, velocity_tolerance) {
            (Some(_), Some(tolerance)) => {
                frame.velocity.abs_diff(self.first_velocity) < tolerance
            }
            _ => true,
        }
    }

    /// Emit the run if it is pitched and long enough
    fn close(self, end: usize, min_note_frames: usize) -> Option<NoteEvent> {
        let note = self.note?;
        let duration_frames = end - self.start;
        if duration_frames < min_note_frames {
            return None;
        }
        let mean = (self.velocity_sum as f64 / duration_frames as f64).round();
        Some(NoteEvent {
            note,
            start_frame: self.start,
            duration_frames,
            velocity: mean.clamp(1.0, 127.0) as u8,
        })
    }
}

/// Scan frames and emit one event per qualifying run, in temporal order
pub fn segment_notes(frames: &[FrameNote], config: &SegmentConfig) -> Vec<NoteEvent> {
    let mut events = Vec::new();
    let Some(first) = frames.first() else {
        return events;
    };

    let mut run = Run::start(0, first);
    for (i, frame) in frames.iter().enumerate().skip(1) {
        if run.continues(frame, config.velocity_tolerance) {
            run.velocity_sum += frame.velocity as u64;
            continue;
        }
        let finished = std::mem::replace(&mut run, Run::start(i, frame));
        events.extend(finished.close(i, config.min_note_frames));
    }
    events.extend(run.close(frames.len(), config.min_note_frames));
    events
}

/// Rebuild the per-frame note sequence: event frames carry the event's note and
/// velocity, everything else is silence with velocity 0
pub fn expand_to_frames(events: &[NoteEvent], frame_count: usize) -> Vec<FrameNote> {
    let mut frames = vec![
        FrameNote {
            note: None,
            velocity: 0,
        };
        frame_count
    ];
    for event in events {
        let end = event.end_frame().min(frame_count);
        for slot in frames.iter_mut().take(end).skip(event.start_frame) {
            *slot = FrameNote {
                note: Some(event.note),
                velocity: event.velocity,
            };
        }
    }
    frames
}
