//! Pass 2: Note Segmentation

use crate::audio::TranscriptionState;
use crate::config::Config;
use crate::error::Result;
use crate::segment::segment_notes;

pub fn run(state: &mut TranscriptionState, config: &Config) -> Result<()> {
    log::info!("Pass 2: Note segmentation");

    if config.segment.velocity_tolerance.is_some() {
        log::debug!("  Velocity-similarity merging enabled");
    }
    state.note_events = segment_notes(&state.frame_notes, &config.segment);

    if state.note_events.is_empty() {
        log::warn!("No notes survived segmentation; the MIDI file will only hold a tempo event");
    } else {
        let shortest = state.note_events.iter().map(|n| n.duration_frames).min();
        let longest = state.note_events.iter().map(|n| n.duration_frames).max();
        log::debug!(
            "  Note duration range: {:?} - {:?} frames",
            shortest,
            longest
        );
    }
    log::info!("  ✓ Pass 2 complete ({} notes)", state.note_events.len());
    Ok(())
}
