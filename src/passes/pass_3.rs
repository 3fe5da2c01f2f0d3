//! Pass 3: MIDI Assembly

use crate::audio::TranscriptionState;
use crate::config::Config;
use crate::error::Result;
use crate::midi::{build_track, encode_file, TickTiming};

pub fn run(state: &mut TranscriptionState, config: &Config) -> Result<()> {
    log::info!("Pass 3: MIDI assembly");

    let timing = TickTiming::new(
        &config.export,
        config.frame.hop_length,
        state.buffer.sample_rate,
    );
    log::debug!(
        "  {} BPM, {} ticks per beat, {:.3} ticks per frame",
        timing.tempo_bpm,
        timing.ticks_per_beat,
        timing.seconds_per_frame * timing.tempo_bpm as f64 / 60.0 * timing.ticks_per_beat as f64
    );

    let track = build_track(&state.note_events, &timing, config.export.note_off_velocity);
    let bytes = encode_file(config.export.ticks_per_beat, &track)?;

    log::info!(
        "  ✓ Pass 3 complete ({} track events, {} bytes)",
        track.len(),
        bytes.len()
    );
    state.midi_bytes = Some(bytes);
    Ok(())
}
