//! Pass 1: Pitch Cleanup & Note Quantization

use crate::audio::TranscriptionState;
use crate::config::Config;
use crate::error::Result;
use crate::postprocess;

pub fn run(state: &mut TranscriptionState, config: &Config) -> Result<()> {
    log::info!("Pass 1: Pitch cleanup");

    state.frame_notes = postprocess::process(&state.estimates, &config.postprocess);

    let voiced = state.frame_notes.iter().filter(|f| f.note.is_some()).count();
    log::info!("  ✓ Pass 1 complete ({} voiced frames)", voiced);
    Ok(())
}
