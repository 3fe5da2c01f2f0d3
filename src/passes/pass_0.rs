//! Pass 0: Framing & YIN Estimation

use crate::audio::TranscriptionState;
use crate::config::Config;
use crate::error::Result;
use crate::frames::Frames;
use crate::yin::YinEstimator;

pub fn run(state: &mut TranscriptionState, config: &Config) -> Result<()> {
    log::info!("Pass 0: Framing & YIN estimation");

    let frames = Frames::new(
        &state.buffer.samples,
        config.frame.frame_length,
        config.frame.hop_length,
    )?;
    let estimator = YinEstimator::new(state.buffer.sample_rate, &config.frame, &config.yin)?;
    log::debug!(
        "  {} frames of {} samples (hop {}, {} samples of padding)",
        frames.len(),
        frames.frame_length(),
        frames.hop_length(),
        frames.padding()
    );

    state.estimates = estimator.estimate(&frames, config.yin.parallel)?;

    let pitched = state
        .estimates
        .iter()
        .filter(|e| e.frequency_hz.is_some())
        .count();
    log::info!(
        "  ✓ Pass 0 complete ({} of {} frames pitched)",
        pitched,
        state.estimates.len()
    );
    Ok(())
}
