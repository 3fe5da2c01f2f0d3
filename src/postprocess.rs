//! Pitch cleanup before segmentation
//!
//! Order: velocity gate, octave-jump rejection (optional), median smoothing,
//! then frequency to MIDI note mapping. Every step returns a new sequence.

use crate::config::PostProcessConfig;
use crate::yin::PitchEstimate;
use serde::{Deserialize, Serialize};

/// Quantized frame handed to the segmenter; `note == None` marks silence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameNote {
    pub note: Option<u8>,
    pub velocity: u8,
}

/// `round(69 + 12·log2(f / 440))`; `None` outside 0..=127 or for non-positive input
pub fn frequency_to_note(frequency_hz: f32) -> Option<u8> {
    if !(frequency_hz > 0.0 && frequency_hz.is_finite()) {
        return None;
    }
    let note = (69.0 + 12.0 * (frequency_hz / 440.0).log2()).round();
    if (0.0..=127.0).contains(&note) {
        Some(note as u8)
    } else {
        None
    }
}

/// Equal-tempered frequency of a MIDI note
pub fn note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0f32.powf((note as f32 - 69.0) / 12.0)
}

/// Silence every frame whose velocity is below `min_velocity`
pub fn gate_by_velocity(estimates: &[PitchEstimate], min_velocity: u8) -> Vec<Option<f32>> {
    estimates
        .iter()
        .map(|e| {
            if e.velocity < min_velocity {
                None
            } else {
                e.frequency_hz
            }
        })
        .collect()
}

/// Reject frames more than `max_semitone_jump` away from the last accepted pitch
pub fn reject_octave_jumps(frequencies: &[Option<f32>], max_semitone_jump: f32) -> Vec<Option<f32>> {
    let mut last_valid: Option<f32> = None;
    frequencies
        .iter()
        .map(|&f| {
            let f = f.filter(|&hz| hz > 0.0)?;
            match last_valid {
                Some(prev) if (12.0 * (f / prev).log2()).abs() > max_semitone_jump => None,
                _ => {
                    last_valid = Some(f);
                    Some(f)
                }
            }
        })
        .collect()
}

/// Sliding median over pitched neighbours only; silent frames stay silent
pub fn median_smooth(frequencies: &[Option<f32>], window: usize) -> Vec<Option<f32>> {
    if window <= 1 {
        return frequencies.to_vec();
    }
    let half = window / 2;
    let mut neighbourhood = Vec::with_capacity(window.min(frequencies.len()));
    frequencies
        .iter()
        .enumerate()
        .map(|(i, f)| {
            f.as_ref()?;
            let start = i.saturating_sub(half);
            let end = i.saturating_add(half).saturating_add(1).min(frequencies.len());
            neighbourhood.clear();
            neighbourhood.extend(frequencies[start..end].iter().flatten().copied());
            neighbourhood.sort_by(|a, b| a.total_cmp(b));
            Some(neighbourhood[neighbourhood.len() / 2])
        })
        .collect()
}

/// Run the full cleanup chain and quantize to notes
pub fn process(estimates: &[PitchEstimate], config: &PostProcessConfig) -> Vec<FrameNote> {
    let gated = gate_by_velocity(estimates, config.min_velocity_threshold);
    log::debug!(
        "  Frames after velocity gate: {}/{}",
        count_pitched(&gated),
        gated.len()
    );

    let filtered = match config.max_semitone_jump {
        Some(limit) => {
            let filtered = reject_octave_jumps(&gated, limit);
            log::debug!(
                "  Frames after octave-jump rejection: {}",
                count_pitched(&filtered)
            );
            filtered
        }
        None => {
            log::debug!("  Octave-jump rejection disabled");
            gated
        }
    };

    let smoothed = median_smooth(&filtered, config.smoothing_window);

    smoothed
        .iter()
        .zip(estimates)
        .map(|(f, e)| FrameNote {
            note: f.and_then(frequency_to_note),
            velocity: e.velocity,
        })
        .collect()
}

fn count_pitched(frequencies: &[Option<f32>]) -> usize {
    frequencies.iter().filter(|f| f.is_some()).count()
}
