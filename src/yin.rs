//! YIN fundamental-frequency and loudness estimation
//!
//! Each frame is analysed independently:
//! 1. autocorrelation of the frame against its reversed first half through a
//!    real FFT pair,
//! 2. windowed energy from a cumulative sum of squares,
//! 3. the difference function `d(τ) = e(0) + e(τ) - 2·acf(τ)`,
//! 4. cumulative mean normalisation,
//! 5. first trough below the threshold (global minimum as fallback),
//! 6. parabolic refinement of the chosen lag.
//!
//! Loudness is the RMS/peak ratio scaled to the MIDI velocity range.

use crate::config::{FrameConfig, YinConfig};
use crate::error::{Result, TranscribeError};
use crate::frames::{Frame, Frames};
use rayon::prelude::*;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Magnitudes below this are treated as numerical noise
const NOISE_FLOOR: f32 = 1e-6;
/// Curvature below this skips parabolic refinement
const MIN_CURVATURE: f32 = 1e-12;

/// Per-frame estimate; `frequency_hz == None` marks silence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    pub frequency_hz: Option<f32>,
    pub velocity: u8,
}

impl PitchEstimate {
    pub const SILENT: PitchEstimate = PitchEstimate {
        frequency_hz: None,
        velocity: 0,
    };
}

/// Lag search range derived from the frequency limits and frame geometry.
///
/// `min_period = floor(sr / fmax)`, `max_period = min(ceil(sr / fmin), frame_length - win_length - 1)`
/// with `win_length = frame_length / 2`.
pub fn period_bounds(
    sample_rate: u32,
    frame_length: usize,
    fmin_hz: f32,
    fmax_hz: f32,
) -> Result<(usize, usize)> {
    if sample_rate == 0 {
        return Err(TranscribeError::UnsupportedSampleRate(sample_rate));
    }
    if !(fmin_hz > 0.0 && fmax_hz > 0.0) {
        return Err(TranscribeError::InvalidConfiguration(
            "frequency limits must be positive".to_string(),
        ));
    }
    let sr = sample_rate as f64;
    let win_length = frame_length / 2;
    let min_period = (sr / fmax_hz as f64).floor() as usize;
    let max_period = ((sr / fmin_hz as f64).ceil() as usize)
        .min((frame_length - win_length).saturating_sub(1));

    // Lag 0 has no cumulative mean to normalise against
    if min_period == 0 {
        return Err(TranscribeError::InvalidConfiguration(format!(
            "fmax_hz {} is above the {} Hz sample rate",
            fmax_hz, sample_rate
        )));
    }
    if min_period >= max_period {
        return Err(TranscribeError::InvalidConfiguration(format!(
            "degenerate period bounds: min_period {} >= max_period {}",
            min_period, max_period
        )));
    }
    Ok((min_period, max_period))
}

/// Cumulative mean normalised difference over `min_period..=max_period`.
///
/// Element `i` of the result belongs to lag `min_period + i`.
pub fn cumulative_mean_normalized_difference(
    diff: &[f32],
    min_period: usize,
    max_period: usize,
) -> Vec<f32> {
    let mut cmnd = Vec::with_capacity(max_period + 1 - min_period);
    let mut running = 0.0f64;
    for tau in 1..=max_period {
        running += diff[tau] as f64;
        if tau >= min_period {
            let mean = (running / tau as f64) as f32;
            cmnd.push(diff[tau] / (mean + f32::MIN_POSITIVE));
        }
    }
    cmnd
}

/// First local minimum below `threshold`, in increasing lag order
pub fn find_first_trough(cmnd: &[f32], threshold: f32) -> Option<usize> {
    (1..cmnd.len().saturating_sub(1)).find(|&i| {
        cmnd[i] < cmnd[i - 1] && cmnd[i] <= cmnd[i + 1] && cmnd[i] < threshold
    })
}

fn argmin(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v < values[best] {
            best = i;
        }
    }
    best
}

/// Sub-sample offset of the minimum at `idx`; zero at the boundaries or on a flat curve
pub fn parabolic_offset(cmnd: &[f32], idx: usize) -> f32 {
    if idx == 0 || idx + 1 >= cmnd.len() {
        return 0.0;
    }
    let (a, b, c) = (cmnd[idx - 1], cmnd[idx], cmnd[idx + 1]);
    let denom = a - 2.0 * b + c;
    if denom.abs() < MIN_CURVATURE {
        return 0.0;
    }
    0.5 * (a - c) / denom
}

/// RMS/peak loudness scaled to 0..=127
pub fn velocity_from_levels(rms: f32, peak: f32) -> u8 {
    if peak <= 0.0 {
        return 0;
    }
    (rms / peak * 127.0).round().clamp(0.0, 127.0) as u8
}

/// Per-task buffers; one set per worker
pub struct YinScratch {
    frame: Vec<f32>,
    fft_in: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    reversed_spectrum: Vec<Complex<f32>>,
    fft_out: Vec<f32>,
    forward_scratch: Vec<Complex<f32>>,
    inverse_scratch: Vec<Complex<f32>>,
    diff: Vec<f32>,
}

/// YIN estimator with precomputed FFT plans and lag bounds
pub struct YinEstimator {
    sample_rate: u32,
    frame_length: usize,
    win_length: usize,
    min_period: usize,
    max_period: usize,
    threshold: f32,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
}

impl YinEstimator {
    pub fn new(sample_rate: u32, frame: &FrameConfig, yin: &YinConfig) -> Result<Self> {
        let frame_length = frame.frame_length;
        if frame_length < 4 {
            return Err(TranscribeError::InvalidConfiguration(format!(
                "frame_length {} is too short for YIN",
                frame_length
            )));
        }
        let (min_period, max_period) =
            period_bounds(sample_rate, frame_length, yin.fmin_hz, yin.fmax_hz)?;

        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(frame_length);
        let inverse = planner.plan_fft_inverse(frame_length);

        log::debug!(
            "YIN: frame_length={} lag range {}..={} ({:.1}-{:.1} Hz)",
            frame_length,
            min_period,
            max_period,
            sample_rate as f32 / max_period as f32,
            sample_rate as f32 / min_period as f32
        );

        Ok(Self {
            sample_rate,
            frame_length,
            win_length: frame_length / 2,
            min_period,
            max_period,
            threshold: yin.trough_threshold,
            forward,
            inverse,
        })
    }

    pub fn min_period(&self) -> usize {
        self.min_period
    }

    pub fn max_period(&self) -> usize {
        self.max_period
    }

    pub fn make_scratch(&self) -> YinScratch {
        YinScratch {
            frame: vec![0.0; self.frame_length],
            fft_in: self.forward.make_input_vec(),
            spectrum: self.forward.make_output_vec(),
            reversed_spectrum: self.forward.make_output_vec(),
            fft_out: self.inverse.make_output_vec(),
            forward_scratch: self.forward.make_scratch_vec(),
            inverse_scratch: self.inverse.make_scratch_vec(),
            diff: vec![0.0; self.frame_length - self.win_length],
        }
    }

    /// Estimate every frame; results are in frame order whether or not `parallel` is set
    pub fn estimate(&self, frames: &Frames<'_>, parallel: bool) -> Result<Vec<PitchEstimate>> {
        if frames.frame_length() != self.frame_length {
            return Err(TranscribeError::InvalidConfiguration(format!(
                "frames are {} samples, estimator expects {}",
                frames.frame_length(),
                self.frame_length
            )));
        }

        let mut results = vec![PitchEstimate::SILENT; frames.len()];
        if parallel {
            results.par_iter_mut().enumerate().try_for_each_init(
                || self.make_scratch(),
                |scratch, (index, slot)| -> Result<()> {
                    let frame = frames.get(index).ok_or_else(|| {
                        TranscribeError::InvalidConfiguration(format!(
                            "frame {} out of range",
                            index
                        ))
                    })?;
                    *slot = self.estimate_frame(&frame, scratch)?;
                    Ok(())
                },
            )?;
        } else {
            let mut scratch = self.make_scratch();
            for (slot, frame) in results.iter_mut().zip(frames.iter()) {
                *slot = self.estimate_frame(&frame, &mut scratch)?;
            }
        }
        Ok(results)
    }

    pub fn estimate_frame(&self, frame: &Frame<'_>, scratch: &mut YinScratch) -> Result<PitchEstimate> {
        let peak = frame.peak();
        if peak == 0.0 {
            return Ok(PitchEstimate::SILENT);
        }
        let velocity = velocity_from_levels(frame.rms(), peak);

        frame.copy_into(&mut scratch.frame);
        self.difference(scratch)?;

        let cmnd =
            cumulative_mean_normalized_difference(&scratch.diff, self.min_period, self.max_period);
        let idx = find_first_trough(&cmnd, self.threshold).unwrap_or_else(|| argmin(&cmnd));
        let period = (self.min_period + idx) as f32 + parabolic_offset(&cmnd, idx);

        let frequency_hz = if period > 0.0 && period.is_finite() {
            Some(self.sample_rate as f32 / period)
        } else {
            None
        };
        Ok(PitchEstimate {
            frequency_hz,
            velocity,
        })
    }

    /// Fill `scratch.diff` with the YIN difference function for lags `0..win_length`
    fn difference(&self, scratch: &mut YinScratch) -> Result<()> {
        let n = self.frame_length;
        let win = self.win_length;
        let x = &scratch.frame;

        scratch.fft_in.copy_from_slice(x);
        self.forward.process_with_scratch(
            &mut scratch.fft_in,
            &mut scratch.spectrum,
            &mut scratch.forward_scratch,
        )?;

        // x[win], x[win-1], ..., x[1], then zeros
        scratch.fft_in.fill(0.0);
        for k in 0..win {
            scratch.fft_in[k] = x[win - k];
        }
        self.forward.process_with_scratch(
            &mut scratch.fft_in,
            &mut scratch.reversed_spectrum,
            &mut scratch.forward_scratch,
        )?;

        for (a, b) in scratch.spectrum.iter_mut().zip(&scratch.reversed_spectrum) {
            *a *= *b;
        }
        if let Some(first) = scratch.spectrum.first_mut() {
            first.im = 0.0;
        }
        if n % 2 == 0 {
            if let Some(last) = scratch.spectrum.last_mut() {
                last.im = 0.0;
            }
        }
        self.inverse.process_with_scratch(
            &mut scratch.spectrum,
            &mut scratch.fft_out,
            &mut scratch.inverse_scratch,
        )?;

        let mut cumulative = Vec::with_capacity(n);
        let mut running = 0.0f64;
        for &s in x.iter() {
            running += (s as f64) * (s as f64);
            cumulative.push(running);
        }

        let lags = n - win;
        let energy_at = |tau: usize| -> f32 {
            let e = (cumulative[win + tau] - cumulative[tau]) as f32;
            if e.abs() < NOISE_FLOOR {
                0.0
            } else {
                e
            }
        };
        let energy_0 = energy_at(0);
        let scale = 1.0 / n as f32;
        for tau in 0..lags {
            let mut acf = scratch.fft_out[win + tau] * scale;
            if acf.abs() < NOISE_FLOOR {
                acf = 0.0;
            }
            scratch.diff[tau] = energy_0 + energy_at(tau) - 2.0 * acf;
        }
        Ok(())
    }
}
