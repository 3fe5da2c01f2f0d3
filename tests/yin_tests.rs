//! Validation tests for the YIN pitch and velocity estimator

use pitch2midi::config::{FrameConfig, YinConfig};
use pitch2midi::error::TranscribeError;
use pitch2midi::frames::Frames;
use pitch2midi::postprocess::frequency_to_note;
use pitch2midi::yin::{
    cumulative_mean_normalized_difference, find_first_trough, parabolic_offset, period_bounds,
    velocity_from_levels, YinEstimator,
};
use std::f32::consts::PI;

const SR: u32 = 44100;

fn sine(freq: f32, amplitude: f32, n_samples: usize, sr: u32) -> Vec<f32> {
    (0..n_samples)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sr as f32).sin())
        .collect()
}

fn estimator() -> YinEstimator {
    YinEstimator::new(SR, &FrameConfig::default(), &YinConfig::default()).unwrap()
}

/// First frame index with no implicit padding
fn first_interior_frame(frames: &Frames<'_>) -> usize {
    frames.padding().div_ceil(frames.hop_length())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_bounds_defaults() {
        let (min_period, max_period) = period_bounds(SR, 2048, 65.406, 2093.0).unwrap();
        assert_eq!(min_period, 21);
        assert_eq!(max_period, 675);

        // max_period is capped by the half-frame window
        let (_, capped) = period_bounds(SR, 1024, 30.0, 2093.0).unwrap();
        assert_eq!(capped, 1024 - 512 - 1);
    }

    #[test]
    fn test_degenerate_period_bounds() {
        assert!(matches!(
            period_bounds(SR, 32, 65.406, 2093.0),
            Err(TranscribeError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            period_bounds(8000, 2048, 100.0, 9000.0),
            Err(TranscribeError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            period_bounds(0, 2048, 65.0, 2000.0),
            Err(TranscribeError::UnsupportedSampleRate(0))
        ));
    }

    #[test]
    fn test_sine_440_interior_frames_are_a4() {
        let samples = sine(440.0, 0.5, SR as usize, SR);
        let frames = Frames::new(&samples, 2048, 512).unwrap();
        let estimates = estimator().estimate(&frames, false).unwrap();
        assert_eq!(estimates.len(), frames.len());

        for estimate in &estimates[first_interior_frame(&frames)..] {
            let f0 = estimate.frequency_hz.expect("interior frame should be pitched");
            assert!((f0 - 440.0).abs() < 5.0, "estimated {} Hz", f0);
            assert_eq!(frequency_to_note(f0), Some(69));
        }
    }

    #[test]
    fn test_sine_velocity_is_rms_over_peak() {
        let samples = sine(440.0, 0.5, SR as usize, SR);
        let frames = Frames::new(&samples, 2048, 512).unwrap();
        let estimates = estimator().estimate(&frames, false).unwrap();
        for estimate in &estimates[first_interior_frame(&frames)..] {
            // 127 / sqrt(2) ~= 89.8
            assert!(
                (88..=92).contains(&estimate.velocity),
                "velocity {}",
                estimate.velocity
            );
        }
    }

    #[test]
    fn test_other_pitches() {
        for (freq, note) in [(110.0, 45u8), (261.63, 60), (880.0, 81)] {
            let samples = sine(freq, 0.8, SR as usize / 2, SR);
            let frames = Frames::new(&samples, 2048, 512).unwrap();
            let estimates = estimator().estimate(&frames, false).unwrap();
            let mid = estimates[frames.len() / 2];
            assert_eq!(
                mid.frequency_hz.and_then(frequency_to_note),
                Some(note),
                "{} Hz estimated as {:?}",
                freq,
                mid.frequency_hz
            );
        }
    }

    #[test]
    fn test_silence_is_unpitched_with_zero_velocity() {
        let samples = vec![0.0; SR as usize];
        let frames = Frames::new(&samples, 2048, 512).unwrap();
        let estimates = estimator().estimate(&frames, true).unwrap();
        assert!(estimates
            .iter()
            .all(|e| e.velocity == 0 && e.frequency_hz.is_none()));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut samples = sine(220.0, 0.4, SR as usize, SR);
        samples.extend(sine(330.0, 0.6, SR as usize, SR));
        let frames = Frames::new(&samples, 2048, 512).unwrap();
        let yin = estimator();
        let sequential = yin.estimate(&frames, false).unwrap();
        let parallel = yin.estimate(&frames, true).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_frame_length_mismatch_rejected() {
        let samples = vec![0.1; 8192];
        let frames = Frames::new(&samples, 1024, 512).unwrap();
        assert!(estimator().estimate(&frames, false).is_err());
    }

    #[test]
    fn test_first_trough_wins_over_deeper_later_trough() {
        let cmnd = [1.0, 0.8, 0.05, 0.3, 0.9, 0.01, 0.5];
        assert_eq!(find_first_trough(&cmnd, 0.1), Some(2));
        assert_eq!(find_first_trough(&cmnd, 0.02), Some(5));
        assert_eq!(find_first_trough(&cmnd, 0.001), None);
    }

    #[test]
    fn test_trough_requires_strict_left_descent() {
        let cmnd = [0.5, 0.05, 0.05, 0.5];
        assert_eq!(find_first_trough(&cmnd, 0.1), Some(1));
        let flat = [0.05, 0.05, 0.05, 0.05];
        assert_eq!(find_first_trough(&flat, 0.1), None);
    }

    #[test]
    fn test_parabolic_offset() {
        // Symmetric neighbours: minimum is exactly on the sample
        assert_eq!(parabolic_offset(&[1.0, 0.0, 1.0], 1), 0.0);
        // Samples of (x - 1.25)^2 at x = 0, 1, 2
        let offset = parabolic_offset(&[1.5625, 0.0625, 0.5625], 1);
        assert!((offset - 0.25).abs() < 1e-6);
        // Boundaries and flat curves are left alone
        assert_eq!(parabolic_offset(&[0.0, 1.0, 2.0], 0), 0.0);
        assert_eq!(parabolic_offset(&[0.0, 1.0, 2.0], 2), 0.0);
        assert_eq!(parabolic_offset(&[0.5, 0.5, 0.5], 1), 0.0);
    }

    #[test]
    fn test_cmnd_indexing_and_zero_guard() {
        let diff = [0.0, 2.0, 4.0, 0.0, 6.0];
        let cmnd = cumulative_mean_normalized_difference(&diff, 2, 4);
        assert_eq!(cmnd.len(), 3);
        assert!((cmnd[0] - 4.0 / 3.0).abs() < 1e-6);
        assert_eq!(cmnd[1], 0.0);
        assert!((cmnd[2] - 6.0 / 3.0).abs() < 1e-6);

        let silent = cumulative_mean_normalized_difference(&[0.0; 8], 1, 7);
        assert!(silent.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_velocity_from_levels() {
        assert_eq!(velocity_from_levels(0.0, 0.0), 0);
        assert_eq!(velocity_from_levels(1.0, 1.0), 127);
        assert_eq!(velocity_from_levels(0.5, 1.0), 64);
        assert_eq!(velocity_from_levels(2.0, 1.0), 127);
    }
}
