//! Sample buffer and WAV loading

use crate::config::Config;
use crate::error::{Result, TranscribeError};
use crate::postprocess::FrameNote;
use crate::segment::NoteEvent;
use crate::yin::PitchEstimate;
use hound::WavReader;
use std::path::Path;

/// Mono sample buffer handed to the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// Audio samples (mono, normalized to [-1, 1])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(TranscribeError::UnsupportedSampleRate(sample_rate));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Get audio duration in seconds
    pub fn duration_sec(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Reject a buffer whose rate differs from a configured fixed rate
    pub fn check_rate(&self, config: &Config) -> Result<()> {
        match config.audio.sample_rate {
            Some(expected) if expected != self.sample_rate => {
                Err(TranscribeError::UnsupportedSampleRate(self.sample_rate))
            }
            _ => Ok(()),
        }
    }
}

/// Pipeline state; each pass fills its own field from the previous one
#[derive(Debug, Clone)]
pub struct TranscriptionState {
    pub buffer: SampleBuffer,
    /// Configuration reference
    pub config: Config,

    // Pass 0: Framing & YIN estimation
    /// One estimate per frame, in frame order
    pub estimates: Vec<PitchEstimate>,

    // Pass 1: Pitch cleanup
    /// Gated, filtered, smoothed and quantized frames
    pub frame_notes: Vec<FrameNote>,

    // Pass 2: Note segmentation
    pub note_events: Vec<NoteEvent>,

    // Pass 3: MIDI assembly
    /// Complete SMF bytes, ready for a single write
    pub midi_bytes: Option<Vec<u8>>,
}

impl TranscriptionState {
    /// Load a WAV file and create initial state
    pub fn load<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        let buffer = load_wav_file(path)?;
        Self::from_buffer(buffer, config)
    }

    /// Create state around an already decoded buffer
    pub fn from_buffer(buffer: SampleBuffer, config: &Config) -> Result<Self> {
        buffer.check_rate(config)?;
        Ok(Self {
            buffer,
            config: config.clone(),
            estimates: Vec::new(),
            frame_notes: Vec::new(),
            note_events: Vec::new(),
            midi_bytes: None,
        })
    }

    /// Create state from raw samples
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, config: &Config) -> Result<Self> {
        Self::from_buffer(SampleBuffer::new(samples, sample_rate)?, config)
    }

    /// Seconds covered by one frame hop
    pub fn seconds_per_frame(&self) -> f64 {
        self.config.frame.hop_length as f64 / self.buffer.sample_rate as f64
    }
}

/// Load a WAV file into a mono sample buffer
pub fn load_wav_file<P: AsRef<Path>>(path: P) -> Result<SampleBuffer> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();
    if extension != "wav" {
        return Err(TranscribeError::InvalidAudioFormat(format!(
            "Unsupported audio format: {}",
            extension
        )));
    }

    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(TranscribeError::InvalidAudioFormat(
            "WAV header declares zero channels".to_string(),
        ));
    }
    if spec.bits_per_sample > 32 {
        return Err(TranscribeError::InvalidAudioFormat(format!(
            "Unsupported bit depth: {}",
            spec.bits_per_sample
        )));
    }

    let mut interleaved: Vec<f32> = Vec::with_capacity(reader.len() as usize);
    match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            for sample in reader.samples::<i32>() {
                interleaved.push(sample? as f32 / max_value);
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                interleaved.push(sample?);
            }
        }
    }

    let samples = downmix(&interleaved, spec.channels as usize);
    log::debug!(
        "Loaded {} ({} Hz, {} channel(s), {} frames)",
        path.display(),
        spec.sample_rate,
        spec.channels,
        samples.len()
    );
    SampleBuffer::new(samples, spec.sample_rate)
}

/// Average interleaved channels into one
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let stereo = vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix(&stereo, 2), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(matches!(
            SampleBuffer::new(vec![0.0; 8], 0),
            Err(TranscribeError::UnsupportedSampleRate(0))
        ));
    }

    #[test]
    fn test_configured_rate_mismatch() {
        let mut config = Config::default();
        config.audio.sample_rate = Some(48000);
        let buffer = SampleBuffer::new(vec![0.0; 8], 44100).unwrap();
        assert!(buffer.check_rate(&config).is_err());
        config.audio.sample_rate = None;
        assert!(buffer.check_rate(&config).is_ok());
    }
}
