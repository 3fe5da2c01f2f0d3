//! Configuration system for the pitch-to-MIDI transcriber

use crate::error::{Result, TranscribeError};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub audio: AudioConfig,
    pub frame: FrameConfig,
    pub yin: YinConfig,
    pub postprocess: PostProcessConfig,
    pub segment: SegmentConfig,
    pub export: ExportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            audio: AudioConfig::default(),
            frame: FrameConfig::default(),
            yin: YinConfig::default(),
            postprocess: PostProcessConfig::default(),
            segment: SegmentConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

/// Audio input configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Required input sample rate; `None` accepts whatever the loader reports
    pub sample_rate: Option<u32>,
}

/// Analysis frame geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

/// YIN estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YinConfig {
    /// Lowest expressible fundamental (C2)
    pub fmin_hz: f32,
    /// Highest expressible fundamental (C7)
    pub fmax_hz: f32,
    pub trough_threshold: f32,
    /// Estimate frames on the rayon pool
    pub parallel: bool,
}

impl Default for YinConfig {
    fn default() -> Self {
        Self {
            fmin_hz: 65.406,
            fmax_hz: 2093.0,
            trough_threshold: 0.1,
            parallel: true,
        }
    }
}

/// Pitch cleanup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessConfig {
    /// Frames quieter than this velocity are treated as silence
    pub min_velocity_threshold: u8,
    /// Octave-jump rejection limit in semitones; `None` disables it
    pub max_semitone_jump: Option<f32>,
    /// Median filter width in frames (odd, 1 disables smoothing)
    pub smoothing_window: usize,
}

impl Default for PostProcessConfig {
    fn default() -> Self {
        Self {
            min_velocity_threshold: 1,
            max_semitone_jump: None,
            smoothing_window: 5,
        }
    }
}

/// Note segmentation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub min_note_frames: usize,
    /// Stricter merge mode: split a run when velocity drifts this far from its first frame
    pub velocity_tolerance: Option<u8>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_note_frames: 3,
            velocity_tolerance: None,
        }
    }
}

/// MIDI export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub tempo_bpm: f32,
    pub ticks_per_beat: u16,
    pub note_off_velocity: u8,
    /// Write analysis.json next to the MIDI file
    pub write_analysis: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: 120.0,
            ticks_per_beat: 480,
            note_off_velocity: 64,
            write_analysis: false,
        }
    }
}

impl ExportConfig {
    /// Tempo meta-event payload, microseconds per quarter note
    pub fn microseconds_per_beat(&self) -> u32 {
        (60_000_000.0 / self.tempo_bpm as f64).round() as u32
    }
}

/// Widest median window accepted, in frames
pub const MAX_SMOOTHING_WINDOW: usize = 1023;

fn invalid(msg: impl Into<String>) -> TranscribeError {
    TranscribeError::InvalidConfiguration(msg.into())
}

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(sr) = config.audio.sample_rate {
        if sr == 0 {
            return Err(TranscribeError::UnsupportedSampleRate(sr));
        }
    }

    let frame = &config.frame;
    if frame.hop_length == 0 {
        return Err(invalid("hop_length must be > 0"));
    }
    if frame.frame_length <= frame.hop_length {
        return Err(invalid(format!(
            "frame_length ({}) must be > hop_length ({})",
            frame.frame_length, frame.hop_length
        )));
    }

    let yin = &config.yin;
    if !(yin.fmin_hz.is_finite() && yin.fmin_hz > 0.0) {
        return Err(invalid("fmin_hz must be a positive frequency"));
    }
    if !(yin.fmax_hz.is_finite() && yin.fmax_hz > yin.fmin_hz) {
        return Err(invalid("fmax_hz must be greater than fmin_hz"));
    }
    if !(yin.trough_threshold > 0.0 && yin.trough_threshold <= 1.0) {
        return Err(invalid("trough_threshold must be in (0, 1]"));
    }

    let post = &config.postprocess;
    if post.smoothing_window == 0 || post.smoothing_window % 2 == 0 {
        return Err(invalid(format!(
            "smoothing_window must be odd, got {}",
            post.smoothing_window
        )));
    }
    if post.smoothing_window > MAX_SMOOTHING_WINDOW {
        return Err(invalid(format!(
            "smoothing_window must be <= {}, got {}",
            MAX_SMOOTHING_WINDOW, post.smoothing_window
        )));
    }
    if let Some(jump) = post.max_semitone_jump {
        if !(jump.is_finite() && jump >= 0.0) {
            return Err(invalid("max_semitone_jump must be a non-negative number"));
        }
    }

    if config.segment.min_note_frames == 0 {
        return Err(invalid("min_note_frames must be >= 1"));
    }
    if config.segment.velocity_tolerance == Some(0) {
        return Err(invalid("velocity_tolerance must be >= 1 when set"));
    }

    let export = &config.export;
    if !(export.tempo_bpm.is_finite() && export.tempo_bpm > 0.0) {
        return Err(invalid("tempo_bpm must be positive"));
    }
    if export.microseconds_per_beat() > 0x00FF_FFFF || export.microseconds_per_beat() == 0 {
        return Err(invalid(format!(
            "tempo {} BPM does not fit a 24-bit tempo meta-event",
            export.tempo_bpm
        )));
    }
    // The high bit of the division field selects SMPTE timing
    if export.ticks_per_beat == 0 || export.ticks_per_beat > 0x7FFF {
        return Err(invalid("ticks_per_beat must be in 1..=32767"));
    }
    if export.note_off_velocity > 127 {
        return Err(invalid("note_off_velocity must be <= 127"));
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
