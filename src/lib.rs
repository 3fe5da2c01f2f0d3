//! Pitch-to-MIDI Transcription
//!
//! Converts a monophonic recording into a Standard MIDI File: YIN pitch and
//! loudness estimation per frame, pitch cleanup, note segmentation and a
//! byte-exact SMF writer.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod frames;
pub mod midi;
pub mod passes;
pub mod postprocess;
pub mod segment;
pub mod yin;

pub use audio::{SampleBuffer, TranscriptionState};
pub use config::Config;
pub use error::{Result, TranscribeError};
pub use segment::NoteEvent;

use std::path::Path;

/// Main processing pipeline for pitch-to-MIDI conversion
pub struct PitchToMidi {
    config: Config,
}

impl PitchToMidi {
    /// Create a new processor with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transcribe a WAV file and write the MIDI file to `output_path`
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(&self, input_path: P, output_path: Q) -> Result<()> {
        config::validate_config(&self.config)?;
        let state = TranscriptionState::load(input_path, &self.config)?;
        let state = self.run(state)?;
        self.export_results(&state, output_path.as_ref())
    }

    /// Run every pass over an already decoded buffer; no file is written
    pub fn transcribe(&self, buffer: SampleBuffer) -> Result<TranscriptionState> {
        config::validate_config(&self.config)?;
        let state = TranscriptionState::from_buffer(buffer, &self.config)?;
        self.run(state)
    }

    fn run(&self, mut state: TranscriptionState) -> Result<TranscriptionState> {
        self.run_pipeline(&mut state)?;
        Ok(state)
    }

    /// Execute the complete pipeline
    fn run_pipeline(&self, state: &mut TranscriptionState) -> Result<()> {
        // Pass 0: Framing & YIN estimation
        passes::pass_0::run(state, &self.config)?;

        // Pass 1: Pitch cleanup
        passes::pass_1::run(state, &self.config)?;

        // Pass 2: Note segmentation
        passes::pass_2::run(state, &self.config)?;

        // Pass 3: MIDI assembly
        passes::pass_3::run(state, &self.config)?;

        Ok(())
    }

    /// Write the MIDI file and, if configured, the analysis report next to it
    pub fn export_results(&self, state: &TranscriptionState, output_path: &Path) -> Result<()> {
        let bytes = state.midi_bytes.as_deref().ok_or_else(|| {
            TranscribeError::InvalidConfiguration("MIDI assembly pass has not run".to_string())
        })?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        midi::write_midi_file(output_path, bytes)?;
        log::info!(
            "Exported {} notes to {}",
            state.note_events.len(),
            output_path.display()
        );

        if self.config.export.write_analysis {
            analysis::export_analysis(state, &output_path.with_extension("json"))?;
        }
        Ok(())
    }
}

/// Validate configuration and that the input can be decoded
pub fn validate_input<P: AsRef<Path>>(input_path: P, config: &Config) -> Result<()> {
    config::validate_config(config)?;

    let buffer = audio::load_wav_file(input_path)?;
    buffer.check_rate(config)?;
    if buffer.len() < config.frame.hop_length {
        return Err(TranscribeError::InvalidConfiguration(format!(
            "input has {} samples, fewer than one {}-sample hop",
            buffer.len(),
            config.frame.hop_length
        )));
    }
    Ok(())
}
