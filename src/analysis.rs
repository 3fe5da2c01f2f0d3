//! JSON analysis report written alongside the MIDI file

use crate::audio::TranscriptionState;
use crate::error::Result;
use crate::midi::TickTiming;
use crate::segment::NoteEvent;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub version: String,
    pub audio_info: AudioInfo,
    pub timing: TimingInfo,
    pub frames: Vec<FrameReport>,
    pub notes: Vec<NoteReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    pub duration_seconds: f32,
    pub sample_rate: u32,
    pub total_samples: usize,
    pub frame_length: usize,
    pub hop_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingInfo {
    pub tempo_bpm: f32,
    pub ticks_per_beat: u16,
    pub seconds_per_frame: f64,
}

/// Per-frame trace: raw estimate and the note it was quantized to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameReport {
    pub index: usize,
    pub time_sec: f64,
    pub frequency_hz: Option<f32>,
    pub velocity: u8,
    pub note: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteReport {
    #[serde(flatten)]
    pub event: NoteEvent,
    pub start_sec: f64,
    pub duration_sec: f64,
    pub start_tick: u64,
    pub end_tick: u64,
}

/// Build the report from a state that has been through every pass
pub fn build_report(state: &TranscriptionState) -> AnalysisReport {
    let config = &state.config;
    let seconds_per_frame = state.seconds_per_frame();
    let timing = TickTiming::new(
        &config.export,
        config.frame.hop_length,
        state.buffer.sample_rate,
    );

    let frames = state
        .estimates
        .iter()
        .enumerate()
        .map(|(index, estimate)| FrameReport {
            index,
            time_sec: index as f64 * seconds_per_frame,
            frequency_hz: estimate.frequency_hz,
            velocity: estimate.velocity,
            note: state.frame_notes.get(index).and_then(|f| f.note),
        })
        .collect();

    let notes = state
        .note_events
        .iter()
        .map(|event| NoteReport {
            event: *event,
            start_sec: event.start_frame as f64 * seconds_per_frame,
            duration_sec: event.duration_frames as f64 * seconds_per_frame,
            start_tick: timing.frame_to_ticks(event.start_frame),
            end_tick: timing.frame_to_ticks(event.end_frame()),
        })
        .collect();

    AnalysisReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        audio_info: AudioInfo {
            duration_seconds: state.buffer.duration_sec(),
            sample_rate: state.buffer.sample_rate,
            total_samples: state.buffer.len(),
            frame_length: config.frame.frame_length,
            hop_length: config.frame.hop_length,
        },
        timing: TimingInfo {
            tempo_bpm: timing.tempo_bpm,
            ticks_per_beat: timing.ticks_per_beat,
            seconds_per_frame,
        },
        frames,
        notes,
    }
}

/// Serialize the report to `path`
pub fn export_analysis(state: &TranscriptionState, path: &Path) -> Result<()> {
    let report = build_report(state);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;
    log::info!("Exported analysis results to {}", path.display());
    Ok(())
}
