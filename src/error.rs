//! Error types for the pitch-to-MIDI system

use std::fmt;

/// Custom error type for transcription
#[derive(Debug)]
pub enum TranscribeError {
    /// E001: Audio file could not be decoded into a sample buffer
    InvalidAudioFormat(String),
    /// E002: Sample rate is zero or does not match the configured rate
    UnsupportedSampleRate(u32),
    /// E003: Configuration or frame geometry is unusable
    InvalidConfiguration(String),
    /// E004: A delta-time does not fit in a four byte VLQ
    EncodingOverflow { event_index: usize, value: u64 },
    /// E005: Byte stream is not a well-formed VLQ or track event
    MalformedMidi(String),
    /// E006: Destination could not be written
    Io(std::io::Error),
    /// E007: Analysis report could not be serialized
    AnalysisExportError(String),
    /// E008: FFT planning or processing failed
    FftError(String),
}

impl fmt::Display for TranscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscribeError::InvalidAudioFormat(msg) => {
                write!(f, "E001: Invalid audio format - {}", msg)
            }
            TranscribeError::UnsupportedSampleRate(sr) => {
                write!(f, "E002: Unsupported sample rate {} Hz", sr)
            }
            TranscribeError::InvalidConfiguration(msg) => {
                write!(f, "E003: Invalid configuration - {}", msg)
            }
            TranscribeError::EncodingOverflow { event_index, value } => {
                write!(
                    f,
                    "E004: Event {} has delta-time {} beyond the VLQ range (max {})",
                    event_index,
                    value,
                    crate::midi::MAX_VLQ
                )
            }
            TranscribeError::MalformedMidi(msg) => {
                write!(f, "E005: Malformed MIDI data - {}", msg)
            }
            TranscribeError::Io(err) => {
                write!(f, "E006: I/O error - {}", err)
            }
            TranscribeError::AnalysisExportError(msg) => {
                write!(f, "E007: Analysis export error - {}", msg)
            }
            TranscribeError::FftError(msg) => {
                write!(f, "E008: FFT error - {}", msg)
            }
        }
    }
}

impl std::error::Error for TranscribeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranscribeError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TranscribeError {
    fn from(err: std::io::Error) -> Self {
        TranscribeError::Io(err)
    }
}

impl From<serde_json::Error> for TranscribeError {
    fn from(err: serde_json::Error) -> Self {
        TranscribeError::AnalysisExportError(format!("JSON serialization error: {}", err))
    }
}

impl From<realfft::FftError> for TranscribeError {
    fn from(err: realfft::FftError) -> Self {
        TranscribeError::FftError(err.to_string())
    }
}

impl From<hound::Error> for TranscribeError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => TranscribeError::Io(io),
            other => TranscribeError::InvalidAudioFormat(other.to_string()),
        }
    }
}

/// Result type alias for transcription operations
pub type Result<T> = std::result::Result<T, TranscribeError>;
