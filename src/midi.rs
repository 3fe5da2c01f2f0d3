//! Standard MIDI File (format 0, single track) serialization

use crate::config::ExportConfig;
use crate::error::{Result, TranscribeError};
use crate::segment::NoteEvent;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Largest value a four byte variable-length quantity can hold
pub const MAX_VLQ: u32 = 0x0FFF_FFFF;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const META: u8 = 0xFF;
const META_TEMPO: u8 = 0x51;
const META_END_OF_TRACK: u8 = 0x2F;

/// Encode `value` as a VLQ: 7 bits per byte, most significant group first,
/// continuation bit set on every byte but the last
pub fn encode_vlq(value: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4);
    write_vlq(value, &mut out).map_err(|value| TranscribeError::EncodingOverflow {
        event_index: 0,
        value,
    })?;
    Ok(out)
}

/// Append a VLQ to `out`; hands the value back when it does not fit in four bytes
fn write_vlq(value: u64, out: &mut Vec<u8>) -> std::result::Result<(), u64> {
    if value > MAX_VLQ as u64 {
        return Err(value);
    }
    let mut groups = [0u8; 4];
    let mut n = 0;
    let mut v = value;
    loop {
        groups[n] = (v & 0x7F) as u8;
        n += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        out.push(groups[i] | continuation);
    }
    Ok(())
}

/// Decode one VLQ from the front of `bytes`, returning the value and bytes consumed
pub fn decode_vlq(bytes: &[u8]) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    for (i, &byte) in bytes.iter().take(4).enumerate() {
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if bytes.len() < 4 {
        Err(TranscribeError::MalformedMidi(format!(
            "VLQ truncated after {} byte(s)",
            bytes.len()
        )))
    } else {
        Err(TranscribeError::MalformedMidi(
            "VLQ longer than four bytes".to_string(),
        ))
    }
}

/// Seconds to ticks: `round(seconds / (60 / bpm) * ticks_per_beat)`
pub fn seconds_to_ticks(seconds: f64, tempo_bpm: f32, ticks_per_beat: u16) -> u64 {
    let seconds_per_beat = 60.0 / tempo_bpm as f64;
    (seconds / seconds_per_beat * ticks_per_beat as f64).round() as u64
}

/// Frame to tick conversion for one file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickTiming {
    pub tempo_bpm: f32,
    pub ticks_per_beat: u16,
    /// Tempo meta-event payload
    pub microseconds_per_beat: u32,
    /// `hop_length / sample_rate`
    pub seconds_per_frame: f64,
}

impl TickTiming {
    pub fn new(export: &ExportConfig, hop_length: usize, sample_rate: u32) -> Self {
        Self {
            tempo_bpm: export.tempo_bpm,
            ticks_per_beat: export.ticks_per_beat,
            microseconds_per_beat: export.microseconds_per_beat(),
            seconds_per_frame: hop_length as f64 / sample_rate as f64,
        }
    }

    pub fn frame_to_ticks(&self, frame: usize) -> u64 {
        seconds_to_ticks(
            frame as f64 * self.seconds_per_frame,
            self.tempo_bpm,
            self.ticks_per_beat,
        )
    }
}

/// The messages this encoder emits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    Tempo { microseconds_per_beat: u32 },
    NoteOn { key: u8, velocity: u8 },
    NoteOff { key: u8, velocity: u8 },
    EndOfTrack,
}

/// Message with its delta-time in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackEvent {
    pub delta: u64,
    pub message: MidiMessage,
}

/// Lay out the track: tempo at 0, a note-on/note-off pair per note, end-of-track
pub fn build_track(events: &[NoteEvent], timing: &TickTiming, note_off_velocity: u8) -> Vec<TrackEvent> {
    let mut track = Vec::with_capacity(events.len() * 2 + 2);
    track.push(TrackEvent {
        delta: 0,
        message: MidiMessage::Tempo {
            microseconds_per_beat: timing.microseconds_per_beat,
        },
    });

    let mut cursor = 0u64;
    for event in events {
        if event.velocity == 0 {
            log::warn!(
                "Skipping silent note {} at frame {}",
                event.note,
                event.start_frame
            );
            continue;
        }
        if event.note > 127 {
            log::warn!(
                "Skipping note {} at frame {}: outside the MIDI key range",
                event.note,
                event.start_frame
            );
            continue;
        }
        let on_tick = timing.frame_to_ticks(event.start_frame);
        let off_tick = timing.frame_to_ticks(event.end_frame()).max(on_tick);

        track.push(TrackEvent {
            delta: on_tick.saturating_sub(cursor),
            message: MidiMessage::NoteOn {
                key: event.note,
                velocity: event.velocity.min(127),
            },
        });
        track.push(TrackEvent {
            delta: off_tick - on_tick,
            message: MidiMessage::NoteOff {
                key: event.note,
                velocity: note_off_velocity.min(127),
            },
        });
        cursor = off_tick.max(cursor);
    }

    track.push(TrackEvent {
        delta: 0,
        message: MidiMessage::EndOfTrack,
    });
    track
}

/// Serialize track events to the raw event stream (no chunk header)
pub fn encode_track(track: &[TrackEvent]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(track.len() * 4);
    for (event_index, event) in track.iter().enumerate() {
        write_vlq(event.delta, &mut out)
            .map_err(|value| TranscribeError::EncodingOverflow { event_index, value })?;
        match event.message {
            MidiMessage::Tempo {
                microseconds_per_beat,
            } => {
                let [_, b0, b1, b2] = microseconds_per_beat.to_be_bytes();
                out.extend_from_slice(&[META, META_TEMPO, 0x03, b0, b1, b2]);
            }
            MidiMessage::NoteOn { key, velocity } => {
                out.extend_from_slice(&[NOTE_ON, key, velocity]);
            }
            MidiMessage::NoteOff { key, velocity } => {
                out.extend_from_slice(&[NOTE_OFF, key, velocity]);
            }
            MidiMessage::EndOfTrack => {
                out.extend_from_slice(&[META, META_END_OF_TRACK, 0x00]);
            }
        }
    }
    Ok(out)
}

/// Assemble the complete file: `MThd` header chunk followed by one `MTrk` chunk
pub fn encode_file(ticks_per_beat: u16, track: &[TrackEvent]) -> Result<Vec<u8>> {
    let events = encode_track(track)?;
    let track_length = u32::try_from(events.len()).map_err(|_| {
        TranscribeError::EncodingOverflow {
            event_index: track.len().saturating_sub(1),
            value: events.len() as u64,
        }
    })?;

    let mut bytes = Vec::with_capacity(14 + 8 + events.len());
    bytes.extend_from_slice(b"MThd");
    bytes.extend_from_slice(&6u32.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&ticks_per_beat.to_be_bytes());
    bytes.extend_from_slice(b"MTrk");
    bytes.extend_from_slice(&track_length.to_be_bytes());
    bytes.extend_from_slice(&events);
    Ok(bytes)
}

/// Note events straight to file bytes
pub fn encode_note_events(
    events: &[NoteEvent],
    export: &ExportConfig,
    hop_length: usize,
    sample_rate: u32,
) -> Result<Vec<u8>> {
    let timing = TickTiming::new(export, hop_length, sample_rate);
    let track = build_track(events, &timing, export.note_off_velocity);
    encode_file(export.ticks_per_beat, &track)
}

/// Read back a raw event stream produced by [`encode_track`]
pub fn parse_track_events(mut bytes: &[u8]) -> Result<Vec<TrackEvent>> {
    let mut track = Vec::new();
    while !bytes.is_empty() {
        let (delta, used) = decode_vlq(bytes)?;
        bytes = &bytes[used..];
        let take = |bytes: &[u8], n: usize| -> Result<Vec<u8>> {
            bytes.get(..n).map(|b| b.to_vec()).ok_or_else(|| {
                TranscribeError::MalformedMidi("event truncated".to_string())
            })
        };
        let (message, used) = match bytes.first().copied() {
            Some(NOTE_ON) => {
                let b = take(bytes, 3)?;
                (MidiMessage::NoteOn { key: b[1], velocity: b[2] }, 3)
            }
            Some(NOTE_OFF) => {
                let b = take(bytes, 3)?;
                (MidiMessage::NoteOff { key: b[1], velocity: b[2] }, 3)
            }
            Some(META) => {
                let b = take(bytes, 3)?;
                match (b[1], b[2]) {
                    (META_TEMPO, 0x03) => {
                        let t = take(bytes, 6)?;
                        let microseconds_per_beat = u32::from_be_bytes([0, t[3], t[4], t[5]]);
                        (MidiMessage::Tempo { microseconds_per_beat }, 6)
                    }
                    (META_END_OF_TRACK, 0x00) => (MidiMessage::EndOfTrack, 3),
                    (kind, len) => {
                        return Err(TranscribeError::MalformedMidi(format!(
                            "unsupported meta-event 0x{:02X} (length {})",
                            kind, len
                        )))
                    }
                }
            }
            Some(status) => {
                return Err(TranscribeError::MalformedMidi(format!(
                    "unsupported status byte 0x{:02X}",
                    status
                )))
            }
            None => {
                return Err(TranscribeError::MalformedMidi(
                    "delta-time without event".to_string(),
                ))
            }
        };
        bytes = &bytes[used..];
        track.push(TrackEvent {
            delta: delta as u64,
            message,
        });
    }
    Ok(track)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Write an assembled file in one call. The bytes go to a sibling staging file
/// that is renamed over `path` only after a successful flush, so a failed write
/// never leaves a truncated MIDI file behind.
pub fn write_midi_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let staging = staging_path(path);

    let written = (|| -> std::io::Result<()> {
        let mut file = File::create(&staging)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();

    match written.and_then(|()| fs::rename(&staging, path)) {
        Ok(()) => Ok(()),
        Err(err) => {
            let _ = fs::remove_file(&staging);
            Err(TranscribeError::Io(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path_is_sibling() {
        let staging = staging_path(Path::new("/tmp/out/song.mid"));
        assert_eq!(staging, PathBuf::from("/tmp/out/song.mid.partial"));
    }

    #[test]
    fn test_write_vlq_hands_back_overflow() {
        let mut out = Vec::new();
        assert_eq!(write_vlq(MAX_VLQ as u64 + 1, &mut out), Err(MAX_VLQ as u64 + 1));
        assert!(out.is_empty());
    }
}
