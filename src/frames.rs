//! Lazy framing of a sample buffer
//!
//! The signal is conceptually prefixed with `frame_length - hop_length` zeros so
//! that frame 0 is centred on the first real sample. The padding is never
//! allocated: a [`Frame`] is a count of leading zeros plus a borrowed slice.

use crate::error::{Result, TranscribeError};

/// Index-driven view of all analysis frames over a borrowed buffer
#[derive(Debug, Clone, Copy)]
pub struct Frames<'a> {
    samples: &'a [f32],
    frame_length: usize,
    hop_length: usize,
    pad: usize,
    count: usize,
}

impl<'a> Frames<'a> {
    pub fn new(samples: &'a [f32], frame_length: usize, hop_length: usize) -> Result<Self> {
        if hop_length == 0 {
            return Err(TranscribeError::InvalidConfiguration(
                "hop_length must be > 0".to_string(),
            ));
        }
        if frame_length <= hop_length {
            return Err(TranscribeError::InvalidConfiguration(format!(
                "frame_length ({}) must be > hop_length ({})",
                frame_length, hop_length
            )));
        }

        let pad = frame_length - hop_length;
        let padded_length = pad + samples.len();
        if padded_length < frame_length {
            return Err(TranscribeError::InvalidConfiguration(format!(
                "signal of {} samples is shorter than one {}-sample frame",
                samples.len(),
                frame_length
            )));
        }

        Ok(Self {
            samples,
            frame_length,
            hop_length,
            pad,
            count: 1 + (padded_length - frame_length) / hop_length,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    /// Zero samples prepended before the signal
    pub fn padding(&self) -> usize {
        self.pad
    }

    /// Frame `index`, or `None` past the end
    pub fn get(&self, index: usize) -> Option<Frame<'a>> {
        if index >= self.count {
            return None;
        }
        let start = index * self.hop_length;
        let leading_zeros = self.pad.saturating_sub(start);
        let begin = start.saturating_sub(self.pad);
        let end = start + self.frame_length - self.pad;
        Some(Frame {
            index,
            leading_zeros,
            data: &self.samples[begin..end],
        })
    }

    pub fn iter(&self) -> FrameIter<'a> {
        FrameIter {
            frames: *self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for &Frames<'a> {
    type Item = Frame<'a>;
    type IntoIter = FrameIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One analysis frame
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub index: usize,
    /// Number of implicit zeros before `data`
    pub leading_zeros: usize,
    pub data: &'a [f32],
}

impl Frame<'_> {
    pub fn len(&self) -> usize {
        self.leading_zeros + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample `i` of the frame, counting the implicit padding
    pub fn sample(&self, i: usize) -> f32 {
        if i < self.leading_zeros {
            0.0
        } else {
            self.data[i - self.leading_zeros]
        }
    }

    /// Copy the frame into `out`, which must hold exactly `len()` samples
    pub fn copy_into(&self, out: &mut [f32]) {
        let (zeros, rest) = out.split_at_mut(self.leading_zeros);
        zeros.fill(0.0);
        rest.copy_from_slice(self.data);
    }

    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    pub fn rms(&self) -> f32 {
        let sum: f64 = self.data.iter().map(|&x| (x as f64) * (x as f64)).sum();
        (sum / self.len() as f64).sqrt() as f32
    }
}

/// Restartable iterator over [`Frames`]
#[derive(Debug, Clone)]
pub struct FrameIter<'a> {
    frames: Frames<'a>,
    next: usize,
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.frames.get(self.next)?;
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.frames.count.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIter<'_> {}
