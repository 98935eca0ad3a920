//! Audio source abstraction: the one blocking read of each stream cycle.

use super::history::HistoryError;
use anyhow::{Context, Result};
use std::path::Path;
use thiserror::Error;

/// Why a capture did not produce a frame. Nothing is committed to the
/// history when one of these is returned.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no audio frame arrived within {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    #[error("audio source delivered {got} of {expected} samples")]
    ShortRead { expected: usize, got: usize },

    #[error("audio source reached end of stream")]
    EndOfStream,

    #[error("audio stream disconnected")]
    Disconnected,

    #[error("audio device error: {0}")]
    Device(String),

    #[error(transparent)]
    History(#[from] HistoryError),
}

impl CaptureError {
    /// Starvation is the only condition worth retrying on the next cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CaptureError::Timeout { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaptureError::Timeout { .. } => "timeout",
            CaptureError::ShortRead { .. } => "short_read",
            CaptureError::EndOfStream => "end_of_stream",
            CaptureError::Disconnected => "disconnected",
            CaptureError::Device(_) => "device",
            CaptureError::History(_) => "history",
        }
    }
}

/// Blocking producer of mono `i16` samples.
///
/// `read` must fill `buf` completely and return `buf.len()`, or fail. Partial
/// reads are reported as [`CaptureError::ShortRead`], never as a short `Ok`.
pub trait AudioSource {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError>;

    fn name(&self) -> &str {
        "unknown_source"
    }

    /// Frames lost upstream of `read` since the source was opened.
    fn frames_dropped(&self) -> u64 {
        0
    }
}

impl<S: AudioSource + ?Sized> AudioSource for Box<S> {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError> {
        (**self).read(buf)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn frames_dropped(&self) -> u64 {
        (**self).frames_dropped()
    }
}

/// Replays pre-recorded samples, one frame per read.
///
/// A trailing remainder shorter than a frame is never delivered; the source
/// reports end of stream instead.
#[derive(Debug, Clone)]
pub struct PcmSource {
    samples: Vec<i16>,
    cursor: usize,
    label: String,
}

impl PcmSource {
    pub fn new(samples: Vec<i16>) -> Self {
        Self {
            samples,
            cursor: 0,
            label: "pcm_memory".to_string(),
        }
    }

    /// Interpret `bytes` as little-endian `i16` samples. An odd trailing byte is dropped.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Self::new(samples)
    }

    /// Load a raw s16le mono PCM file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read PCM file '{}'", path.display()))?;
        let mut source = Self::from_le_bytes(&bytes);
        source.label = format!("pcm_file:{}", path.display());
        Ok(source)
    }

    pub fn remaining(&self) -> usize {
        self.samples.len().saturating_sub(self.cursor)
    }
}

impl AudioSource for PcmSource {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining() < buf.len() {
            self.cursor = self.samples.len();
            return Err(CaptureError::EndOfStream);
        }
        let end = self.cursor + buf.len();
        buf.copy_from_slice(&self.samples[self.cursor..end]);
        self.cursor = end;
        Ok(buf.len())
    }

    fn name(&self) -> &str {
        &self.label
    }
}
