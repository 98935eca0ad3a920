//! Capture buffer: the current-frame staging area plus the frame history.
//!
//! Each `capture()` reads into a scratch frame first and only swaps it in
//! once the source has delivered a whole frame, so a failed read never
//! disturbs the current frame or the history.

use super::frame::Frame;
use super::history::{FrameHistory, HistoryError};
use super::source::{AudioSource, CaptureError};

pub struct CaptureBuffer<S> {
    source: S,
    history: FrameHistory,
    current: Frame,
    scratch: Frame,
}

impl<S: AudioSource> CaptureBuffer<S> {
    pub fn new(source: S, frame_len: usize, history_frames: usize) -> Self {
        Self {
            source,
            history: FrameHistory::new(history_frames, frame_len),
            current: Frame::silent(frame_len),
            scratch: Frame::silent(frame_len),
        }
    }

    /// Block until the source delivers one full frame, then commit it.
    pub fn capture(&mut self) -> Result<&[i16], CaptureError> {
        let expected = self.scratch.len();
        let got = self.source.read(self.scratch.samples_mut())?;
        if got != expected {
            return Err(CaptureError::ShortRead { expected, got });
        }
        self.history.push(self.scratch.samples())?;
        std::mem::swap(&mut self.current, &mut self.scratch);
        Ok(self.current.samples())
    }

    /// Most recently captured frame; all zeros before the first capture.
    pub fn current_frame(&self) -> &[i16] {
        self.current.samples()
    }

    /// Frame captured `offset` cycles before the current one.
    pub fn frame_at_offset(&self, offset: usize) -> Result<&[i16], HistoryError> {
        self.history.at_offset(offset)
    }

    /// Capture sequence number of the current frame.
    pub fn sequence(&self) -> Option<u64> {
        self.history.latest_sequence()
    }

    pub fn sequence_at_offset(&self, offset: usize) -> Result<u64, HistoryError> {
        self.history.sequence_at_offset(offset)
    }

    pub fn history(&self) -> &FrameHistory {
        &self.history
    }

    pub fn frame_len(&self) -> usize {
        self.current.len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
