//! Fixed-capacity circular history of captured frames.
//!
//! All frames live in one flat allocation of `capacity * frame_len` samples.
//! `pos` is the slot of the most recent write and `oldest` the logically
//! oldest slot once the ring has wrapped. Every write advances `pos`; when it
//! lands on `oldest`, that slot is retired and `oldest` moves forward.

use thiserror::Error;

/// Errors raised by history accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("lookback offset {offset} is outside 1..{held} (frames held: {held})")]
    OutOfRange { offset: usize, held: usize },

    #[error("frame has {got} samples, history slots hold {expected}")]
    FrameLength { expected: usize, got: usize },
}

pub struct FrameHistory {
    samples: Box<[i16]>,
    sequences: Box<[u64]>,
    frame_len: usize,
    capacity: usize,
    pos: usize,
    oldest: usize,
    len: usize,
    next_sequence: u64,
}

impl FrameHistory {
    pub fn new(capacity: usize, frame_len: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: vec![0; capacity * frame_len].into_boxed_slice(),
            sequences: vec![0; capacity].into_boxed_slice(),
            frame_len,
            capacity,
            pos: 0,
            oldest: 0,
            len: 0,
            next_sequence: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Frames currently held, `min(writes, capacity)`.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of valid lookback offsets behind the latest frame.
    pub fn lookback_available(&self) -> usize {
        self.len.saturating_sub(1)
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn oldest(&self) -> usize {
        self.oldest
    }

    /// Copy `frame` into the next slot and return its capture sequence number.
    pub fn push(&mut self, frame: &[i16]) -> Result<u64, HistoryError> {
        if frame.len() != self.frame_len {
            return Err(HistoryError::FrameLength {
                expected: self.frame_len,
                got: frame.len(),
            });
        }

        self.pos = (self.pos + 1) % self.capacity;
        if self.pos == self.oldest {
            self.oldest = (self.oldest + 1) % self.capacity;
        }

        let start = self.pos * self.frame_len;
        self.samples[start..start + self.frame_len].copy_from_slice(frame);

        let sequence = self.next_sequence;
        self.sequences[self.pos] = sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.len = (self.len + 1).min(self.capacity);
        Ok(sequence)
    }

    pub fn latest(&self) -> Option<&[i16]> {
        if self.is_empty() {
            return None;
        }
        Some(self.slot(self.pos))
    }

    pub fn latest_sequence(&self) -> Option<u64> {
        if self.is_empty() {
            return None;
        }
        Some(self.sequences[self.pos])
    }

    /// The frame written `offset` pushes before the latest one.
    pub fn at_offset(&self, offset: usize) -> Result<&[i16], HistoryError> {
        let index = self.offset_index(offset)?;
        Ok(self.slot(index))
    }

    pub fn sequence_at_offset(&self, offset: usize) -> Result<u64, HistoryError> {
        let index = self.offset_index(offset)?;
        Ok(self.sequences[index])
    }

    fn offset_index(&self, offset: usize) -> Result<usize, HistoryError> {
        if offset == 0 || offset >= self.len {
            return Err(HistoryError::OutOfRange {
                offset,
                held: self.len,
            });
        }
        Ok((self.pos + self.capacity - offset) % self.capacity)
    }

    fn slot(&self, index: usize) -> &[i16] {
        let start = index * self.frame_len;
        &self.samples[start..start + self.frame_len]
    }
}
