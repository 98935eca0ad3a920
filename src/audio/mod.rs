//! Audio capture, frame history, and voice activity detection (VAD).
//!
//! Audio arrives as mono 16-bit PCM in fixed-length frames. Every captured
//! frame is kept in a small circular history so the streamer can reach back
//! and recover the start of an utterance that preceded detection.

mod buffer;
#[cfg_attr(not(feature = "mic-capture"), allow(dead_code))]
mod dispatch;
mod frame;
mod history;
#[cfg(feature = "mic-capture")]
mod recorder;
mod source;
mod vad;

pub use buffer::CaptureBuffer;
pub use frame::{
    decode_frame, encode_frame, encode_frame_into, encoded_len, Frame, BYTES_PER_SAMPLE,
};
pub use history::{FrameHistory, HistoryError};
#[cfg(feature = "mic-capture")]
pub use recorder::{MicSource, Recorder};
pub use source::{AudioSource, CaptureError, PcmSource};
pub use vad::{analyze, classify, EnergyZcrVad, FrameStats, Thresholds, VadDecision, VadEngine};
