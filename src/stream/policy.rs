//! Hysteresis policy turning per-frame VAD decisions into a streaming window.
//!
//! The only state is the time of the last speech frame. Every decision is a
//! function of that timestamp, the current time, and the current frame's
//! classification:
//!
//! | frame   | since last speech | regime       | sends                     |
//! |---------|-------------------|--------------|---------------------------|
//! | speech  | > window          | Onset        | lookback flush + current  |
//! | any     | <= window         | Continuation | current                   |
//! | silence | > window          | Silence      | nothing                   |
//!
//! Speech refreshes the timestamp in both the onset and continuation
//! regimes, which is what carries the window across short pauses.

use crate::config::StreamConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Silence,
    Onset,
    Continuation,
}

impl Regime {
    pub fn label(self) -> &'static str {
        match self {
            Regime::Silence => "silence",
            Regime::Onset => "onset",
            Regime::Continuation => "continuation",
        }
    }
}

/// What the pipeline should do with the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub regime: Regime,
    /// Lookback frames to flush before the current frame (onset only).
    pub flush_frames: usize,
}

impl Decision {
    pub fn send_current(&self) -> bool {
        !matches!(self.regime, Regime::Silence)
    }

    pub fn indicator_on(&self) -> bool {
        self.send_current()
    }

    /// History offsets to flush, oldest first: `flush_frames` down to 1.
    pub fn flush_offsets(&self) -> impl Iterator<Item = usize> {
        (1..=self.flush_frames).rev()
    }
}

#[derive(Debug, Clone)]
pub struct StreamingPolicy {
    listening_window: Duration,
    lookback_frames: usize,
    last_speech_at: Option<Duration>,
}

impl StreamingPolicy {
    /// `lookback_frames` counts the onset frame itself, so onset flushes
    /// `lookback_frames - 1` history frames.
    pub fn new(listening_window: Duration, lookback_frames: usize) -> Self {
        Self {
            listening_window,
            lookback_frames,
            last_speech_at: None,
        }
    }

    pub fn from_config(cfg: &StreamConfig) -> Self {
        Self::new(cfg.listening_window(), cfg.lookback_frames)
    }

    pub fn listening_window(&self) -> Duration {
        self.listening_window
    }

    pub fn last_speech_at(&self) -> Option<Duration> {
        self.last_speech_at
    }

    /// Whether `now` falls inside the listening window of the last speech.
    pub fn in_window(&self, now: Duration) -> bool {
        match self.last_speech_at {
            Some(at) => now.saturating_sub(at) <= self.listening_window,
            None => false,
        }
    }

    /// Decide the cycle at time `now` for a frame classified as `is_speech`.
    pub fn decide(&mut self, is_speech: bool, now: Duration) -> Decision {
        let in_window = self.in_window(now);
        if is_speech {
            self.last_speech_at = Some(now);
        }

        match (is_speech, in_window) {
            (true, false) => Decision {
                regime: Regime::Onset,
                flush_frames: self.lookback_frames.saturating_sub(1),
            },
            (_, true) => Decision {
                regime: Regime::Continuation,
                flush_frames: 0,
            },
            (false, false) => Decision {
                regime: Regime::Silence,
                flush_frames: 0,
            },
        }
    }

    pub fn reset(&mut self) {
        self.last_speech_at = None;
    }
}
