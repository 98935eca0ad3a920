use super::defaults::{
    MAX_CAPTURE_TIMEOUT_MS, MAX_CHANNEL_CAPACITY, MAX_CONSECUTIVE_TIMEOUTS_LIMIT,
    MAX_DATAGRAM_BYTES, MAX_FRAME_SAMPLES, MAX_HISTORY_FRAMES, MAX_LISTENING_WINDOW_MS,
    MAX_SAMPLE_RATE, MIN_CAPTURE_TIMEOUT_MS, MIN_CHANNEL_CAPACITY, MIN_FRAME_SAMPLES,
    MIN_HISTORY_FRAMES, MIN_SAMPLE_RATE,
};
use super::{AppConfig, StreamConfig};
use crate::audio::encoded_len;
use anyhow::{bail, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values against the bounds the stream loop relies on.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            bail!(
                "--sample-rate must be between {MIN_SAMPLE_RATE} and {MAX_SAMPLE_RATE} Hz, got {}",
                self.sample_rate
            );
        }
        if !(MIN_FRAME_SAMPLES..=MAX_FRAME_SAMPLES).contains(&self.frame_samples) {
            bail!(
                "--frame-samples must be between {MIN_FRAME_SAMPLES} and {MAX_FRAME_SAMPLES}, got {}",
                self.frame_samples
            );
        }
        // One frame travels as one datagram.
        if encoded_len(self.frame_samples) > MAX_DATAGRAM_BYTES {
            bail!("--frame-samples encodes to more than {MAX_DATAGRAM_BYTES} bytes");
        }
        if !(MIN_HISTORY_FRAMES..=MAX_HISTORY_FRAMES).contains(&self.history_frames) {
            bail!(
                "--history-frames must be between {MIN_HISTORY_FRAMES} and {MAX_HISTORY_FRAMES}, got {}",
                self.history_frames
            );
        }
        // The flush reaches back lookback-1 frames, which the history must hold.
        if self.lookback_frames == 0 || self.lookback_frames > self.history_frames {
            bail!(
                "--lookback-frames must be between 1 and --history-frames ({}), got {}",
                self.history_frames,
                self.lookback_frames
            );
        }
        if self.listening_window_ms == 0 || self.listening_window_ms > MAX_LISTENING_WINDOW_MS {
            bail!(
                "--listening-window-ms must be between 1 and {MAX_LISTENING_WINDOW_MS}, got {}",
                self.listening_window_ms
            );
        }
        if !(MIN_CAPTURE_TIMEOUT_MS..=MAX_CAPTURE_TIMEOUT_MS).contains(&self.capture_timeout_ms) {
            bail!(
                "--capture-timeout-ms must be between {MIN_CAPTURE_TIMEOUT_MS} and {MAX_CAPTURE_TIMEOUT_MS}, got {}",
                self.capture_timeout_ms
            );
        }
        if self.max_consecutive_timeouts == 0
            || self.max_consecutive_timeouts > MAX_CONSECUTIVE_TIMEOUTS_LIMIT
        {
            bail!(
                "--max-consecutive-timeouts must be between 1 and {MAX_CONSECUTIVE_TIMEOUTS_LIMIT}, got {}",
                self.max_consecutive_timeouts
            );
        }
        if !(MIN_CHANNEL_CAPACITY..=MAX_CHANNEL_CAPACITY).contains(&self.channel_capacity) {
            bail!(
                "--channel-capacity must be between {MIN_CHANNEL_CAPACITY} and {MAX_CHANNEL_CAPACITY}, got {}",
                self.channel_capacity
            );
        }
        if self.server.port() == 0 {
            bail!("--server must name a non-zero port, got {}", self.server);
        }

        match &self.input_file {
            Some(path) => {
                if !path.is_file() {
                    bail!("--input-file '{}' is not a readable file", path.display());
                }
            }
            None => {
                #[cfg(not(feature = "mic-capture"))]
                bail!("microphone capture requires the 'mic-capture' feature; pass --input-file");
            }
        }

        Ok(())
    }

    /// Snapshot the CLI-controlled capture and stream settings for the core.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: self.sample_rate,
            frame_samples: self.frame_samples,
            history_frames: self.history_frames,
            lookback_frames: self.lookback_frames,
            listening_window_ms: self.listening_window_ms,
            energy_threshold: self.energy_threshold,
            zcr_threshold: self.zcr_threshold,
            capture_timeout_ms: self.capture_timeout_ms,
            max_consecutive_timeouts: self.max_consecutive_timeouts,
            channel_capacity: self.channel_capacity,
        }
    }
}
