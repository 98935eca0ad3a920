//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub use defaults::{
    DEFAULT_BIND_ADDR, DEFAULT_CAPTURE_TIMEOUT_MS, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_ENERGY_THRESHOLD, DEFAULT_FRAME_SAMPLES, DEFAULT_HISTORY_FRAMES,
    DEFAULT_LISTENING_WINDOW_MS, DEFAULT_LOOKBACK_FRAMES, DEFAULT_MAX_CONSECUTIVE_TIMEOUTS,
    DEFAULT_SAMPLE_RATE, DEFAULT_SERVER_ADDR, DEFAULT_ZCR_THRESHOLD,
};

/// CLI options for the voxstream microphone streamer.
#[derive(Debug, Parser, Clone)]
#[command(about = "VoxStream microphone speech streamer", author, version)]
pub struct AppConfig {
    /// Remote endpoint that receives audio frames and sends commands (IP:port)
    #[arg(long, env = "VOXSTREAM_SERVER", default_value = DEFAULT_SERVER_ADDR)]
    pub server: SocketAddr,

    /// Local address for the UDP socket
    #[arg(long, default_value = DEFAULT_BIND_ADDR)]
    pub bind: SocketAddr,

    /// Preferred audio input device name
    #[arg(long, conflicts_with = "input_file")]
    pub input_device: Option<String>,

    /// Stream a raw s16le mono PCM file instead of the microphone
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Print detected audio input devices and exit
    #[arg(long = "list-input-devices", default_value_t = false)]
    pub list_input_devices: bool,

    /// Capture sample rate (Hz); the receiver must be configured to match
    #[arg(long = "sample-rate", default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Samples per frame; one frame is one datagram
    #[arg(long = "frame-samples", default_value_t = DEFAULT_FRAME_SAMPLES)]
    pub frame_samples: usize,

    /// Frames retained in the circular history
    #[arg(long = "history-frames", default_value_t = DEFAULT_HISTORY_FRAMES)]
    pub history_frames: usize,

    /// Frames flushed on speech onset, counting the onset frame itself
    #[arg(long = "lookback-frames", default_value_t = DEFAULT_LOOKBACK_FRAMES)]
    pub lookback_frames: usize,

    /// Keep streaming this long after the last speech frame (milliseconds)
    #[arg(long = "listening-window-ms", default_value_t = DEFAULT_LISTENING_WINDOW_MS)]
    pub listening_window_ms: u64,

    /// Frame energy (sum of squared samples) must exceed this to count as speech
    #[arg(
        long = "energy-threshold",
        default_value_t = DEFAULT_ENERGY_THRESHOLD,
        allow_negative_numbers = true
    )]
    pub energy_threshold: i64,

    /// Zero crossings per frame must stay below this to count as speech
    #[arg(
        long = "zcr-threshold",
        default_value_t = DEFAULT_ZCR_THRESHOLD,
        allow_negative_numbers = true
    )]
    pub zcr_threshold: i64,

    /// Give up waiting for a frame after this long (milliseconds)
    #[arg(long = "capture-timeout-ms", default_value_t = DEFAULT_CAPTURE_TIMEOUT_MS)]
    pub capture_timeout_ms: u64,

    /// Consecutive capture timeouts tolerated before exiting
    #[arg(
        long = "max-consecutive-timeouts",
        default_value_t = DEFAULT_MAX_CONSECUTIVE_TIMEOUTS
    )]
    pub max_consecutive_timeouts: u32,

    /// Frame channel capacity between the device callback and the stream loop
    #[arg(long = "channel-capacity", default_value_t = DEFAULT_CHANNEL_CAPACITY)]
    pub channel_capacity: usize,

    /// Ignore LED and threshold commands from the server
    #[arg(long = "no-commands", default_value_t = false)]
    pub no_commands: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "VOXSTREAM_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "VOXSTREAM_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Enable per-frame timing and classifier logs
    #[arg(long)]
    pub log_timings: bool,

    /// JSON-lines trace file (default: voxstream_trace.jsonl in the temp dir)
    #[arg(long = "trace-log", env = "VOXSTREAM_TRACE_LOG")]
    pub trace_log: Option<PathBuf>,
}

/// Tunable parameters for the capture + stream loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub sample_rate: u32,
    pub frame_samples: usize,
    pub history_frames: usize,
    pub lookback_frames: usize,
    pub listening_window_ms: u64,
    pub energy_threshold: i64,
    pub zcr_threshold: i64,
    pub capture_timeout_ms: u64,
    pub max_consecutive_timeouts: u32,
    pub channel_capacity: usize,
}

impl StreamConfig {
    pub fn listening_window(&self) -> Duration {
        Duration::from_millis(self.listening_window_ms)
    }

    /// Wall-clock span of one frame at the configured rate.
    pub fn frame_duration(&self) -> Duration {
        let nanos =
            (self.frame_samples as u64 * 1_000_000_000) / u64::from(self.sample_rate.max(1));
        Duration::from_nanos(nanos)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_samples: DEFAULT_FRAME_SAMPLES,
            history_frames: DEFAULT_HISTORY_FRAMES,
            lookback_frames: DEFAULT_LOOKBACK_FRAMES,
            listening_window_ms: DEFAULT_LISTENING_WINDOW_MS,
            energy_threshold: DEFAULT_ENERGY_THRESHOLD,
            zcr_threshold: DEFAULT_ZCR_THRESHOLD,
            capture_timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
            max_consecutive_timeouts: DEFAULT_MAX_CONSECUTIVE_TIMEOUTS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}
