pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:5001";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:0";

pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_FRAME_SAMPLES: usize = 512;
pub const DEFAULT_HISTORY_FRAMES: usize = 10;
pub const DEFAULT_LOOKBACK_FRAMES: usize = 5;
pub const DEFAULT_LISTENING_WINDOW_MS: u64 = 750;
pub const DEFAULT_ENERGY_THRESHOLD: i64 = 1_000_000;
pub const DEFAULT_ZCR_THRESHOLD: i64 = 100;
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_MAX_CONSECUTIVE_TIMEOUTS: u32 = 20;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

pub(super) const MIN_SAMPLE_RATE: u32 = 8_000;
pub(super) const MAX_SAMPLE_RATE: u32 = 48_000;
pub(super) const MIN_FRAME_SAMPLES: usize = 64;
pub(super) const MAX_FRAME_SAMPLES: usize = 4_096;
pub(super) const MIN_HISTORY_FRAMES: usize = 2;
pub(super) const MAX_HISTORY_FRAMES: usize = 64;
pub(super) const MAX_LISTENING_WINDOW_MS: u64 = 60_000;
pub(super) const MIN_CAPTURE_TIMEOUT_MS: u64 = 10;
pub(super) const MAX_CAPTURE_TIMEOUT_MS: u64 = 60_000;
pub(super) const MAX_CONSECUTIVE_TIMEOUTS_LIMIT: u32 = 10_000;
pub(super) const MIN_CHANNEL_CAPACITY: usize = 2;
pub(super) const MAX_CHANNEL_CAPACITY: usize = 1_024;

/// Largest payload a single IPv4 UDP datagram can carry.
pub(super) const MAX_DATAGRAM_BYTES: usize = 65_507;
