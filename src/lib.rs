pub mod audio;
pub mod command;
pub mod config;
pub mod indicator;
pub mod stream;
pub mod telemetry;
pub mod transport;

mod app;
mod lock;

pub(crate) use lock::lock_or_recover;
pub use app::{crash_log_path, init_logging, log_debug, log_file_path, log_panic, log_timing};
