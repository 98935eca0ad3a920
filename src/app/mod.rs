//! Process-level plumbing shared by the binary: debug and crash logs.

mod logging;

pub use logging::{crash_log_path, init_logging, log_debug, log_file_path, log_panic, log_timing};
