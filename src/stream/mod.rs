//! Speech-gated streaming: the hysteresis policy and the capture loop that
//! applies it.

mod pipeline;
mod policy;
#[cfg(test)]
mod tests;

pub use pipeline::{
    Clock, CycleReport, ExitReason, FrameClock, MonotonicClock, StreamMetrics, StreamPipeline,
};
pub use policy::{Decision, Regime, StreamingPolicy};
