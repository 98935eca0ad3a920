//! The stream loop: one capture, one classification, one policy decision,
//! and the resulting sends, per cycle.
//!
//! Capture is the only blocking step. Everything after it is bounded: O(F)
//! for classification and O(lookback) sends.

use super::policy::{Decision, Regime, StreamingPolicy};
use crate::audio::{
    encode_frame_into, AudioSource, CaptureBuffer, CaptureError, EnergyZcrVad, FrameStats,
    HistoryError, Thresholds, VadDecision, VadEngine,
};
use crate::config::StreamConfig;
use crate::indicator::ActivityIndicator;
use crate::transport::TransportSink;
use crate::{log_debug, log_timing};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Source of stream time for the policy.
pub trait Clock {
    fn now(&mut self) -> Duration;
}

/// Wall-clock time since construction, for live capture.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&mut self) -> Duration {
        self.start.elapsed()
    }
}

/// Audio time: advances one frame span per reading. Replayed files run
/// faster than real time, so wall clock would distort the listening window.
#[derive(Debug, Clone)]
pub struct FrameClock {
    frame: Duration,
    elapsed: Duration,
}

impl FrameClock {
    pub fn new(frame: Duration) -> Self {
        Self {
            frame,
            elapsed: Duration::ZERO,
        }
    }

    pub fn from_config(cfg: &StreamConfig) -> Self {
        Self::new(cfg.frame_duration())
    }
}

impl Clock for FrameClock {
    fn now(&mut self) -> Duration {
        self.elapsed += self.frame;
        self.elapsed
    }
}

/// Counters for observability; printed when the stream ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamMetrics {
    pub cycles: u64,
    pub speech_frames: u64,
    pub onsets: u64,
    /// Frames handed to the transport, lookback included.
    pub frames_transmitted: u64,
    pub lookback_frames: u64,
    /// Lookback frames already sent as continuation frames.
    pub duplicates_skipped: u64,
    /// Lookback offsets requested on onset that the history did not hold yet.
    pub lookback_unavailable: u64,
    pub send_failures: u64,
    pub bytes_sent: u64,
    pub capture_timeouts: u64,
    /// Frames the source lost before they reached the capture loop.
    pub frames_dropped: u64,
}

/// Why `run` returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    EndOfStream,
    Stopped,
    Failed(String),
}

impl ExitReason {
    pub fn label(&self) -> &'static str {
        match self {
            ExitReason::EndOfStream => "end_of_stream",
            ExitReason::Stopped => "stopped",
            ExitReason::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub sequence: u64,
    pub at: Duration,
    pub vad: VadDecision,
    pub stats: Option<FrameStats>,
    pub decision: Decision,
    pub frames_transmitted: usize,
}

pub struct StreamPipeline<S, T, I, C> {
    capture: CaptureBuffer<S>,
    vad: Box<dyn VadEngine>,
    policy: StreamingPolicy,
    transport: T,
    indicator: I,
    clock: C,
    metrics: StreamMetrics,
    last_sent: Option<u64>,
    indicator_on: Option<bool>,
    encode_buf: Vec<u8>,
}

impl<S, T, I, C> StreamPipeline<S, T, I, C>
where
    S: AudioSource,
    T: TransportSink,
    I: ActivityIndicator,
    C: Clock,
{
    pub fn new(
        capture: CaptureBuffer<S>,
        vad: Box<dyn VadEngine>,
        policy: StreamingPolicy,
        transport: T,
        indicator: I,
        clock: C,
    ) -> Self {
        Self {
            capture,
            vad,
            policy,
            transport,
            indicator,
            clock,
            metrics: StreamMetrics::default(),
            last_sent: None,
            indicator_on: None,
            encode_buf: Vec::new(),
        }
    }

    /// Wire the standard energy/ZCR detector and policy from `cfg`.
    pub fn from_config(
        cfg: &StreamConfig,
        source: S,
        thresholds: Thresholds,
        transport: T,
        indicator: I,
        clock: C,
    ) -> Self {
        Self::new(
            CaptureBuffer::new(source, cfg.frame_samples, cfg.history_frames),
            Box::new(EnergyZcrVad::new(thresholds)),
            StreamingPolicy::from_config(cfg),
            transport,
            indicator,
            clock,
        )
    }

    /// Run one capture/classify/send cycle.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CaptureError> {
        let captured = self.capture.capture().map(|_| ());
        self.sync_dropped();
        if let Err(err) = captured {
            if err.is_retryable() {
                self.metrics.capture_timeouts += 1;
            }
            return Err(err);
        }

        let at = self.clock.now();
        let sequence = self.capture.sequence().unwrap_or_default();
        let vad = self.vad.process_frame(self.capture.current_frame());
        let stats = self.vad.last_stats();
        self.metrics.cycles += 1;
        if vad.is_speech() {
            self.metrics.speech_frames += 1;
        }

        let decision = self.policy.decide(vad.is_speech(), at);
        let mut frames_transmitted = 0;

        if decision.regime == Regime::Onset {
            self.metrics.onsets += 1;
            log_debug(&format!(
                "speech onset at {}ms (frame {sequence}); flushing up to {} lookback frames",
                at.as_millis(),
                decision.flush_frames
            ));
            tracing::info!(
                sequence,
                at_ms = at.as_millis() as u64,
                flush_frames = decision.flush_frames,
                "speech_onset"
            );
            frames_transmitted += self.flush_lookback(&decision);
        }

        if decision.send_current() && self.transmit(0).unwrap_or(false) {
            frames_transmitted += 1;
        }

        self.update_indicator(decision.indicator_on());

        let report = CycleReport {
            sequence,
            at,
            vad,
            stats,
            decision,
            frames_transmitted,
        };
        let thresholds = self.vad.thresholds().map(|t| (t.energy(), t.zcr()));
        if let Some(stats) = stats {
            tracing::debug!(
                sequence,
                energy = stats.energy,
                zcr = stats.zero_crossings,
                energy_threshold = thresholds.map(|(energy, _)| energy),
                zcr_threshold = thresholds.map(|(_, zcr)| zcr),
                regime = decision.regime.label(),
                "frame_classified"
            );
        }
        log_timing(&timing_line(&report, thresholds));
        Ok(report)
    }

    /// Loop until the source ends, `stop_flag` is set, or capture starvation
    /// exceeds `max_consecutive_timeouts`.
    pub fn run(
        &mut self,
        stop_flag: Option<&AtomicBool>,
        max_consecutive_timeouts: u32,
    ) -> ExitReason {
        let max_consecutive_timeouts = max_consecutive_timeouts.max(1);
        let mut consecutive_timeouts = 0u32;

        let reason = loop {
            if stop_flag.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                break ExitReason::Stopped;
            }
            match self.run_cycle() {
                Ok(_) => consecutive_timeouts = 0,
                Err(err) if err.is_retryable() => {
                    consecutive_timeouts += 1;
                    log_debug(&format!("capture retry {consecutive_timeouts}: {err}"));
                    tracing::warn!(error = %err, consecutive_timeouts, "capture_timeout");
                    if consecutive_timeouts >= max_consecutive_timeouts {
                        break ExitReason::Failed(format!(
                            "{err} ({consecutive_timeouts} consecutive timeouts)"
                        ));
                    }
                }
                Err(CaptureError::EndOfStream) => break ExitReason::EndOfStream,
                Err(err) => {
                    tracing::error!(error = %err, kind = err.label(), "capture_failed");
                    break ExitReason::Failed(err.to_string());
                }
            }
        };

        self.update_indicator(false);
        log_debug(&format!(
            "stream ended ({}): {:?}",
            reason.label(),
            self.metrics
        ));
        reason
    }

    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }

    pub fn policy(&self) -> &StreamingPolicy {
        &self.policy
    }

    pub fn capture(&self) -> &CaptureBuffer<S> {
        &self.capture
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    /// Send lookback frames oldest first, skipping offsets the history does
    /// not hold yet and frames that already went out.
    fn flush_lookback(&mut self, decision: &Decision) -> usize {
        let available = self.capture.history().lookback_available();
        if decision.flush_frames > available {
            let missing = decision.flush_frames - available;
            self.metrics.lookback_unavailable += missing as u64;
            log_debug(&format!(
                "lookback short by {missing} frames (history holds {available})"
            ));
        }

        let mut transmitted = 0;
        for offset in decision.flush_offsets().filter(|offset| *offset <= available) {
            match self.transmit(offset) {
                Ok(true) => {
                    transmitted += 1;
                    self.metrics.lookback_frames += 1;
                }
                Ok(false) => {}
                Err(err) => log_debug(&format!("lookback offset {offset} skipped: {err}")),
            }
        }
        transmitted
    }

    /// Encode and send the frame `offset` cycles back (0 = current frame).
    /// Returns `Ok(false)` when the frame was already transmitted.
    fn transmit(&mut self, offset: usize) -> Result<bool, HistoryError> {
        let (sequence, samples) = if offset == 0 {
            (
                self.capture.sequence().unwrap_or_default(),
                self.capture.current_frame(),
            )
        } else {
            (
                self.capture.sequence_at_offset(offset)?,
                self.capture.frame_at_offset(offset)?,
            )
        };

        if self.last_sent.is_some_and(|last| sequence <= last) {
            self.metrics.duplicates_skipped += 1;
            return Ok(false);
        }

        encode_frame_into(samples, &mut self.encode_buf);
        self.last_sent = Some(sequence);
        self.metrics.frames_transmitted += 1;

        match self.transport.send(&self.encode_buf) {
            Ok(()) => self.metrics.bytes_sent += self.encode_buf.len() as u64,
            Err(err) => {
                self.metrics.send_failures += 1;
                log_debug(&format!("frame {sequence} dropped: {err}"));
                tracing::warn!(sequence, error = %err, "send_failed");
            }
        }
        Ok(true)
    }

    fn sync_dropped(&mut self) {
        let dropped = self.capture.source().frames_dropped();
        if dropped > self.metrics.frames_dropped {
            log_debug(&format!(
                "source dropped {} frames ({dropped} total)",
                dropped - self.metrics.frames_dropped
            ));
            tracing::warn!(frames_dropped = dropped, "frames_dropped");
        }
        self.metrics.frames_dropped = dropped;
    }

    fn update_indicator(&mut self, on: bool) {
        if self.indicator_on == Some(on) {
            return;
        }
        if self.indicator_on == Some(true) && !on {
            tracing::info!(
                last_speech_ms = self.policy.last_speech_at().map(|at| at.as_millis() as u64),
                "stream_silent"
            );
        }
        self.indicator_on = Some(on);
        self.indicator.set_active(on);
    }
}

/// One `--log-timings` line per frame: classifier inputs, thresholds, outcome.
pub(super) fn timing_line(report: &CycleReport, thresholds: Option<(i64, i64)>) -> String {
    let mut line = format!(
        "frame {} at {}ms vad={:?}",
        report.sequence,
        report.at.as_millis(),
        report.vad
    );
    if let Some(stats) = report.stats {
        line.push_str(&format!(
            " energy={} zcr={}",
            stats.energy, stats.zero_crossings
        ));
    }
    if let Some((energy, zcr)) = thresholds {
        line.push_str(&format!(" energy_thr={energy} zcr_thr={zcr}"));
    }
    line.push_str(&format!(
        " regime={} sent={}",
        report.decision.regime.label(),
        report.frames_transmitted
    ));
    line
}
