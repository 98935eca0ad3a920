use super::pipeline::timing_line;
use super::{Clock, ExitReason, FrameClock, Regime, StreamPipeline, StreamingPolicy};
use crate::audio::{analyze, decode_frame, AudioSource, CaptureError, PcmSource, Thresholds};
use crate::config::StreamConfig;
use crate::indicator::ActivityIndicator;
use crate::transport::{TransportError, TransportSink};
use std::cell::Cell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

const FRAME: usize = 8;

#[derive(Default)]
struct RecordingSink {
    sent: Vec<Vec<u8>>,
    fail: bool,
}

impl TransportSink for RecordingSink {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.fail {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        self.sent.push(payload.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingIndicator {
    states: Vec<bool>,
}

impl ActivityIndicator for RecordingIndicator {
    fn set_active(&mut self, active: bool) {
        self.states.push(active);
    }
}

/// Clock the test moves by hand between cycles.
#[derive(Clone, Default)]
struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    fn set_ms(&self, ms: u64) {
        self.now.set(Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> Duration {
        self.now.get()
    }
}

/// Replays a fixed list of read outcomes, then reports end of stream.
struct ScriptedSource {
    script: VecDeque<Result<Vec<i16>, CaptureError>>,
}

impl AudioSource for ScriptedSource {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError> {
        match self.script.pop_front() {
            Some(Ok(frame)) => {
                buf.copy_from_slice(&frame);
                Ok(buf.len())
            }
            Some(Err(err)) => Err(err),
            None => Err(CaptureError::EndOfStream),
        }
    }
}

/// Wraps a source and reports a fixed drop count, like a device that fell behind.
struct LossySource<S> {
    inner: S,
    dropped: Rc<Cell<u64>>,
}

impl<S: AudioSource> AudioSource for LossySource<S> {
    fn read(&mut self, buf: &mut [i16]) -> Result<usize, CaptureError> {
        self.inner.read(buf)
    }

    fn frames_dropped(&self) -> u64 {
        self.dropped.get()
    }
}

// Silence markers must stay below 35 so FRAME * marker^2 < 10_000.
fn silence(marker: i16) -> Vec<i16> {
    vec![marker; FRAME]
}

fn speech(marker: i16) -> Vec<i16> {
    vec![1000 + marker; FRAME]
}

fn small_config(window_ms: u64) -> StreamConfig {
    StreamConfig {
        frame_samples: FRAME,
        history_frames: 10,
        lookback_frames: 5,
        listening_window_ms: window_ms,
        energy_threshold: 10_000,
        zcr_threshold: 100,
        ..StreamConfig::default()
    }
}

fn pcm(frames: &[Vec<i16>]) -> PcmSource {
    PcmSource::new(frames.concat())
}

fn pipeline_with<S: AudioSource, C: Clock>(
    cfg: &StreamConfig,
    source: S,
    clock: C,
) -> StreamPipeline<S, RecordingSink, RecordingIndicator, C> {
    StreamPipeline::from_config(
        cfg,
        source,
        Thresholds::from_config(cfg),
        RecordingSink::default(),
        RecordingIndicator::default(),
        clock,
    )
}

fn frame_clock(ms: u64) -> FrameClock {
    FrameClock::new(Duration::from_millis(ms))
}

/// First sample of every datagram sent so far.
fn sent_markers<S, I, C>(pipeline: &StreamPipeline<S, RecordingSink, I, C>) -> Vec<i16>
where
    S: AudioSource,
    I: ActivityIndicator,
    C: Clock,
{
    pipeline
        .transport()
        .sent
        .iter()
        .map(|payload| decode_frame(payload).expect("even payload")[0])
        .collect()
}

fn drain<S, C>(
    pipeline: &mut StreamPipeline<S, RecordingSink, RecordingIndicator, C>,
) -> Vec<Regime>
where
    S: AudioSource,
    C: Clock,
{
    let mut regimes = Vec::new();
    while let Ok(report) = pipeline.run_cycle() {
        regimes.push(report.decision.regime);
    }
    regimes
}

#[test]
fn policy_regimes_follow_window() {
    let mut policy = StreamingPolicy::new(Duration::from_millis(100), 5);
    let at = Duration::from_millis;

    let silent = policy.decide(false, at(0));
    assert_eq!(silent.regime, Regime::Silence);
    assert!(!silent.send_current());
    assert_eq!(policy.last_speech_at(), None);

    let onset = policy.decide(true, at(10));
    assert_eq!(onset.regime, Regime::Onset);
    assert_eq!(onset.flush_frames, 4);
    assert_eq!(onset.flush_offsets().collect::<Vec<_>>(), vec![4, 3, 2, 1]);

    let cont = policy.decide(false, at(110));
    assert_eq!(cont.regime, Regime::Continuation);
    assert_eq!(cont.flush_frames, 0);

    assert_eq!(policy.decide(false, at(111)).regime, Regime::Silence);
    assert_eq!(policy.last_speech_at(), Some(at(10)));
}

#[test]
fn policy_speech_inside_window_refreshes_without_flush() {
    let mut policy = StreamingPolicy::new(Duration::from_millis(100), 5);
    let at = Duration::from_millis;

    assert_eq!(policy.decide(true, at(0)).regime, Regime::Onset);
    let again = policy.decide(true, at(90));
    assert_eq!(again.regime, Regime::Continuation);
    assert_eq!(again.flush_frames, 0);
    assert_eq!(policy.last_speech_at(), Some(at(90)));

    // Still inside the window measured from the refreshed timestamp.
    assert_eq!(policy.decide(false, at(180)).regime, Regime::Continuation);
    assert_eq!(policy.decide(false, at(191)).regime, Regime::Silence);
}

#[test]
fn policy_lookback_of_one_flushes_nothing() {
    let mut policy = StreamingPolicy::new(Duration::from_millis(100), 1);
    let decision = policy.decide(true, Duration::ZERO);
    assert_eq!(decision.regime, Regime::Onset);
    assert_eq!(decision.flush_offsets().count(), 0);
}

#[test]
fn policy_reset_forgets_last_speech() {
    let mut policy = StreamingPolicy::new(Duration::from_millis(100), 5);
    policy.decide(true, Duration::from_millis(5));
    policy.reset();
    assert!(!policy.in_window(Duration::from_millis(6)));
    assert_eq!(policy.decide(true, Duration::from_millis(6)).regime, Regime::Onset);
}

#[test]
fn frame_clock_advances_one_frame_per_reading() {
    let mut clock = FrameClock::from_config(&StreamConfig::default());
    assert_eq!(clock.now(), Duration::from_millis(32));
    assert_eq!(clock.now(), Duration::from_millis(64));
}

#[test]
fn onset_flushes_lookback_oldest_first_then_current() {
    let cfg = small_config(750);
    let mut frames: Vec<Vec<i16>> = (1..=6).map(silence).collect();
    frames.push(speech(7));
    let mut pipeline = pipeline_with(&cfg, pcm(&frames), frame_clock(32));

    for _ in 0..6 {
        let report = pipeline.run_cycle().expect("silence cycle");
        assert_eq!(report.decision.regime, Regime::Silence);
        assert_eq!(report.frames_transmitted, 0);
    }
    let report = pipeline.run_cycle().expect("onset cycle");
    assert_eq!(report.decision.regime, Regime::Onset);
    assert_eq!(report.frames_transmitted, 5);

    assert_eq!(sent_markers(&pipeline), vec![3, 4, 5, 6, 1007]);
    assert_eq!(pipeline.metrics().onsets, 1);
    assert_eq!(pipeline.metrics().lookback_frames, 4);
    assert_eq!(pipeline.indicator().states, vec![false, true]);
    assert!(pipeline
        .transport()
        .sent
        .iter()
        .all(|payload| payload.len() == FRAME * 2));
}

#[test]
fn continuation_sends_current_frame_until_window_closes() {
    let cfg = small_config(100);
    let frames = vec![
        speech(1),
        silence(2),
        silence(3),
        silence(4),
        silence(5),
        silence(6),
    ];
    let mut pipeline = pipeline_with(&cfg, pcm(&frames), frame_clock(32));

    let regimes = drain(&mut pipeline);
    assert_eq!(
        regimes,
        vec![
            Regime::Onset,
            Regime::Continuation,
            Regime::Continuation,
            Regime::Continuation,
            Regime::Silence,
            Regime::Silence,
        ]
    );
    assert_eq!(sent_markers(&pipeline), vec![1001, 2, 3, 4]);
    assert_eq!(pipeline.indicator().states, vec![true, false]);
}

#[test]
fn speech_after_long_silence_flushes_once_then_continues() {
    let cfg = small_config(750);
    let clock = ManualClock::default();
    let frames = vec![
        silence(1),
        silence(2),
        silence(3),
        silence(4),
        silence(5),
        speech(6),
        speech(7),
    ];
    let mut pipeline = pipeline_with(&cfg, pcm(&frames), clock.clone());

    for ms in [0, 250, 500, 750, 1000] {
        clock.set_ms(ms);
        pipeline.run_cycle().expect("silence cycle");
    }
    assert!(pipeline.transport().sent.is_empty());

    clock.set_ms(1032);
    let onset = pipeline.run_cycle().expect("onset");
    assert_eq!(onset.decision.regime, Regime::Onset);
    assert_eq!(onset.frames_transmitted, 5);

    clock.set_ms(1132);
    let next = pipeline.run_cycle().expect("continuation");
    assert_eq!(next.decision.regime, Regime::Continuation);
    assert_eq!(next.frames_transmitted, 1);

    assert_eq!(sent_markers(&pipeline), vec![2, 3, 4, 5, 1006, 1007]);
    assert_eq!(pipeline.metrics().onsets, 1);
    assert_eq!(
        pipeline.policy().last_speech_at(),
        Some(Duration::from_millis(1132))
    );
}

#[test]
fn onset_right_after_window_skips_frames_already_sent() {
    let cfg = small_config(100);
    let frames = vec![
        speech(1),
        silence(2),
        silence(3),
        silence(4),
        silence(5),
        speech(6),
    ];
    let mut pipeline = pipeline_with(&cfg, pcm(&frames), frame_clock(32));

    let regimes = drain(&mut pipeline);
    assert_eq!(regimes.last(), Some(&Regime::Onset));
    assert_eq!(regimes[4], Regime::Silence);

    assert_eq!(sent_markers(&pipeline), vec![1001, 2, 3, 4, 5, 1006]);
    assert_eq!(pipeline.metrics().duplicates_skipped, 3);
    assert_eq!(pipeline.metrics().lookback_frames, 1);
    assert_eq!(pipeline.metrics().onsets, 2);
}

#[test]
fn onset_before_history_fills_flushes_what_is_held() {
    let cfg = small_config(750);
    let mut first = pipeline_with(&cfg, pcm(&[speech(1)]), frame_clock(32));
    let report = first.run_cycle().expect("first frame");
    assert_eq!(report.decision.regime, Regime::Onset);
    assert_eq!(sent_markers(&first), vec![1001]);
    assert_eq!(first.metrics().lookback_unavailable, 4);

    let frames = vec![silence(1), silence(2), speech(3)];
    let mut early = pipeline_with(&cfg, pcm(&frames), frame_clock(32));
    drain(&mut early);
    assert_eq!(sent_markers(&early), vec![1, 2, 1003]);
    assert_eq!(early.metrics().lookback_unavailable, 2);
}

#[test]
fn lookback_reads_across_ring_wrap() {
    let cfg = StreamConfig {
        history_frames: 3,
        lookback_frames: 3,
        ..small_config(750)
    };
    let mut frames: Vec<Vec<i16>> = (1..=8).map(silence).collect();
    frames.push(speech(9));
    let mut pipeline = pipeline_with(&cfg, pcm(&frames), frame_clock(32));

    drain(&mut pipeline);
    assert_eq!(sent_markers(&pipeline), vec![7, 8, 1009]);
}

#[test]
fn threshold_updates_apply_to_next_frame() {
    let cfg = small_config(750);
    let thresholds = Thresholds::new(i64::MAX, 100);
    let frames = vec![speech(1), speech(2)];
    let mut pipeline = StreamPipeline::from_config(
        &cfg,
        pcm(&frames),
        thresholds.clone(),
        RecordingSink::default(),
        RecordingIndicator::default(),
        frame_clock(32),
    );

    let muted = pipeline.run_cycle().expect("muted frame");
    assert_eq!(muted.decision.regime, Regime::Silence);

    thresholds.set_energy_threshold(10_000);
    let onset = pipeline.run_cycle().expect("onset");
    assert_eq!(onset.decision.regime, Regime::Onset);
    assert_eq!(sent_markers(&pipeline), vec![1001, 1002]);
}

#[test]
fn send_failures_do_not_stop_the_stream() {
    let cfg = small_config(750);
    let frames = vec![speech(1), speech(2), speech(3)];
    let mut pipeline = StreamPipeline::from_config(
        &cfg,
        pcm(&frames),
        Thresholds::from_config(&cfg),
        RecordingSink {
            sent: Vec::new(),
            fail: true,
        },
        RecordingIndicator::default(),
        frame_clock(32),
    );

    assert_eq!(pipeline.run(None, 20), ExitReason::EndOfStream);
    let metrics = pipeline.metrics();
    assert_eq!(metrics.cycles, 3);
    assert_eq!(metrics.frames_transmitted, 3);
    assert_eq!(metrics.send_failures, 3);
    assert_eq!(metrics.bytes_sent, 0);
}

#[test]
fn timeouts_are_retried_and_do_not_commit_frames() {
    let cfg = small_config(750);
    let source = ScriptedSource {
        script: VecDeque::from(vec![
            Err(CaptureError::Timeout { waited_ms: 5 }),
            Err(CaptureError::Timeout { waited_ms: 5 }),
            Ok(speech(1)),
            Err(CaptureError::Timeout { waited_ms: 5 }),
            Ok(speech(2)),
        ]),
    };
    let mut pipeline = pipeline_with(&cfg, source, frame_clock(32));

    assert_eq!(pipeline.run(None, 3), ExitReason::EndOfStream);
    assert_eq!(pipeline.metrics().capture_timeouts, 3);
    assert_eq!(pipeline.metrics().cycles, 2);
    assert_eq!(pipeline.capture().history().len(), 2);
    assert_eq!(sent_markers(&pipeline), vec![1001, 1002]);
}

#[test]
fn persistent_starvation_fails_after_limit() {
    let cfg = small_config(750);
    let source = ScriptedSource {
        script: (0..10)
            .map(|_| Err(CaptureError::Timeout { waited_ms: 5 }))
            .collect(),
    };
    let mut pipeline = pipeline_with(&cfg, source, frame_clock(32));

    let reason = pipeline.run(None, 3);
    assert_eq!(reason.label(), "failed");
    assert_eq!(pipeline.metrics().capture_timeouts, 3);
    assert!(pipeline.capture().history().is_empty());
}

#[test]
fn fatal_capture_error_ends_stream() {
    let cfg = small_config(750);
    let source = ScriptedSource {
        script: VecDeque::from(vec![Ok(speech(1)), Err(CaptureError::Disconnected)]),
    };
    let mut pipeline = pipeline_with(&cfg, source, frame_clock(32));

    match pipeline.run(None, 3) {
        ExitReason::Failed(message) => assert!(message.contains("disconnected")),
        other => panic!("unexpected exit: {other:?}"),
    }
    assert_eq!(pipeline.indicator().states, vec![true, false]);
}

#[test]
fn stop_flag_ends_run_before_capture() {
    let cfg = small_config(750);
    let stop = AtomicBool::new(true);
    let mut pipeline = pipeline_with(&cfg, pcm(&[speech(1)]), frame_clock(32));

    assert_eq!(pipeline.run(Some(&stop), 3), ExitReason::Stopped);
    assert_eq!(pipeline.metrics().cycles, 0);
    assert_eq!(pipeline.indicator().states, vec![false]);
}

#[test]
fn default_config_streams_utterance_with_lookback_and_tail() {
    let cfg = StreamConfig::default();
    let frame = cfg.frame_samples;
    let mut samples = vec![0i16; frame * 40];
    samples.extend(std::iter::repeat(2000i16).take(frame * 5));
    samples.extend(std::iter::repeat(0i16).take(frame * 40));
    let clock = FrameClock::from_config(&cfg);
    let mut pipeline = pipeline_with(&cfg, PcmSource::new(samples), clock);

    assert_eq!(
        pipeline.run(None, cfg.max_consecutive_timeouts),
        ExitReason::EndOfStream
    );

    // 4 lookback frames, 5 speech frames, then 23 frames inside 750 ms at 32 ms each.
    let metrics = pipeline.metrics();
    assert_eq!(metrics.cycles, 85);
    assert_eq!(metrics.onsets, 1);
    assert_eq!(metrics.speech_frames, 5);
    assert_eq!(metrics.frames_transmitted, 32);
    assert_eq!(metrics.bytes_sent, 32 * 1024);
    assert_eq!(pipeline.indicator().states, vec![false, true, false]);
}

#[test]
fn source_drops_are_copied_into_metrics() {
    let cfg = small_config(750);
    let dropped = Rc::new(Cell::new(0));
    let source = LossySource {
        inner: pcm(&[speech(1), speech(2), speech(3)]),
        dropped: dropped.clone(),
    };
    let mut pipeline = pipeline_with(&cfg, source, frame_clock(32));

    pipeline.run_cycle().expect("first frame");
    assert_eq!(pipeline.metrics().frames_dropped, 0);

    dropped.set(4);
    pipeline.run_cycle().expect("second frame");
    assert_eq!(pipeline.metrics().frames_dropped, 4);

    dropped.set(6);
    assert_eq!(pipeline.run(None, 3), ExitReason::EndOfStream);
    assert_eq!(pipeline.metrics().frames_dropped, 6);
}

#[test]
fn cycle_report_carries_classifier_stats() {
    let cfg = small_config(750);
    let mut pipeline = pipeline_with(&cfg, pcm(&[speech(1)]), frame_clock(32));

    let report = pipeline.run_cycle().expect("frame");
    assert_eq!(report.stats, Some(analyze(&speech(1))));

    let line = timing_line(&report, Some((10_000, 100)));
    let energy = analyze(&speech(1)).energy;
    assert!(line.starts_with("frame 0 at 32ms vad=Speech"));
    assert!(line.contains(&format!("energy={energy} zcr=0")));
    assert!(line.contains("energy_thr=10000 zcr_thr=100"));
    assert!(line.ends_with("regime=onset sent=1"));
}
