//! Voice Activity Detection (VAD) for speech/silence classification.
//!
//! A frame counts as speech when it is loud (sum of squared samples above the
//! energy threshold) and not noisy (fewer sign changes than the zero-crossing
//! threshold). Voiced speech carries most of its energy at low frequencies,
//! while hiss and broadband noise cross zero far more often.

use crate::config::StreamConfig;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Per-frame measurements the classifier decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Sum of squared samples.
    pub energy: i64,
    /// Sign changes between consecutive samples; zero counts as non-negative.
    pub zero_crossings: usize,
}

impl FrameStats {
    pub fn is_speech(&self, energy_threshold: i64, zcr_threshold: i64) -> bool {
        let zero_crossings = i64::try_from(self.zero_crossings).unwrap_or(i64::MAX);
        self.energy > energy_threshold && zero_crossings < zcr_threshold
    }
}

/// Measure energy and zero crossings in a single pass.
pub fn analyze(frame: &[i16]) -> FrameStats {
    let mut energy = 0i64;
    let mut zero_crossings = 0usize;
    let mut previous_non_negative: Option<bool> = None;

    for &sample in frame {
        let wide = i64::from(sample);
        energy = energy.saturating_add(wide * wide);

        let non_negative = sample >= 0;
        if previous_non_negative.is_some_and(|prev| prev != non_negative) {
            zero_crossings += 1;
        }
        previous_non_negative = Some(non_negative);
    }

    FrameStats {
        energy,
        zero_crossings,
    }
}

/// Pure speech test: `energy > energy_threshold && zcr < zcr_threshold`.
pub fn classify(frame: &[i16], energy_threshold: i64, zcr_threshold: i64) -> bool {
    analyze(frame).is_speech(energy_threshold, zcr_threshold)
}

/// Classifier thresholds shared between the capture loop and the command
/// listener thread. Clones observe each other's updates.
///
/// The two thresholds are independent scalars, so relaxed atomics are enough:
/// a frame may be classified with one old and one new value during an update,
/// which is indistinguishable from the update landing a frame later.
#[derive(Clone, Debug)]
pub struct Thresholds {
    energy: Arc<AtomicI64>,
    zcr: Arc<AtomicI64>,
}

impl Thresholds {
    pub fn new(energy_threshold: i64, zcr_threshold: i64) -> Self {
        Self {
            energy: Arc::new(AtomicI64::new(energy_threshold)),
            zcr: Arc::new(AtomicI64::new(zcr_threshold)),
        }
    }

    pub fn from_config(cfg: &StreamConfig) -> Self {
        Self::new(cfg.energy_threshold, cfg.zcr_threshold)
    }

    pub fn energy(&self) -> i64 {
        self.energy.load(Ordering::Relaxed)
    }

    pub fn zcr(&self) -> i64 {
        self.zcr.load(Ordering::Relaxed)
    }

    /// No validation: zero or negative values are legal and widen detection.
    pub fn set_energy_threshold(&self, energy_threshold: i64) {
        self.energy.store(energy_threshold, Ordering::Relaxed);
    }

    pub fn set_zcr_threshold(&self, zcr_threshold: i64) {
        self.zcr.store(zcr_threshold, Ordering::Relaxed);
    }
}

/// Frame classifier used by the stream pipeline.
///
/// # Frame Size Contract
/// Engines receive whole frames of the configured length. Thresholds are
/// absolute (not normalised per sample), so they must be tuned for that length.
pub trait VadEngine {
    fn process_frame(&mut self, samples: &[i16]) -> VadDecision;
    fn reset(&mut self);
    fn name(&self) -> &'static str {
        "unknown_vad"
    }

    /// Measurements behind the most recent decision, for timing logs.
    fn last_stats(&self) -> Option<FrameStats> {
        None
    }

    /// Live thresholds, when the engine is threshold based.
    fn thresholds(&self) -> Option<&Thresholds> {
        None
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        matches!(self, VadDecision::Speech)
    }
}

/// Energy + zero-crossing detector reading live thresholds on every frame.
#[derive(Debug, Clone)]
pub struct EnergyZcrVad {
    thresholds: Thresholds,
    last_stats: Option<FrameStats>,
}

impl EnergyZcrVad {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            last_stats: None,
        }
    }
}

impl VadEngine for EnergyZcrVad {
    fn process_frame(&mut self, samples: &[i16]) -> VadDecision {
        let stats = analyze(samples);
        self.last_stats = Some(stats);
        if stats.is_speech(self.thresholds.energy(), self.thresholds.zcr()) {
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }

    fn reset(&mut self) {
        self.last_stats = None;
    }

    fn name(&self) -> &'static str {
        "energy_zcr_vad"
    }

    fn last_stats(&self) -> Option<FrameStats> {
        self.last_stats
    }

    fn thresholds(&self) -> Option<&Thresholds> {
        Some(&self.thresholds)
    }
}
