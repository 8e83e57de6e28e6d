//! Per-track adaptive acceptance threshold.

use log::trace;

use crate::tracker::history::BoundedHistory;
use crate::tracker::instrument_tracker::TrackerConfig;

/// Which rule produced a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdRegime {
    /// Too few samples; the fixed base threshold applies
    Warmup,
    /// Low coefficient of variation; near-historical confidence is required
    Stable,
    /// Noisy history; acceptance is relaxed
    Unstable,
}

/// Outcome of evaluating one candidate confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceDecision {
    /// The confidence that was recorded, sanitized into `[0, 1]`.
    pub confidence: f32,
    pub threshold: f32,
    pub regime: ThresholdRegime,
}

impl ConfidenceDecision {
    #[inline]
    pub fn passes(&self) -> bool {
        self.confidence >= self.threshold
    }
}

/// Mean and coefficient of variation (population stdev / mean).
fn mean_and_cv(history: &BoundedHistory<f32>) -> (f32, Option<f32>) {
    let n = history.len() as f32;
    let mean = history.iter().sum::<f32>() / n;
    let var = history.iter().map(|c| (c - mean).powi(2)).sum::<f32>() / n;
    let cv = (mean > f32::EPSILON).then(|| var.sqrt() / mean);
    (mean, cv)
}

/// Threshold implied by the history alone, without recording anything.
pub fn adaptive_threshold(
    history: &BoundedHistory<f32>,
    config: &TrackerConfig,
) -> (f32, ThresholdRegime) {
    if history.len() < config.min_history_for_adaptive.max(1) {
        return (
            config.base_threshold.clamp(config.threshold_floor, config.threshold_ceiling),
            ThresholdRegime::Warmup,
        );
    }

    let (mean, cv) = mean_and_cv(history);
    let (raw, regime) = match cv {
        Some(cv) if cv < config.stable_cv_limit => {
            (mean * config.stable_factor, ThresholdRegime::Stable)
        }
        _ => (mean * config.unstable_factor, ThresholdRegime::Unstable),
    };
    (raw.clamp(config.threshold_floor, config.threshold_ceiling), regime)
}

/// Derive this frame's threshold from prior history, then record `confidence`.
///
/// The confidence is recorded whether or not the candidate is eventually
/// accepted, so the history tracks detection quality rather than only
/// successes.
pub fn evaluate(
    history: &mut BoundedHistory<f32>,
    confidence: f32,
    config: &TrackerConfig,
) -> ConfidenceDecision {
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (threshold, regime) = adaptive_threshold(history, config);
    history.push(confidence);
    trace!("confidence {confidence:.3} vs threshold {threshold:.3} ({regime:?})");

    ConfidenceDecision {
        confidence,
        threshold,
        regime,
    }
}
