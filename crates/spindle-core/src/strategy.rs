//! Pluggable detection strategies.
//!
//! Two strategies share the same verdict contract: a fixed per-metric
//! percentage-deviation threshold test, and the forecast + classifier
//! fusion. Which one runs is a configuration choice, not a code path
//! scattered through the detector.

use crate::classifier::Classifier;
use crate::forecast;
use crate::window::MetricWindow;
use std::collections::HashMap;
use tracing::debug;

/// One coherent per-tick snapshot of every metric.
pub type Snapshot = HashMap<String, f64>;

/// Intermediate signals attached to a flagged verdict, forwarded to the
/// remote verifier. The variant mirrors the strategy that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerifySignals {
    Baseline { mean: f64, std: f64 },
    Fused { forecast_anomaly: bool, classifier_normal: bool },
}

/// Local (pre-verification) outcome for one metric observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalVerdict {
    pub is_anomaly: bool,
    pub deviation: Option<f64>,
    pub signals: Option<VerifySignals>,
}

impl LocalVerdict {
    /// The explicit insufficient-history outcome. Distinct from a
    /// confirmed-normal verdict: `deviation` is absent.
    pub fn unknown() -> Self {
        Self {
            is_anomaly: false,
            deviation: None,
            signals: None,
        }
    }
}

/// A detection heuristic evaluated once per (metric, tick) against the
/// metric's window and the tick's cross-metric snapshot.
///
/// The window already contains the observation under test as its newest
/// point; implementations must only be called with at least 3 points.
pub trait DetectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(
        &self,
        metric: &str,
        window: &MetricWindow,
        snapshot: Option<&Snapshot>,
    ) -> LocalVerdict;
}

/// Relative deviation of the newest point from the rolling mean. Zero when
/// the mean is zero rather than a division fault.
fn relative_deviation(window: &MetricWindow) -> Option<f64> {
    let baseline = window.baseline()?;
    let latest = window.latest()?;
    if baseline.mean == 0.0 {
        return Some(0.0);
    }
    Some((latest - baseline.mean).abs() / baseline.mean)
}

/// Fixed per-metric percentage-deviation thresholds (the earlier, simpler
/// detection configuration).
#[derive(Debug, Clone)]
pub struct ThresholdStrategy {
    thresholds: HashMap<String, f64>,
    default_threshold: f64,
}

impl ThresholdStrategy {
    pub fn new(thresholds: HashMap<String, f64>, default_threshold: f64) -> Self {
        Self {
            thresholds,
            default_threshold,
        }
    }

    fn threshold_for(&self, metric: &str) -> f64 {
        self.thresholds
            .get(metric)
            .copied()
            .unwrap_or(self.default_threshold)
    }
}

impl Default for ThresholdStrategy {
    /// The standard sensor thresholds: how far a reading may drift from
    /// its rolling mean, as a fraction, before it is flagged.
    fn default() -> Self {
        let thresholds = [
            ("rotation_speed", 0.05),
            ("vibration", 0.10),
            ("temperature", 0.03),
            ("pressure", 0.05),
            ("flow_rate", 0.05),
            ("voltage", 0.02),
            ("current", 0.05),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        Self::new(thresholds, 0.05)
    }
}

impl DetectionStrategy for ThresholdStrategy {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn evaluate(
        &self,
        metric: &str,
        window: &MetricWindow,
        _snapshot: Option<&Snapshot>,
    ) -> LocalVerdict {
        let (Some(baseline), Some(deviation)) = (window.baseline(), relative_deviation(window))
        else {
            return LocalVerdict::unknown();
        };

        LocalVerdict {
            is_anomaly: deviation > self.threshold_for(metric),
            deviation: Some(deviation),
            signals: Some(VerifySignals::Baseline {
                mean: baseline.mean,
                std: baseline.std,
            }),
        }
    }
}

/// Forecast-interval test fused with the pretrained classifier: either
/// signal alone is enough to flag an anomaly.
pub struct ForecastStrategy {
    classifier: Classifier,
}

impl ForecastStrategy {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }
}

impl Default for ForecastStrategy {
    fn default() -> Self {
        Self::new(Classifier::builtin())
    }
}

impl DetectionStrategy for ForecastStrategy {
    fn name(&self) -> &'static str {
        "forecast"
    }

    fn evaluate(
        &self,
        metric: &str,
        window: &MetricWindow,
        snapshot: Option<&Snapshot>,
    ) -> LocalVerdict {
        let Some(deviation) = relative_deviation(window) else {
            return LocalVerdict::unknown();
        };

        // The forecast test needs a full window; a failed fit is simply no
        // opinion.
        let forecast_anomaly = if window.is_full() {
            forecast::forecast_outlier(&window.values()).unwrap_or(false)
        } else {
            false
        };

        let classifier_normal = match snapshot {
            Some(snap) => self.classifier.classify_snapshot(snap).unwrap_or(true),
            None => {
                debug!(metric, "no snapshot supplied, skipping classifier test");
                true
            }
        };

        LocalVerdict {
            is_anomaly: forecast_anomaly || !classifier_normal,
            deviation: Some(deviation),
            signals: Some(VerifySignals::Fused {
                forecast_anomaly,
                classifier_normal,
            }),
        }
    }
}
