//! Streaming anomaly detector.
//!
//! Owns one bounded window per metric and turns each observation into an
//! [`AnomalyVerdict`] through the configured detection strategy, with
//! optional remote verification of flagged verdicts. Per-tick faults are
//! handled locally and logged; only configuration errors are fatal, and
//! only at construction time.

use crate::classifier::Classifier;
use crate::config::{ConfigError, DetectorConfig, StrategyKind};
use crate::strategy::{
    DetectionStrategy, ForecastStrategy, LocalVerdict, Snapshot, ThresholdStrategy,
};
use crate::verify::{RemoteVerifier, VerifierConfig, VerifyQuery};
use crate::window::MetricWindow;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Per-(metric, tick) detection outcome. A `deviation` of `None` means
/// "insufficient history", which callers must not conflate with a
/// confirmed-normal verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyVerdict {
    pub is_anomaly: bool,
    pub deviation: Option<f64>,
}

impl From<LocalVerdict> for AnomalyVerdict {
    fn from(local: LocalVerdict) -> Self {
        Self {
            is_anomaly: local.is_anomaly,
            deviation: local.deviation,
        }
    }
}

pub struct AnomalyDetector {
    windows: HashMap<String, MetricWindow>,
    window_size: usize,
    strategy: Box<dyn DetectionStrategy>,
    verifier: Option<RemoteVerifier>,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let strategy: Box<dyn DetectionStrategy> = match config.strategy {
            StrategyKind::Threshold => Box::new(ThresholdStrategy::default()),
            StrategyKind::Forecast => {
                let classifier = match &config.classifier_artifact {
                    Some(json) => Classifier::from_json(json)?,
                    None => Classifier::builtin(),
                };
                Box::new(ForecastStrategy::new(classifier))
            }
        };

        let verifier = config.verifier_url.as_ref().map(|url| {
            RemoteVerifier::new(
                VerifierConfig::new(url.clone()).with_timeout_ms(config.verify_timeout_ms),
            )
        });

        Ok(Self {
            windows: HashMap::new(),
            window_size: config.window_size,
            strategy,
            verifier,
        })
    }

    /// Build around an explicit strategy, mainly for tests and embedding.
    pub fn with_strategy(window_size: usize, strategy: Box<dyn DetectionStrategy>) -> Self {
        Self {
            windows: HashMap::new(),
            window_size: window_size.max(3),
            strategy,
            verifier: None,
        }
    }

    pub fn set_verifier(&mut self, verifier: Option<RemoteVerifier>) {
        self.verifier = verifier;
    }

    pub fn verifier(&self) -> Option<&RemoteVerifier> {
        self.verifier.as_ref()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Observe `value` and compute the local (pre-verification) verdict.
    ///
    /// Fewer than 3 accepted points for a metric yields the explicit
    /// unknown verdict. A rejected (non-finite) observation does the same
    /// without touching the window.
    pub fn get_status_local(
        &mut self,
        metric: &str,
        value: f64,
        snapshot: Option<&Snapshot>,
    ) -> LocalVerdict {
        let window_size = self.window_size;
        let accepted = self
            .windows
            .entry(metric.to_string())
            .or_insert_with(|| MetricWindow::new(window_size))
            .add_point(metric, value);
        if !accepted {
            return LocalVerdict::unknown();
        }

        let window = &self.windows[metric];
        if window.len() < 3 {
            debug!(metric, points = window.len(), "insufficient history");
            return LocalVerdict::unknown();
        }

        self.strategy.evaluate(metric, window, snapshot)
    }

    /// Full per-observation contract: local verdict plus, when flagged and
    /// a verifier is configured, bounded-timeout remote verification. The
    /// remote verdict replaces the local one; any transport fault leaves
    /// the local verdict standing.
    pub async fn get_status(
        &mut self,
        metric: &str,
        value: f64,
        snapshot: Option<&Snapshot>,
    ) -> AnomalyVerdict {
        let local = self.get_status_local(metric, value, snapshot);
        self.confirm(metric, value, local).await
    }

    /// Apply remote verification to an already-computed local verdict.
    pub async fn confirm(&self, metric: &str, value: f64, local: LocalVerdict) -> AnomalyVerdict {
        let verdict = AnomalyVerdict::from(local);
        if !local.is_anomaly {
            return verdict;
        }
        let Some(verifier) = &self.verifier else {
            return verdict;
        };

        let query = VerifyQuery {
            metric: metric.to_string(),
            value,
            deviation: local.deviation,
            signals: local.signals,
        };
        match verifier.verify(&query).await {
            Some(remote) => AnomalyVerdict {
                is_anomaly: remote,
                deviation: local.deviation,
            },
            None => verdict,
        }
    }

    /// Current window contents for a metric, oldest first. Inspection
    /// only; no side effects.
    pub fn get_points(&self, metric: &str) -> Vec<f64> {
        self.windows
            .get(metric)
            .map(|w| w.values())
            .unwrap_or_default()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}
