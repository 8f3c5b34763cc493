//! Detector configuration.

use crate::classifier::ClassifierError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("window size must be at least {min}, got {got}")]
    WindowTooSmall { min: usize, got: usize },
    #[error("verification timeout must be non-zero")]
    ZeroTimeout,
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Which detection heuristic the detector runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Fixed per-metric percentage-deviation thresholds.
    Threshold,
    /// Forecast-interval test fused with the pretrained classifier.
    Forecast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Observations retained per metric.
    pub window_size: usize,
    pub strategy: StrategyKind,
    /// Remote verification endpoint; `None` disables verification.
    pub verifier_url: Option<String>,
    pub verify_timeout_ms: u64,
    /// Classifier artifact as JSON; `None` selects the built-in boundary.
    pub classifier_artifact: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            strategy: StrategyKind::Forecast,
            verifier_url: None,
            verify_timeout_ms: crate::verify::DEFAULT_VERIFY_TIMEOUT_MS,
            classifier_artifact: None,
        }
    }
}

impl DetectorConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        const MIN_WINDOW: usize = 3;
        if self.window_size < MIN_WINDOW {
            return Err(ConfigError::WindowTooSmall {
                min: MIN_WINDOW,
                got: self.window_size,
            });
        }
        if self.verify_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DetectorConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_tiny_window() {
        let config = DetectorConfig {
            window_size: 2,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowTooSmall { .. })
        ));
    }

    #[test]
    fn strategy_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&StrategyKind::Forecast).unwrap(),
            "\"forecast\""
        );
    }
}
