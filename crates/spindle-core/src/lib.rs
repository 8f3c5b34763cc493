//! # spindle-core - Streaming Sensor Anomaly Detection
//!
//! Detection engine for the synthetic industrial-control testbed: turns a
//! stream of per-metric sensor readings into per-tick anomaly verdicts.
//!
//! ```text
//! reading ──▶ MetricWindow ──▶ DetectionStrategy ──▶ RemoteVerifier ──▶ AnomalyVerdict
//!             (bounded FIFO,    threshold | forecast   (optional,
//!              rolling baseline) + classifier fusion    bounded timeout)
//! ```
//!
//! ## Key design principles
//!
//! 1. **Fail-open per tick** - a failed forecast fit, a missing classifier
//!    feature, or a dead verifier never raises and never escalates; the
//!    least disruptive verdict wins. Only configuration errors are fatal,
//!    and only at construction.
//!
//! 2. **Unknown is not normal** - until a metric has three accepted
//!    points, verdicts carry `deviation: None` so callers can tell
//!    "insufficient history" from "confirmed normal".
//!
//! 3. **Pluggable heuristics** - the fixed-threshold test and the
//!    forecast + classifier fusion are interchangeable strategies behind
//!    one contract, selected by configuration.

pub mod classifier;
pub mod config;
pub mod detector;
pub mod forecast;
pub mod strategy;
pub mod verify;
pub mod window;

pub use classifier::{BoundaryArtifact, Classifier, ClassifierError, TreeNode};
pub use config::{ConfigError, DetectorConfig, StrategyKind};
pub use detector::{AnomalyDetector, AnomalyVerdict};
pub use forecast::{forecast_band, forecast_outlier, is_stationary, ForecastBand};
pub use strategy::{
    DetectionStrategy, ForecastStrategy, LocalVerdict, Snapshot, ThresholdStrategy, VerifySignals,
};
pub use verify::{RemoteVerifier, VerifierConfig, VerifyQuery, DEFAULT_VERIFY_TIMEOUT_MS};
pub use window::{Baseline, MetricWindow};
