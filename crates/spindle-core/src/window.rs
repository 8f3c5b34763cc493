//! Per-metric observation windows and rolling baselines.
//!
//! A `MetricWindow` is a bounded FIFO of the most recent readings for a
//! single metric. The baseline statistics exclude the newest point so a
//! reading never biases its own deviation score.

use std::collections::VecDeque;
use tracing::warn;

/// Rolling mean/std over a window, computed over all points except the
/// most recently inserted one. Undefined until the window holds at least
/// two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Baseline {
    pub mean: f64,
    pub std: f64,
}

/// Bounded FIFO of recent observations for one metric.
#[derive(Debug, Clone)]
pub struct MetricWindow {
    points: VecDeque<f64>,
    capacity: usize,
    baseline: Option<Baseline>,
}

impl MetricWindow {
    /// Create a window holding up to `capacity` observations.
    /// Capacities below 3 are clamped; a smaller window can never produce
    /// a verdict.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(3);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
            baseline: None,
        }
    }

    /// Append an observation, evicting the oldest point once full.
    ///
    /// Non-finite values (NaN, ±inf) are dropped with a warning and leave
    /// the window untouched. Returns whether the point was accepted.
    pub fn add_point(&mut self, metric: &str, value: f64) -> bool {
        if !value.is_finite() {
            warn!(metric, value, "dropping non-finite observation");
            return false;
        }

        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(value);
        self.baseline = self.compute_baseline();
        true
    }

    /// Mean/std over all points except the newest.
    fn compute_baseline(&self) -> Option<Baseline> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }

        let history = self.points.iter().take(n - 1);
        let count = (n - 1) as f64;
        let mean = history.clone().sum::<f64>() / count;
        let variance = history.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count;

        Some(Baseline {
            mean,
            std: variance.sqrt(),
        })
    }

    pub fn baseline(&self) -> Option<Baseline> {
        self.baseline
    }

    pub fn latest(&self) -> Option<f64> {
        self.points.back().copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the window has reached its capacity.
    pub fn is_full(&self) -> bool {
        self.points.len() == self.capacity
    }

    /// Window contents, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().copied().collect()
    }
}
