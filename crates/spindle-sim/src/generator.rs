//! Sensor value generation.
//!
//! Produces one snapshot of every metric per tick: low-noise baseline
//! values while idle, attack-perturbed waveforms while the state machine
//! is attacking. Every value is labeled with the phase that produced it,
//! which is what makes detector verdicts measurable against ground truth.

use crate::attack::{AttackConfig, AttackConfigError, AttackPhase, AttackStateMachine, AttackType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use spindle_core::Snapshot;
use std::f64::consts::TAU;
use thiserror::Error;

/// Exponent of the gradual ramp.
const GRADUAL_EXPONENT: i32 = 2;

/// Cycles the oscillating waveform completes over one attack duration.
const OSCILLATION_FREQUENCY: f64 = 2.0;

/// Probability that a sudden-attack tick draws from the discrete set
/// {min, max, 1.5*base, 0.5*base} instead of the continuous band.
const SUDDEN_DISCRETE_PROBABILITY: f64 = 0.4;

/// Allowed idle-noise envelope, as a fraction of the baseline.
const NOISE_MIN: f64 = 0.001;
const NOISE_MAX: f64 = 0.01;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("at least one metric is required")]
    EmptyMetrics,
    #[error(
        "metric {metric}: attack bounds must straddle the baseline \
         (min {min} < base {base} < max {max})"
    )]
    Bounds {
        metric: String,
        base: f64,
        min: f64,
        max: f64,
    },
    #[error("metric {metric}: noise envelope must be within {NOISE_MIN}..={NOISE_MAX}, got {noise}")]
    Noise { metric: String, noise: f64 },
    #[error(transparent)]
    Attack(#[from] AttackConfigError),
}

/// Static per-metric parameters: baseline value, idle-noise envelope, and
/// the bounds attacks drive the value toward. Read-only after validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub base: f64,
    /// Symmetric idle-noise envelope as a fraction of `base`.
    pub noise: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricSpec {
    pub fn new(name: &str, base: f64, noise: f64, min: f64, max: f64) -> Self {
        Self {
            name: name.to_string(),
            base,
            noise,
            min,
            max,
        }
    }

    fn validate(&self) -> Result<(), GeneratorError> {
        let finite = self.base.is_finite()
            && self.min.is_finite()
            && self.max.is_finite()
            && self.noise.is_finite();
        if !finite || !(self.min < self.base && self.base < self.max) {
            return Err(GeneratorError::Bounds {
                metric: self.name.clone(),
                base: self.base,
                min: self.min,
                max: self.max,
            });
        }
        if !(NOISE_MIN..=NOISE_MAX).contains(&self.noise) {
            return Err(GeneratorError::Noise {
                metric: self.name.clone(),
                noise: self.noise,
            });
        }
        Ok(())
    }
}

/// The standard centrifuge metric set: baseline operating point and the
/// range each attack pattern drives the value across.
pub fn standard_metrics() -> Vec<MetricSpec> {
    vec![
        MetricSpec::new("rotation_speed", 50_000.0, 0.01, 40_000.0, 63_000.0),
        MetricSpec::new("vibration", 2.0, 0.01, 0.5, 6.0),
        MetricSpec::new("temperature", 75.0, 0.005, 60.0, 101.0),
        MetricSpec::new("pressure", 550.0, 0.005, 430.0, 660.0),
        MetricSpec::new("flow_rate", 70.0, 0.005, 50.0, 90.0),
        MetricSpec::new("voltage", 380.0, 0.002, 310.0, 580.0),
        MetricSpec::new("current", 10.0, 0.005, 6.0, 16.0),
    ]
}

/// One generated tick: the cross-metric snapshot plus the phase that
/// produced it.
#[derive(Debug, Clone)]
pub struct TickSample {
    pub values: Snapshot,
    pub phase: AttackPhase,
}

impl TickSample {
    pub fn is_attack(&self) -> bool {
        self.phase.is_attacking()
    }
}

/// Baseline value with the idle-noise envelope applied.
pub fn idle_value(spec: &MetricSpec, rng: &mut impl Rng) -> f64 {
    let noise = rng.random_range(-spec.noise..=spec.noise);
    spec.base * (1.0 + noise)
}

/// Attack-perturbed value for one metric at a given point in the attack.
pub fn attack_value(
    attack_type: AttackType,
    spec: &MetricSpec,
    progress: u32,
    duration: u32,
    rng: &mut impl Rng,
) -> f64 {
    let progress_factor = f64::from(progress) / f64::from(duration.max(1));

    match attack_type {
        AttackType::Gradual => {
            spec.base + (spec.max - spec.base) * progress_factor.powi(GRADUAL_EXPONENT)
        }
        AttackType::Oscillating => {
            let amplitude = (spec.max - spec.min) / 2.0;
            spec.base + amplitude * (TAU * OSCILLATION_FREQUENCY * progress_factor).sin()
        }
        AttackType::Sudden => {
            if rng.random_bool(SUDDEN_DISCRETE_PROBABILITY) {
                let choices = [spec.min, spec.max, 1.5 * spec.base, 0.5 * spec.base];
                choices[rng.random_range(0..choices.len())]
            } else {
                spec.base * rng.random_range(0.5..1.5)
            }
        }
    }
}

/// Drives the attack cycle and synthesizes every metric once per tick.
pub struct SensorGenerator {
    metrics: Vec<MetricSpec>,
    machine: AttackStateMachine,
    rng: StdRng,
}

impl SensorGenerator {
    pub fn new(
        metrics: Vec<MetricSpec>,
        attack: AttackConfig,
        seed: Option<u64>,
    ) -> Result<Self, GeneratorError> {
        if metrics.is_empty() {
            return Err(GeneratorError::EmptyMetrics);
        }
        for spec in &metrics {
            spec.validate()?;
        }

        let machine = AttackStateMachine::new(attack)?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            metrics,
            machine,
            rng,
        })
    }

    pub fn metrics(&self) -> &[MetricSpec] {
        &self.metrics
    }

    pub fn phase(&self) -> AttackPhase {
        self.machine.phase()
    }

    /// Advance one tick: step the attack cycle, then synthesize every
    /// metric from the resulting phase.
    pub fn next_sample(&mut self) -> TickSample {
        let phase = self.machine.tick(&mut self.rng);

        let mut values = Snapshot::with_capacity(self.metrics.len());
        for spec in &self.metrics {
            let value = match phase {
                AttackPhase::Idle { .. } => idle_value(spec, &mut self.rng),
                AttackPhase::Attacking {
                    attack_type,
                    progress,
                    duration,
                } => attack_value(attack_type, spec, progress, duration, &mut self.rng),
            };
            values.insert(spec.name.clone(), value);
        }

        TickSample { values, phase }
    }
}
