//! Attack-pattern state machine.
//!
//! Cycles between `Idle` and `Attacking` phases, one transition per tick.
//! An attack starts from a cooled-down idle state with a fixed per-tick
//! probability, runs a sampled number of ticks with a typed waveform, and
//! is followed by a fixed cooldown during which no new attack may start.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum AttackConfigError {
    #[error("attack start probability must be within (0, 1], got {0}")]
    Probability(f64),
    #[error("attack duration range must satisfy 1 <= lo <= hi, got {lo}..={hi}")]
    DurationRange { lo: u32, hi: u32 },
}

/// The injected waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackType {
    /// Monotonic ramp from the baseline toward the attack maximum.
    Gradual,
    /// Sinusoid around the baseline spanning the attack bounds.
    Oscillating,
    /// Erratic jumps across the attack range.
    Sudden,
}

impl AttackType {
    pub const ALL: [AttackType; 3] = [
        AttackType::Gradual,
        AttackType::Oscillating,
        AttackType::Sudden,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AttackType::Gradual => "gradual",
            AttackType::Oscillating => "oscillating",
            AttackType::Sudden => "sudden",
        }
    }
}

/// Current phase of the attack cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackPhase {
    Idle {
        cooldown: u32,
    },
    Attacking {
        attack_type: AttackType,
        progress: u32,
        duration: u32,
    },
}

impl AttackPhase {
    pub fn is_attacking(&self) -> bool {
        matches!(self, AttackPhase::Attacking { .. })
    }

    pub fn attack_type(&self) -> Option<AttackType> {
        match self {
            AttackPhase::Attacking { attack_type, .. } => Some(*attack_type),
            AttackPhase::Idle { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackConfig {
    /// Bernoulli per-tick probability of starting an attack from a
    /// cooled-down idle state.
    pub start_probability: f64,
    /// Inclusive range the attack duration is sampled from, in ticks.
    pub duration_range: (u32, u32),
    /// Ticks to wait after an attack completes before another may start.
    pub cooldown_period: u32,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            start_probability: 0.02,
            duration_range: (10, 30),
            cooldown_period: 120,
        }
    }
}

impl AttackConfig {
    fn validate(&self) -> Result<(), AttackConfigError> {
        if !(self.start_probability > 0.0 && self.start_probability <= 1.0) {
            return Err(AttackConfigError::Probability(self.start_probability));
        }
        let (lo, hi) = self.duration_range;
        if lo < 1 || lo > hi {
            return Err(AttackConfigError::DurationRange { lo, hi });
        }
        Ok(())
    }
}

/// Single owner of the attack cycle; `tick` is the only writer.
#[derive(Debug, Clone)]
pub struct AttackStateMachine {
    phase: AttackPhase,
    config: AttackConfig,
}

impl AttackStateMachine {
    pub fn new(config: AttackConfig) -> Result<Self, AttackConfigError> {
        config.validate()?;
        Ok(Self {
            phase: AttackPhase::Idle { cooldown: 0 },
            config,
        })
    }

    pub fn phase(&self) -> AttackPhase {
        self.phase
    }

    /// Advance one tick and return the resulting phase.
    pub fn tick(&mut self, rng: &mut impl Rng) -> AttackPhase {
        self.phase = match self.phase {
            AttackPhase::Idle { cooldown } if cooldown > 0 => AttackPhase::Idle {
                cooldown: cooldown - 1,
            },
            AttackPhase::Idle { .. } => {
                if rng.random_bool(self.config.start_probability) {
                    let attack_type =
                        AttackType::ALL[rng.random_range(0..AttackType::ALL.len())];
                    let (lo, hi) = self.config.duration_range;
                    let duration = rng.random_range(lo..=hi);
                    info!(
                        attack = attack_type.name(),
                        duration, "starting attack"
                    );
                    AttackPhase::Attacking {
                        attack_type,
                        progress: 0,
                        duration,
                    }
                } else {
                    AttackPhase::Idle { cooldown: 0 }
                }
            }
            AttackPhase::Attacking {
                attack_type,
                progress,
                duration,
            } => {
                let progress = progress + 1;
                if progress >= duration {
                    info!(attack = attack_type.name(), "attack completed");
                    AttackPhase::Idle {
                        cooldown: self.config.cooldown_period,
                    }
                } else {
                    AttackPhase::Attacking {
                        attack_type,
                        progress,
                        duration,
                    }
                }
            }
        };
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn always_attack() -> AttackConfig {
        AttackConfig {
            start_probability: 1.0,
            duration_range: (5, 5),
            cooldown_period: 4,
        }
    }

    #[test]
    fn progress_increases_until_duration_then_cooldown() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut machine = AttackStateMachine::new(always_attack()).unwrap();

        let phase = machine.tick(&mut rng);
        assert_eq!(
            phase,
            AttackPhase::Attacking {
                attack_type: phase.attack_type().unwrap(),
                progress: 0,
                duration: 5
            }
        );

        let mut last_progress = 0;
        loop {
            match machine.tick(&mut rng) {
                AttackPhase::Attacking { progress, .. } => {
                    assert_eq!(progress, last_progress + 1);
                    last_progress = progress;
                }
                AttackPhase::Idle { cooldown } => {
                    assert_eq!(last_progress, 4);
                    assert_eq!(cooldown, 4);
                    break;
                }
            }
        }
    }

    #[test]
    fn no_attack_starts_during_cooldown() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut machine = AttackStateMachine::new(always_attack()).unwrap();

        // Run through one full attack.
        while !matches!(machine.tick(&mut rng), AttackPhase::Idle { .. }) {}

        // Cooldown counts down and blocks the (certain) restart.
        for expected in (0..4).rev() {
            match machine.tick(&mut rng) {
                AttackPhase::Idle { cooldown } => assert_eq!(cooldown, expected),
                other => panic!("attack started during cooldown: {other:?}"),
            }
        }

        // First cooled-down tick: probability 1.0 restarts immediately.
        assert!(machine.tick(&mut rng).is_attacking());
    }

    #[test]
    fn duration_is_sampled_from_configured_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let config = AttackConfig {
            start_probability: 1.0,
            duration_range: (10, 30),
            cooldown_period: 0,
        };
        let mut machine = AttackStateMachine::new(config).unwrap();

        for _ in 0..50 {
            match machine.tick(&mut rng) {
                AttackPhase::Attacking { duration, .. } => {
                    assert!((10..=30).contains(&duration))
                }
                AttackPhase::Idle { .. } => {}
            }
        }
    }

    #[test]
    fn rejects_malformed_config() {
        let bad_probability = AttackConfig {
            start_probability: 0.0,
            ..Default::default()
        };
        assert!(AttackStateMachine::new(bad_probability).is_err());

        let bad_range = AttackConfig {
            duration_range: (20, 10),
            ..Default::default()
        };
        assert!(AttackStateMachine::new(bad_range).is_err());
    }
}
