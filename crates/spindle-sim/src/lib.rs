//! # spindle-sim - Synthetic ICS Attack Simulation
//!
//! Drives the detection engine with labeled sensor telemetry: a state
//! machine cycles the plant between normal operation and typed attack
//! waveforms, and every tick's verdicts are scored against that ground
//! truth.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   SimulationEngine                       │
//! │                                                          │
//! │  AttackStateMachine ──▶ SensorGenerator ──▶ Snapshot     │
//! │   (Idle / Attacking)     (noise + waveforms)   │         │
//! │                                                ▼         │
//! │                              AnomalyDetector (core)      │
//! │                                                │         │
//! │                      TickReport { verdicts, ground truth }│
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Attack patterns:
//!
//! | pattern       | shape                                             |
//! |---------------|---------------------------------------------------|
//! | `gradual`     | quadratic ramp from the baseline to the attack max |
//! | `oscillating` | sinusoid spanning the attack bounds                |
//! | `sudden`      | erratic jumps across the attack range              |

pub mod attack;
pub mod engine;
pub mod generator;

pub use attack::{
    AttackConfig, AttackConfigError, AttackPhase, AttackStateMachine, AttackType,
};
pub use engine::{SimStats, SimulationEngine, TickReport};
pub use generator::{
    attack_value, idle_value, standard_metrics, GeneratorError, MetricSpec, SensorGenerator,
    TickSample,
};
