//! Simulation engine.
//!
//! Wires the sensor generator to the anomaly detector on a fixed tick
//! cadence. Within one tick every metric is generated and observed before
//! any cross-metric decision, and remote verification of flagged metrics
//! runs concurrently under its own deadline so one slow call cannot stall
//! the rest of the tick.

use crate::attack::AttackType;
use crate::generator::SensorGenerator;
use chrono::{DateTime, Utc};
use serde::Serialize;
use spindle_core::{AnomalyDetector, AnomalyVerdict, LocalVerdict, VerifyQuery};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Outcome of one fully processed tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub wall_time: DateTime<Utc>,
    /// Ground truth: the attack waveform active while this tick was
    /// generated, if any.
    pub attack: Option<AttackType>,
    pub verdicts: HashMap<String, AnomalyVerdict>,
}

impl TickReport {
    pub fn flagged(&self) -> impl Iterator<Item = (&str, &AnomalyVerdict)> {
        self.verdicts
            .iter()
            .filter(|(_, v)| v.is_anomaly)
            .map(|(k, v)| (k.as_str(), v))
    }
}

/// Running totals over a simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SimStats {
    pub ticks: u64,
    pub attacks_started: u64,
    pub attacks_completed: u64,
    /// Individual (metric, tick) verdicts that flagged an anomaly.
    pub anomalies_flagged: u64,
    /// Flagged verdicts that coincided with an active attack.
    pub flagged_during_attack: u64,
}

pub struct SimulationEngine {
    generator: SensorGenerator,
    detector: AnomalyDetector,
    stats: SimStats,
    tick: u64,
    was_attacking: bool,
}

impl SimulationEngine {
    pub fn new(generator: SensorGenerator, detector: AnomalyDetector) -> Self {
        Self {
            generator,
            detector,
            stats: SimStats::default(),
            tick: 0,
            was_attacking: false,
        }
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    /// Process exactly one tick to completion: generate the snapshot,
    /// observe every metric, then verify flagged metrics concurrently.
    pub async fn process_tick(&mut self) -> TickReport {
        let sample = self.generator.next_sample();

        let attacking = sample.is_attack();
        if attacking && !self.was_attacking {
            self.stats.attacks_started += 1;
        }
        if !attacking && self.was_attacking {
            self.stats.attacks_completed += 1;
        }
        self.was_attacking = attacking;

        // Local pass first: every metric of this tick is observed before
        // verification I/O begins, and each strategy call sees the same
        // coherent snapshot.
        let metric_names: Vec<String> = self
            .generator
            .metrics()
            .iter()
            .map(|spec| spec.name.clone())
            .collect();
        let mut locals: Vec<(String, f64, LocalVerdict)> = Vec::with_capacity(metric_names.len());
        for name in &metric_names {
            let value = sample.values[name];
            let local = self
                .detector
                .get_status_local(name, value, Some(&sample.values));
            locals.push((name.clone(), value, local));
        }

        // Remote pass: one bounded-deadline request per flagged metric,
        // all in flight at once. Unflagged metrics skip verification.
        let mut remote: HashMap<String, bool> = HashMap::new();
        if let Some(verifier) = self.detector.verifier().cloned() {
            let mut inflight = JoinSet::new();
            for (name, value, local) in &locals {
                if !local.is_anomaly {
                    continue;
                }
                let verifier = verifier.clone();
                let query = VerifyQuery {
                    metric: name.clone(),
                    value: *value,
                    deviation: local.deviation,
                    signals: local.signals,
                };
                inflight.spawn(async move {
                    let opinion = verifier.verify(&query).await;
                    (query.metric, opinion)
                });
            }
            while let Some(joined) = inflight.join_next().await {
                match joined {
                    Ok((metric, Some(opinion))) => {
                        remote.insert(metric, opinion);
                    }
                    Ok((_, None)) => {}
                    Err(e) => warn!(error = %e, "verification task failed"),
                }
            }
        }

        let mut verdicts = HashMap::with_capacity(locals.len());
        for (name, _, local) in locals {
            let verdict = match remote.get(&name) {
                Some(&opinion) => AnomalyVerdict {
                    is_anomaly: opinion,
                    deviation: local.deviation,
                },
                None => AnomalyVerdict::from(local),
            };
            if verdict.is_anomaly {
                self.stats.anomalies_flagged += 1;
                if attacking {
                    self.stats.flagged_during_attack += 1;
                }
            }
            verdicts.insert(name, verdict);
        }

        self.tick += 1;
        self.stats.ticks += 1;

        TickReport {
            tick: self.tick,
            wall_time: Utc::now(),
            attack: sample.phase.attack_type(),
            verdicts,
        }
    }

    /// Drive the engine at a fixed cadence until `shutdown` fires or
    /// `max_ticks` is reached.
    ///
    /// Cancellation is cooperative: the in-flight tick (including its
    /// verification calls) always runs to completion, so no partial-tick
    /// verdicts are ever emitted.
    pub async fn run(
        &mut self,
        tick_interval: Duration,
        max_ticks: Option<u64>,
        shutdown: CancellationToken,
    ) -> SimStats {
        let mut interval = tokio::time::interval(tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            strategy = self.detector.strategy_name(),
            tick_ms = tick_interval.as_millis() as u64,
            "simulation started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping tick loop");
                    break;
                }
                _ = interval.tick() => {
                    let report = self.process_tick().await;
                    for (metric, verdict) in report.flagged() {
                        warn!(
                            tick = report.tick,
                            metric,
                            deviation = verdict.deviation,
                            under_attack = report.attack.is_some(),
                            "anomaly flagged"
                        );
                    }
                    if max_ticks.is_some_and(|max| report.tick >= max) {
                        break;
                    }
                }
            }
        }

        info!(
            ticks = self.stats.ticks,
            attacks_started = self.stats.attacks_started,
            anomalies_flagged = self.stats.anomalies_flagged,
            "simulation finished"
        );
        self.stats
    }
}
