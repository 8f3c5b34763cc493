//! spindle-sim - synthetic ICS testbed runner.
//!
//! Usage:
//!   spindle-sim run --ticks 600 --tick-ms 1000
//!   spindle-sim run --strategy threshold --verify-url http://localhost:9100/api/detect
//!   spindle-sim list

use clap::{Parser, Subcommand, ValueEnum};
use spindle_core::{AnomalyDetector, DetectorConfig, StrategyKind};
use spindle_sim::{standard_metrics, AttackConfig, SensorGenerator, SimulationEngine};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spindle-sim")]
#[command(about = "Synthetic ICS telemetry with injected attacks and streaming detection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the simulation loop
    Run {
        /// Number of ticks to run; omit to run until Ctrl-C
        #[arg(long)]
        ticks: Option<u64>,

        /// Tick interval in milliseconds
        #[arg(long, default_value = "1000")]
        tick_ms: u64,

        /// Detection strategy
        #[arg(long, value_enum, default_value = "forecast")]
        strategy: StrategyArg,

        /// Observations retained per metric
        #[arg(long, default_value = "10")]
        window: usize,

        /// Remote verification endpoint (disabled when omitted)
        #[arg(long)]
        verify_url: Option<String>,

        /// Per-tick probability of starting an attack
        #[arg(long, default_value = "0.02")]
        attack_probability: f64,

        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Print the run summary as JSON on stdout
        #[arg(long)]
        json: bool,
    },

    /// List the standard metric set
    List,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Threshold,
    Forecast,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Threshold => StrategyKind::Threshold,
            StrategyArg::Forecast => StrategyKind::Forecast,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            tick_ms,
            strategy,
            window,
            verify_url,
            attack_probability,
            seed,
            json,
        } => {
            if let Err(code) = run(
                ticks,
                tick_ms,
                strategy,
                window,
                verify_url,
                attack_probability,
                seed,
                json,
            )
            .await
            {
                std::process::exit(code);
            }
        }
        Commands::List => list(),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    ticks: Option<u64>,
    tick_ms: u64,
    strategy: StrategyArg,
    window: usize,
    verify_url: Option<String>,
    attack_probability: f64,
    seed: Option<u64>,
    json: bool,
) -> Result<(), i32> {
    let detector_config = DetectorConfig {
        window_size: window,
        strategy: strategy.into(),
        verifier_url: verify_url,
        ..Default::default()
    };
    let detector = AnomalyDetector::new(detector_config).map_err(|e| {
        error!(error = %e, "invalid detector configuration");
        2
    })?;

    let attack = AttackConfig {
        start_probability: attack_probability,
        ..Default::default()
    };
    let generator = SensorGenerator::new(standard_metrics(), attack, seed).map_err(|e| {
        error!(error = %e, "invalid generator configuration");
        2
    })?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let mut engine = SimulationEngine::new(generator, detector);
    let stats = engine
        .run(Duration::from_millis(tick_ms.max(1)), ticks, shutdown)
        .await;

    info!(
        ticks = stats.ticks,
        attacks_started = stats.attacks_started,
        attacks_completed = stats.attacks_completed,
        anomalies_flagged = stats.anomalies_flagged,
        flagged_during_attack = stats.flagged_during_attack,
        "run summary"
    );
    if json {
        println!(
            "{}",
            serde_json::to_string(&stats).unwrap_or_else(|_| "{}".to_string())
        );
    }
    Ok(())
}

fn list() {
    println!(
        "{:<16} {:>12} {:>8} {:>12} {:>12}",
        "metric", "base", "noise", "attack min", "attack max"
    );
    for spec in standard_metrics() {
        println!(
            "{:<16} {:>12.1} {:>8.3} {:>12.1} {:>12.1}",
            spec.name, spec.base, spec.noise, spec.min, spec.max
        );
    }
}
