//! End-to-end flows: generator-shaped telemetry through the full
//! detection pipeline, including remote verification over real sockets.

use spindle_core::{
    AnomalyDetector, DetectorConfig, ForecastStrategy, RemoteVerifier, Snapshot, StrategyKind,
    ThresholdStrategy, VerifierConfig,
};
use spindle_sim::{standard_metrics, AttackConfig, SensorGenerator, SimulationEngine};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn baseline_snapshot() -> Snapshot {
    [
        ("rotation_speed", 50_000.0),
        ("vibration", 2.0),
        ("temperature", 75.0),
        ("pressure", 550.0),
        ("flow_rate", 70.0),
        ("voltage", 380.0),
        ("current", 10.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Serve one canned HTTP response on an ephemeral port.
async fn one_shot_server(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    format!("http://{addr}/api/detect")
}

#[tokio::test]
async fn constant_temperature_stream_never_flags() {
    // A zero-variance series: the forecast fit is degenerate once the
    // window fills, and the engine must fail open rather than flag.
    let mut detector = AnomalyDetector::with_strategy(30, Box::new(ForecastStrategy::default()));
    let snapshot = baseline_snapshot();

    for tick in 0..30 {
        let verdict = detector.get_status("temperature", 75.0, Some(&snapshot)).await;
        assert!(!verdict.is_anomaly, "flagged at tick {tick}");
        if tick < 2 {
            assert_eq!(verdict.deviation, None, "expected unknown at tick {tick}");
        } else {
            assert_eq!(verdict.deviation, Some(0.0));
        }
    }

    assert_eq!(detector.get_points("temperature").len(), 30);
}

#[tokio::test]
async fn sudden_voltage_attack_is_flagged_by_fusion() {
    // 570 V is 1.5x the 380 V baseline, inside the sudden-attack range;
    // the classifier separates it even though the degenerate forecast fit
    // has no opinion.
    let mut detector = AnomalyDetector::with_strategy(30, Box::new(ForecastStrategy::default()));
    let snapshot = baseline_snapshot();

    for _ in 0..30 {
        let verdict = detector.get_status("voltage", 380.0, Some(&snapshot)).await;
        assert!(!verdict.is_anomaly);
    }

    let mut attacked = baseline_snapshot();
    attacked.insert("voltage".to_string(), 570.0);

    let verdict = detector.get_status("voltage", 570.0, Some(&attacked)).await;
    assert!(verdict.is_anomaly);
    assert!(verdict.deviation.unwrap() > 0.0);
}

#[tokio::test]
async fn verification_timeout_keeps_local_verdict() {
    // Accept the connection but never answer: the deadline must lapse and
    // the local verdict must stand unchanged.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _held = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
    });

    let mut detector = AnomalyDetector::with_strategy(10, Box::new(ThresholdStrategy::default()));
    detector.set_verifier(Some(RemoteVerifier::new(
        VerifierConfig::new(format!("http://{addr}/api/detect")).with_timeout_ms(200),
    )));

    for _ in 0..5 {
        detector.get_status("voltage", 380.0, None).await;
    }
    let verdict = detector.get_status("voltage", 450.0, None).await;

    assert!(verdict.is_anomaly, "timeout must not suppress the local verdict");
}

#[tokio::test]
async fn well_formed_remote_verdict_replaces_local() {
    let url = one_shot_server("{\"is_anomaly\":false}").await;

    let mut detector = AnomalyDetector::with_strategy(10, Box::new(ThresholdStrategy::default()));
    detector.set_verifier(Some(RemoteVerifier::new(
        VerifierConfig::new(url).with_timeout_ms(2_000),
    )));

    for _ in 0..5 {
        detector.get_status("voltage", 380.0, None).await;
    }
    let verdict = detector.get_status("voltage", 450.0, None).await;

    assert!(
        !verdict.is_anomaly,
        "a well-formed remote verdict replaces the local one"
    );
    assert!(verdict.deviation.unwrap() > 0.02);
}

#[tokio::test]
async fn injected_attack_is_flagged_against_ground_truth() {
    // Force an attack from the first cooled-down tick and let it run its
    // full 20-tick course; the threshold detector must flag at least one
    // (metric, tick) while the attack is active, whatever waveform the
    // seed picks.
    let attack = AttackConfig {
        start_probability: 1.0,
        duration_range: (20, 20),
        cooldown_period: 120,
    };
    let generator = SensorGenerator::new(standard_metrics(), attack, Some(1234)).unwrap();
    let detector = AnomalyDetector::with_strategy(10, Box::new(ThresholdStrategy::default()));
    let mut engine = SimulationEngine::new(generator, detector);

    for _ in 0..40 {
        engine.process_tick().await;
    }

    let stats = engine.stats();
    assert_eq!(stats.ticks, 40);
    assert_eq!(stats.attacks_started, 1);
    assert_eq!(stats.attacks_completed, 1);
    assert!(stats.anomalies_flagged > 0);
    assert!(stats.flagged_during_attack > 0);
}

#[tokio::test]
async fn configured_detector_runs_both_strategies() {
    for strategy in [StrategyKind::Threshold, StrategyKind::Forecast] {
        let mut detector = AnomalyDetector::new(DetectorConfig {
            strategy,
            ..Default::default()
        })
        .unwrap();

        let snapshot = baseline_snapshot();
        for _ in 0..5 {
            let verdict = detector.get_status("pressure", 550.0, Some(&snapshot)).await;
            assert!(!verdict.is_anomaly);
        }
    }
}
