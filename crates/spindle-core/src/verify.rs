//! Remote verification client.
//!
//! When a local verdict flags an anomaly, the detector can ask an external
//! verifier for a second opinion: a GET carrying the metric, value,
//! deviation, and whichever intermediate signals the strategy produced.
//! A well-formed response replaces the local verdict; any transport fault,
//! timeout, or malformed body leaves it standing.

use crate::strategy::VerifySignals;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_VERIFY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub url: String,
    pub timeout_ms: u64,
}

impl VerifierConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: DEFAULT_VERIFY_TIMEOUT_MS,
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// Everything the verifier is told about a flagged observation.
#[derive(Debug, Clone)]
pub struct VerifyQuery {
    pub metric: String,
    pub value: f64,
    pub deviation: Option<f64>,
    pub signals: Option<VerifySignals>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    is_anomaly: bool,
}

/// Bounded-timeout HTTP client for the external verification collaborator.
#[derive(Debug, Clone)]
pub struct RemoteVerifier {
    client: reqwest::Client,
    url: String,
}

impl RemoteVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .build()
            .unwrap_or_default();

        Self {
            client,
            url: config.url,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ask for a second opinion. `None` means "no remote opinion": the
    /// caller keeps its local verdict.
    pub async fn verify(&self, query: &VerifyQuery) -> Option<bool> {
        let mut params: Vec<(&str, String)> = vec![
            ("metric", query.metric.clone()),
            ("value", query.value.to_string()),
        ];
        if let Some(deviation) = query.deviation {
            params.push(("deviation", deviation.to_string()));
        }
        match query.signals {
            Some(VerifySignals::Baseline { mean, std }) => {
                params.push(("mean", mean.to_string()));
                params.push(("std", std.to_string()));
            }
            Some(VerifySignals::Fused {
                forecast_anomaly,
                classifier_normal,
            }) => {
                params.push(("arima_anomaly", forecast_anomaly.to_string()));
                params.push(("classifier_normal", classifier_normal.to_string()));
            }
            None => {}
        }

        let response = match self.client.get(&self.url).query(&params).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(metric = %query.metric, error = %e, "verification request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(
                metric = %query.metric,
                status = %response.status(),
                "verifier returned a non-success status"
            );
            return None;
        }

        match response.json::<VerifyResponse>().await {
            Ok(body) => {
                debug!(
                    metric = %query.metric,
                    is_anomaly = body.is_anomaly,
                    "remote verdict received"
                );
                Some(body.is_anomaly)
            }
            Err(e) => {
                warn!(metric = %query.metric, error = %e, "malformed verifier response");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn flagged_query() -> VerifyQuery {
        VerifyQuery {
            metric: "temperature".to_string(),
            value: 92.0,
            deviation: Some(0.22),
            signals: Some(VerifySignals::Baseline {
                mean: 75.0,
                std: 0.4,
            }),
        }
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
    async fn well_formed_response_is_returned() {
        let url = one_shot_server("{\"is_anomaly\":false}").await;
        let verifier = RemoteVerifier::new(VerifierConfig::new(url).with_timeout_ms(2_000));

        assert_eq!(verifier.verify(&flagged_query()).await, Some(false));
    }

    #[tokio::test]
    async fn timeout_yields_no_opinion() {
        // Accept the connection but never answer.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _held = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let config = VerifierConfig::new(format!("http://{addr}/api/detect")).with_timeout_ms(200);
        let verifier = RemoteVerifier::new(config);

        assert_eq!(verifier.verify(&flagged_query()).await, None);
    }

    #[tokio::test]
    async fn non_success_status_yields_no_opinion() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
            }
        });

        let config = VerifierConfig::new(format!("http://{addr}/api/detect")).with_timeout_ms(2_000);
        let verifier = RemoteVerifier::new(config);

        assert_eq!(verifier.verify(&flagged_query()).await, None);
    }

    #[tokio::test]
    async fn malformed_body_yields_no_opinion() {
        let url = one_shot_server("not json").await;
        let verifier = RemoteVerifier::new(VerifierConfig::new(url).with_timeout_ms(2_000));

        assert_eq!(verifier.verify(&flagged_query()).await, None);
    }
}
