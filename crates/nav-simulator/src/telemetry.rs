//! Telemetry pings for the ingest service.

use crate::error::{Result, SimulatorError};
use chrono::Utc;
use nav_domain::SimulationState;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Real time between pings sent by the CLI host.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(2);

/// Position report accepted by the ingest endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPing {
    pub vehicle_id: String,
    pub lat: f64,
    pub lon: f64,
    /// km/h
    pub speed: f64,
    pub heading: f64,
    /// Unix seconds
    pub timestamp: i64,
}

impl TelemetryPing {
    /// Ping for the current snapshot, stamped now. `None` before the vehicle
    /// has a position.
    #[must_use]
    pub fn from_state(vehicle_id: Uuid, state: &SimulationState) -> Option<Self> {
        let position = state.current_position?;
        Some(Self {
            vehicle_id: vehicle_id.to_string(),
            lat: position.latitude,
            lon: position.longitude,
            speed: state.current_speed_kmh,
            heading: state.heading_deg,
            timestamp: Utc::now().timestamp(),
        })
    }
}

/// Posts pings as JSON. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct TelemetryReporter {
    client: Client,
    url: String,
}

impl TelemetryReporter {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one ping.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Telemetry`] on transport failure and
    /// [`SimulatorError::TelemetryRejected`] for a non-success status.
    pub async fn report(&self, ping: &TelemetryPing) -> Result<()> {
        let response = self.client.post(&self.url).json(ping).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SimulatorError::TelemetryRejected(status.as_u16()));
        }
        debug!(vehicle_id = %ping.vehicle_id, status = status.as_u16(), "Telemetry accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_domain::Coordinate;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one HTTP request, answer with `status_line`, return the body.
    async fn one_shot_server(status_line: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ingest", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0_u8; 1024];
            let body = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    let body = &text[split + 4..];
                    if body.len() >= length || n == 0 {
                        break body.to_string();
                    }
                }
                assert!(n > 0, "connection closed before headers");
            };
            let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            body
        });

        (url, handle)
    }

    fn reporter(url: String) -> TelemetryReporter {
        let client = Client::builder().no_proxy().build().unwrap();
        TelemetryReporter::with_client(client, url)
    }

    fn moving_state() -> SimulationState {
        SimulationState {
            is_running: true,
            current_position: Some(Coordinate::new(-112.074, 33.4484)),
            current_speed_kmh: 4750.0,
            heading_deg: 143.5,
            ..SimulationState::idle()
        }
    }

    #[test]
    fn test_ping_from_state() {
        let id = Uuid::new_v4();
        let ping = TelemetryPing::from_state(id, &moving_state()).unwrap();
        assert_eq!(ping.vehicle_id, id.to_string());
        assert!((ping.lat - 33.4484).abs() < f64::EPSILON);
        assert!((ping.lon + 112.074).abs() < f64::EPSILON);
        assert!((ping.heading - 143.5).abs() < f64::EPSILON);
        assert!(ping.timestamp > 1_600_000_000);

        assert!(TelemetryPing::from_state(id, &SimulationState::idle()).is_none());
    }

    #[tokio::test]
    async fn test_report_posts_json() {
        let (url, server) = one_shot_server("202 Accepted").await;
        let ping = TelemetryPing::from_state(Uuid::new_v4(), &moving_state()).unwrap();

        tokio_test::assert_ok!(reporter(url).report(&ping).await);

        let body: TelemetryPing = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body, ping);
    }

    #[tokio::test]
    async fn test_report_surfaces_rejection() {
        let (url, server) = one_shot_server("500 Internal Server Error").await;
        let ping = TelemetryPing::from_state(Uuid::new_v4(), &moving_state()).unwrap();

        let err = reporter(url).report(&ping).await.unwrap_err();
        assert!(matches!(err, SimulatorError::TelemetryRejected(500)));
        server.await.unwrap();
    }
}
