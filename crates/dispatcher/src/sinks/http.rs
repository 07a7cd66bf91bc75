//! HttpSink - one PUT per notification

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use contracts::{ContractError, Notification, NotificationSink};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::error::DispatcherError;

/// Freshness marker sent with every entry
pub const MAX_AGE: u32 = 0;

/// Request body: a batch that always carries exactly one entry
#[derive(Debug, Serialize)]
pub struct NotificationBatch<'a> {
    pub notifications: [NotificationEntry<'a>; 1],
}

/// One outbound notification
#[derive(Debug, Serialize)]
pub struct NotificationEntry<'a> {
    /// Content type of the decoded payload
    pub ct: &'static str,

    #[serde(rename = "max-age")]
    pub max_age: u32,

    /// Device id
    pub ep: &'a str,

    pub path: &'a str,

    /// Base64 of the payload bytes
    pub payload: String,
}

impl<'a> NotificationBatch<'a> {
    pub fn single(notification: &'a Notification) -> Self {
        Self {
            notifications: [NotificationEntry {
                ct: notification.content_type.as_str(),
                max_age: MAX_AGE,
                ep: notification.device_id.as_str(),
                path: notification.path.as_str(),
                payload: B64.encode(&notification.payload),
            }],
        }
    }
}

/// Sink that PUTs each notification to a fixed URL
pub struct HttpSink {
    name: String,
    url: Url,
    client: Client,
}

impl HttpSink {
    /// Create a new HttpSink
    ///
    /// # Errors
    /// - `InvalidUrl` if `url` does not parse or is not http(s)
    /// - `SinkCreation` if the HTTP client cannot be built
    pub fn new(name: impl Into<String>, url: &str, timeout: Duration) -> Result<Self, DispatcherError> {
        let name = name.into();
        let url = Url::parse(url).map_err(|e| DispatcherError::invalid_url(url, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DispatcherError::invalid_url(
                url.as_str(),
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatcherError::sink_creation(&name, e.to_string()))?;

        Ok(Self { name, url, client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl NotificationSink for HttpSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "http_sink_write",
        skip(self, notification),
        fields(sink = %self.name, device_id = %notification.device_id, path = %notification.path)
    )]
    async fn write(&self, notification: &Notification) -> Result<(), ContractError> {
        let response = self
            .client
            .put(self.url.clone())
            .json(&NotificationBatch::single(notification))
            .send()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ContractError::SinkStatus {
                sink_name: self.name.clone(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "PUT accepted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::put;
    use axum::{Json, Router};
    use contracts::{ContentType, DeviceId, MetricPath};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<Value>>>;

    async fn capture(
        State((captured, status)): State<(Captured, AxumStatus)>,
        Json(body): Json<Value>,
    ) -> (AxumStatus, &'static str) {
        captured.lock().unwrap().push(body);
        (status, "store says no")
    }

    async fn spawn_store(status: AxumStatus) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/notifications", put(capture))
            .with_state((captured.clone(), status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/notifications"), captured)
    }

    fn temperature() -> Notification {
        Notification::new(
            DeviceId::from_address("AA:BB:CC:DD:EE:FF"),
            MetricPath::from_segments(["temperature"]),
            ContentType::TextPlain,
            &b"21.5"[..],
        )
    }

    #[test]
    fn test_batch_shape() {
        let n = temperature();
        let json = serde_json::to_value(NotificationBatch::single(&n)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "notifications": [{
                    "ct": "text/plain",
                    "max-age": 0,
                    "ep": "AABBCCDDEEFF",
                    "path": "/temperature",
                    "payload": "MjEuNQ=="
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_put_success() {
        let (url, captured) = spawn_store(AxumStatus::OK).await;
        let sink = HttpSink::new("store", &url, Duration::from_secs(5)).unwrap();

        sink.write(&temperature()).await.unwrap();

        let bodies = captured.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["notifications"][0]["ep"], "AABBCCDDEEFF");
        assert_eq!(bodies[0]["notifications"][0]["payload"], "MjEuNQ==");
    }

    #[tokio::test]
    async fn test_non_200_is_error_with_body() {
        let (url, _captured) = spawn_store(AxumStatus::ACCEPTED).await;
        let sink = HttpSink::new("store", &url, Duration::from_secs(5)).unwrap();

        match sink.write(&temperature()).await {
            Err(ContractError::SinkStatus { status, body, .. }) => {
                assert_eq!(status, 202);
                assert_eq!(body, "store says no");
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_write_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = HttpSink::new("store", &format!("http://{addr}/"), Duration::from_secs(2)).unwrap();
        let err = sink.write(&temperature()).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkWrite { .. }));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = HttpSink::new("store", "ftp://store/upload", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, DispatcherError::InvalidUrl { .. }));

        let err = HttpSink::new("store", "not a url", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, DispatcherError::InvalidUrl { .. }));
    }
}
