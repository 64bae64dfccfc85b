use log::{error, info, warn};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no webhook sink configured")]
    NotConfigured,
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("sink answered {0}")]
    Status(StatusCode),
}

/// Forwards gateway events to the backend sink.
#[derive(Clone)]
pub struct Relay {
    http: reqwest::Client,
    sink_url: Option<String>,
    token: Option<String>,
}

impl Relay {
    pub fn new(http: reqwest::Client, sink_url: Option<String>, token: Option<String>) -> Self {
        Self {
            http,
            sink_url,
            token,
        }
    }

    pub async fn forward(&self, event: &Value) -> Result<(), RelayError> {
        let url = self.sink_url.as_deref().ok_or(RelayError::NotConfigured)?;
        let mut req = self.http.post(url).json(event);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(RelayError::Status(resp.status()));
        }
        Ok(())
    }

    /// Spawns the forward as its own task. The outcome only reaches the log;
    /// callers are not expected to join the handle.
    pub fn detach(&self, event: Value) -> JoinHandle<()> {
        let relay = self.clone();
        let id = Uuid::new_v4();
        tokio::spawn(async move {
            match relay.forward(&event).await {
                Ok(()) => info!("Webhook {} relayed to sink", id),
                Err(RelayError::NotConfigured) => {
                    warn!("Webhook {} dropped: no sink configured", id)
                }
                Err(e) => error!("Webhook {} relay failed: {}", id, e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn relay_to(url: Option<String>) -> Relay {
        Relay::new(reqwest::Client::new(), url, Some("self-key".into()))
    }

    #[tokio::test]
    async fn forwards_event_with_bearer() {
        let server = MockServer::start().await;
        let event = json!({"event": "messages.upsert", "data": {"key": {"id": "1"}}});
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("authorization", "Bearer self-key"))
            .and(header("content-type", "application/json"))
            .and(body_json(&event))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        relay_to(Some(format!("{}/hook", server.uri())))
            .forward(&event)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = relay_to(Some(server.uri()))
            .forward(&json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Status(s) if s == StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn missing_sink_is_error() {
        let err = relay_to(None).forward(&json!({})).await.unwrap_err();
        assert!(matches!(err, RelayError::NotConfigured));
    }

    #[tokio::test]
    async fn detached_failure_does_not_panic() {
        // Nothing listens on port 9 locally.
        let relay = relay_to(Some("http://127.0.0.1:9/hook".into()));
        let handle = relay.detach(json!({"event": "connection.update"}));
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("forward should settle")
            .expect("forward task must not panic");
    }

    #[tokio::test]
    async fn detached_failure_is_logged() {
        crate::testing::capture_logs();
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(451))
            .expect(1)
            .mount(&server)
            .await;

        relay_to(Some(server.uri()))
            .detach(json!({"event": "messages.upsert"}))
            .await
            .unwrap();
        let line = crate::testing::wait_for_log(&["relay failed", "sink answered 451"])
            .await
            .expect("relay failure should be logged");
        assert!(line.starts_with("[ERROR]"));
    }

    #[tokio::test]
    async fn detach_returns_before_sink_answers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;

        let handle = relay_to(Some(server.uri())).detach(json!({"n": 1}));
        assert!(!handle.is_finished());
        handle.await.unwrap();
    }
}
