use std::str::FromStr;

use log::debug;
use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const CREATE_FALLBACK_MESSAGE: &str = "Erro ao criar instância";
const WEBHOOK_EVENTS: [&str; 2] = ["connection.update", "messages.upsert"];

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway answered but signalled failure.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    /// Network failure, or a body that was not JSON.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("gateway URL cannot take path segments: {0}")]
    InvalidUrl(String),
}

impl GatewayError {
    /// HTTP status of a rejection; `None` when the gateway never answered.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            Self::InvalidUrl(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceAction {
    Disconnect,
    Delete,
}

impl InstanceAction {
    fn segments(self) -> [&'static str; 2] {
        match self {
            Self::Disconnect => ["instance", "logout"],
            Self::Delete => ["instance", "delete"],
        }
    }
}

impl FromStr for InstanceAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disconnect" => Ok(Self::Disconnect),
            "delete" => Ok(Self::Delete),
            _ => Err(()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateInstanceBody<'a> {
    instance_name: &'a str,
    qrcode: bool,
    webhook: WebhookRegistration<'a>,
}

#[derive(Serialize)]
struct WebhookRegistration<'a> {
    url: &'a str,
    events: [&'static str; 2],
}

#[derive(Serialize)]
struct SendTextBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    number: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a Value>,
}

/// HTTP client for the Evolution gateway API.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl GatewayClient {
    pub fn new(http: reqwest::Client, base_url: Url, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url,
            api_key,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key),
            None => builder,
        }
    }

    /// Creates an instance with QR pairing and registers `webhook_url` for
    /// connection and message events. Returns the QR code, if the gateway sent one.
    pub async fn create_instance(
        &self,
        instance_id: &str,
        webhook_url: &str,
    ) -> Result<Option<Value>, GatewayError> {
        let url = self.endpoint(&["instance", "create"])?;
        let body = CreateInstanceBody {
            instance_name: instance_id,
            qrcode: true,
            webhook: WebhookRegistration {
                url: webhook_url,
                events: WEBHOOK_EVENTS,
            },
        };

        let resp = self.request(Method::POST, url).json(&body).send().await?;
        let status = resp.status();
        let data: Value = resp.json().await?;

        if !status.is_success() || is_truthy(data.get("error")) {
            return Err(GatewayError::Rejected {
                status,
                message: rejection_message(&data)
                    .unwrap_or_else(|| CREATE_FALLBACK_MESSAGE.to_string()),
            });
        }

        Ok(extract_qr_code(&data))
    }

    /// Sends a text message. The gateway body is returned as-is, whatever its status.
    pub async fn send_text(
        &self,
        instance_id: &str,
        to: Option<&Value>,
        text: Option<&Value>,
    ) -> Result<Value, GatewayError> {
        let url = self.endpoint(&["message", "sendText", instance_id])?;
        let body = SendTextBody { number: to, text };
        let resp = self.request(Method::POST, url).json(&body).send().await?;
        Ok(resp.json().await?)
    }

    /// Logs out or deletes an instance. The gateway body is returned as-is.
    pub async fn control_instance(
        &self,
        action: InstanceAction,
        instance_id: &str,
    ) -> Result<Value, GatewayError> {
        let [scope, verb] = action.segments();
        let url = self.endpoint(&[scope, verb, instance_id])?;
        let resp = self.request(Method::DELETE, url).send().await?;
        Ok(resp.json().await?)
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Evolution puts its message either at the top level or under `response`,
/// as a string or a list of strings.
fn rejection_message(data: &Value) -> Option<String> {
    let raw = data
        .get("message")
        .filter(|m| is_truthy(Some(*m)))
        .or_else(|| data.pointer("/response/message"))?;
    match raw {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) if !items.is_empty() => Some(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null | Value::String(_) | Value::Array(_) => None,
        other => Some(other.to_string()),
    }
}

/// `qrcode.base64` when present, otherwise whatever `qrcode` holds.
fn extract_qr_code(data: &Value) -> Option<Value> {
    let qrcode = data.get("qrcode")?;
    match qrcode.get("base64") {
        Some(b64) if is_truthy(Some(b64)) => Some(b64.clone()),
        _ => Some(qrcode.clone()),
    }
}
