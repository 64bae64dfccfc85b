use std::sync::Arc;

use axum::extract::State;
use axum::http::header::HOST;
use axum::http::{HeaderMap, Uri};
use axum::response::IntoResponse;
use axum::Json;
use log::error;
use serde_json::Value;

use crate::config::Config;
use crate::error::AppError;
use crate::extract::JsonBody;
use crate::gateway::{GatewayClient, InstanceAction};
use crate::relay::Relay;
use crate::types::{
    CreateInstanceRequest, CreateInstanceResponse, HealthResponse, InstanceControlRequest,
    InstanceControlResponse, SendMessageRequest, WebhookAck,
};

pub const WEBHOOK_PATH: &str = "/evolution-webhook";

const MISSING_INSTANCE_ID: &str = "instanceId é obrigatório";
const INVALID_ACTION: &str = "Ação inválida";

pub struct AppState {
    pub config: Config,
    pub gateway: GatewayClient,
    pub relay: Relay,
}

impl AppState {
    pub fn new(config: Config, http: reqwest::Client) -> Self {
        let gateway = GatewayClient::new(
            http.clone(),
            config.gateway_url.clone(),
            config.gateway_api_key.clone(),
        );
        let relay = Relay::new(http, config.sink_url.clone(), config.self_api_key.clone());
        Self {
            config,
            gateway,
            relay,
        }
    }
}

/// Where the gateway should push events for instances created through this request.
fn webhook_url(config: &Config, uri: &Uri, headers: &HeaderMap) -> String {
    if let Some(base) = &config.public_base_url {
        return format!("{}{}", base, WEBHOOK_PATH);
    }

    let scheme = uri.scheme_str().unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| format!("localhost:{}", config.port));
    format!("{}://{}{}", scheme, host, WEBHOOK_PATH)
}

/// Renders an instance id for use as a gateway path segment. Strings are used
/// as-is, numbers and booleans in their JSON form; anything else, including an
/// absent id, becomes an empty segment.
fn instance_segment(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
        _ => String::new(),
    }
}

pub async fn create_instance(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    JsonBody(req): JsonBody<CreateInstanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let instance_id = match req.instance_id {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => return Err(AppError::BadRequest(MISSING_INSTANCE_ID)),
    };

    let callback = webhook_url(&state.config, &uri, &headers);
    let qr_code = state
        .gateway
        .create_instance(&instance_id, &callback)
        .await
        .inspect_err(|e| {
            error!(
                "Failed to create instance {} (gateway status {:?}): {}",
                instance_id,
                e.upstream_status(),
                e
            )
        })?;

    Ok(Json(CreateInstanceResponse { qr_code }))
}

/// Nothing is validated here. A missing `instanceId` is sent as an empty path
/// segment (`/message/sendText/`) and the gateway decides what that means.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    let instance_id = instance_segment(req.instance_id.as_ref());
    let data = state
        .gateway
        .send_text(&instance_id, req.to.as_ref(), req.text.as_ref())
        .await
        .inspect_err(|e| error!("Failed to send message via {}: {}", instance_id, e))?;

    Ok(Json(data))
}

pub async fn instance_control(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<InstanceControlRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action: InstanceAction = match &req.action {
        Some(Value::String(a)) => a.parse().ok(),
        _ => None,
    }
    .ok_or(AppError::BadRequest(INVALID_ACTION))?;

    let instance_id = instance_segment(req.instance_id.as_ref());
    let data = state
        .gateway
        .control_instance(action, &instance_id)
        .await
        .inspect_err(|e| error!("Failed to {:?} instance {}: {}", action, instance_id, e))?;

    Ok(Json(InstanceControlResponse {
        success: true,
        data,
    }))
}

/// Acknowledges right away; the forward to the sink runs detached.
pub async fn evolution_webhook(
    State(state): State<Arc<AppState>>,
    JsonBody(event): JsonBody<Value>,
) -> impl IntoResponse {
    state.relay.detach(event);
    Json(WebhookAck { received: true })
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(public_base_url: Option<&str>) -> Config {
        let public = public_base_url.map(str::to_string);
        Config::from_lookup(|key| match key {
            "PUBLIC_BASE_URL" => public.clone(),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn webhook_url_uses_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "bridge.local:3100".parse().unwrap());
        let uri: Uri = "/create-instance".parse().unwrap();
        assert_eq!(
            webhook_url(&config(None), &uri, &headers),
            "http://bridge.local:3100/evolution-webhook"
        );
    }

    #[test]
    fn webhook_url_uses_absolute_uri() {
        let uri: Uri = "https://edge.example.com/create-instance".parse().unwrap();
        assert_eq!(
            webhook_url(&config(None), &uri, &HeaderMap::new()),
            "https://edge.example.com/evolution-webhook"
        );
    }

    #[test]
    fn webhook_url_prefers_public_base() {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, "10.0.0.4:3100".parse().unwrap());
        let uri: Uri = "/create-instance".parse().unwrap();
        assert_eq!(
            webhook_url(&config(Some("https://bridge.example.com")), &uri, &headers),
            "https://bridge.example.com/evolution-webhook"
        );
    }

    #[test]
    fn instance_segment_renders_scalars() {
        assert_eq!(instance_segment(Some(&Value::from("abc"))), "abc");
        assert_eq!(instance_segment(Some(&Value::from(42))), "42");
        assert_eq!(instance_segment(Some(&Value::Null)), "");
        assert_eq!(instance_segment(None), "");
    }

    #[test]
    fn webhook_url_falls_back_to_local_port() {
        let uri: Uri = "/create-instance".parse().unwrap();
        assert_eq!(
            webhook_url(&config(None), &uri, &HeaderMap::new()),
            "http://localhost:3100/evolution-webhook"
        );
    }
}
