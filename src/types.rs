use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request fields stay loosely typed so a wrong type is reported as a
/// validation error rather than a decode failure.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest {
    #[serde(default)]
    pub instance_id: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<Value>,
}

/// Fields are forwarded untouched; the gateway does the validation.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub instance_id: Option<Value>,
    #[serde(default)]
    pub to: Option<Value>,
    #[serde(default)]
    pub text: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceControlRequest {
    #[serde(default)]
    pub action: Option<Value>,
    #[serde(default)]
    pub instance_id: Option<Value>,
}

#[derive(Serialize)]
pub struct InstanceControlResponse {
    pub success: bool,
    pub data: Value,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}
