use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::gateway::GatewayError;

pub const UNAUTHORIZED_MESSAGE: &str = "Não autorizado";

pub enum AppError {
    Unauthorized,
    BadRequest(&'static str),
    /// The request body could not be read or decoded.
    Body { status: StatusCode, message: String },
    Gateway(GatewayError),
}

impl AppError {
    pub fn invalid_body(err: serde_json::Error) -> Self {
        Self::Body {
            status: StatusCode::BAD_REQUEST,
            message: err.to_string(),
        }
    }

    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Body { status, .. } => *status,
            Self::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Unauthorized => UNAUTHORIZED_MESSAGE.to_string(),
            Self::BadRequest(msg) => msg.to_string(),
            Self::Body { message, .. } => message.clone(),
            Self::Gateway(e) => e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err)
    }
}
