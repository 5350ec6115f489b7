//! Gateway error envelope.
//!
//! Every failure leaves the gateway as `{ "error": ..., "details": ... }`
//! with a status from the five categories the routes recognize: invalid
//! input (400), missing credentials (401), upstream non-2xx (status relayed
//! as-is), timeout/abort (504), anything else (500).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::providers::ProviderError;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug)]
pub enum GatewayError {
    BadRequest(String),
    MissingKey(String),
    Upstream { status: u16, message: String },
    Timeout,
    Internal(String),
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::MissingKey(provider) => GatewayError::MissingKey(provider),
            ProviderError::InvalidRequest(msg) => GatewayError::BadRequest(msg),
            ProviderError::Api { status, message } => GatewayError::Upstream { status, message },
            ProviderError::Timeout | ProviderError::Cancelled => GatewayError::Timeout,
            ProviderError::Network(msg) => GatewayError::Internal(msg),
            ProviderError::Parse(msg) => GatewayError::Internal(msg),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            GatewayError::BadRequest(details) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "invalid request".to_string(),
                    details: Some(details),
                },
            ),
            GatewayError::MissingKey(provider) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: format!("missing API key for {provider}"),
                    details: None,
                },
            ),
            GatewayError::Upstream { status, message } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                ErrorBody {
                    error: "upstream error".to_string(),
                    details: Some(message),
                },
            ),
            GatewayError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                ErrorBody {
                    error: "upstream request timed out".to_string(),
                    details: None,
                },
            ),
            GatewayError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "internal error".to_string(),
                    details: Some(details),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
