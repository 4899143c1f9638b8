//! Error types for the proxy.

use crate::translate::types::ErrorResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Upstream error: {message}")]
    Upstream { status: Option<u16>, message: String },

    #[error("Unknown route: {method} {path}")]
    RouteNotFound { method: String, path: String },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ProxyError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn upstream(status: Option<u16>, msg: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: msg.into(),
        }
    }

    pub fn route_not_found(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self::RouteNotFound {
            method: method.into(),
            path: path.into(),
        }
    }

    /// HTTP status the error is reported with.
    ///
    /// Upstream failures keep the upstream's own status when it is an error
    /// status; transport failures (no status) map to 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream {
                status: Some(code), ..
            } if *code >= 400 => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Render as the OpenAI-style error envelope.
    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            Self::Config { message } => ErrorResponse::new("configuration_error", message),
            Self::Toml(_) => ErrorResponse::new("configuration_error", self.to_string()),
            Self::InvalidRequest { message } => ErrorResponse::invalid_request(message),
            Self::Upstream { message, .. } => ErrorResponse::new("upstream_error", message),
            Self::RouteNotFound { .. } => {
                ErrorResponse::new("not_found_error", self.to_string()).with_code("route_not_found")
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.to_error_response())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
