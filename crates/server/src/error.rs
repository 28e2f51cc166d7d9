//! Errors returned to gateway clients.
//!
//! Every failure is one [`GatewayError`]: a status code, a message and zero
//! or more per-endpoint details.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ledgergate_broadcast::BroadcastError;
use ledgergate_commit::NotifierError;
use ledgergate_core::EndpointError;
use ledgergate_endorse::PlanError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status code of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    InvalidArgument,
    Unavailable,
    Aborted,
    Cancelled,
    DeadlineExceeded,
}

impl Code {
    pub fn name(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unavailable => "UNAVAILABLE",
            Self::Aborted => "ABORTED",
            Self::Cancelled => "CANCELLED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }

    /// HTTP status used by the JSON surface.
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Aborted => StatusCode::CONFLICT,
            Self::Cancelled => StatusCode::REQUEST_TIMEOUT,
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// A failed gateway call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The request was malformed; nothing was attempted.
    #[error("{0}")]
    InvalidArgument(String),

    /// A collaborator could not serve the call.
    #[error("{message}")]
    Unavailable {
        message: String,
        details: Vec<EndpointError>,
    },

    /// One or more endpoints rejected or failed the call.
    #[error("{message}")]
    Aborted {
        message: String,
        details: Vec<EndpointError>,
    },

    #[error("{0}")]
    Cancelled(String),

    #[error("{message}")]
    DeadlineExceeded {
        message: String,
        details: Vec<EndpointError>,
    },
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn aborted(message: impl Into<String>, details: Vec<EndpointError>) -> Self {
        Self::Aborted {
            message: message.into(),
            details,
        }
    }

    pub fn code(&self) -> Code {
        match self {
            Self::InvalidArgument(_) => Code::InvalidArgument,
            Self::Unavailable { .. } => Code::Unavailable,
            Self::Aborted { .. } => Code::Aborted,
            Self::Cancelled(_) => Code::Cancelled,
            Self::DeadlineExceeded { .. } => Code::DeadlineExceeded,
        }
    }

    /// Per-endpoint details, in endorsement plan order.
    pub fn details(&self) -> &[EndpointError] {
        match self {
            Self::Unavailable { details, .. }
            | Self::Aborted { details, .. }
            | Self::DeadlineExceeded { details, .. } => details,
            Self::InvalidArgument(_) | Self::Cancelled(_) => &[],
        }
    }
}

impl From<PlanError> for GatewayError {
    fn from(err: PlanError) -> Self {
        Self::unavailable(err.to_string())
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<NotifierError> for GatewayError {
    fn from(err: NotifierError) -> Self {
        Self::unavailable(err.to_string())
    }
}

impl From<BroadcastError> for GatewayError {
    fn from(err: BroadcastError) -> Self {
        let details = err.endpoint_detail().into_iter().collect();
        match err {
            BroadcastError::Discovery(_)
            | BroadcastError::NoOrderers
            | BroadcastError::Connection { .. } => Self::Unavailable {
                message: err.to_string(),
                details,
            },
            _ => Self::aborted(err.to_string(), details),
        }
    }
}

/// Error body of the JSON surface.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: Code,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<EndpointError>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let code = self.code();
        let body = ErrorResponse {
            error: self.to_string(),
            code,
            details: self.details().to_vec(),
        };

        (code.http_status(), Json(body)).into_response()
    }
}
