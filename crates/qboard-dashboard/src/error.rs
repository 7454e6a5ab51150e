//! Dashboard error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use qboard_broker::BrokerError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Queue {0} not found")]
    QueueNotFound(String),

    #[error("Queue {0} is read-only")]
    ReadOnly(String),

    #[error("Broker info is not available")]
    BrokerInfoUnavailable,

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DashboardResult<T> = Result<T, DashboardError>;

impl DashboardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::QueueNotFound(_) | DashboardError::BrokerInfoUnavailable => {
                StatusCode::NOT_FOUND
            }
            DashboardError::ReadOnly(_) => StatusCode::BAD_REQUEST,
            DashboardError::Broker(e) => match e {
                BrokerError::JobNotFound { .. } => StatusCode::NOT_FOUND,
                BrokerError::InvalidJobState { .. } | BrokerError::UnsupportedState(_) => {
                    StatusCode::BAD_REQUEST
                }
                BrokerError::JobLocked(_) => StatusCode::CONFLICT,
                BrokerError::Redis(_) | BrokerError::ConnectTimeout { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            DashboardError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Dashboard request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
