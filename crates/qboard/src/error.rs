//! Application error types.

use thiserror::Error;

/// Invalid command-line configuration. Detected before any connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing Redis URL. You can set it with the --redis-url flag or the REDIS_URL environment variable")]
    MissingRedisUrl,

    #[error("The queue name must not be empty")]
    EmptyQueueName,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Broker error: {0}")]
    Broker(#[from] qboard_broker::BrokerError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] qboard_dashboard::DashboardError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] qboard_telemetry::TelemetryError),
}

pub type AppResult<T> = Result<T, AppError>;
