//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
///
/// `tower_http` carries the per-request log lines of the dashboard server.
const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, multi-line.
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Pick the format from the value of `RUST_ENV`.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some("production") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Initialize structured logging.
///
/// Configures tracing with JSON output for production and
/// pretty output for development.
pub fn init_logging() -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let format = LogFormat::from_env_value(std::env::var("RUST_ENV").ok().as_deref());

    let result = match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_env_value() {
        assert_eq!(LogFormat::from_env_value(Some("production")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some("development")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Pretty);
    }

    #[test]
    fn test_second_init_reports_error() {
        // The global subscriber can only be installed once per process.
        let _ = init_logging();
        assert!(matches!(init_logging(), Err(TelemetryError::LoggingInit(_))));
    }
}
