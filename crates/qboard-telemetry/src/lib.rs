//! Structured logging for qboard.
//!
//! Pretty output while developing, JSON lines when `RUST_ENV=production`.

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogFormat};
