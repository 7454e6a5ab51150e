//! qboard - BullMQ queue inspector.
//!
//! Wires the pieces together in a fixed order:
//! - parse and validate the command line
//! - open one Redis connection
//! - bind a queue handle per configured name
//! - register them with the dashboard and serve HTTP

pub mod app;
pub mod cli;
pub mod config;
pub mod error;

pub use app::{run, Application, ConnectedApplication};
pub use cli::{Cli, Command, StartArgs};
pub use config::StartConfig;
pub use error::{AppError, AppResult, ConfigError};
