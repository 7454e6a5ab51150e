//! Redis connection and BullMQ queue handles for qboard.
//!
//! One [`BrokerConnection`] is opened per process and every [`QueueHandle`]
//! shares it. Nothing is cached locally: every read goes to Redis when the
//! dashboard asks for it.
//!
//! Mutations (retry, promote, remove, clean, pause) run as Lua scripts so a
//! job never sits in two states at once.

pub mod connection;
pub mod error;
pub mod job;
pub mod keys;
pub mod queue;
mod scripts;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use connection::{BrokerConfig, BrokerConnection, ServerInfo};
pub use error::{BrokerError, BrokerResult};
pub use job::{Job, JobCounts, JobState};
pub use keys::{QueueKeys, DEFAULT_PREFIX};
pub use queue::{open_queues, BrokerConn, QueueHandle};
pub use redis::aio::ConnectionManager;
