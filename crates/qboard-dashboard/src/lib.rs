//! qboard-dashboard - Web dashboard for inspecting BullMQ queues.
//!
//! Queues are registered as [`QueueAdapter`] trait objects, so the dashboard
//! does not care what backs them. [`BrokerQueueAdapter`] wraps a Redis
//! [`qboard_broker::QueueHandle`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        qboard process                         │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐        │
//! │  │ QueueHandle  │  │ QueueHandle  │  │ QueueHandle  │        │
//! │  │  "orders"    │  │ "shipments"  │  │     ...      │        │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘        │
//! │         └─────── one shared Redis connection ┘               │
//! │                           │                                  │
//! │  ┌────────────────────────▼─────────────────────────────┐    │
//! │  │  DashboardRegistry (Vec<Arc<dyn QueueAdapter>>)      │    │
//! │  └────────────────────────┬─────────────────────────────┘    │
//! │                           │ into_router()                    │
//! │  ┌────────────────────────▼─────────────────────────────┐    │
//! │  │       axum HTTP Server (port 3042)                    │    │
//! │  │  GET /                 → Static HTML/JS               │    │
//! │  │  GET /api/queues       → queues with job counts       │    │
//! │  │  GET /api/queues/{q}   → one page of jobs             │    │
//! │  │  PUT/DELETE ...        → retry, promote, remove, ...  │    │
//! │  └───────────────────────────────────────────────────────┘    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use qboard_dashboard::{BrokerQueueAdapter, DashboardConfig, DashboardRegistry, run_server};
//!
//! let adapters = queues
//!     .into_iter()
//!     .map(|q| Arc::new(BrokerQueueAdapter::new(q)) as Arc<dyn QueueAdapter>);
//! let config = DashboardConfig::default();
//! let router = DashboardRegistry::new(config.clone())
//!     .with_queues(adapters)
//!     .into_router();
//! run_server(router, &config).await?;
//! ```

mod adapter;
mod config;
mod error;
mod registry;
mod server;
mod types;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use adapter::{BrokerInfo, BrokerQueueAdapter, QueueAdapter};
pub use config::{DashboardConfig, DEFAULT_PORT};
pub use error::{DashboardError, DashboardResult};
pub use registry::DashboardRegistry;
pub use server::{run_server, serve};
pub use types::{
    ActionResult, JobDetail, JobLogs, JobsPage, JobsQuery, QueueSummary, QueuesResponse,
};
