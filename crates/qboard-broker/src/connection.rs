//! Broker connection provider.
//!
//! Opens the single Redis connection the whole process shares. The first
//! connection attempt is bounded by a timeout and fails startup. Once
//! connected, reconnects are retried without limit so a dashboard request
//! never fails just because the client gave up; it waits for Redis instead.

use std::collections::HashMap;
use std::time::Duration;

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{BrokerError, BrokerResult};
use crate::queue::{open_queues, QueueHandle};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Redis URL, e.g. `redis://localhost:6379`.
    pub url: String,
    /// Upper bound of the reconnect backoff.
    pub max_reconnect_delay_ms: u64,
    /// How long the initial connection may take.
    pub connect_timeout_ms: u64,
}

impl BrokerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_reconnect_delay_ms: 2000,
            connect_timeout_ms: 5000,
        }
    }
}

/// The process-wide Redis connection.
///
/// Cloning is cheap; clones multiplex over the same socket.
#[derive(Clone)]
pub struct BrokerConnection {
    manager: ConnectionManager,
}

impl BrokerConnection {
    /// Open the connection. A malformed URL, a refused connection or a
    /// server that does not answer within `connect_timeout_ms` is returned
    /// as an error, not retried.
    pub async fn connect(config: &BrokerConfig) -> BrokerResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let url = redact_url(&config.url);
        let timeout = Duration::from_millis(config.connect_timeout_ms);
        let timed_out = || BrokerError::ConnectTimeout {
            url: url.clone(),
            timeout_ms: config.connect_timeout_ms,
        };

        // The manager retries its first connect with the reconnect policy,
        // which never gives up. Check reachability with a single attempt.
        let mut probe = tokio::time::timeout(timeout, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| timed_out())??;
        let _: String = tokio::time::timeout(timeout, redis::cmd("PING").query_async(&mut probe))
            .await
            .map_err(|_| timed_out())??;
        debug!(%url, "Redis answered PING");

        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(usize::MAX)
            .set_max_delay(config.max_reconnect_delay_ms);
        let manager = tokio::time::timeout(
            timeout,
            ConnectionManager::new_with_config(client, manager_config),
        )
        .await
        .map_err(|_| timed_out())??;
        info!(%url, "Connected to Redis");

        Ok(Self { manager })
    }

    /// Handles for `names`, in order, all on this connection.
    pub fn queues(&self, names: &[String]) -> Vec<QueueHandle> {
        open_queues(&self.manager, names)
    }

    pub async fn server_info(&self) -> BrokerResult<ServerInfo> {
        let mut conn = self.manager.clone();
        let raw: String = redis::cmd("INFO").query_async(&mut conn).await?;
        Ok(ServerInfo::parse(&raw))
    }
}

impl std::fmt::Debug for BrokerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConnection").finish_non_exhaustive()
    }
}

/// Subset of `INFO` shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub version: Option<String>,
    pub mode: Option<String>,
    pub port: Option<u16>,
    pub os: Option<String>,
    pub uptime_seconds: Option<u64>,
    pub connected_clients: Option<u64>,
    pub used_memory: Option<u64>,
    pub used_memory_peak: Option<u64>,
    pub total_system_memory: Option<u64>,
}

impl ServerInfo {
    /// Parse the `field:value` lines of an `INFO` reply.
    pub fn parse(raw: &str) -> Self {
        let fields: HashMap<&str, &str> = raw
            .lines()
            .filter(|line| !line.starts_with('#'))
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim(), v.trim()))
            .collect();

        let text = |key: &str| fields.get(key).map(|v| v.to_string());
        let number = |key: &str| fields.get(key).and_then(|v| v.parse::<u64>().ok());

        Self {
            version: text("redis_version"),
            mode: text("redis_mode"),
            port: fields.get("tcp_port").and_then(|v| v.parse().ok()),
            os: text("os"),
            uptime_seconds: number("uptime_in_seconds"),
            connected_clients: number("connected_clients"),
            used_memory: number("used_memory"),
            used_memory_peak: number("used_memory_peak"),
            total_system_memory: number("total_system_memory"),
        }
    }
}

/// Hide the password part of a Redis URL for logging.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
