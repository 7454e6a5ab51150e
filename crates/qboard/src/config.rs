//! Validated start configuration.

use std::net::IpAddr;

use qboard_broker::BrokerConfig;
use qboard_dashboard::DashboardConfig;

use crate::error::ConfigError;

/// Everything needed to start serving. Only built through validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartConfig {
    redis_url: String,
    queue_names: Vec<String>,
    dashboard: DashboardConfig,
    read_only: bool,
}

impl StartConfig {
    /// Validate raw settings.
    ///
    /// A missing or empty Redis URL and an empty queue list are rejected.
    /// Queue names keep their order and are not deduplicated.
    pub fn new(
        port: Option<u16>,
        redis_url: Option<String>,
        queue_names: Vec<String>,
    ) -> Result<Self, ConfigError> {
        let redis_url = redis_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingRedisUrl)?;

        if queue_names.is_empty() || queue_names.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::EmptyQueueName);
        }

        Ok(Self {
            redis_url,
            queue_names,
            dashboard: DashboardConfig::with_port(port),
            read_only: false,
        })
    }

    /// Listen on `host` instead of loopback.
    pub fn with_host(mut self, host: Option<IpAddr>) -> Self {
        if let Some(host) = host {
            self.dashboard.host = host;
        }
        self
    }

    /// Mount the dashboard under `base_path` instead of `/`.
    pub fn with_base_path(mut self, base_path: Option<String>) -> Self {
        if let Some(base_path) = base_path {
            self.dashboard.base_path = base_path;
        }
        self
    }

    /// Page size of job lists; `0` keeps the default.
    pub fn with_jobs_per_page(mut self, jobs_per_page: Option<usize>) -> Self {
        if let Some(n) = jobs_per_page.filter(|n| *n > 0) {
            self.dashboard.jobs_per_page = n;
        }
        self
    }

    /// Register every queue without its mutating actions.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }

    pub fn queue_names(&self) -> &[String] {
        &self.queue_names
    }

    pub fn dashboard(&self) -> &DashboardConfig {
        &self.dashboard
    }

    pub fn port(&self) -> u16 {
        self.dashboard.port
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig::new(self.redis_url.clone())
    }
}
