//! Dashboard configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

/// Port used when none is configured, or when it is configured as 0.
pub const DEFAULT_PORT: u16 = 3042;

/// Dashboard server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Address to listen on. Loopback unless set explicitly, since the
    /// dashboard has no authentication.
    #[serde(default = "default_host")]
    pub host: IpAddr,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path the dashboard is mounted under.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Jobs shown per page of a job list.
    #[serde(default = "default_jobs_per_page")]
    pub jobs_per_page: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_base_path() -> String {
    "/".to_string()
}

fn default_jobs_per_page() -> usize {
    10
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: default_base_path(),
            jobs_per_page: default_jobs_per_page(),
        }
    }
}

impl DashboardConfig {
    /// Config listening on `port`; `None` and `0` both mean the default.
    pub fn with_port(port: Option<u16>) -> Self {
        Self {
            port: port.filter(|p| *p != 0).unwrap_or(DEFAULT_PORT),
            ..Default::default()
        }
    }

    /// Socket address the server binds.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Base path without trailing slash, `None` for the root.
    pub fn mount_path(&self) -> Option<String> {
        let trimmed = self.base_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{trimmed}"))
        }
    }
}
