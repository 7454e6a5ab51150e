//! Startup sequence.
//!
//! `Application` (configured) → `ConnectedApplication` (connected) →
//! `serve()` (serving until the process is killed). There is no way back:
//! a failure at any step ends the process.

use std::sync::Arc;

use qboard_broker::{BrokerConn, BrokerConnection, QueueHandle};
use qboard_dashboard::{BrokerQueueAdapter, DashboardRegistry, QueueAdapter};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::StartConfig;
use crate::error::AppResult;

/// Connect, register every queue and serve the dashboard.
pub async fn run(config: StartConfig) -> AppResult<()> {
    Application::new(config).connect().await?.serve().await
}

/// Validated configuration, nothing opened yet.
#[derive(Debug)]
pub struct Application {
    config: StartConfig,
}

impl Application {
    pub fn new(config: StartConfig) -> Self {
        Self { config }
    }

    /// Open the shared Redis connection and bind one handle per queue name.
    pub async fn connect(self) -> AppResult<ConnectedApplication> {
        let connection = BrokerConnection::connect(&self.config.broker_config()).await?;
        let queues = connection.queues(self.config.queue_names());

        info!(
            queues = ?queues.iter().map(|q| q.name()).collect::<Vec<_>>(),
            "Queues attached"
        );

        Ok(ConnectedApplication {
            config: self.config,
            connection,
            queues,
        })
    }
}

/// Holds the process-wide connection and its queue handles.
#[derive(Debug)]
pub struct ConnectedApplication {
    config: StartConfig,
    connection: BrokerConnection,
    queues: Vec<QueueHandle>,
}

impl ConnectedApplication {
    pub fn queues(&self) -> &[QueueHandle] {
        &self.queues
    }

    /// Dashboard registry with one adapter per queue handle, in order.
    pub fn registry(&self) -> DashboardRegistry {
        DashboardRegistry::new(self.config.dashboard().clone())
            .with_queues(adapters(&self.queues, self.config.read_only()))
            .with_broker_info(Arc::new(self.connection.clone()))
    }

    /// Serve on the configured address. Only returns on error.
    pub async fn serve(self) -> AppResult<()> {
        let registry = self.registry();
        let config = registry.config().clone();
        info!(
            addr = %config.bind_addr(),
            read_only = self.config.read_only(),
            "Starting dashboard server"
        );
        qboard_dashboard::run_server(registry.into_router(), &config).await?;
        Ok(())
    }

    /// Serve on an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> AppResult<()> {
        let router = self.registry().into_router();
        qboard_dashboard::serve(listener, router).await?;
        Ok(())
    }
}

/// Wrap each queue handle in a dashboard adapter, keeping order.
fn adapters<C: BrokerConn>(
    queues: &[QueueHandle<C>],
    read_only: bool,
) -> Vec<Arc<dyn QueueAdapter>> {
    queues
        .iter()
        .cloned()
        .map(|queue| {
            let adapter = BrokerQueueAdapter::new(queue);
            let adapter = if read_only { adapter.read_only() } else { adapter };
            Arc::new(adapter) as Arc<dyn QueueAdapter>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qboard_broker::open_queues;
    use qboard_broker::testing::FakeRedis;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_adapters_follow_queue_order() {
        let queues = open_queues(&FakeRedis::new(), &names(&["orders", "shipments", "orders"]));

        let adapters = adapters(&queues, false);

        let got: Vec<&str> = adapters.iter().map(|a| a.name()).collect();
        assert_eq!(got, vec!["orders", "shipments", "orders"]);
        assert!(adapters.iter().all(|a| a.allows_actions()));
    }

    #[test]
    fn test_read_only_adapters() {
        let queues = open_queues(&FakeRedis::new(), &names(&["orders"]));

        let adapters = adapters(&queues, true);

        assert!(!adapters[0].allows_actions());
    }

    #[tokio::test]
    async fn test_unreachable_redis_fails_connect() {
        let config = StartConfig::new(
            None,
            Some("redis://127.0.0.1:1".into()),
            names(&["orders"]),
        )
        .unwrap();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(15),
            Application::new(config).connect(),
        )
        .await
        .expect("connect must give up on its own");

        assert!(result.is_err());
    }
}
