//! Dashboard registry: the set of queues a dashboard shows.

use std::sync::Arc;

use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::adapter::{BrokerInfo, QueueAdapter};
use crate::config::DashboardConfig;
use crate::server::{create_router, AppState};

/// Collects queue adapters and turns them into HTTP routes.
///
/// Queues keep registration order. Registering the same name twice shows
/// the queue twice; per-queue routes resolve to the first one.
#[derive(Clone)]
pub struct DashboardRegistry {
    config: DashboardConfig,
    queues: Vec<Arc<dyn QueueAdapter>>,
    broker_info: Option<Arc<dyn BrokerInfo>>,
}

impl DashboardRegistry {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            queues: Vec::new(),
            broker_info: None,
        }
    }

    pub fn with_queues<I>(mut self, queues: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn QueueAdapter>>,
    {
        self.queues.extend(queues);
        self
    }

    pub fn with_broker_info(mut self, info: Arc<dyn BrokerInfo>) -> Self {
        self.broker_info = Some(info);
        self
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn queue_names(&self) -> Vec<&str> {
        self.queues.iter().map(|q| q.name()).collect()
    }

    /// Build the routes. Performs no I/O.
    pub fn into_router(self) -> Router {
        let mount_path = self.config.mount_path();
        let state = AppState::new(self.queues, self.broker_info, self.config);
        let routes = create_router(state);

        let app = match mount_path {
            Some(path) => {
                let index = path.clone();
                Router::new()
                    .route(
                        &format!("{path}/"),
                        get(move || {
                            let index = index.clone();
                            async move { Redirect::temporary(&index) }
                        }),
                    )
                    .nest(&path, routes)
            }
            None => routes,
        };

        app.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
    }
}

impl std::fmt::Debug for DashboardRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardRegistry")
            .field("config", &self.config)
            .field("queues", &self.queue_names())
            .field("broker_info", &self.broker_info.is_some())
            .finish()
    }
}
