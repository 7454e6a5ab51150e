//! HTTP server implementation using axum.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{Html, Json};
use axum::routing::{get, put};
use axum::Router;
use chrono::Utc;
use futures_util::future::try_join_all;
use qboard_broker::{JobState, ServerInfo};
use tokio::net::TcpListener;
use tracing::info;

use crate::adapter::{BrokerInfo, QueueAdapter};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::types::{
    page_count, ActionResult, JobDetail, JobLogs, JobsPage, JobsQuery, QueueSummary,
    QueuesResponse,
};

const INDEX_TEMPLATE: &str = include_str!("../static/index.html");
const BASE_PATH_PLACEHOLDER: &str = "__QBOARD_BASE_PATH__";

/// State shown when a job list is requested without `status`.
const DEFAULT_STATUS: JobState = JobState::Active;

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    queues: Arc<[Arc<dyn QueueAdapter>]>,
    broker_info: Option<Arc<dyn BrokerInfo>>,
    config: Arc<DashboardConfig>,
    index_html: Arc<str>,
}

impl AppState {
    pub fn new(
        queues: Vec<Arc<dyn QueueAdapter>>,
        broker_info: Option<Arc<dyn BrokerInfo>>,
        config: DashboardConfig,
    ) -> Self {
        let base = config.mount_path().unwrap_or_default();
        Self {
            queues: queues.into(),
            broker_info,
            index_html: INDEX_TEMPLATE.replace(BASE_PATH_PLACEHOLDER, &base).into(),
            config: Arc::new(config),
        }
    }

    /// First registered queue called `name`.
    fn queue(&self, name: &str) -> DashboardResult<&Arc<dyn QueueAdapter>> {
        self.queues
            .iter()
            .find(|q| q.name() == name)
            .ok_or_else(|| DashboardError::QueueNotFound(name.to_string()))
    }

    /// Like [`Self::queue`], but refuses read-only queues.
    fn mutable_queue(&self, name: &str) -> DashboardResult<&Arc<dyn QueueAdapter>> {
        let queue = self.queue(name)?;
        if !queue.allows_actions() {
            return Err(DashboardError::ReadOnly(name.to_string()));
        }
        Ok(queue)
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/queues", get(list_queues))
        .route("/api/queues/{queue}", get(list_jobs))
        .route("/api/queues/{queue}/retry", put(retry_failed))
        .route("/api/queues/{queue}/promote", put(promote_delayed))
        .route("/api/queues/{queue}/clean/{status}", put(clean_state))
        .route("/api/queues/{queue}/pause", put(pause_queue))
        .route("/api/queues/{queue}/resume", put(resume_queue))
        .route(
            "/api/queues/{queue}/jobs/{job_id}",
            get(get_job).delete(remove_job),
        )
        .route("/api/queues/{queue}/jobs/{job_id}/logs", get(get_job_logs))
        .route("/api/queues/{queue}/jobs/{job_id}/retry", put(retry_job))
        .route("/api/queues/{queue}/jobs/{job_id}/promote", put(promote_job))
        .route("/api/broker", get(get_broker_info))
        .with_state(state)
}

/// Serve the index HTML page.
async fn serve_index(State(state): State<AppState>) -> Html<String> {
    Html(state.index_html.to_string())
}

async fn summarize(queue: &Arc<dyn QueueAdapter>) -> DashboardResult<QueueSummary> {
    let (counts, is_paused) = tokio::try_join!(queue.counts(), queue.is_paused())?;
    Ok(QueueSummary {
        name: queue.name().to_string(),
        is_paused,
        allows_actions: queue.allows_actions(),
        counts,
    })
}

async fn list_queues(State(state): State<AppState>) -> DashboardResult<Json<QueuesResponse>> {
    let queues = try_join_all(state.queues.iter().map(summarize)).await?;
    Ok(Json(QueuesResponse {
        timestamp_ms: Utc::now().timestamp_millis(),
        queues,
    }))
}

async fn list_jobs(
    State(state): State<AppState>,
    Path(queue): Path<String>,
    Query(query): Query<JobsQuery>,
) -> DashboardResult<Json<JobsPage>> {
    let queue = state.queue(&queue)?;
    let status = query.status.unwrap_or(DEFAULT_STATUS);
    let page_size = state.config.jobs_per_page.max(1);

    let summary = summarize(queue).await?;
    let pages = page_count(summary.counts.get(status), page_size);
    // Past the last page shows the last page.
    let page = query.page.unwrap_or(1).clamp(1, pages);
    let start = (page - 1).saturating_mul(page_size);
    let end = start.saturating_add(page_size - 1);
    let jobs = queue.jobs(status, start, end).await?;

    Ok(Json(JobsPage {
        timestamp_ms: Utc::now().timestamp_millis(),
        page_count: pages,
        queue: summary,
        status,
        page,
        page_size,
        jobs,
    }))
}

async fn get_job(
    State(state): State<AppState>,
    Path((queue, job_id)): Path<(String, String)>,
) -> DashboardResult<Json<JobDetail>> {
    let queue = state.queue(&queue)?;
    let (job, job_state) = tokio::try_join!(queue.job(&job_id), queue.job_state(&job_id))?;
    Ok(Json(JobDetail {
        job,
        state: job_state,
    }))
}

async fn get_job_logs(
    State(state): State<AppState>,
    Path((queue, job_id)): Path<(String, String)>,
) -> DashboardResult<Json<JobLogs>> {
    let logs = state.queue(&queue)?.job_logs(&job_id).await?;
    Ok(Json(JobLogs {
        job_id,
        count: logs.len(),
        logs,
    }))
}

async fn retry_job(
    State(state): State<AppState>,
    Path((queue, job_id)): Path<(String, String)>,
) -> DashboardResult<Json<ActionResult>> {
    state.mutable_queue(&queue)?.retry_job(&job_id).await?;
    Ok(Json(ActionResult { affected: 1 }))
}

async fn promote_job(
    State(state): State<AppState>,
    Path((queue, job_id)): Path<(String, String)>,
) -> DashboardResult<Json<ActionResult>> {
    state.mutable_queue(&queue)?.promote_job(&job_id).await?;
    Ok(Json(ActionResult { affected: 1 }))
}

async fn remove_job(
    State(state): State<AppState>,
    Path((queue, job_id)): Path<(String, String)>,
) -> DashboardResult<Json<ActionResult>> {
    state.mutable_queue(&queue)?.remove_job(&job_id).await?;
    Ok(Json(ActionResult { affected: 1 }))
}

async fn retry_failed(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> DashboardResult<Json<ActionResult>> {
    let affected = state.mutable_queue(&queue)?.retry_failed().await?;
    Ok(Json(ActionResult { affected }))
}

async fn promote_delayed(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> DashboardResult<Json<ActionResult>> {
    let affected = state.mutable_queue(&queue)?.promote_delayed().await?;
    Ok(Json(ActionResult { affected }))
}

async fn clean_state(
    State(state): State<AppState>,
    Path((queue, status)): Path<(String, JobState)>,
) -> DashboardResult<Json<ActionResult>> {
    let affected = state.mutable_queue(&queue)?.clean(status).await?;
    Ok(Json(ActionResult { affected }))
}

async fn pause_queue(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> DashboardResult<Json<ActionResult>> {
    let changed = state.mutable_queue(&queue)?.pause().await?;
    Ok(Json(ActionResult {
        affected: u64::from(changed),
    }))
}

async fn resume_queue(
    State(state): State<AppState>,
    Path(queue): Path<String>,
) -> DashboardResult<Json<ActionResult>> {
    let changed = state.mutable_queue(&queue)?.resume().await?;
    Ok(Json(ActionResult {
        affected: u64::from(changed),
    }))
}

async fn get_broker_info(State(state): State<AppState>) -> DashboardResult<Json<ServerInfo>> {
    let info = state
        .broker_info
        .as_ref()
        .ok_or(DashboardError::BrokerInfoUnavailable)?;
    Ok(Json(info.server_info().await?))
}

/// Bind `<host>:<port>` and serve until the process is killed.
pub async fn run_server(router: Router, config: &DashboardConfig) -> DashboardResult<()> {
    let listener = TcpListener::bind(config.bind_addr()).await?;
    serve(listener, router).await
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, router: Router) -> DashboardResult<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "Dashboard listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{job, MemoryQueue};
    use crate::registry::DashboardRegistry;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    fn orders() -> MemoryQueue {
        let mut failed = job("1", "charge");
        failed.failed_reason = Some("card declined".to_string());
        MemoryQueue::new("orders")
            .with_job(JobState::Failed, failed)
            .with_job(JobState::Delayed, job("2", "reminder"))
            .with_job(JobState::Waiting, job("3", "charge"))
            .with_job(JobState::Active, job("4", "charge"))
            .with_logs("1", &["attempt 1", "attempt 2"])
    }

    fn router_with(queues: Vec<Arc<dyn QueueAdapter>>, config: DashboardConfig) -> Router {
        DashboardRegistry::new(config)
            .with_queues(queues)
            .into_router()
    }

    fn default_router() -> (Router, Arc<MemoryQueue>) {
        let orders = Arc::new(orders());
        let router = router_with(
            vec![
                orders.clone() as Arc<dyn QueueAdapter>,
                Arc::new(MemoryQueue::new("shipments")),
            ],
            DashboardConfig::default(),
        );
        (router, orders)
    }

    async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_index_is_served() {
        let (router, _) = default_router();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("<html"));
        assert!(!html.contains(BASE_PATH_PLACEHOLDER));
    }

    #[tokio::test]
    async fn test_list_queues_in_registration_order() {
        let (router, _) = default_router();
        let (status, body) = call(router, Method::GET, "/api/queues").await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["queues"]
            .as_array()
            .unwrap()
            .iter()
            .map(|q| q["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["orders", "shipments"]);
        assert_eq!(body["queues"][0]["counts"]["failed"], 1);
        assert_eq!(body["queues"][0]["counts"]["waiting"], 1);
        assert_eq!(body["queues"][1]["counts"]["failed"], 0);
    }

    #[tokio::test]
    async fn test_duplicate_queues_are_listed_twice() {
        let router = router_with(
            vec![
                Arc::new(MemoryQueue::new("orders")),
                Arc::new(MemoryQueue::new("orders")),
            ],
            DashboardConfig::default(),
        );
        let (_, body) = call(router, Method::GET, "/api/queues").await;
        assert_eq!(body["queues"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_jobs_by_status() {
        let (router, _) = default_router();
        let (status, body) = call(router, Method::GET, "/api/queues/orders?status=failed").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["page"], 1);
        assert_eq!(body["page_count"], 1);
        assert_eq!(body["jobs"][0]["id"], "1");
        assert_eq!(body["jobs"][0]["failed_reason"], "card declined");
    }

    #[tokio::test]
    async fn test_list_jobs_paginates() {
        let mut queue = MemoryQueue::new("bulk");
        for i in 0..5 {
            queue = queue.with_job(JobState::Completed, job(&i.to_string(), "x"));
        }
        let config = DashboardConfig {
            jobs_per_page: 2,
            ..Default::default()
        };
        let router = router_with(vec![Arc::new(queue)], config);

        let (_, body) = call(router, Method::GET, "/api/queues/bulk?status=completed&page=3").await;
        assert_eq!(body["page_count"], 3);
        assert_eq!(body["page_size"], 2);
        // Newest first: ids 4,3 | 2,1 | 0
        let ids: Vec<&str> = body["jobs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|j| j["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["0"]);
    }

    #[tokio::test]
    async fn test_page_past_the_end_shows_last_page() {
        let mut queue = MemoryQueue::new("bulk");
        for i in 0..3 {
            queue = queue.with_job(JobState::Failed, job(&i.to_string(), "x"));
        }
        let config = DashboardConfig {
            jobs_per_page: 2,
            ..Default::default()
        };
        let router = router_with(vec![Arc::new(queue)], config);

        let (status, body) = call(
            router,
            Method::GET,
            "/api/queues/bulk?status=failed&page=18446744073709551615",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], 2);
        assert_eq!(body["page_count"], 2);
        assert_eq!(body["jobs"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_page_zero_shows_first_page() {
        let (router, _) = default_router();
        let (status, body) = call(router, Method::GET, "/api/queues/orders?status=failed&page=0").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page"], 1);
        assert_eq!(body["jobs"][0]["id"], "1");
    }

    #[tokio::test]
    async fn test_unknown_status_is_rejected() {
        let (router, _) = default_router();
        let (status, _) = call(router, Method::GET, "/api/queues/orders?status=latest").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_queue_is_404() {
        let (router, _) = default_router();
        let (status, body) = call(router, Method::GET, "/api/queues/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Queue nope not found");
    }

    #[tokio::test]
    async fn test_job_detail_and_logs() {
        let (router, _) = default_router();
        let (status, body) = call(router.clone(), Method::GET, "/api/queues/orders/jobs/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "charge");
        assert_eq!(body["state"], "failed");

        let (status, body) = call(router.clone(), Method::GET, "/api/queues/orders/jobs/1/logs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["logs"][1], "attempt 2");

        let (status, _) = call(router, Method::GET, "/api/queues/orders/jobs/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_retry_and_promote_job() {
        let (router, orders) = default_router();

        let (status, body) = call(router.clone(), Method::PUT, "/api/queues/orders/jobs/1/retry").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["affected"], 1);
        assert_eq!(orders.state_of("1"), Some(JobState::Waiting));

        let (status, _) = call(router.clone(), Method::PUT, "/api/queues/orders/jobs/2/promote").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(orders.state_of("2"), Some(JobState::Waiting));

        // Job 3 is waiting, not failed.
        let (status, _) = call(router, Method::PUT, "/api/queues/orders/jobs/3/retry").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_remove_job() {
        let (router, orders) = default_router();

        let (status, _) = call(router.clone(), Method::DELETE, "/api/queues/orders/jobs/3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(orders.state_of("3"), None);

        let (status, _) = call(router, Method::DELETE, "/api/queues/orders/jobs/4").await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_bulk_actions() {
        let (router, orders) = default_router();

        let (_, body) = call(router.clone(), Method::PUT, "/api/queues/orders/retry").await;
        assert_eq!(body["affected"], 1);
        let (_, body) = call(router.clone(), Method::PUT, "/api/queues/orders/promote").await;
        assert_eq!(body["affected"], 1);
        let (_, body) = call(router.clone(), Method::PUT, "/api/queues/orders/clean/waiting").await;
        assert_eq!(body["affected"], 3);
        assert_eq!(orders.state_of("4"), Some(JobState::Active));

        let (status, _) = call(router, Method::PUT, "/api/queues/orders/clean/active").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pause_and_resume() {
        let (router, orders) = default_router();

        let (_, body) = call(router.clone(), Method::PUT, "/api/queues/orders/pause").await;
        assert_eq!(body["affected"], 1);
        assert_eq!(orders.state_of("3"), Some(JobState::Paused));
        let (_, body) = call(router.clone(), Method::PUT, "/api/queues/orders/pause").await;
        assert_eq!(body["affected"], 0);

        let (_, body) = call(router.clone(), Method::GET, "/api/queues").await;
        assert_eq!(body["queues"][0]["is_paused"], true);

        let (_, body) = call(router, Method::PUT, "/api/queues/orders/resume").await;
        assert_eq!(body["affected"], 1);
        assert_eq!(orders.state_of("3"), Some(JobState::Waiting));
    }

    #[tokio::test]
    async fn test_read_only_queue_refuses_actions() {
        let queue = Arc::new(orders().read_only());
        let router = router_with(
            vec![queue.clone() as Arc<dyn QueueAdapter>],
            DashboardConfig::default(),
        );

        let (status, body) = call(router.clone(), Method::PUT, "/api/queues/orders/jobs/1/retry").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Queue orders is read-only");
        assert_eq!(queue.state_of("1"), Some(JobState::Failed));

        let (status, _) = call(router, Method::GET, "/api/queues/orders/jobs/1").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_read_only_broker_queue_never_reaches_redis() {
        use crate::adapter::BrokerQueueAdapter;
        use qboard_broker::testing::FakeRedis;
        use qboard_broker::QueueHandle;

        let conn = FakeRedis::new();
        let adapter = BrokerQueueAdapter::new(QueueHandle::new("orders", conn.clone())).read_only();
        let router = router_with(
            vec![Arc::new(adapter) as Arc<dyn QueueAdapter>],
            DashboardConfig::default(),
        );

        let (status, body) = call(router, Method::PUT, "/api/queues/orders/jobs/1/retry").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Queue orders is read-only");
        assert!(conn.sent().is_empty());
    }

    #[tokio::test]
    async fn test_broker_info_absent_is_404() {
        let (router, _) = default_router();
        let (status, _) = call(router, Method::GET, "/api/broker").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_mounted_under_base_path() {
        let config = DashboardConfig {
            base_path: "/admin/queues".to_string(),
            ..Default::default()
        };
        let router = router_with(vec![Arc::new(orders())], config);

        let (status, body) = call(router.clone(), Method::GET, "/admin/queues/api/queues").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["queues"][0]["name"], "orders");

        let (status, _) = call(router, Method::GET, "/api/queues").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_base_path_with_trailing_slash_redirects() {
        let config = DashboardConfig {
            base_path: "/admin/queues".to_string(),
            ..Default::default()
        };
        let router = router_with(vec![Arc::new(orders())], config);

        let request = Request::builder()
            .uri("/admin/queues")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::builder()
            .uri("/admin/queues/")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()["location"], "/admin/queues");
    }
}
