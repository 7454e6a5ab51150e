//! Dashboard API types.
//!
//! These types are used for JSON serialization of the REST API.

use qboard_broker::{Job, JobCounts, JobState};
use serde::{Deserialize, Serialize};

/// One registered queue as listed by the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct QueueSummary {
    pub name: String,
    pub is_paused: bool,
    /// False when the queue was registered read-only.
    pub allows_actions: bool,
    pub counts: JobCounts,
}

/// Response of `GET /api/queues`.
#[derive(Debug, Clone, Serialize)]
pub struct QueuesResponse {
    /// Timestamp when the counts were read (Unix milliseconds).
    pub timestamp_ms: i64,
    /// Registered queues, in registration order.
    pub queues: Vec<QueueSummary>,
}

/// Query string of `GET /api/queues/{queue}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsQuery {
    #[serde(default)]
    pub status: Option<JobState>,
    #[serde(default)]
    pub page: Option<usize>,
}

/// One page of jobs in a single state.
#[derive(Debug, Clone, Serialize)]
pub struct JobsPage {
    pub timestamp_ms: i64,
    pub queue: QueueSummary,
    pub status: JobState,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub jobs: Vec<Job>,
}

/// Job detail including its current state.
#[derive(Debug, Clone, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: Job,
    /// `None` if the job hash exists but the job is in no state list.
    pub state: Option<JobState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobLogs {
    pub job_id: String,
    pub count: usize,
    pub logs: Vec<String>,
}

/// Result of a mutating action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Number of jobs (or queues, for pause/resume) changed.
    pub affected: u64,
}

/// Number of pages needed for `total` items, at least one.
pub fn page_count(total: u64, page_size: usize) -> usize {
    let page_size = page_size.max(1) as u64;
    (total.div_ceil(page_size)).max(1) as usize
}
