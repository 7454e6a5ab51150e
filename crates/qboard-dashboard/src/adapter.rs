//! Queue capability interface.
//!
//! The dashboard only talks to queues through [`QueueAdapter`], so any
//! backend that can count, list and move jobs can be registered.

use async_trait::async_trait;
use qboard_broker::{
    BrokerConn, BrokerConnection, ConnectionManager, Job, JobCounts, JobState, QueueHandle,
    ServerInfo,
};

use crate::error::DashboardResult;

/// What the dashboard can do with a queue.
#[async_trait]
pub trait QueueAdapter: Send + Sync {
    /// Queue name shown in the dashboard and used in routes.
    fn name(&self) -> &str;

    /// Whether mutating actions (retry, remove, ...) are offered.
    fn allows_actions(&self) -> bool {
        true
    }

    async fn counts(&self) -> DashboardResult<JobCounts>;

    async fn is_paused(&self) -> DashboardResult<bool>;

    /// Jobs in `state` from index `start` to `end`, inclusive.
    async fn jobs(&self, state: JobState, start: usize, end: usize) -> DashboardResult<Vec<Job>>;

    async fn job(&self, job_id: &str) -> DashboardResult<Job>;

    async fn job_state(&self, job_id: &str) -> DashboardResult<Option<JobState>>;

    async fn job_logs(&self, job_id: &str) -> DashboardResult<Vec<String>>;

    async fn retry_job(&self, job_id: &str) -> DashboardResult<()>;

    async fn retry_failed(&self) -> DashboardResult<u64>;

    async fn promote_job(&self, job_id: &str) -> DashboardResult<()>;

    async fn promote_delayed(&self) -> DashboardResult<u64>;

    async fn remove_job(&self, job_id: &str) -> DashboardResult<()>;

    async fn clean(&self, state: JobState) -> DashboardResult<u64>;

    /// Returns false if already paused.
    async fn pause(&self) -> DashboardResult<bool>;

    /// Returns false if not paused.
    async fn resume(&self) -> DashboardResult<bool>;
}

/// Server statistics shown next to the queue list.
#[async_trait]
pub trait BrokerInfo: Send + Sync {
    async fn server_info(&self) -> DashboardResult<ServerInfo>;
}

#[async_trait]
impl BrokerInfo for BrokerConnection {
    async fn server_info(&self) -> DashboardResult<ServerInfo> {
        Ok(BrokerConnection::server_info(self).await?)
    }
}

/// [`QueueAdapter`] over a BullMQ [`QueueHandle`].
pub struct BrokerQueueAdapter<C = ConnectionManager> {
    queue: QueueHandle<C>,
    read_only: bool,
}

impl<C> BrokerQueueAdapter<C> {
    pub fn new(queue: QueueHandle<C>) -> Self {
        Self {
            queue,
            read_only: false,
        }
    }

    /// Hide every mutating action for this queue.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

#[async_trait]
impl<C: BrokerConn> QueueAdapter for BrokerQueueAdapter<C> {
    fn name(&self) -> &str {
        self.queue.name()
    }

    fn allows_actions(&self) -> bool {
        !self.read_only
    }

    async fn counts(&self) -> DashboardResult<JobCounts> {
        Ok(self.queue.counts().await?)
    }

    async fn is_paused(&self) -> DashboardResult<bool> {
        Ok(self.queue.is_paused().await?)
    }

    async fn jobs(&self, state: JobState, start: usize, end: usize) -> DashboardResult<Vec<Job>> {
        let start = isize::try_from(start).unwrap_or(isize::MAX);
        let end = isize::try_from(end).unwrap_or(isize::MAX);
        Ok(self.queue.jobs(state, start, end).await?)
    }

    async fn job(&self, job_id: &str) -> DashboardResult<Job> {
        Ok(self.queue.job(job_id).await?)
    }

    async fn job_state(&self, job_id: &str) -> DashboardResult<Option<JobState>> {
        Ok(self.queue.job_state(job_id).await?)
    }

    async fn job_logs(&self, job_id: &str) -> DashboardResult<Vec<String>> {
        Ok(self.queue.job_logs(job_id).await?)
    }

    async fn retry_job(&self, job_id: &str) -> DashboardResult<()> {
        Ok(self.queue.retry_job(job_id).await?)
    }

    async fn retry_failed(&self) -> DashboardResult<u64> {
        Ok(self.queue.retry_failed().await?)
    }

    async fn promote_job(&self, job_id: &str) -> DashboardResult<()> {
        Ok(self.queue.promote_job(job_id).await?)
    }

    async fn promote_delayed(&self) -> DashboardResult<u64> {
        Ok(self.queue.promote_delayed().await?)
    }

    async fn remove_job(&self, job_id: &str) -> DashboardResult<()> {
        Ok(self.queue.remove_job(job_id).await?)
    }

    async fn clean(&self, state: JobState) -> DashboardResult<u64> {
        Ok(self.queue.clean(state).await?)
    }

    async fn pause(&self) -> DashboardResult<bool> {
        Ok(self.queue.pause().await?)
    }

    async fn resume(&self) -> DashboardResult<bool> {
        Ok(self.queue.resume().await?)
    }
}
