//! In-memory [`QueueAdapter`] for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use qboard_broker::{BrokerError, Job, JobCounts, JobState};
use serde_json::Value;

use crate::adapter::QueueAdapter;
use crate::error::DashboardResult;

/// A job with just an id and a name, everything else empty.
pub fn job(id: &str, name: &str) -> Job {
    Job {
        id: id.to_string(),
        name: name.to_string(),
        data: Value::Null,
        opts: Value::Null,
        progress: Value::Null,
        timestamp: None,
        delay: None,
        priority: None,
        processed_on: None,
        finished_on: None,
        attempts_made: 0,
        failed_reason: None,
        stacktrace: Vec::new(),
        return_value: Value::Null,
    }
}

#[derive(Default)]
struct Inner {
    /// Insertion ordered; newest last.
    jobs: Vec<(JobState, Job)>,
    logs: HashMap<String, Vec<String>>,
    paused: bool,
}

/// Queue kept entirely in memory.
pub struct MemoryQueue {
    name: String,
    read_only: bool,
    inner: Mutex<Inner>,
}

impl MemoryQueue {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            read_only: false,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_job(self, state: JobState, job: Job) -> Self {
        self.inner.lock().jobs.push((state, job));
        self
    }

    pub fn with_logs(self, job_id: &str, logs: &[&str]) -> Self {
        self.inner.lock().logs.insert(
            job_id.to_string(),
            logs.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// State of a job, for assertions.
    pub fn state_of(&self, job_id: &str) -> Option<JobState> {
        self.inner
            .lock()
            .jobs
            .iter()
            .find(|(_, j)| j.id == job_id)
            .map(|(s, _)| *s)
    }

    fn not_found(&self, job_id: &str) -> BrokerError {
        BrokerError::JobNotFound {
            queue: self.name.clone(),
            job_id: job_id.to_string(),
        }
    }

    fn move_job(&self, job_id: &str, from: JobState) -> DashboardResult<()> {
        let mut inner = self.inner.lock();
        let target = if inner.paused {
            JobState::Paused
        } else {
            JobState::Waiting
        };
        let entry = inner
            .jobs
            .iter_mut()
            .find(|(_, j)| j.id == job_id)
            .ok_or_else(|| self.not_found(job_id))?;
        if entry.0 != from {
            return Err(BrokerError::InvalidJobState {
                job_id: job_id.to_string(),
                expected: from,
            }
            .into());
        }
        entry.0 = target;
        entry.1.failed_reason = None;
        entry.1.finished_on = None;
        Ok(())
    }

    fn move_all(&self, from: JobState) -> u64 {
        let mut inner = self.inner.lock();
        let target = if inner.paused {
            JobState::Paused
        } else {
            JobState::Waiting
        };
        let mut moved = 0;
        for (state, job) in inner.jobs.iter_mut().filter(|(s, _)| *s == from) {
            *state = target;
            job.failed_reason = None;
            moved += 1;
        }
        moved
    }

    fn swap_state(&self, from: JobState, to: JobState) {
        for (state, _) in self.inner.lock().jobs.iter_mut() {
            if *state == from {
                *state = to;
            }
        }
    }
}

#[async_trait]
impl QueueAdapter for MemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn allows_actions(&self) -> bool {
        !self.read_only
    }

    async fn counts(&self) -> DashboardResult<JobCounts> {
        let mut counts = JobCounts::default();
        for (state, _) in self.inner.lock().jobs.iter() {
            counts.set(*state, counts.get(*state) + 1);
        }
        Ok(counts)
    }

    async fn is_paused(&self) -> DashboardResult<bool> {
        Ok(self.inner.lock().paused)
    }

    async fn jobs(&self, state: JobState, start: usize, end: usize) -> DashboardResult<Vec<Job>> {
        let inner = self.inner.lock();
        Ok(inner
            .jobs
            .iter()
            .rev()
            .filter(|(s, _)| *s == state)
            .skip(start)
            .take(end.saturating_sub(start) + 1)
            .map(|(_, j)| j.clone())
            .collect())
    }

    async fn job(&self, job_id: &str) -> DashboardResult<Job> {
        self.inner
            .lock()
            .jobs
            .iter()
            .find(|(_, j)| j.id == job_id)
            .map(|(_, j)| j.clone())
            .ok_or_else(|| self.not_found(job_id).into())
    }

    async fn job_state(&self, job_id: &str) -> DashboardResult<Option<JobState>> {
        Ok(self.state_of(job_id))
    }

    async fn job_logs(&self, job_id: &str) -> DashboardResult<Vec<String>> {
        if self.state_of(job_id).is_none() {
            return Err(self.not_found(job_id).into());
        }
        Ok(self
            .inner
            .lock()
            .logs
            .get(job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn retry_job(&self, job_id: &str) -> DashboardResult<()> {
        self.move_job(job_id, JobState::Failed)
    }

    async fn retry_failed(&self) -> DashboardResult<u64> {
        Ok(self.move_all(JobState::Failed))
    }

    async fn promote_job(&self, job_id: &str) -> DashboardResult<()> {
        self.move_job(job_id, JobState::Delayed)
    }

    async fn promote_delayed(&self) -> DashboardResult<u64> {
        Ok(self.move_all(JobState::Delayed))
    }

    async fn remove_job(&self, job_id: &str) -> DashboardResult<()> {
        let mut inner = self.inner.lock();
        let index = inner
            .jobs
            .iter()
            .position(|(_, j)| j.id == job_id)
            .ok_or_else(|| self.not_found(job_id))?;
        if inner.jobs[index].0 == JobState::Active {
            return Err(BrokerError::JobLocked(job_id.to_string()).into());
        }
        inner.jobs.remove(index);
        inner.logs.remove(job_id);
        Ok(())
    }

    async fn clean(&self, state: JobState) -> DashboardResult<u64> {
        if state == JobState::Active {
            return Err(BrokerError::UnsupportedState(state).into());
        }
        let mut inner = self.inner.lock();
        let before = inner.jobs.len();
        inner.jobs.retain(|(s, _)| *s != state);
        Ok((before - inner.jobs.len()) as u64)
    }

    async fn pause(&self) -> DashboardResult<bool> {
        if self.inner.lock().paused {
            return Ok(false);
        }
        self.swap_state(JobState::Waiting, JobState::Paused);
        self.inner.lock().paused = true;
        Ok(true)
    }

    async fn resume(&self) -> DashboardResult<bool> {
        if !self.inner.lock().paused {
            return Ok(false);
        }
        self.swap_state(JobState::Paused, JobState::Waiting);
        self.inner.lock().paused = false;
        Ok(true)
    }
}
