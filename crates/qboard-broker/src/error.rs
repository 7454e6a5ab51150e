//! Broker error types.

use thiserror::Error;

use crate::job::JobState;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Timed out connecting to Redis at {url} after {timeout_ms}ms")]
    ConnectTimeout { url: String, timeout_ms: u64 },

    #[error("Job {job_id} not found in queue {queue}")]
    JobNotFound { queue: String, job_id: String },

    #[error("Job {job_id} is not {expected}")]
    InvalidJobState { job_id: String, expected: JobState },

    #[error("Job {0} is being processed and cannot be removed")]
    JobLocked(String),

    #[error("Operation not supported for {0} jobs")]
    UnsupportedState(JobState),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
