//! Queue handles bound to the shared broker connection.

use std::collections::HashMap;

use redis::aio::{ConnectionLike, ConnectionManager};
use tracing::{debug, info};

use crate::error::{BrokerError, BrokerResult};
use crate::job::{Job, JobCounts, JobState};
use crate::keys::QueueKeys;
use crate::scripts;

/// Connection types a [`QueueHandle`] can run commands on.
pub trait BrokerConn: ConnectionLike + Clone + Send + Sync + 'static {}

impl<T> BrokerConn for T where T: ConnectionLike + Clone + Send + Sync + 'static {}

/// Build one handle per queue name, in input order, all sharing `conn`.
///
/// Names are not deduplicated: a repeated name yields a repeated handle.
pub fn open_queues<C: Clone>(conn: &C, names: &[String]) -> Vec<QueueHandle<C>> {
    names
        .iter()
        .map(|name| QueueHandle::new(name, conn.clone()))
        .collect()
}

/// A named BullMQ queue.
///
/// Holds no queue contents; every call is a round-trip to Redis.
#[derive(Clone)]
pub struct QueueHandle<C = ConnectionManager> {
    keys: QueueKeys,
    conn: C,
}

impl<C> QueueHandle<C> {
    pub fn new(name: &str, conn: C) -> Self {
        Self {
            keys: QueueKeys::new(name),
            conn,
        }
    }

    pub fn name(&self) -> &str {
        self.keys.name()
    }

    pub fn keys(&self) -> &QueueKeys {
        &self.keys
    }

    fn state_key(&self, state: JobState) -> String {
        match state {
            JobState::Active => self.keys.active(),
            JobState::Waiting => self.keys.wait(),
            JobState::WaitingChildren => self.keys.waiting_children(),
            JobState::Prioritized => self.keys.prioritized(),
            JobState::Completed => self.keys.completed(),
            JobState::Failed => self.keys.failed(),
            JobState::Delayed => self.keys.delayed(),
            JobState::Paused => self.keys.paused(),
        }
    }

    fn not_found(&self, job_id: &str) -> BrokerError {
        BrokerError::JobNotFound {
            queue: self.name().to_string(),
            job_id: job_id.to_string(),
        }
    }
}

impl<C> std::fmt::Debug for QueueHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("name", &self.name())
            .finish()
    }
}

impl<C: BrokerConn> QueueHandle<C> {
    /// Job count per state.
    pub async fn counts(&self) -> BrokerResult<JobCounts> {
        let mut conn = self.conn.clone();
        let (active, waiting, paused, prioritized, waiting_children, delayed, completed, failed): (
            u64,
            u64,
            u64,
            u64,
            u64,
            u64,
            u64,
            u64,
        ) = redis::pipe()
            .cmd("LLEN")
            .arg(self.keys.active())
            .cmd("LLEN")
            .arg(self.keys.wait())
            .cmd("LLEN")
            .arg(self.keys.paused())
            .cmd("ZCARD")
            .arg(self.keys.prioritized())
            .cmd("ZCARD")
            .arg(self.keys.waiting_children())
            .cmd("ZCARD")
            .arg(self.keys.delayed())
            .cmd("ZCARD")
            .arg(self.keys.completed())
            .cmd("ZCARD")
            .arg(self.keys.failed())
            .query_async(&mut conn)
            .await?;

        Ok(JobCounts {
            active,
            waiting,
            waiting_children,
            prioritized,
            completed,
            failed,
            delayed,
            paused,
        })
    }

    pub async fn is_paused(&self) -> BrokerResult<bool> {
        let mut conn = self.conn.clone();
        let paused: bool = redis::cmd("HEXISTS")
            .arg(self.keys.meta())
            .arg("paused")
            .query_async(&mut conn)
            .await?;
        Ok(paused)
    }

    /// Jobs in `state` between `start` and `end` (inclusive, Redis range
    /// semantics). Completed and failed jobs come newest first.
    pub async fn jobs(&self, state: JobState, start: isize, end: isize) -> BrokerResult<Vec<Job>> {
        let mut conn = self.conn.clone();
        let command = if state.is_list() {
            "LRANGE"
        } else if state.newest_first() {
            "ZREVRANGE"
        } else {
            "ZRANGE"
        };

        let ids: Vec<String> = redis::cmd(command)
            .arg(self.state_key(state))
            .arg(start)
            .arg(end)
            .query_async(&mut conn)
            .await?;

        debug!(queue = %self.name(), %state, count = ids.len(), "Fetched job ids");

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for id in &ids {
            pipe.cmd("HGETALL").arg(self.keys.job(id));
        }
        let hashes: Vec<HashMap<String, String>> = pipe.query_async(&mut conn).await?;

        // A job removed between the two round-trips decodes to None and is skipped.
        Ok(ids
            .into_iter()
            .zip(hashes)
            .filter_map(|(id, hash)| Job::from_hash(&id, hash))
            .collect())
    }

    pub async fn job(&self, job_id: &str) -> BrokerResult<Job> {
        let mut conn = self.conn.clone();
        let hash: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.keys.job(job_id))
            .query_async(&mut conn)
            .await?;
        Job::from_hash(job_id, hash).ok_or_else(|| self.not_found(job_id))
    }

    /// Current state of a job, `None` if it is in no known state.
    pub async fn job_state(&self, job_id: &str) -> BrokerResult<Option<JobState>> {
        let mut conn = self.conn.clone();
        let (completed, failed, delayed, prioritized, waiting_children, active, waiting, paused): (
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<i64>,
            Option<i64>,
            Option<i64>,
        ) = redis::pipe()
            .cmd("ZSCORE")
            .arg(self.keys.completed())
            .arg(job_id)
            .cmd("ZSCORE")
            .arg(self.keys.failed())
            .arg(job_id)
            .cmd("ZSCORE")
            .arg(self.keys.delayed())
            .arg(job_id)
            .cmd("ZSCORE")
            .arg(self.keys.prioritized())
            .arg(job_id)
            .cmd("ZSCORE")
            .arg(self.keys.waiting_children())
            .arg(job_id)
            .cmd("LPOS")
            .arg(self.keys.active())
            .arg(job_id)
            .cmd("LPOS")
            .arg(self.keys.wait())
            .arg(job_id)
            .cmd("LPOS")
            .arg(self.keys.paused())
            .arg(job_id)
            .query_async(&mut conn)
            .await?;

        let found = [
            (completed.is_some(), JobState::Completed),
            (failed.is_some(), JobState::Failed),
            (delayed.is_some(), JobState::Delayed),
            (prioritized.is_some(), JobState::Prioritized),
            (waiting_children.is_some(), JobState::WaitingChildren),
            (active.is_some(), JobState::Active),
            (waiting.is_some(), JobState::Waiting),
            (paused.is_some(), JobState::Paused),
        ];
        Ok(found
            .into_iter()
            .find(|(present, _)| *present)
            .map(|(_, state)| state))
    }

    pub async fn job_logs(&self, job_id: &str) -> BrokerResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let (exists, logs): (bool, Vec<String>) = redis::pipe()
            .cmd("EXISTS")
            .arg(self.keys.job(job_id))
            .cmd("LRANGE")
            .arg(self.keys.job_logs(job_id))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;

        if !exists {
            return Err(self.not_found(job_id));
        }
        Ok(logs)
    }

    /// Move a failed job back to waiting, or to prioritized when it has a
    /// priority.
    pub async fn retry_job(&self, job_id: &str) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        let moved: i64 = scripts::retry_job()
            .key(self.keys.failed())
            .key(self.keys.wait())
            .key(self.keys.paused())
            .key(self.keys.meta())
            .key(self.keys.marker())
            .key(self.keys.prioritized())
            .key(self.keys.priority_counter())
            .key(self.keys.job(job_id))
            .arg(job_id)
            .invoke_async(&mut conn)
            .await?;

        if moved == 0 {
            return Err(self.wrong_state(&mut conn, job_id, JobState::Failed).await);
        }
        info!(queue = %self.name(), job_id, "Retried job");
        Ok(())
    }

    /// Move every failed job back to waiting. Returns how many moved.
    pub async fn retry_failed(&self) -> BrokerResult<u64> {
        let mut conn = self.conn.clone();
        let moved: u64 = scripts::retry_all_failed()
            .key(self.keys.failed())
            .key(self.keys.wait())
            .key(self.keys.paused())
            .key(self.keys.meta())
            .key(self.keys.marker())
            .key(self.keys.prioritized())
            .key(self.keys.priority_counter())
            .arg(self.keys.job_prefix())
            .invoke_async(&mut conn)
            .await?;

        info!(queue = %self.name(), count = moved, "Retried failed jobs");
        Ok(moved)
    }

    /// Move a delayed job to waiting right away.
    pub async fn promote_job(&self, job_id: &str) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        let moved: i64 = scripts::promote_job()
            .key(self.keys.delayed())
            .key(self.keys.wait())
            .key(self.keys.paused())
            .key(self.keys.meta())
            .key(self.keys.marker())
            .key(self.keys.prioritized())
            .key(self.keys.priority_counter())
            .key(self.keys.job(job_id))
            .arg(job_id)
            .invoke_async(&mut conn)
            .await?;

        if moved == 0 {
            return Err(self.wrong_state(&mut conn, job_id, JobState::Delayed).await);
        }
        info!(queue = %self.name(), job_id, "Promoted job");
        Ok(())
    }

    /// Move every delayed job to waiting. Returns how many moved.
    pub async fn promote_delayed(&self) -> BrokerResult<u64> {
        let mut conn = self.conn.clone();
        let moved: u64 = scripts::promote_all_delayed()
            .key(self.keys.delayed())
            .key(self.keys.wait())
            .key(self.keys.paused())
            .key(self.keys.meta())
            .key(self.keys.marker())
            .key(self.keys.prioritized())
            .key(self.keys.priority_counter())
            .arg(self.keys.job_prefix())
            .invoke_async(&mut conn)
            .await?;

        info!(queue = %self.name(), count = moved, "Promoted delayed jobs");
        Ok(moved)
    }

    /// Delete a job from whatever state it is in, along with its logs.
    pub async fn remove_job(&self, job_id: &str) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        let outcome: i64 = scripts::remove_job()
            .key(self.keys.wait())
            .key(self.keys.paused())
            .key(self.keys.active())
            .key(self.keys.prioritized())
            .key(self.keys.waiting_children())
            .key(self.keys.delayed())
            .key(self.keys.completed())
            .key(self.keys.failed())
            .key(self.keys.job(job_id))
            .key(self.keys.job_logs(job_id))
            .arg(job_id)
            .invoke_async(&mut conn)
            .await?;

        match outcome {
            1 => {
                info!(queue = %self.name(), job_id, "Removed job");
                Ok(())
            }
            -1 => Err(BrokerError::JobLocked(job_id.to_string())),
            _ => Err(self.not_found(job_id)),
        }
    }

    /// Delete every job in `state`. Active jobs belong to workers and
    /// cannot be cleaned.
    pub async fn clean(&self, state: JobState) -> BrokerResult<u64> {
        if state == JobState::Active {
            return Err(BrokerError::UnsupportedState(state));
        }

        let mut conn = self.conn.clone();
        let kind = if state.is_list() { "list" } else { "zset" };
        let removed: u64 = scripts::clean_state()
            .key(self.state_key(state))
            .arg(self.keys.job_prefix())
            .arg(kind)
            .invoke_async(&mut conn)
            .await?;

        info!(queue = %self.name(), %state, count = removed, "Cleaned jobs");
        Ok(removed)
    }

    /// Returns false if the queue was already paused.
    pub async fn pause(&self) -> BrokerResult<bool> {
        let mut conn = self.conn.clone();
        let changed: bool = scripts::pause()
            .key(self.keys.wait())
            .key(self.keys.paused())
            .key(self.keys.meta())
            .invoke_async(&mut conn)
            .await?;

        if changed {
            info!(queue = %self.name(), "Paused queue");
        }
        Ok(changed)
    }

    /// Returns false if the queue was not paused.
    pub async fn resume(&self) -> BrokerResult<bool> {
        let mut conn = self.conn.clone();
        let changed: bool = scripts::resume()
            .key(self.keys.wait())
            .key(self.keys.paused())
            .key(self.keys.meta())
            .key(self.keys.marker())
            .invoke_async(&mut conn)
            .await?;

        if changed {
            info!(queue = %self.name(), "Resumed queue");
        }
        Ok(changed)
    }

    /// Error for a script that found the job outside the state it acts on.
    async fn wrong_state(&self, conn: &mut C, job_id: &str, expected: JobState) -> BrokerError {
        let exists: Result<bool, redis::RedisError> = redis::cmd("EXISTS")
            .arg(self.keys.job(job_id))
            .query_async(conn)
            .await;

        match exists {
            Ok(false) => self.not_found(job_id),
            Ok(true) => BrokerError::InvalidJobState {
                job_id: job_id.to_string(),
                expected,
            },
            Err(e) => BrokerError::Redis(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bulk, bulks, FakeRedis};
    use redis::Value;
    use std::sync::Arc;

    fn orders(conn: &FakeRedis) -> QueueHandle<FakeRedis> {
        QueueHandle::new("orders", conn.clone())
    }

    fn ints(values: &[i64]) -> Value {
        Value::Array(values.iter().map(|v| Value::Int(*v)).collect())
    }

    #[test]
    fn test_open_queues_preserves_order_and_shares_connection() {
        let conn = Arc::new(());
        let names = vec!["orders".to_string(), "shipments".to_string()];

        let queues = open_queues(&conn, &names);

        assert_eq!(queues.len(), 2);
        assert_eq!(queues[0].name(), "orders");
        assert_eq!(queues[1].name(), "shipments");
        assert!(queues.iter().all(|q| Arc::ptr_eq(&q.conn, &conn)));
        // One reference held here plus one per handle, no new connections.
        assert_eq!(Arc::strong_count(&conn), 3);
    }

    #[test]
    fn test_open_queues_keeps_duplicates() {
        let conn = Arc::new(());
        let names = vec!["a".to_string(), "a".to_string(), "b".to_string()];

        let queues = open_queues(&conn, &names);

        let got: Vec<&str> = queues.iter().map(|q| q.name()).collect();
        assert_eq!(got, vec!["a", "a", "b"]);
    }

    #[test]
    fn test_state_keys() {
        let queue = QueueHandle::new("mail", ());
        assert_eq!(queue.state_key(JobState::Waiting), "bull:mail:wait");
        assert_eq!(queue.state_key(JobState::Paused), "bull:mail:paused");
        assert_eq!(
            queue.state_key(JobState::WaitingChildren),
            "bull:mail:waiting-children"
        );
    }

    #[test]
    fn test_not_found_error_names_queue_and_job() {
        let queue = QueueHandle::new("mail", ());
        let msg = queue.not_found("9").to_string();
        assert_eq!(msg, "Job 9 not found in queue mail");
    }

    #[tokio::test]
    async fn test_counts_reads_every_state_in_one_pipeline() {
        let conn = FakeRedis::new().reply(ints(&[1, 2, 3, 4, 5, 6, 7, 8]));

        let counts = orders(&conn).counts().await.unwrap();

        assert_eq!(counts.active, 1);
        assert_eq!(counts.waiting, 2);
        assert_eq!(counts.paused, 3);
        assert_eq!(counts.prioritized, 4);
        assert_eq!(counts.waiting_children, 5);
        assert_eq!(counts.delayed, 6);
        assert_eq!(counts.completed, 7);
        assert_eq!(counts.failed, 8);

        let sent = conn.sent();
        assert_eq!(sent.len(), 8);
        assert_eq!(sent[0], vec!["LLEN", "bull:orders:active"]);
        assert_eq!(sent[1], vec!["LLEN", "bull:orders:wait"]);
        assert_eq!(sent[7], vec!["ZCARD", "bull:orders:failed"]);
    }

    #[tokio::test]
    async fn test_failed_jobs_listed_newest_first() {
        let conn = FakeRedis::new()
            .reply(bulks(&["3", "2", "1"]))
            .reply(Value::Array(vec![
                bulks(&["name", "charge", "failedReason", "card declined"]),
                bulks(&["name", "charge"]),
                // Removed between the two round-trips.
                Value::Array(vec![]),
            ]));

        let jobs = orders(&conn).jobs(JobState::Failed, 0, 9).await.unwrap();

        let ids: Vec<&str> = jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);
        assert_eq!(jobs[0].failed_reason.as_deref(), Some("card declined"));

        let sent = conn.sent();
        assert_eq!(sent[0], vec!["ZREVRANGE", "bull:orders:failed", "0", "9"]);
        assert_eq!(sent[1], vec!["HGETALL", "bull:orders:3"]);
        assert_eq!(sent[3], vec!["HGETALL", "bull:orders:1"]);
    }

    #[tokio::test]
    async fn test_empty_list_skips_hash_fetch() {
        let conn = FakeRedis::new().reply(Value::Array(vec![]));

        let jobs = orders(&conn).jobs(JobState::Waiting, 0, 9).await.unwrap();

        assert!(jobs.is_empty());
        assert_eq!(conn.sent(), vec![vec!["LRANGE", "bull:orders:wait", "0", "9"]]);
    }

    #[tokio::test]
    async fn test_delayed_jobs_listed_in_score_order() {
        let conn = FakeRedis::new().reply(Value::Array(vec![]));

        orders(&conn).jobs(JobState::Delayed, 10, 19).await.unwrap();

        assert_eq!(conn.sent()[0], vec!["ZRANGE", "bull:orders:delayed", "10", "19"]);
    }

    #[tokio::test]
    async fn test_job_state_from_list_position() {
        let conn = FakeRedis::new().reply(Value::Array(vec![
            Value::Nil,
            Value::Nil,
            Value::Nil,
            Value::Nil,
            Value::Nil,
            Value::Nil,
            Value::Int(0),
            Value::Nil,
        ]));

        let state = orders(&conn).job_state("5").await.unwrap();

        assert_eq!(state, Some(JobState::Waiting));
        let sent = conn.sent();
        assert_eq!(sent[0], vec!["ZSCORE", "bull:orders:completed", "5"]);
        assert_eq!(sent[6], vec!["LPOS", "bull:orders:wait", "5"]);
    }

    #[tokio::test]
    async fn test_job_state_from_sorted_set_score() {
        let conn = FakeRedis::new().reply(Value::Array(vec![
            Value::Nil,
            bulk("1700000000000"),
            Value::Nil,
            Value::Nil,
            Value::Nil,
            Value::Nil,
            Value::Nil,
            Value::Nil,
        ]));

        let state = orders(&conn).job_state("5").await.unwrap();

        assert_eq!(state, Some(JobState::Failed));
    }

    #[tokio::test]
    async fn test_job_state_unknown() {
        let conn = FakeRedis::new().reply(Value::Array(vec![Value::Nil; 8]));
        assert_eq!(orders(&conn).job_state("5").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_job_outcomes() {
        let conn = FakeRedis::new()
            .reply(Value::Int(1))
            .reply(Value::Int(0))
            .reply(Value::Int(-1));
        let queue = orders(&conn);

        queue.remove_job("1").await.unwrap();
        assert!(matches!(
            queue.remove_job("2").await,
            Err(BrokerError::JobNotFound { job_id, .. }) if job_id == "2"
        ));
        assert!(matches!(
            queue.remove_job("3").await,
            Err(BrokerError::JobLocked(job_id)) if job_id == "3"
        ));

        let sent = conn.sent();
        assert_eq!(sent[0][0], "EVALSHA");
        // Ten keys, then the job id.
        assert_eq!(sent[0][2], "10");
        assert_eq!(sent[0][11], "bull:orders:1");
        assert_eq!(sent[0][13], "1");
    }

    #[tokio::test]
    async fn test_retry_passes_priority_keys() {
        let conn = FakeRedis::new().reply(Value::Int(1));

        orders(&conn).retry_job("4").await.unwrap();

        let sent = conn.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][2], "8");
        assert_eq!(
            &sent[0][3..11],
            &[
                "bull:orders:failed",
                "bull:orders:wait",
                "bull:orders:paused",
                "bull:orders:meta",
                "bull:orders:marker",
                "bull:orders:prioritized",
                "bull:orders:pc",
                "bull:orders:4",
            ]
        );
        assert_eq!(sent[0][11], "4");
    }

    #[tokio::test]
    async fn test_retry_of_job_in_other_state() {
        // Script moved nothing, job hash exists.
        let conn = FakeRedis::new().reply(Value::Int(0)).reply(Value::Int(1));

        let err = orders(&conn).retry_job("4").await.unwrap_err();

        assert_eq!(err.to_string(), "Job 4 is not failed");
        assert_eq!(conn.sent()[1], vec!["EXISTS", "bull:orders:4"]);
    }

    #[tokio::test]
    async fn test_promote_of_missing_job() {
        let conn = FakeRedis::new().reply(Value::Int(0)).reply(Value::Int(0));

        let err = orders(&conn).promote_job("4").await.unwrap_err();

        assert!(matches!(err, BrokerError::JobNotFound { .. }));
        assert_eq!(conn.sent()[0][3], "bull:orders:delayed");
    }

    #[tokio::test]
    async fn test_clean_active_is_refused_without_a_round_trip() {
        let conn = FakeRedis::new();

        let err = orders(&conn).clean(JobState::Active).await.unwrap_err();

        assert!(matches!(err, BrokerError::UnsupportedState(JobState::Active)));
        assert!(conn.sent().is_empty());
    }

    #[tokio::test]
    async fn test_job_logs_of_missing_job() {
        let conn = FakeRedis::new().reply(Value::Array(vec![Value::Int(0), Value::Array(vec![])]));

        let err = orders(&conn).job_logs("8").await.unwrap_err();

        assert_eq!(err.to_string(), "Job 8 not found in queue orders");
    }
}
