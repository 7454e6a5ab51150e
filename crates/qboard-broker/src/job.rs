//! Job data model as stored by BullMQ.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State a job is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Active,
    Waiting,
    WaitingChildren,
    Prioritized,
    Completed,
    Failed,
    Delayed,
    Paused,
}

impl JobState {
    /// Every state, in dashboard display order.
    pub const ALL: [JobState; 8] = [
        JobState::Active,
        JobState::Waiting,
        JobState::WaitingChildren,
        JobState::Prioritized,
        JobState::Completed,
        JobState::Failed,
        JobState::Delayed,
        JobState::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Active => "active",
            JobState::Waiting => "waiting",
            JobState::WaitingChildren => "waiting-children",
            JobState::Prioritized => "prioritized",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Delayed => "delayed",
            JobState::Paused => "paused",
        }
    }

    /// States backed by a Redis list rather than a sorted set.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            JobState::Active | JobState::Waiting | JobState::Paused
        )
    }

    /// Sorted-set states listed newest first.
    pub fn newest_first(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown job state: {s}"))
    }
}

/// Number of jobs in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JobCounts {
    pub active: u64,
    pub waiting: u64,
    pub waiting_children: u64,
    pub prioritized: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
    pub paused: u64,
}

impl JobCounts {
    pub fn get(&self, state: JobState) -> u64 {
        match state {
            JobState::Active => self.active,
            JobState::Waiting => self.waiting,
            JobState::WaitingChildren => self.waiting_children,
            JobState::Prioritized => self.prioritized,
            JobState::Completed => self.completed,
            JobState::Failed => self.failed,
            JobState::Delayed => self.delayed,
            JobState::Paused => self.paused,
        }
    }

    pub fn set(&mut self, state: JobState, count: u64) {
        match state {
            JobState::Active => self.active = count,
            JobState::Waiting => self.waiting = count,
            JobState::WaitingChildren => self.waiting_children = count,
            JobState::Prioritized => self.prioritized = count,
            JobState::Completed => self.completed = count,
            JobState::Failed => self.failed = count,
            JobState::Delayed => self.delayed = count,
            JobState::Paused => self.paused = count,
        }
    }

    pub fn total(&self) -> u64 {
        JobState::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

/// A job decoded from its Redis hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub data: Value,
    pub opts: Value,
    pub progress: Value,
    /// Creation time (Unix milliseconds).
    pub timestamp: Option<i64>,
    pub delay: Option<i64>,
    pub priority: Option<i64>,
    pub processed_on: Option<i64>,
    pub finished_on: Option<i64>,
    pub attempts_made: u32,
    pub failed_reason: Option<String>,
    pub stacktrace: Vec<String>,
    pub return_value: Value,
}

impl Job {
    /// Decode a job hash. Returns `None` for an empty hash (missing job).
    pub fn from_hash(id: &str, mut hash: HashMap<String, String>) -> Option<Self> {
        if hash.is_empty() {
            return None;
        }

        let attempts_made = hash
            .remove("atm")
            .or_else(|| hash.remove("attemptsMade"))
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let stacktrace = match hash.remove("stacktrace") {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|_| vec![raw]),
            None => Vec::new(),
        };

        Some(Self {
            id: id.to_string(),
            name: hash.remove("name").unwrap_or_default(),
            data: json_field(hash.remove("data")),
            opts: json_field(hash.remove("opts")),
            progress: json_field(hash.remove("progress")),
            timestamp: int_field(hash.remove("timestamp")),
            delay: int_field(hash.remove("delay")),
            priority: int_field(hash.remove("priority")),
            processed_on: int_field(hash.remove("processedOn")),
            finished_on: int_field(hash.remove("finishedOn")),
            attempts_made,
            failed_reason: hash.remove("failedReason").filter(|r| !r.is_empty()),
            stacktrace,
            return_value: json_field(hash.remove("returnvalue")),
        })
    }
}

/// JSON text is decoded; anything else is kept verbatim as a string.
fn json_field(raw: Option<String>) -> Value {
    match raw {
        None => Value::Null,
        Some(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
    }
}

fn int_field(raw: Option<String>) -> Option<i64> {
    raw.and_then(|v| v.parse::<f64>().ok()).map(|v| v as i64)
}
