//! BullMQ key layout.

/// Key prefix BullMQ uses unless told otherwise.
pub const DEFAULT_PREFIX: &str = "bull";

/// Redis keys of a single queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    name: String,
    base: String,
}

impl QueueKeys {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            base: format!("{DEFAULT_PREFIX}:{name}"),
        }
    }

    /// Queue name as registered with BullMQ.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}:{}", self.base, suffix)
    }

    pub fn wait(&self) -> String {
        self.key("wait")
    }

    pub fn paused(&self) -> String {
        self.key("paused")
    }

    pub fn active(&self) -> String {
        self.key("active")
    }

    pub fn prioritized(&self) -> String {
        self.key("prioritized")
    }

    pub fn waiting_children(&self) -> String {
        self.key("waiting-children")
    }

    pub fn delayed(&self) -> String {
        self.key("delayed")
    }

    pub fn completed(&self) -> String {
        self.key("completed")
    }

    pub fn failed(&self) -> String {
        self.key("failed")
    }

    pub fn meta(&self) -> String {
        self.key("meta")
    }

    /// Counter that orders jobs of equal priority.
    pub fn priority_counter(&self) -> String {
        self.key("pc")
    }

    /// Sorted set workers block on for new work.
    pub fn marker(&self) -> String {
        self.key("marker")
    }

    /// Prefix of every job hash, `<prefix>:<queue>:`.
    pub fn job_prefix(&self) -> String {
        format!("{}:", self.base)
    }

    pub fn job(&self, job_id: &str) -> String {
        self.key(job_id)
    }

    pub fn job_logs(&self, job_id: &str) -> String {
        format!("{}:{}:logs", self.base, job_id)
    }
}
