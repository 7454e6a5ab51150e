//! Scripted Redis connection for tests.
//!
//! [`FakeRedis`] answers each command (or each pipeline) with the next
//! queued reply and records what was sent, so queue operations can be
//! checked without a server. Lua scripts are not run: a script call is
//! answered like any other command.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use redis::aio::ConnectionLike;
use redis::{Cmd, ErrorKind, Pipeline, RedisError, RedisFuture, RedisResult};

pub use redis::Value;

#[derive(Default)]
struct State {
    replies: VecDeque<Value>,
    sent: Vec<Vec<String>>,
}

/// A connection that replays queued replies. Clones share the queue.
#[derive(Clone, Default)]
pub struct FakeRedis {
    state: Arc<Mutex<State>>,
}

impl FakeRedis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the reply to the next command. A pipeline takes one
    /// [`Value::Array`] holding one entry per command.
    pub fn reply(self, value: Value) -> Self {
        self.state.lock().replies.push_back(value);
        self
    }

    /// Every command sent so far, as strings, pipelines flattened.
    pub fn sent(&self) -> Vec<Vec<String>> {
        self.state.lock().sent.clone()
    }

    fn next_reply(&self) -> RedisResult<Value> {
        self.state
            .lock()
            .replies
            .pop_front()
            .ok_or_else(|| RedisError::from((ErrorKind::ClientError, "no reply queued")))
    }

    fn record(&self, packed: &[u8]) {
        self.state.lock().sent.extend(unpack(packed));
    }
}

impl ConnectionLike for FakeRedis {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        self.record(&cmd.get_packed_command());
        let reply = self.next_reply();
        Box::pin(async move { reply })
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        pipeline: &'a Pipeline,
        _offset: usize,
        _count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        self.record(&pipeline.get_packed_pipeline());
        let reply = self.next_reply().and_then(|value| match value {
            Value::Array(items) => Ok(items),
            _ => Err(RedisError::from((
                ErrorKind::ClientError,
                "pipeline reply must be an array",
            ))),
        });
        Box::pin(async move { reply })
    }

    fn get_db(&self) -> i64 {
        0
    }
}

/// Bulk string reply.
pub fn bulk(text: &str) -> Value {
    Value::BulkString(text.as_bytes().to_vec())
}

/// Array of bulk strings.
pub fn bulks(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|item| bulk(item)).collect())
}

/// Split RESP-encoded commands back into their arguments.
fn unpack(packed: &[u8]) -> Vec<Vec<String>> {
    let text = String::from_utf8_lossy(packed);
    let mut lines = text.split("\r\n");
    let mut commands = Vec::new();

    while let Some(header) = lines.next() {
        let Some(count) = header.strip_prefix('*').and_then(|n| n.parse::<usize>().ok()) else {
            continue;
        };
        let args = (0..count)
            .filter_map(|_| {
                // Skip the `$<len>` line.
                lines.next();
                lines.next().map(str::to_string)
            })
            .collect();
        commands.push(args);
    }
    commands
}
