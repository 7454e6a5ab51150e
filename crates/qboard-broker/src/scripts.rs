//! Lua scripts for the mutating queue operations.
//!
//! Each script moves jobs between state keys in one atomic step, the same
//! way BullMQ itself does.

use redis::Script;

/// Shared by the scripts that hand jobs back to workers. Expects KEYS[2]
/// wait, KEYS[3] paused, KEYS[6] prioritized and KEYS[7] the priority
/// counter. Prioritized jobs keep their place in the prioritized set
/// whether or not the queue is paused.
const ENQUEUE: &str = r#"
local function enqueue(job_key, id, paused)
  local priority = tonumber(redis.call("HGET", job_key, "priority")) or 0
  if priority > 0 then
    local counter = redis.call("INCR", KEYS[7])
    redis.call("ZADD", KEYS[6], priority * 4294967296 + counter % 4294967296, id)
  elseif paused then
    redis.call("LPUSH", KEYS[3], id)
  else
    redis.call("LPUSH", KEYS[2], id)
  end
end
"#;

fn with_enqueue(body: &str) -> Script {
    Script::new(&format!("{ENQUEUE}{body}"))
}

/// KEYS: failed, wait, paused, meta, marker, prioritized, pc, job.
/// ARGV: job id. Returns 1 when moved, 0 when the job was not failed.
pub(crate) fn retry_job() -> Script {
    with_enqueue(
        r#"
if redis.call("ZSCORE", KEYS[1], ARGV[1]) == false then
  return 0
end
redis.call("ZREM", KEYS[1], ARGV[1])
redis.call("HDEL", KEYS[8], "finishedOn", "processedOn", "failedReason", "returnvalue")
local paused = redis.call("HEXISTS", KEYS[4], "paused") == 1
enqueue(KEYS[8], ARGV[1], paused)
if not paused then
  redis.call("ZADD", KEYS[5], 0, "0")
end
return 1
"#,
    )
}

/// KEYS: failed, wait, paused, meta, marker, prioritized, pc.
/// ARGV: job key prefix. Returns the number of jobs moved.
pub(crate) fn retry_all_failed() -> Script {
    with_enqueue(
        r#"
local ids = redis.call("ZRANGE", KEYS[1], 0, -1)
if #ids == 0 then
  return 0
end
local paused = redis.call("HEXISTS", KEYS[4], "paused") == 1
for _, id in ipairs(ids) do
  local job_key = ARGV[1] .. id
  redis.call("HDEL", job_key, "finishedOn", "processedOn", "failedReason", "returnvalue")
  enqueue(job_key, id, paused)
end
redis.call("DEL", KEYS[1])
if not paused then
  redis.call("ZADD", KEYS[5], 0, "0")
end
return #ids
"#,
    )
}

/// KEYS: delayed, wait, paused, meta, marker, prioritized, pc, job.
/// ARGV: job id. Returns 1 when promoted, 0 when the job was not delayed.
pub(crate) fn promote_job() -> Script {
    with_enqueue(
        r#"
if redis.call("ZREM", KEYS[1], ARGV[1]) == 0 then
  return 0
end
redis.call("HSET", KEYS[8], "delay", 0)
local paused = redis.call("HEXISTS", KEYS[4], "paused") == 1
enqueue(KEYS[8], ARGV[1], paused)
if not paused then
  redis.call("ZADD", KEYS[5], 0, "0")
end
return 1
"#,
    )
}

/// KEYS: delayed, wait, paused, meta, marker, prioritized, pc.
/// ARGV: job key prefix. Returns the number of jobs promoted.
pub(crate) fn promote_all_delayed() -> Script {
    with_enqueue(
        r#"
local ids = redis.call("ZRANGE", KEYS[1], 0, -1)
if #ids == 0 then
  return 0
end
local paused = redis.call("HEXISTS", KEYS[4], "paused") == 1
for _, id in ipairs(ids) do
  local job_key = ARGV[1] .. id
  redis.call("HSET", job_key, "delay", 0)
  enqueue(job_key, id, paused)
end
redis.call("DEL", KEYS[1])
if not paused then
  redis.call("ZADD", KEYS[5], 0, "0")
end
return #ids
"#,
    )
}

/// KEYS: wait, paused, active, prioritized, waiting-children, delayed,
/// completed, failed, job, logs. ARGV: job id.
/// Returns 1 when removed, 0 when missing, -1 when the job is active.
pub(crate) fn remove_job() -> Script {
    Script::new(
        r#"
if redis.call("EXISTS", KEYS[9]) == 0 then
  return 0
end
if redis.call("LPOS", KEYS[3], ARGV[1]) then
  return -1
end
redis.call("LREM", KEYS[1], 0, ARGV[1])
redis.call("LREM", KEYS[2], 0, ARGV[1])
for i = 4, 8 do
  redis.call("ZREM", KEYS[i], ARGV[1])
end
redis.call("DEL", KEYS[9], KEYS[10])
return 1
"#,
    )
}

/// KEYS: state key. ARGV: job key prefix, "list" or "zset".
/// Returns the number of jobs deleted.
pub(crate) fn clean_state() -> Script {
    Script::new(
        r#"
local ids
if ARGV[2] == "list" then
  ids = redis.call("LRANGE", KEYS[1], 0, -1)
else
  ids = redis.call("ZRANGE", KEYS[1], 0, -1)
end
for _, id in ipairs(ids) do
  redis.call("DEL", ARGV[1] .. id, ARGV[1] .. id .. ":logs")
end
redis.call("DEL", KEYS[1])
return #ids
"#,
    )
}

/// KEYS: wait, paused, meta. Returns 0 when already paused.
pub(crate) fn pause() -> Script {
    Script::new(
        r#"
if redis.call("HEXISTS", KEYS[3], "paused") == 1 then
  return 0
end
if redis.call("EXISTS", KEYS[1]) == 1 then
  redis.call("RENAME", KEYS[1], KEYS[2])
end
redis.call("HSET", KEYS[3], "paused", 1)
return 1
"#,
    )
}

/// KEYS: wait, paused, meta, marker. Returns 0 when not paused.
pub(crate) fn resume() -> Script {
    Script::new(
        r#"
if redis.call("HEXISTS", KEYS[3], "paused") == 0 then
  return 0
end
if redis.call("EXISTS", KEYS[2]) == 1 then
  redis.call("RENAME", KEYS[2], KEYS[1])
  redis.call("ZADD", KEYS[4], 0, "0")
end
redis.call("HDEL", KEYS[3], "paused")
return 1
"#,
    )
}
