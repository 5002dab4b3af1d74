//! The cache capability and its pipelined-write batch.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::CacheResult;

/// Key-value cache operations.
///
/// Every failure is a [`CacheError`](crate::CacheError); callers decide
/// whether that means a miss or fail-open.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value, with an optional expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Add `delta` (may be negative), creating the key at 0 first.
    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64>;

    /// Returns whether a timeout was set.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remaining time to live; `None` for a missing key or one without expiry.
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> CacheResult<()>;

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>>;

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>>;

    /// Returns whether the field existed.
    async fn hdel(&self, key: &str, field: &str) -> CacheResult<bool>;

    /// Values in key order; missing keys are `None`.
    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>>;

    /// Returns the number of keys removed.
    async fn mdelete(&self, keys: &[String]) -> CacheResult<u64>;

    /// Run a write batch atomically.
    async fn execute(&self, pipeline: Pipeline) -> CacheResult<PipelineReplies>;

    async fn ping(&self) -> CacheResult<()>;

    async fn incr(&self, key: &str) -> CacheResult<i64> {
        self.incr_by(key, 1).await
    }

    async fn decr(&self, key: &str) -> CacheResult<i64> {
        self.incr_by(key, -1).await
    }

    async fn decr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.incr_by(key, -delta).await
    }
}

/// JSON convenience layered over any [`Cache`].
#[async_trait]
pub trait CacheExt: Cache {
    /// Read and decode a JSON value. A value that fails to decode is a
    /// `Decode` error, not a miss.
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

/// A command inside a [`Pipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    IncrBy { key: String, delta: i64 },
    /// `only_if_unset` maps to `EXPIRE … NX` (Redis 7+).
    Expire {
        key: String,
        ttl: Duration,
        only_if_unset: bool,
    },
    Set {
        key: String,
        value: String,
        ttl: Option<Duration>,
    },
    Delete { key: String },
}

/// Index of a command's reply in [`PipelineReplies`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHandle(usize);

/// An ordered batch of writes executed as one unit.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, command: Command) -> ReplyHandle {
        self.commands.push(command);
        ReplyHandle(self.commands.len() - 1)
    }

    pub fn incr_by(&mut self, key: impl Into<String>, delta: i64) -> ReplyHandle {
        self.push(Command::IncrBy {
            key: key.into(),
            delta,
        })
    }

    pub fn incr(&mut self, key: impl Into<String>) -> ReplyHandle {
        self.incr_by(key, 1)
    }

    pub fn expire(&mut self, key: impl Into<String>, ttl: Duration) -> ReplyHandle {
        self.push(Command::Expire {
            key: key.into(),
            ttl,
            only_if_unset: false,
        })
    }

    /// Set a TTL only when the key has none yet.
    pub fn expire_nx(&mut self, key: impl Into<String>, ttl: Duration) -> ReplyHandle {
        self.push(Command::Expire {
            key: key.into(),
            ttl,
            only_if_unset: true,
        })
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: Option<Duration>,
    ) -> ReplyHandle {
        self.push(Command::Set {
            key: key.into(),
            value: value.into(),
            ttl,
        })
    }

    pub fn delete(&mut self, key: impl Into<String>) -> ReplyHandle {
        self.push(Command::Delete { key: key.into() })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// A single reply from a pipelined command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Int(i64),
    Bool(bool),
    Ok,
    Nil,
}

/// Replies of an executed [`Pipeline`], addressed by handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReplies(Vec<Reply>);

impl PipelineReplies {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self(replies)
    }

    pub fn get(&self, handle: ReplyHandle) -> Option<&Reply> {
        self.0.get(handle.0)
    }

    /// Integer reply (`INCRBY`, `DEL`).
    pub fn int(&self, handle: ReplyHandle) -> Option<i64> {
        match self.get(handle)? {
            Reply::Int(n) => Some(*n),
            Reply::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Boolean reply (`EXPIRE`).
    pub fn bool(&self, handle: ReplyHandle) -> Option<bool> {
        match self.get(handle)? {
            Reply::Bool(b) => Some(*b),
            Reply::Int(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
