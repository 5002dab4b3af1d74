//! Redis-backed cache over a deadpool connection pool.

use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands, RedisResult, Value};
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::client::{Cache, Command, Pipeline, PipelineReplies, Reply};
use crate::config::RedisConfig;
use crate::error::{CacheError, CacheResult};

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            CacheError::Unavailable(err.to_string())
        } else if err.is_timeout() {
            CacheError::Timeout
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

/// Redis cache client.
#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
    timeout: Duration,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisCache")
            .field("size", &status.size)
            .field("available", &status.available)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RedisCache {
    /// Build the pool. Connections are opened lazily on first use.
    pub fn new(config: &RedisConfig) -> CacheResult<Self> {
        let timeout = config.timeout();
        let mut pool_config = PoolConfig::new(config.pool_size.max(1));
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut cfg = Config::from_url(config.url()?);
        cfg.pool = Some(pool_config);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Config(e.to_string()))?;

        debug!(
            host = %config.host,
            port = config.port,
            db = config.db,
            pool_size = config.pool_size,
            "Redis pool created"
        );

        Ok(Self { pool, timeout })
    }

    async fn conn(&self) -> CacheResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    async fn timed<T>(&self, fut: impl Future<Output = RedisResult<T>>) -> CacheResult<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout),
        }
    }
}

fn reply_from_value(value: Value) -> Reply {
    match value {
        Value::Int(n) => Reply::Int(n),
        Value::Boolean(b) => Reply::Bool(b),
        Value::Okay => Reply::Ok,
        Value::SimpleString(s) if s == "OK" => Reply::Ok,
        _ => Reply::Nil,
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = self.timed(conn.get(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        match ttl {
            Some(ttl) => {
                let _: () = self.timed(conn.set_ex(key, value, ttl_secs(ttl))).await?;
            }
            None => {
                let _: () = self.timed(conn.set(key, value)).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = self.timed(conn.del(key)).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let exists: bool = self.timed(conn.exists(key)).await?;
        Ok(exists)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let mut conn = self.conn().await?;
        let value: i64 = self.timed(conn.incr(key, delta)).await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let set: bool = self
            .timed(conn.expire(key, ttl_secs(ttl) as i64))
            .await?;
        Ok(set)
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.conn().await?;
        // -2: missing key, -1: no expiry
        let secs: i64 = self.timed(conn.ttl(key)).await?;
        Ok((secs >= 0).then(|| Duration::from_secs(secs as u64)))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: i64 = self.timed(conn.hset(key, field, value)).await?;
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        let value: Option<String> = self.timed(conn.hget(key, field)).await?;
        Ok(value)
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        let mut conn = self.conn().await?;
        let map: HashMap<String, String> = self.timed(conn.hgetall(key)).await?;
        Ok(map)
    }

    async fn hdel(&self, key: &str, field: &str) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        let removed: i64 = self.timed(conn.hdel(key, field)).await?;
        Ok(removed > 0)
    }

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("MGET");
        cmd.arg(keys);
        let values: Vec<Option<String>> = self.timed(cmd.query_async(&mut conn)).await?;
        Ok(values)
    }

    async fn mdelete(&self, keys: &[String]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let mut cmd = redis::cmd("DEL");
        cmd.arg(keys);
        let removed: u64 = self.timed(cmd.query_async(&mut conn)).await?;
        Ok(removed)
    }

    async fn execute(&self, pipeline: Pipeline) -> CacheResult<PipelineReplies> {
        if pipeline.is_empty() {
            return Ok(PipelineReplies::default());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in pipeline.commands() {
            match command {
                Command::IncrBy { key, delta } => {
                    pipe.cmd("INCRBY").arg(key).arg(*delta);
                }
                Command::Expire {
                    key,
                    ttl,
                    only_if_unset,
                } => {
                    let cmd = pipe.cmd("EXPIRE").arg(key).arg(ttl_secs(*ttl));
                    if *only_if_unset {
                        cmd.arg("NX");
                    }
                }
                Command::Set { key, value, ttl } => {
                    let cmd = pipe.cmd("SET").arg(key).arg(value);
                    if let Some(ttl) = ttl {
                        cmd.arg("EX").arg(ttl_secs(*ttl));
                    }
                }
                Command::Delete { key } => {
                    pipe.cmd("DEL").arg(key);
                }
            }
        }

        let mut conn = self.conn().await?;
        let values: Vec<Value> = self.timed(pipe.query_async(&mut conn)).await?;
        Ok(PipelineReplies::new(
            values.into_iter().map(reply_from_value).collect(),
        ))
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let pong: String = self.timed(redis::cmd("PING").query_async(&mut conn)).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(CacheError::Command(format!("unexpected PING reply: {}", pong)))
        }
    }
}
