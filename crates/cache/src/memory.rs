//! In-process cache for tests and single-node development.

use async_trait::async_trait;
use moka::sync::Cache as EntryCache;
use moka::Expiry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::client::{Cache, Command, Pipeline, PipelineReplies, Reply};
use crate::error::{CacheError, CacheResult};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(now))
    }
}

/// Evicts each entry at its own `expires_at`; reads leave it alone.
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        created_at: Instant,
    ) -> Option<Duration> {
        entry.remaining(created_at)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.remaining(updated_at)
    }
}

/// A moka cache with per-entry TTLs.
///
/// Mutations are serialized under one lock so counters and pipelines stay
/// atomic. `set_available(false)` makes every call fail with
/// `Unavailable`, for exercising fail-open paths.
pub struct MemoryCache {
    entries: EntryCache<String, Entry>,
    writes: Mutex<()>,
    unavailable: AtomicBool,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            entries: EntryCache::builder().expire_after(EntryExpiry).build(),
            writes: Mutex::new(()),
            unavailable: AtomicBool::new(false),
        }
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::Relaxed);
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|(_, e)| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries still held after pending evictions have run.
    pub fn stored(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    fn check(&self) -> CacheResult<()> {
        if self.unavailable.load(Ordering::Relaxed) {
            Err(CacheError::Unavailable("memory cache marked unavailable".into()))
        } else {
            Ok(())
        }
    }

    fn live(&self, key: &str) -> Option<Entry> {
        self.entries
            .get(key)
            .filter(|e| !e.is_expired(Instant::now()))
    }

    fn read<T>(
        &self,
        key: &str,
        f: impl FnOnce(Option<Entry>) -> CacheResult<T>,
    ) -> CacheResult<T> {
        self.check()?;
        f(self.live(key))
    }

    fn write<T>(&self, f: impl FnOnce() -> CacheResult<T>) -> CacheResult<T> {
        self.check()?;
        let _guard = self.writes.lock();
        f()
    }

    fn remove(&self, key: &str) -> bool {
        let existed = self.live(key).is_some();
        self.entries.invalidate(key);
        existed
    }

    fn incr_raw(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let (current, expires_at) = match self.live(key) {
            Some(Entry {
                value: Value::Str(s),
                expires_at,
            }) => (
                s.parse::<i64>()
                    .map_err(|_| CacheError::Command("value is not an integer".into()))?,
                expires_at,
            ),
            Some(_) => return Err(wrong_type()),
            None => (0, None),
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::Command("increment would overflow".into()))?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(next.to_string()),
                expires_at,
            },
        );
        Ok(next)
    }

    fn apply(&self, command: &Command) -> CacheResult<Reply> {
        let now = Instant::now();
        match command {
            Command::IncrBy { key, delta } => self.incr_raw(key, *delta).map(Reply::Int),
            Command::Expire {
                key,
                ttl,
                only_if_unset,
            } => Ok(Reply::Bool(match self.live(key) {
                Some(entry) if *only_if_unset && entry.expires_at.is_some() => false,
                Some(mut entry) => {
                    entry.expires_at = Some(now + *ttl);
                    self.entries.insert(key.clone(), entry);
                    true
                }
                None => false,
            })),
            Command::Set { key, value, ttl } => {
                self.entries.insert(
                    key.clone(),
                    Entry {
                        value: Value::Str(value.clone()),
                        expires_at: ttl.map(|t| now + t),
                    },
                );
                Ok(Reply::Ok)
            }
            Command::Delete { key } => Ok(Reply::Int(i64::from(self.remove(key)))),
        }
    }
}

fn wrong_type() -> CacheError {
    CacheError::Command("WRONGTYPE operation against a key holding the wrong kind of value".into())
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.read(key, |entry| match entry.map(|e| e.value) {
            Some(Value::Str(s)) => Ok(Some(s)),
            Some(_) => Err(wrong_type()),
            None => Ok(None),
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        self.write(|| {
            self.apply(&Command::Set {
                key: key.to_string(),
                value: value.to_string(),
                ttl,
            })
            .map(|_| ())
        })
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.write(|| Ok(self.remove(key)))
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.read(key, |entry| Ok(entry.is_some()))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.write(|| self.incr_raw(key, delta))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.write(|| {
            let reply = self.apply(&Command::Expire {
                key: key.to_string(),
                ttl,
                only_if_unset: false,
            })?;
            Ok(reply == Reply::Bool(true))
        })
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        self.read(key, |entry| Ok(entry.and_then(|e| e.remaining(Instant::now()))))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> CacheResult<()> {
        self.write(|| {
            let mut entry = self.live(key).unwrap_or(Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::Hash(map) => {
                    map.insert(field.to_string(), value.to_string());
                }
                Value::Str(_) => return Err(wrong_type()),
            }
            self.entries.insert(key.to_string(), entry);
            Ok(())
        })
    }

    async fn hget(&self, key: &str, field: &str) -> CacheResult<Option<String>> {
        self.read(key, |entry| match entry.map(|e| e.value) {
            Some(Value::Hash(mut map)) => Ok(map.remove(field)),
            Some(Value::Str(_)) => Err(wrong_type()),
            None => Ok(None),
        })
    }

    async fn hgetall(&self, key: &str) -> CacheResult<HashMap<String, String>> {
        self.read(key, |entry| match entry.map(|e| e.value) {
            Some(Value::Hash(map)) => Ok(map),
            Some(Value::Str(_)) => Err(wrong_type()),
            None => Ok(HashMap::new()),
        })
    }

    async fn hdel(&self, key: &str, field: &str) -> CacheResult<bool> {
        self.write(|| {
            let Some(mut entry) = self.live(key) else {
                return Ok(false);
            };
            let Value::Hash(map) = &mut entry.value else {
                return Err(wrong_type());
            };
            let removed = map.remove(field).is_some();
            if map.is_empty() {
                self.entries.invalidate(key);
            } else if removed {
                self.entries.insert(key.to_string(), entry);
            }
            Ok(removed)
        })
    }

    async fn mget(&self, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        self.check()?;
        Ok(keys
            .iter()
            .map(|k| match self.live(k).map(|e| e.value) {
                Some(Value::Str(s)) => Some(s),
                _ => None,
            })
            .collect())
    }

    async fn mdelete(&self, keys: &[String]) -> CacheResult<u64> {
        self.write(|| Ok(keys.iter().filter(|k| self.remove(k)).count() as u64))
    }

    async fn execute(&self, pipeline: Pipeline) -> CacheResult<PipelineReplies> {
        // MULTI/EXEC: commands run in order under the write lock; a failed
        // command yields Nil without aborting the rest.
        self.write(|| {
            Ok(PipelineReplies::new(
                pipeline
                    .commands()
                    .iter()
                    .map(|cmd| self.apply(cmd).unwrap_or(Reply::Nil))
                    .collect(),
            ))
        })
    }

    async fn ping(&self) -> CacheResult<()> {
        self.check()
    }
}
