//! Cache errors.

use thiserror::Error;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Connection, pool, or I/O failure. Callers treat this as a miss.
    #[error("cache unavailable: {0}")]
    Unavailable(String),

    #[error("cache operation timed out")]
    Timeout,

    /// The server rejected the command (e.g. INCR on a non-integer).
    #[error("cache command failed: {0}")]
    Command(String),

    #[error("cache value decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid cache configuration: {0}")]
    Config(String),
}

impl From<CacheError> for tracker_core::Error {
    fn from(err: CacheError) -> Self {
        tracker_core::Error::cache(err.to_string())
    }
}
