//! Per-request time budgets.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Point in time after which a request stops waiting on downstream calls.
///
/// Dropping the wrapped future is the cancellation: a store write already
/// sent may still commit, but the caller sees `REQUEST_TIMEOUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// The earlier of this deadline and `budget` from now.
    pub fn cap(self, budget: Duration) -> Self {
        let other = Instant::now() + budget;
        Self {
            at: self.at.min(other),
        }
    }

    /// Run `fut` within the remaining budget.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout_at(self.at, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }
}
