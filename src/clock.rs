//! Time source used to stamp queue entries and matches
//!
//! Production code runs on [`SystemClock`]; tests pin time with [`FixedClock`]
//! so timestamps and wait times are reproducible.

use crate::error::{MatchmakingError, Result};
use crate::utils::current_timestamp;
use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;

/// Trait for anything that can tell the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        current_timestamp()
    }
}

/// Manually driven clock for deterministic tests and simulations
#[derive(Debug)]
pub struct FixedClock {
    instant: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: RwLock::new(instant),
        }
    }

    /// Move the clock to `instant`
    pub fn set(&self, instant: DateTime<Utc>) -> Result<()> {
        let mut current = self
            .instant
            .write()
            .map_err(|_| MatchmakingError::lock_poisoned("clock"))?;
        *current = instant;
        Ok(())
    }

    /// Move the clock forward by `by`
    pub fn advance(&self, by: Duration) -> Result<()> {
        let mut current = self
            .instant
            .write()
            .map_err(|_| MatchmakingError::lock_poisoned("clock"))?;
        *current += by;
        Ok(())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        // A poisoned clock still holds a valid instant
        match self.instant.read() {
            Ok(instant) => *instant,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
