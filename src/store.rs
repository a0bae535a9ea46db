//! Match storage interface and in-memory implementation
//!
//! Committed matches are handed to a [`MatchStore`] by the scheduler. The
//! in-memory store keeps records for the lifetime of the process only.

use crate::error::{MatchmakingError, Result};
use crate::types::{MatchId, MatchRecord};
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for match record storage operations
pub trait MatchStore: Send + Sync {
    /// Persist a committed match
    fn save(&self, record: MatchRecord) -> Result<()>;

    /// Get a match by id
    fn find_by_id(&self, match_id: &MatchId) -> Result<Option<MatchRecord>>;

    /// Get every stored match, oldest first
    fn find_all(&self) -> Result<Vec<MatchRecord>>;

    /// Number of stored matches
    fn count(&self) -> Result<usize>;
}

#[derive(Debug, Default)]
struct StoredMatches {
    records: HashMap<MatchId, MatchRecord>,
    insertion_order: Vec<MatchId>,
}

/// In-memory match storage
#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    matches: RwLock<StoredMatches>,
}

impl InMemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchStore for InMemoryMatchStore {
    fn save(&self, record: MatchRecord) -> Result<()> {
        let mut matches = self
            .matches
            .write()
            .map_err(|_| MatchmakingError::lock_poisoned("match store write"))?;

        if matches.records.insert(record.id, record.clone()).is_none() {
            matches.insertion_order.push(record.id);
        }
        Ok(())
    }

    fn find_by_id(&self, match_id: &MatchId) -> Result<Option<MatchRecord>> {
        let matches = self
            .matches
            .read()
            .map_err(|_| MatchmakingError::lock_poisoned("match store read"))?;

        Ok(matches.records.get(match_id).cloned())
    }

    fn find_all(&self) -> Result<Vec<MatchRecord>> {
        let matches = self
            .matches
            .read()
            .map_err(|_| MatchmakingError::lock_poisoned("match store read"))?;

        Ok(matches
            .insertion_order
            .iter()
            .filter_map(|id| matches.records.get(id).cloned())
            .collect())
    }

    fn count(&self) -> Result<usize> {
        let matches = self
            .matches
            .read()
            .map_err(|_| MatchmakingError::lock_poisoned("match store read"))?;

        Ok(matches.records.len())
    }
}
