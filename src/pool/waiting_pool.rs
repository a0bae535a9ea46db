//! Skill-indexed waiting pool
//!
//! Entries are held in three indices: the primary id map, fixed-width skill
//! buckets for range scans, and a wait-ordered set for "longest waiting"
//! queries. All three live behind one lock so every operation observes and
//! leaves them consistent.

use crate::error::{MatchmakingError, Result};
use crate::types::{PlayerId, Skill, WaitingEntry};
use crate::utils::bucket_index;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Position of an entry in wait order; the sequence breaks timestamp ties
type WaitKey = (DateTime<Utc>, u64, PlayerId);

#[derive(Debug, Clone)]
struct IndexedEntry {
    entry: WaitingEntry,
    seq: u64,
}

impl IndexedEntry {
    fn wait_key(&self) -> WaitKey {
        (self.entry.queued_at, self.seq, self.entry.player_id().clone())
    }
}

#[derive(Debug, Default)]
struct PoolIndex {
    entries: HashMap<PlayerId, IndexedEntry>,
    buckets: BTreeMap<u32, BTreeSet<PlayerId>>,
    wait_order: BTreeSet<WaitKey>,
    next_seq: u64,
}

impl PoolIndex {
    fn insert(&mut self, entry: WaitingEntry, bucket_width: u32) -> bool {
        let player_id = entry.player_id().clone();
        if self.entries.contains_key(&player_id) {
            return false;
        }

        let indexed = IndexedEntry {
            entry,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        self.buckets
            .entry(bucket_index(indexed.entry.skill(), bucket_width))
            .or_default()
            .insert(player_id.clone());
        self.wait_order.insert(indexed.wait_key());
        self.entries.insert(player_id, indexed);
        true
    }

    fn remove(&mut self, player_id: &str, bucket_width: u32) -> Option<WaitingEntry> {
        let indexed = self.entries.remove(player_id)?;

        let bucket = bucket_index(indexed.entry.skill(), bucket_width);
        if let Some(ids) = self.buckets.get_mut(&bucket) {
            ids.remove(player_id);
            if ids.is_empty() {
                self.buckets.remove(&bucket);
            }
        }
        self.wait_order.remove(&indexed.wait_key());

        Some(indexed.entry)
    }

    fn ordered_entries(&self) -> impl Iterator<Item = &WaitingEntry> {
        self.wait_order
            .iter()
            .filter_map(|(_, _, id)| self.entries.get(id).map(|indexed| &indexed.entry))
    }
}

/// Thread-safe store of everyone currently waiting for a match
#[derive(Debug)]
pub struct WaitingPool {
    bucket_width: u32,
    index: RwLock<PoolIndex>,
}

impl WaitingPool {
    /// Create an empty pool with the given skill bucket width
    pub fn new(bucket_width: u32) -> Self {
        Self {
            bucket_width: bucket_width.max(1),
            index: RwLock::new(PoolIndex::default()),
        }
    }

    pub fn bucket_width(&self) -> u32 {
        self.bucket_width
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, PoolIndex>> {
        self.index
            .read()
            .map_err(|_| MatchmakingError::lock_poisoned("waiting pool read").into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, PoolIndex>> {
        self.index
            .write()
            .map_err(|_| MatchmakingError::lock_poisoned("waiting pool write").into())
    }

    /// Insert an entry; fails with `AlreadyQueued` if the id is present
    pub fn add(&self, entry: WaitingEntry) -> Result<WaitingEntry> {
        let mut index = self.write()?;
        if !index.insert(entry.clone(), self.bucket_width) {
            return Err(MatchmakingError::AlreadyQueued {
                player_id: entry.player_id().clone(),
            }
            .into());
        }
        debug!(
            "Pool add - player: '{}', skill: {}, size: {}",
            entry.player_id(),
            entry.skill(),
            index.entries.len()
        );
        Ok(entry)
    }

    /// Remove an entry, returning whether it was present
    pub fn remove(&self, player_id: &str) -> Result<bool> {
        let mut index = self.write()?;
        Ok(index.remove(player_id, self.bucket_width).is_some())
    }

    /// Remove every entry in `planned`, or none of them.
    ///
    /// An entry only counts as present when the pool still holds exactly
    /// the entry that was planned with; an id that left and re-queued is a
    /// conflict. Returns the removed entries in the order given, or the
    /// conflicting ids, in which case the pool is left untouched.
    pub fn take_all(
        &self,
        planned: &[WaitingEntry],
    ) -> Result<std::result::Result<Vec<WaitingEntry>, Vec<PlayerId>>> {
        let mut index = self.write()?;

        let conflicts: Vec<PlayerId> = planned
            .iter()
            .filter(|entry| {
                index
                    .entries
                    .get(entry.player_id().as_str())
                    .map_or(true, |current| current.entry != **entry)
            })
            .map(|entry| entry.player_id().clone())
            .collect();
        if !conflicts.is_empty() {
            debug!("Commit conflict on {:?}", conflicts);
            return Ok(Err(conflicts));
        }

        let taken = planned
            .iter()
            .filter_map(|entry| index.remove(entry.player_id(), self.bucket_width))
            .collect();
        Ok(Ok(taken))
    }

    /// Put entries taken by [`take_all`](Self::take_all) back into the pool.
    ///
    /// Ids that were re-enqueued in the meantime keep their newer entry.
    pub fn restore(&self, entries: Vec<WaitingEntry>) -> Result<usize> {
        let mut index = self.write()?;
        let mut restored = 0;
        for entry in entries {
            let player_id = entry.player_id().clone();
            if index.insert(entry, self.bucket_width) {
                restored += 1;
            } else {
                warn!(
                    "Player '{}' re-queued before restore, keeping newer entry",
                    player_id
                );
            }
        }
        Ok(restored)
    }

    pub fn find_by_id(&self, player_id: &str) -> Result<Option<WaitingEntry>> {
        let index = self.read()?;
        Ok(index
            .entries
            .get(player_id)
            .map(|indexed| indexed.entry.clone()))
    }

    pub fn contains(&self, player_id: &str) -> Result<bool> {
        Ok(self.read()?.entries.contains_key(player_id))
    }

    /// Snapshot of every entry, in wait order
    pub fn find_all(&self) -> Result<Vec<WaitingEntry>> {
        let index = self.read()?;
        Ok(index.ordered_entries().cloned().collect())
    }

    /// Entries ordered by wait time, longest waiting first
    pub fn find_all_by_wait_priority(&self) -> Result<Vec<WaitingEntry>> {
        self.find_all()
    }

    pub fn find_longest_waiting(&self) -> Result<Option<WaitingEntry>> {
        let index = self.read()?;
        let first = index.ordered_entries().next().cloned();
        Ok(first)
    }

    /// Entries with `min <= skill <= max`, ordered by skill then wait order
    pub fn find_by_skill_range(&self, min: Skill, max: Skill) -> Result<Vec<WaitingEntry>> {
        if min > max {
            return Ok(Vec::new());
        }

        let index = self.read()?;
        let first = bucket_index(min, self.bucket_width);
        let last = bucket_index(max, self.bucket_width);

        let mut found: Vec<&IndexedEntry> = index
            .buckets
            .range(first..=last)
            .flat_map(|(_, ids)| ids.iter())
            .filter_map(|id| index.entries.get(id))
            .filter(|indexed| (min..=max).contains(&indexed.entry.skill()))
            .collect();
        found.sort_by_key(|indexed| (indexed.entry.skill(), indexed.wait_key()));

        Ok(found.into_iter().map(|indexed| indexed.entry.clone()).collect())
    }

    /// Up to `limit` entries within `radius` of `anchor`, closest first
    pub fn find_candidates_around(
        &self,
        anchor: Skill,
        radius: Skill,
        limit: usize,
    ) -> Result<Vec<WaitingEntry>> {
        let mut candidates =
            self.find_by_skill_range(anchor.saturating_sub(radius), anchor.saturating_add(radius))?;
        candidates.sort_by_key(|entry| entry.skill().abs_diff(anchor));
        candidates.truncate(limit);
        Ok(candidates)
    }

    /// Number of waiting entries per bucket, keyed by the bucket's lowest skill
    pub fn bucket_distribution(&self) -> Result<BTreeMap<u32, usize>> {
        let index = self.read()?;
        Ok(index
            .buckets
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(bucket, ids)| (bucket * self.bucket_width, ids.len()))
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.entries.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<()> {
        let mut index = self.write()?;
        *index = PoolIndex::default();
        Ok(())
    }
}

impl Default for WaitingPool {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Participant, Role};
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn entry(id: &str, skill: Skill, offset_secs: i64) -> WaitingEntry {
        let participant = Participant::new(id, format!("Player {}", id), skill, Role::Mid, Role::Top)
            .unwrap();
        WaitingEntry::new(participant, base_time() + Duration::seconds(offset_secs))
    }

    #[test]
    fn test_add_and_find() {
        let pool = WaitingPool::default();
        pool.add(entry("p1", 1500, 0)).unwrap();

        assert_eq!(pool.len().unwrap(), 1);
        assert!(pool.contains("p1").unwrap());
        assert_eq!(pool.find_by_id("p1").unwrap().unwrap().skill(), 1500);
        assert!(pool.find_by_id("p2").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let pool = WaitingPool::default();
        pool.add(entry("p1", 1500, 0)).unwrap();

        let err = pool.add(entry("p1", 1800, 5)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::AlreadyQueued { player_id }) if player_id == "p1"
        ));

        // Original entry is kept, not replaced
        assert_eq!(pool.len().unwrap(), 1);
        assert_eq!(pool.find_by_id("p1").unwrap().unwrap().skill(), 1500);
    }

    #[test]
    fn test_remove_updates_all_indices() {
        let pool = WaitingPool::default();
        pool.add(entry("p1", 1500, 0)).unwrap();
        pool.add(entry("p2", 1550, 1)).unwrap();

        assert!(pool.remove("p1").unwrap());
        assert!(!pool.remove("p1").unwrap());

        assert_eq!(pool.len().unwrap(), 1);
        assert_eq!(pool.find_by_skill_range(0, 3000).unwrap().len(), 1);
        assert_eq!(
            pool.find_longest_waiting().unwrap().unwrap().player_id(),
            "p2"
        );
        assert_eq!(pool.bucket_distribution().unwrap().get(&1500), Some(&1));
    }

    #[test]
    fn test_find_by_skill_range_filters_exact_bounds() {
        let pool = WaitingPool::default();
        pool.add(entry("a", 1450, 0)).unwrap();
        pool.add(entry("b", 1510, 1)).unwrap();
        pool.add(entry("c", 1590, 2)).unwrap();
        pool.add(entry("d", 1620, 3)).unwrap();

        let found: Vec<_> = pool
            .find_by_skill_range(1500, 1600)
            .unwrap()
            .into_iter()
            .map(|e| e.player_id().clone())
            .collect();
        assert_eq!(found, vec!["b", "c"]);

        assert!(pool.find_by_skill_range(1600, 1500).unwrap().is_empty());
    }

    #[test]
    fn test_longest_waiting_and_wait_order() {
        let pool = WaitingPool::default();
        pool.add(entry("late", 1500, 30)).unwrap();
        pool.add(entry("early", 1200, 0)).unwrap();
        pool.add(entry("middle", 1800, 10)).unwrap();

        assert_eq!(
            pool.find_longest_waiting().unwrap().unwrap().player_id(),
            "early"
        );
        let order: Vec<_> = pool
            .find_all_by_wait_priority()
            .unwrap()
            .into_iter()
            .map(|e| e.player_id().clone())
            .collect();
        assert_eq!(order, vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_same_timestamp_keeps_insertion_order() {
        let pool = WaitingPool::default();
        for id in ["x", "a", "m"] {
            pool.add(entry(id, 1500, 0)).unwrap();
        }
        let order: Vec<_> = pool
            .find_all()
            .unwrap()
            .into_iter()
            .map(|e| e.player_id().clone())
            .collect();
        assert_eq!(order, vec!["x", "a", "m"]);
    }

    #[test]
    fn test_bucket_distribution() {
        let pool = WaitingPool::new(100);
        pool.add(entry("a", 1500, 0)).unwrap();
        pool.add(entry("b", 1599, 1)).unwrap();
        pool.add(entry("c", 1600, 2)).unwrap();
        pool.add(entry("d", 20, 3)).unwrap();

        let distribution = pool.bucket_distribution().unwrap();
        let expected: BTreeMap<u32, usize> = [(0, 1), (1500, 2), (1600, 1)].into_iter().collect();
        assert_eq!(distribution, expected);
    }

    #[test]
    fn test_find_candidates_around() {
        let pool = WaitingPool::default();
        pool.add(entry("far", 1300, 0)).unwrap();
        pool.add(entry("near", 1490, 1)).unwrap();
        pool.add(entry("nearer", 1505, 2)).unwrap();
        pool.add(entry("mid", 1400, 3)).unwrap();

        let candidates: Vec<_> = pool
            .find_candidates_around(1500, 150, 2)
            .unwrap()
            .into_iter()
            .map(|e| e.player_id().clone())
            .collect();
        assert_eq!(candidates, vec!["nearer", "near"]);
    }

    #[test]
    fn test_take_all_is_all_or_nothing() {
        let pool = WaitingPool::default();
        let p1 = pool.add(entry("p1", 1500, 0)).unwrap();
        let p2 = pool.add(entry("p2", 1500, 1)).unwrap();
        let ghost = entry("ghost", 1500, 2);

        let planned = vec![p1, p2, ghost];
        let missing = pool.take_all(&planned).unwrap().unwrap_err();
        assert_eq!(missing, vec!["ghost".to_string()]);
        assert_eq!(pool.len().unwrap(), 2);

        let taken = pool.take_all(&planned[..2]).unwrap().unwrap();
        assert_eq!(taken.len(), 2);
        assert!(pool.is_empty().unwrap());

        assert_eq!(pool.restore(taken).unwrap(), 2);
        assert_eq!(pool.len().unwrap(), 2);
        assert_eq!(pool.find_longest_waiting().unwrap().unwrap().player_id(), "p1");
    }

    #[test]
    fn test_take_all_rejects_requeued_entry() {
        let pool = WaitingPool::default();
        let planned = vec![
            pool.add(entry("p1", 1500, 0)).unwrap(),
            pool.add(entry("p2", 1500, 1)).unwrap(),
        ];

        // p1 leaves and comes back with a different rating
        assert!(pool.remove("p1").unwrap());
        pool.add(entry("p1", 2900, 30)).unwrap();

        let conflicts = pool.take_all(&planned).unwrap().unwrap_err();
        assert_eq!(conflicts, vec!["p1".to_string()]);
        assert_eq!(pool.len().unwrap(), 2);
        assert_eq!(pool.find_by_id("p1").unwrap().unwrap().skill(), 2900);
    }

    #[test]
    fn test_restore_keeps_requeued_entry() {
        let pool = WaitingPool::default();
        let planned = vec![pool.add(entry("p1", 1500, 0)).unwrap()];
        let taken = pool.take_all(&planned).unwrap().unwrap();

        pool.add(entry("p1", 1700, 60)).unwrap();
        assert_eq!(pool.restore(taken).unwrap(), 0);
        assert_eq!(pool.find_by_id("p1").unwrap().unwrap().skill(), 1700);
    }

    #[test]
    fn test_clear() {
        let pool = WaitingPool::default();
        pool.add(entry("p1", 1500, 0)).unwrap();
        pool.clear().unwrap();
        assert!(pool.is_empty().unwrap());
        assert!(pool.bucket_distribution().unwrap().is_empty());
        assert!(pool.find_longest_waiting().unwrap().is_none());
    }

    proptest! {
        #[test]
        fn prop_indices_stay_consistent(
            ops in proptest::collection::vec((0u8..20, 0u32..3000, any::<bool>()), 1..120)
        ) {
            let pool = WaitingPool::new(100);
            let mut expected: HashMap<String, Skill> = HashMap::new();

            for (step, (id, skill, is_add)) in ops.into_iter().enumerate() {
                let id = format!("p{}", id);
                if is_add {
                    let added = pool.add(entry(&id, skill, step as i64)).is_ok();
                    prop_assert_eq!(added, !expected.contains_key(&id));
                    expected.entry(id).or_insert(skill);
                } else {
                    let removed = pool.remove(&id).unwrap();
                    prop_assert_eq!(removed, expected.remove(&id).is_some());
                }
            }

            prop_assert_eq!(pool.len().unwrap(), expected.len());
            prop_assert_eq!(pool.find_all().unwrap().len(), expected.len());
            prop_assert_eq!(pool.find_by_skill_range(0, u32::MAX).unwrap().len(), expected.len());

            let bucketed: usize = pool.bucket_distribution().unwrap().values().sum();
            prop_assert_eq!(bucketed, expected.len());

            for (id, skill) in &expected {
                let found = pool.find_by_skill_range(*skill, *skill).unwrap();
                prop_assert!(found.iter().any(|e| e.player_id() == id));
            }
        }
    }
}
