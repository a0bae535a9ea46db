//! Test fixtures and helper builders for integration testing

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use role_queue::config::MatchmakingConfig;
use role_queue::error::Result;
use role_queue::{
    FixedClock, InMemoryMatchStore, MatchId, MatchRecord, MatchScheduler, MatchStore,
    MatchmakingError, Participant, Role, Skill,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Instant every fixture clock starts at
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

/// Role following `role` in enumeration order, wrapping around
pub fn next_role(role: Role) -> Role {
    let index = Role::ALL.iter().position(|r| *r == role).unwrap();
    Role::ALL[(index + 1) % Role::COUNT]
}

pub fn participant(id: &str, skill: Skill, primary: Role, secondary: Role) -> Participant {
    Participant::new(id, format!("Player {}", id), skill, primary, secondary).unwrap()
}

/// `count` participants at `skill` whose primaries cycle through every role
pub fn role_balanced_group(prefix: &str, skill: Skill, count: usize) -> Vec<Participant> {
    (0..count)
        .map(|i| {
            let primary = Role::ALL[i % Role::COUNT];
            participant(&format!("{}_{}", prefix, i), skill, primary, next_role(primary))
        })
        .collect()
}

/// Ten participants, one high and one low per role, all on their primary
pub fn bimodal_group(high: Skill, low: Skill) -> Vec<Participant> {
    Role::ALL
        .iter()
        .flat_map(|role| {
            let secondary = next_role(*role);
            vec![
                participant(&format!("high_{}", role), high, *role, secondary),
                participant(&format!("low_{}", role), low, *role, secondary),
            ]
        })
        .collect()
}

/// Scheduler over an in-memory store and a pinned clock
pub fn create_scheduler(max_skill_difference: i64) -> (MatchScheduler, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(start_time()));
    let config = MatchmakingConfig::default().with_max_skill_difference(max_skill_difference);
    let scheduler =
        MatchScheduler::new(config, Arc::new(InMemoryMatchStore::new()), clock.clone()).unwrap();
    (scheduler, clock)
}

pub fn create_scheduler_with_store(store: Arc<dyn MatchStore>) -> MatchScheduler {
    let clock = Arc::new(FixedClock::new(start_time()));
    MatchScheduler::new(MatchmakingConfig::default(), store, clock).unwrap()
}

pub fn enqueue_all(scheduler: &MatchScheduler, participants: Vec<Participant>) {
    for participant in participants {
        scheduler.enqueue(participant).unwrap();
    }
}

/// Store that refuses every write
#[derive(Debug, Default)]
pub struct FailingMatchStore {
    save_calls: AtomicUsize,
}

impl FailingMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

impl MatchStore for FailingMatchStore {
    fn save(&self, _record: MatchRecord) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        Err(MatchmakingError::InternalError {
            message: "match store unavailable".to_string(),
        }
        .into())
    }

    fn find_by_id(&self, _match_id: &MatchId) -> Result<Option<MatchRecord>> {
        Ok(None)
    }

    fn find_all(&self) -> Result<Vec<MatchRecord>> {
        Ok(Vec::new())
    }

    fn count(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Check the structural invariants every committed match must hold
pub fn assert_match_well_formed(record: &MatchRecord, max_skill_difference: i64) {
    for team in [&record.team1, &record.team2] {
        assert_eq!(team.size(), Role::COUNT);
        for role in Role::ALL {
            let assignment = team.get(role).expect("every role filled");
            assert_eq!(assignment.role, role);
        }
    }

    let ids: HashSet<_> = record.player_ids().into_iter().collect();
    assert_eq!(ids.len(), Role::COUNT * 2, "no participant appears twice");

    let penalties = role_queue::PenaltyTable::default();
    for assignment in record.assignments() {
        assert_eq!(
            assignment.effective_skill,
            penalties.effective_skill(assignment.participant.skill, assignment.kind)
        );
    }

    assert_eq!(
        record.skill_difference,
        (record.team1.avg_effective_skill - record.team2.avg_effective_skill).abs()
    );
    assert!(record.skill_difference <= max_skill_difference);
}
