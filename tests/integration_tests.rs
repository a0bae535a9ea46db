//! Integration tests for the role-queue matchmaking service
//!
//! These tests drive the scheduler end to end, including:
//! - Queue uniqueness and participant conservation
//! - Role completeness and effective skill accounting
//! - Window selection and threshold enforcement
//! - Pool exhaustion and store failure recovery

mod fixtures;

use chrono::Duration;
use proptest::prelude::*;
use role_queue::{FailureReason, MatchOutcome, MatchmakingError, Role};
use std::collections::HashSet;
use std::sync::Arc;

use fixtures::{
    assert_match_well_formed, bimodal_group, create_scheduler, create_scheduler_with_store,
    enqueue_all, next_role, participant, role_balanced_group, FailingMatchStore,
};

#[test]
fn test_participant_can_only_queue_once() {
    let (scheduler, _clock) = create_scheduler(100);

    scheduler
        .enqueue(participant("p1", 1500, Role::Mid, Role::Top))
        .unwrap();
    let err = scheduler
        .enqueue(participant("p1", 1800, Role::Adc, Role::Support))
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<MatchmakingError>(),
        Some(MatchmakingError::AlreadyQueued { .. })
    ));
    assert_eq!(scheduler.queue_size().unwrap(), 1);

    // The first entry is untouched
    let status = scheduler.queue_status("p1").unwrap().unwrap();
    assert_eq!(status.skill, 1500);
    assert_eq!(status.primary_role, Role::Mid);
}

#[test]
fn test_dequeued_participant_can_requeue() {
    let (scheduler, _clock) = create_scheduler(100);

    scheduler
        .enqueue(participant("p1", 1500, Role::Mid, Role::Top))
        .unwrap();
    assert!(scheduler.dequeue("p1").unwrap());
    assert!(!scheduler.dequeue("p1").unwrap());

    scheduler
        .enqueue(participant("p1", 1500, Role::Mid, Role::Top))
        .unwrap();
    assert_eq!(scheduler.queue_size().unwrap(), 1);
}

#[test]
fn test_participants_are_conserved() {
    let (scheduler, _clock) = create_scheduler(100);
    let participants = role_balanced_group("player", 1500, 23);
    let all_ids: HashSet<String> = participants.iter().map(|p| p.id.clone()).collect();
    enqueue_all(&scheduler, participants);

    let matches = scheduler.drain().unwrap();
    assert_eq!(matches.len(), 2);

    let mut seen = HashSet::new();
    for record in &matches {
        for id in record.player_ids() {
            assert!(seen.insert(id), "participant matched twice");
        }
    }
    for entry in scheduler.all_waiting().unwrap() {
        assert!(seen.insert(entry.participant.id), "matched participant still waiting");
    }

    assert_eq!(seen, all_ids);
    assert_eq!(scheduler.queue_size().unwrap(), 3);
    assert_eq!(scheduler.match_count().unwrap(), 2);
}

#[test]
fn test_committed_match_fills_every_role() {
    let (scheduler, _clock) = create_scheduler(100);
    enqueue_all(&scheduler, role_balanced_group("player", 1500, 10));

    let record = scheduler.attempt_match().unwrap().into_match().unwrap();
    assert_match_well_formed(&record, 100);

    // Every primary is available exactly twice, so nobody is moved
    assert!(record
        .assignments()
        .all(|a| a.role == a.participant.primary_role));
}

#[test]
fn test_identical_skills_give_even_teams() {
    let (scheduler, _clock) = create_scheduler(100);
    enqueue_all(&scheduler, role_balanced_group("player", 1500, 10));

    let record = scheduler.attempt_match().unwrap().into_match().unwrap();
    assert_eq!(record.skill_difference, 0);
    assert_eq!(record.avg_skill, 1500);
    assert_eq!(record.team1.avg_effective_skill, 1500);
    assert_eq!(record.team2.avg_effective_skill, 1500);
}

#[test]
fn test_effective_skill_reflects_assignment_kind() {
    let (scheduler, _clock) = create_scheduler(1000);

    // Everyone wants MID first, so eight players fall back to their secondary
    let participants: Vec<_> = (0..10)
        .map(|i| {
            let secondary = Role::ALL[i % 4];
            let secondary = if secondary == Role::Mid {
                Role::Support
            } else {
                secondary
            };
            participant(&format!("mid_{}", i), 1500 + i as u32 * 10, Role::Mid, secondary)
        })
        .collect();
    enqueue_all(&scheduler, participants);

    let record = scheduler.attempt_match().unwrap().into_match().unwrap();
    assert_match_well_formed(&record, 1000);

    let mid_players = record
        .assignments()
        .filter(|a| a.role == Role::Mid)
        .map(|a| a.participant.skill)
        .collect::<HashSet<_>>();
    // The two strongest players get their primary
    assert_eq!(mid_players, HashSet::from([1590, 1580]));

    for assignment in record.assignments() {
        let penalty = i64::from(assignment.participant.skill) - assignment.effective_skill;
        match assignment.kind {
            role_queue::AssignmentKind::Primary => assert_eq!(penalty, 0),
            role_queue::AssignmentKind::Secondary => assert_eq!(penalty, 50),
            role_queue::AssignmentKind::Autofill => assert_eq!(penalty, 100),
        }
    }
}

#[test]
fn test_tightest_window_is_selected() {
    let (scheduler, _clock) = create_scheduler(1000);

    let skills = [
        1000, 1010, 1020, 1030, 1040, 1500, 1510, 1520, 1530, 1540, 2000, 2500,
    ];
    let participants = skills
        .iter()
        .enumerate()
        .map(|(i, skill)| {
            let primary = Role::ALL[i % Role::COUNT];
            participant(&format!("p{}", i), *skill, primary, next_role(primary))
        })
        .collect();
    enqueue_all(&scheduler, participants);

    let record = scheduler.attempt_match().unwrap().into_match().unwrap();
    let skills: Vec<u32> = record.assignments().map(|a| a.participant.skill).collect();
    let spread = skills.iter().max().unwrap() - skills.iter().min().unwrap();
    assert!(spread <= 540, "spread {} exceeds tightest window", spread);

    let waiting: HashSet<u32> = scheduler
        .all_waiting()
        .unwrap()
        .iter()
        .map(|e| e.skill())
        .collect();
    assert_eq!(waiting, HashSet::from([2000, 2500]));
}

#[test]
fn test_threshold_rejects_without_touching_pool() {
    let (scheduler, _clock) = create_scheduler(10);
    enqueue_all(&scheduler, bimodal_group(2500, 500));

    let outcome = scheduler.attempt_match().unwrap();
    assert_eq!(
        outcome,
        MatchOutcome::Failed(FailureReason::SkillDifferenceTooHigh {
            difference: 400,
            max: 10,
        })
    );
    assert_eq!(scheduler.queue_size().unwrap(), 10);
    assert_eq!(scheduler.match_count().unwrap(), 0);

    let stats = scheduler.stats().unwrap();
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.failed_attempts, 1);
}

#[test]
fn test_threshold_allows_bimodal_when_relaxed() {
    let (scheduler, _clock) = create_scheduler(400);
    enqueue_all(&scheduler, bimodal_group(2500, 500));

    let record = scheduler.attempt_match().unwrap().into_match().unwrap();
    assert_eq!(record.skill_difference, 400);
    assert_eq!(record.avg_skill, 1500);
    assert_match_well_formed(&record, 400);
}

#[test]
fn test_not_enough_players() {
    let (scheduler, _clock) = create_scheduler(100);
    enqueue_all(&scheduler, role_balanced_group("player", 1500, 9));

    let outcome = scheduler.attempt_match().unwrap();
    assert_eq!(
        outcome.failure(),
        Some(&FailureReason::NotEnoughPlayers {
            required: 10,
            available: 9,
        })
    );
}

#[test]
fn test_pool_exhaustion() {
    let (scheduler, _clock) = create_scheduler(100);
    enqueue_all(&scheduler, role_balanced_group("player", 1500, 50));

    let matches = scheduler.drain().unwrap();
    assert_eq!(matches.len(), 5);
    assert!(scheduler.all_waiting().unwrap().is_empty());

    let mut ids = HashSet::new();
    for record in &matches {
        assert_match_well_formed(record, 100);
        ids.extend(record.player_ids());
    }
    assert_eq!(ids.len(), 50);

    let match_ids: HashSet<_> = matches.iter().map(|m| m.id).collect();
    assert_eq!(match_ids.len(), 5);

    for record in &matches {
        let stored = scheduler.find_match(&record.id).unwrap().unwrap();
        assert_eq!(&stored, record);
    }
    assert!(!scheduler.attempt_match().unwrap().is_matched());
}

#[test]
fn test_failed_save_restores_participants() {
    let store = Arc::new(FailingMatchStore::new());
    let scheduler = create_scheduler_with_store(store.clone());
    enqueue_all(&scheduler, role_balanced_group("player", 1500, 10));
    let before: Vec<String> = scheduler
        .all_waiting()
        .unwrap()
        .into_iter()
        .map(|e| e.participant.id)
        .collect();

    assert!(scheduler.attempt_match().is_err());
    assert_eq!(store.save_calls(), 1);

    let after: Vec<String> = scheduler
        .all_waiting()
        .unwrap()
        .into_iter()
        .map(|e| e.participant.id)
        .collect();
    assert_eq!(before, after);
}

#[test]
fn test_wait_time_reporting() {
    let (scheduler, clock) = create_scheduler(100);

    scheduler
        .enqueue(participant("early", 1500, Role::Top, Role::Mid))
        .unwrap();
    clock.advance(Duration::seconds(45)).unwrap();
    scheduler
        .enqueue(participant("late", 1500, Role::Adc, Role::Support))
        .unwrap();
    clock.advance(Duration::seconds(15)).unwrap();

    assert_eq!(
        scheduler.queue_status("early").unwrap().unwrap().wait_seconds,
        60
    );
    assert_eq!(
        scheduler.queue_status("late").unwrap().unwrap().wait_seconds,
        15
    );
    assert!(scheduler.queue_status("missing").unwrap().is_none());

    let stats = scheduler.queue_stats().unwrap();
    assert_eq!(stats.total_players, 2);
    assert_eq!(stats.max_wait_seconds, 60);
    assert_eq!(stats.role_distribution.get(&Role::Top), Some(&1));

    let record_time = scheduler.now();
    enqueue_all(&scheduler, role_balanced_group("filler", 1500, 8));
    let record = scheduler.attempt_match().unwrap().into_match().unwrap();
    assert_eq!(record.created_at, record_time);
}

fn arb_role_pair() -> impl Strategy<Value = (Role, Role)> {
    (0..Role::COUNT, 1..Role::COUNT).prop_map(|(primary, offset)| {
        (
            Role::ALL[primary],
            Role::ALL[(primary + offset) % Role::COUNT],
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_drain_conserves_participants(
        players in prop::collection::vec((0u32..=3000, arb_role_pair()), 10..45)
    ) {
        let (scheduler, _clock) = create_scheduler(10_000);
        let participants: Vec<_> = players
            .iter()
            .enumerate()
            .map(|(i, (skill, (primary, secondary)))| {
                participant(&format!("p{}", i), *skill, *primary, *secondary)
            })
            .collect();
        let total = participants.len();
        enqueue_all(&scheduler, participants);

        let matches = scheduler.drain().unwrap();
        prop_assert_eq!(matches.len(), total / 10);
        prop_assert_eq!(scheduler.queue_size().unwrap(), total % 10);

        let mut seen = HashSet::new();
        for record in &matches {
            assert_match_well_formed(record, 10_000);
            for id in record.player_ids() {
                prop_assert!(seen.insert(id));
            }
        }
        for entry in scheduler.all_waiting().unwrap() {
            prop_assert!(seen.insert(entry.participant.id));
        }
        prop_assert_eq!(seen.len(), total);
    }

    #[test]
    fn prop_committed_difference_never_exceeds_threshold(
        skills in prop::collection::vec(0u32..=3000, 10..30),
        max_skill_difference in 0i64..300,
    ) {
        let (scheduler, _clock) = create_scheduler(max_skill_difference);
        let participants: Vec<_> = skills
            .iter()
            .enumerate()
            .map(|(i, skill)| {
                let primary = Role::ALL[i % Role::COUNT];
                participant(&format!("p{}", i), *skill, primary, next_role(primary))
            })
            .collect();
        enqueue_all(&scheduler, participants);

        for record in scheduler.drain().unwrap() {
            prop_assert!(record.skill_difference <= max_skill_difference);
        }
    }
}
