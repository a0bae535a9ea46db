//! Match scheduler implementation
//!
//! The scheduler owns the waiting pool and drives match attempts. Each
//! attempt plans against a snapshot of the pool and then commits by taking
//! every selected participant out of the pool in one step before the match
//! is saved.

use crate::clock::Clock;
use crate::config::MatchmakingConfig;
use crate::error::{MatchmakingError, Result};
use crate::matching::WindowSelector;
use crate::metrics::MetricsCollector;
use crate::pool::WaitingPool;
use crate::scheduler::planner::{log_transition, AttemptStage, MatchPlanner, PlanOutcome};
use crate::store::MatchStore;
use crate::types::{
    FailureReason, MatchId, MatchOutcome, MatchRecord, Participant, PlayerId, Role, Skill,
    WaitingEntry,
};
use crate::utils::generate_match_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Statistics about scheduler operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    /// Total participants accepted into the pool
    pub players_enqueued: u64,
    /// Total participants that left without a match
    pub players_dequeued: u64,
    /// Total match attempts
    pub attempts: u64,
    /// Attempts that committed a match
    pub matches_created: u64,
    /// Attempts that ended with a failure reason
    pub failed_attempts: u64,
    /// Commits abandoned because a selected participant had left
    pub commit_conflicts: u64,
}

/// A single participant's place in the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub player_id: PlayerId,
    pub display_name: String,
    pub skill: Skill,
    pub primary_role: Role,
    pub secondary_role: Role,
    pub queued_at: DateTime<Utc>,
    pub wait_seconds: i64,
}

impl QueueStatus {
    pub fn from_entry(entry: &WaitingEntry, now: DateTime<Utc>) -> Self {
        Self {
            player_id: entry.participant.id.clone(),
            display_name: entry.participant.display_name.clone(),
            skill: entry.participant.skill,
            primary_role: entry.participant.primary_role,
            secondary_role: entry.participant.secondary_role,
            queued_at: entry.queued_at,
            wait_seconds: entry.wait_seconds(now),
        }
    }
}

/// Aggregate view of the waiting pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub total_players: usize,
    /// Bucket start skill to number of waiting participants
    pub skill_distribution: BTreeMap<u32, usize>,
    /// Waiting participants per primary role, every role present
    pub role_distribution: BTreeMap<Role, usize>,
    pub avg_wait_seconds: f64,
    pub max_wait_seconds: i64,
}

/// The match scheduler
pub struct MatchScheduler {
    /// Matchmaking settings
    config: MatchmakingConfig,
    /// Participants waiting for a match
    pool: Arc<WaitingPool>,
    /// Committed matches
    store: Arc<dyn MatchStore>,
    /// Time source for queue and match timestamps
    clock: Arc<dyn Clock>,
    /// Pure planning pipeline
    planner: MatchPlanner,
    /// Serializes match attempts
    attempt_lock: Mutex<()>,
    /// Scheduler statistics
    stats: RwLock<SchedulerStats>,
    /// Metrics collector for recording performance data
    metrics_collector: Arc<MetricsCollector>,
}

impl MatchScheduler {
    /// Create a new scheduler with its own metrics collector
    pub fn new(
        config: MatchmakingConfig,
        store: Arc<dyn MatchStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let metrics_collector = Arc::new(MetricsCollector::new()?);
        Self::with_metrics(config, store, clock, metrics_collector)
    }

    /// Create a new scheduler reporting to `metrics_collector`
    pub fn with_metrics(
        config: MatchmakingConfig,
        store: Arc<dyn MatchStore>,
        clock: Arc<dyn Clock>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| MatchmakingError::ConfigurationError {
                message: e.to_string(),
            })?;

        Ok(Self {
            pool: Arc::new(WaitingPool::new(config.skill_bucket_width)),
            planner: MatchPlanner::new(config.clone()),
            config,
            store,
            clock,
            attempt_lock: Mutex::new(()),
            stats: RwLock::new(SchedulerStats::default()),
            metrics_collector,
        })
    }

    /// Replace the window selection strategy
    pub fn with_selector(mut self, selector: Arc<dyn WindowSelector>) -> Self {
        self.planner = MatchPlanner::with_selector(self.config.clone(), selector);
        self
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    pub fn pool(&self) -> Arc<WaitingPool> {
        self.pool.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn update_stats(&self, update: impl FnOnce(&mut SchedulerStats)) -> Result<()> {
        let mut stats = self
            .stats
            .write()
            .map_err(|_| MatchmakingError::lock_poisoned("scheduler stats"))?;
        update(&mut stats);
        Ok(())
    }

    /// Add a participant to the waiting pool
    pub fn enqueue(&self, participant: Participant) -> Result<WaitingEntry> {
        debug!(
            "Processing enqueue - player_id: '{}', skill: {}, roles: {}/{}",
            participant.id, participant.skill, participant.primary_role, participant.secondary_role
        );

        let entry = self
            .pool
            .add(WaitingEntry::new(participant, self.clock.now()))?;
        let queue_size = self.pool.len()?;

        self.update_stats(|stats| stats.players_enqueued += 1)?;
        self.metrics_collector
            .record_enqueued(entry.skill(), queue_size);

        info!(
            "Player '{}' queued (skill: {}, queue size: {})",
            entry.player_id(),
            entry.skill(),
            queue_size
        );
        Ok(entry)
    }

    /// Remove a participant from the waiting pool, returning whether it was waiting
    pub fn dequeue(&self, player_id: &str) -> Result<bool> {
        let removed = self.pool.remove(player_id)?;
        if removed {
            let queue_size = self.pool.len()?;
            self.update_stats(|stats| stats.players_dequeued += 1)?;
            self.metrics_collector.record_dequeued(queue_size);
            info!("Player '{}' left the queue", player_id);
        } else {
            debug!("Dequeue for '{}' ignored, not in queue", player_id);
        }
        Ok(removed)
    }

    pub fn queue_size(&self) -> Result<usize> {
        self.pool.len()
    }

    /// Every waiting entry, longest waiting first
    pub fn all_waiting(&self) -> Result<Vec<WaitingEntry>> {
        self.pool.find_all()
    }

    pub fn queue_status(&self, player_id: &str) -> Result<Option<QueueStatus>> {
        let now = self.clock.now();
        Ok(self
            .pool
            .find_by_id(player_id)?
            .map(|entry| QueueStatus::from_entry(&entry, now)))
    }

    pub fn queue_stats(&self) -> Result<QueueStats> {
        let now = self.clock.now();
        let entries = self.pool.find_all()?;

        let mut role_distribution: BTreeMap<Role, usize> =
            Role::ALL.iter().map(|role| (*role, 0)).collect();
        for entry in &entries {
            *role_distribution
                .entry(entry.participant.primary_role)
                .or_default() += 1;
        }

        let waits: Vec<i64> = entries.iter().map(|e| e.wait_seconds(now)).collect();
        let avg_wait_seconds = if waits.is_empty() {
            0.0
        } else {
            waits.iter().sum::<i64>() as f64 / waits.len() as f64
        };

        Ok(QueueStats {
            total_players: entries.len(),
            skill_distribution: self.pool.bucket_distribution()?,
            role_distribution,
            avg_wait_seconds,
            max_wait_seconds: waits.iter().copied().max().unwrap_or(0),
        })
    }

    /// Run one match attempt.
    ///
    /// Attempts are serialized. A committed match has already left the pool
    /// and been saved when this returns. If saving fails the participants
    /// are put back and the error is returned.
    pub fn attempt_match(&self) -> Result<MatchOutcome> {
        let timer = self.metrics_collector.start_timer();
        let _guard = self
            .attempt_lock
            .lock()
            .map_err(|_| MatchmakingError::lock_poisoned("match attempt"))?;

        let outcome = self.run_attempt();
        self.metrics_collector
            .record_attempt_duration(timer.stop());

        match &outcome {
            Ok(MatchOutcome::Matched(_)) => self.update_stats(|stats| {
                stats.attempts += 1;
                stats.matches_created += 1;
            })?,
            Ok(MatchOutcome::Failed(reason)) => {
                self.metrics_collector.record_attempt_failed(reason);
                self.update_stats(|stats| {
                    stats.attempts += 1;
                    stats.failed_attempts += 1;
                })?;
            }
            Err(_) => self.update_stats(|stats| stats.attempts += 1)?,
        }
        outcome
    }

    fn run_attempt(&self) -> Result<MatchOutcome> {
        let max_tries = self.config.commit_retries.max(1);

        for attempt in 1..=max_tries {
            let snapshot = self.pool.find_all()?;
            let plan = match self.planner.plan(&snapshot)? {
                PlanOutcome::Ready(plan) => plan,
                PlanOutcome::Rejected(reason) => {
                    match &reason {
                        FailureReason::NotEnoughPlayers { .. } => debug!("No match: {}", reason),
                        _ => warn!("Match attempt rejected: {}", reason),
                    }
                    return Ok(MatchOutcome::Failed(reason));
                }
            };

            let taken = match self.pool.take_all(&plan.window.entries)? {
                Ok(taken) => taken,
                Err(missing) => {
                    warn!(
                        "Commit conflict on try {}/{} - players left or re-queued: {:?}",
                        attempt, max_tries, missing
                    );
                    self.update_stats(|stats| stats.commit_conflicts += 1)?;
                    continue;
                }
            };

            let now = self.clock.now();
            let record = MatchRecord::new(
                generate_match_id(),
                plan.teams.team1,
                plan.teams.team2,
                now,
            );

            if let Err(e) = self.store.save(record.clone()) {
                error!("Failed to save match {}: {}", record.id, e);
                match self.pool.restore(taken) {
                    Ok(restored) => info!(
                        "Restored {} players to the queue after failed save",
                        restored
                    ),
                    Err(restore_err) => error!(
                        "Failed to restore players after failed save: {}",
                        restore_err
                    ),
                }
                return Err(e.context(format!("Failed to save match {}", record.id)));
            }
            log_transition(AttemptStage::ValidatingThreshold, AttemptStage::Committed);

            let waits: Vec<i64> = taken.iter().map(|entry| entry.wait_seconds(now)).collect();
            self.metrics_collector.record_match_created(&record, &waits);
            self.metrics_collector.set_queue_size(self.pool.len()?);

            info!(
                "Match {} created - avg skill: {}, difference: {}, spread: {}",
                record.id, record.avg_skill, record.skill_difference, plan.window.spread
            );
            return Ok(MatchOutcome::Matched(record));
        }

        Ok(MatchOutcome::Failed(FailureReason::Contended {
            attempts: max_tries,
        }))
    }

    /// Attempt matches until one fails, returning every committed match
    pub fn drain(&self) -> Result<Vec<MatchRecord>> {
        let mut created = Vec::new();
        while let MatchOutcome::Matched(record) = self.attempt_match()? {
            created.push(record);
        }
        if !created.is_empty() {
            info!("Drained {} matches from the queue", created.len());
        }
        Ok(created)
    }

    pub fn find_match(&self, match_id: &MatchId) -> Result<Option<MatchRecord>> {
        self.store.find_by_id(match_id)
    }

    pub fn all_matches(&self) -> Result<Vec<MatchRecord>> {
        self.store.find_all()
    }

    pub fn match_count(&self) -> Result<usize> {
        self.store.count()
    }

    pub fn stats(&self) -> Result<SchedulerStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::lock_poisoned("scheduler stats"))?;
        Ok(stats.clone())
    }
}
