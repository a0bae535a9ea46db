//! Match scheduling
//!
//! This module provides the pure planning stage of a match attempt and the
//! scheduler that commits plans against the shared waiting pool.

pub mod matchmaker;
pub mod planner;

pub use matchmaker::{MatchScheduler, QueueStats, QueueStatus, SchedulerStats};
pub use planner::{plan_match, AttemptStage, MatchPlan, MatchPlanner, PlanOutcome};
