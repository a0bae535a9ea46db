//! Pure planning stage of a match attempt
//!
//! The planner turns a pool snapshot into either a ready-to-commit plan or a
//! typed rejection. It reads nothing but its inputs, so the same snapshot
//! and configuration always give the same plan.

use crate::config::MatchmakingConfig;
use crate::error::Result;
use crate::matching::{
    BalancedTeams, RoleAssigner, SkillWindowSelector, TeamBalancer, WindowSelection,
    WindowSelector,
};
use crate::types::{FailureReason, Participant, PlayerId, WaitingEntry};
use std::sync::Arc;
use tracing::debug;

/// Stages a match attempt moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStage {
    Idle,
    SelectingWindow,
    AssigningRoles,
    Balancing,
    ValidatingThreshold,
    Committed,
    Rejected,
}

impl std::fmt::Display for AttemptStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AttemptStage::Idle => "idle",
            AttemptStage::SelectingWindow => "selecting_window",
            AttemptStage::AssigningRoles => "assigning_roles",
            AttemptStage::Balancing => "balancing",
            AttemptStage::ValidatingThreshold => "validating_threshold",
            AttemptStage::Committed => "committed",
            AttemptStage::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

pub(crate) fn log_transition(from: AttemptStage, to: AttemptStage) {
    debug!("Match attempt {} -> {}", from, to);
}

/// A plan that passed every check and is ready to commit
#[derive(Debug, Clone)]
pub struct MatchPlan {
    pub window: WindowSelection,
    pub teams: BalancedTeams,
}

impl MatchPlan {
    /// Ids of every participant the plan would consume
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.window
            .entries
            .iter()
            .map(|entry| entry.player_id().clone())
            .collect()
    }
}

/// Result of planning against one snapshot
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    Ready(MatchPlan),
    Rejected(FailureReason),
}

/// Runs window selection, role assignment, balancing and the threshold check
#[derive(Clone)]
pub struct MatchPlanner {
    config: MatchmakingConfig,
    selector: Arc<dyn WindowSelector>,
    assigner: RoleAssigner,
    balancer: TeamBalancer,
}

impl MatchPlanner {
    pub fn new(config: MatchmakingConfig) -> Self {
        Self::with_selector(config, Arc::new(SkillWindowSelector::new()))
    }

    /// Create a planner using a custom window selection strategy
    pub fn with_selector(config: MatchmakingConfig, selector: Arc<dyn WindowSelector>) -> Self {
        let assigner = RoleAssigner::from_config(&config);
        Self {
            config,
            selector,
            assigner,
            balancer: TeamBalancer::new(),
        }
    }

    pub fn config(&self) -> &MatchmakingConfig {
        &self.config
    }

    /// Plan a match from `snapshot`.
    ///
    /// Rejections are returned as values. An `Err` means the balancer was
    /// handed an uneven role split, which the assigner never produces.
    pub fn plan(&self, snapshot: &[WaitingEntry]) -> Result<PlanOutcome> {
        let required = self.config.players_per_match;
        if snapshot.len() < required {
            log_transition(AttemptStage::Idle, AttemptStage::Rejected);
            return Ok(PlanOutcome::Rejected(FailureReason::NotEnoughPlayers {
                required,
                available: snapshot.len(),
            }));
        }

        log_transition(AttemptStage::Idle, AttemptStage::SelectingWindow);
        let Some(window) = self.selector.find_best_window(
            snapshot,
            required,
            self.config.players_per_role(),
        ) else {
            log_transition(AttemptStage::SelectingWindow, AttemptStage::Rejected);
            return Ok(PlanOutcome::Rejected(FailureReason::NoSuitableWindow));
        };

        log_transition(AttemptStage::SelectingWindow, AttemptStage::AssigningRoles);
        let participants: Vec<Participant> = window
            .entries
            .iter()
            .map(|entry| entry.participant.clone())
            .collect();
        let Some(assignments) = self.assigner.assign(&participants) else {
            log_transition(AttemptStage::AssigningRoles, AttemptStage::Rejected);
            return Ok(PlanOutcome::Rejected(FailureReason::UnassignableRoles));
        };

        log_transition(AttemptStage::AssigningRoles, AttemptStage::Balancing);
        let teams = self.balancer.balance(assignments)?;

        log_transition(AttemptStage::Balancing, AttemptStage::ValidatingThreshold);
        if teams.skill_difference > self.config.max_skill_difference {
            log_transition(AttemptStage::ValidatingThreshold, AttemptStage::Rejected);
            return Ok(PlanOutcome::Rejected(
                FailureReason::SkillDifferenceTooHigh {
                    difference: teams.skill_difference,
                    max: self.config.max_skill_difference,
                },
            ));
        }

        Ok(PlanOutcome::Ready(MatchPlan { window, teams }))
    }
}

/// Plan a match with the default window selector
pub fn plan_match(snapshot: &[WaitingEntry], config: &MatchmakingConfig) -> Result<PlanOutcome> {
    MatchPlanner::new(config.clone()).plan(snapshot)
}
