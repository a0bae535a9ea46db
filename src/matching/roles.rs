//! Role assignment for a selected window
//!
//! Participants are placed in three passes: primary role, secondary role,
//! then autofill into whichever role still has room. Each pass walks the
//! unassigned participants from highest to lowest skill.

use crate::config::MatchmakingConfig;
use crate::types::{Assignment, AssignmentKind, Participant, PenaltyTable, Role};
use tracing::debug;

/// Assigns role slots to a full match worth of participants
#[derive(Debug, Clone)]
pub struct RoleAssigner {
    players_per_match: usize,
    players_per_role: usize,
    penalties: PenaltyTable,
}

impl RoleAssigner {
    pub fn new(players_per_match: usize, players_per_role: usize, penalties: PenaltyTable) -> Self {
        Self {
            players_per_match,
            players_per_role,
            penalties,
        }
    }

    pub fn from_config(config: &MatchmakingConfig) -> Self {
        Self::new(
            config.players_per_match,
            config.players_per_role(),
            config.penalties,
        )
    }

    /// How `role` relates to the participant's stated preferences
    pub fn kind_for(participant: &Participant, role: Role) -> AssignmentKind {
        if participant.primary_role == role {
            AssignmentKind::Primary
        } else if participant.secondary_role == role {
            AssignmentKind::Secondary
        } else {
            AssignmentKind::Autofill
        }
    }

    /// Assign every participant a role, or `None` if the group cannot be
    /// split into exactly `players_per_role` per role
    pub fn assign(&self, participants: &[Participant]) -> Option<Vec<Assignment>> {
        if participants.len() != self.players_per_match {
            debug!(
                "Role assignment needs {} participants, got {}",
                self.players_per_match,
                participants.len()
            );
            return None;
        }

        // Stable: equal skills keep input order
        let mut order: Vec<&Participant> = participants.iter().collect();
        order.sort_by(|a, b| b.skill.cmp(&a.skill));

        let mut filled = [0usize; Role::COUNT];
        let mut slots: Vec<Option<(Role, AssignmentKind)>> = vec![None; order.len()];

        for kind in AssignmentKind::ALL {
            for (slot, participant) in slots.iter_mut().zip(&order) {
                if slot.is_some() {
                    continue;
                }
                let target = match kind {
                    AssignmentKind::Primary => Some(participant.primary_role),
                    AssignmentKind::Secondary => Some(participant.secondary_role),
                    AssignmentKind::Autofill => Role::ALL
                        .into_iter()
                        .find(|role| filled[*role as usize] < self.players_per_role),
                };
                if let Some(role) = target {
                    if filled[role as usize] < self.players_per_role {
                        filled[role as usize] += 1;
                        *slot = Some((role, kind));
                    }
                }
            }
        }

        if filled.iter().any(|count| *count != self.players_per_role) {
            debug!("Role assignment left uneven roles: {:?}", filled);
            return None;
        }

        let assignments: Option<Vec<Assignment>> = slots
            .into_iter()
            .zip(order)
            .map(|(slot, participant)| {
                slot.map(|(role, kind)| {
                    Assignment::new(participant.clone(), role, kind, &self.penalties)
                })
            })
            .collect();

        if let Some(assignments) = &assignments {
            let autofilled = assignments
                .iter()
                .filter(|a| a.kind == AssignmentKind::Autofill)
                .count();
            debug!(
                "Assigned {} participants, {} autofilled",
                assignments.len(),
                autofilled
            );
        }
        assignments
    }
}

impl Default for RoleAssigner {
    fn default() -> Self {
        Self::from_config(&MatchmakingConfig::default())
    }
}
