//! Splitting role-bound assignments into two sides
//!
//! The balancer runs a greedy snake draft. Roles with the widest internal
//! skill gap are placed first, and each role's stronger member goes to
//! whichever side is currently behind.

use crate::error::{MatchmakingError, Result};
use crate::types::{Assignment, Role, Team};
use std::collections::BTreeMap;
use tracing::debug;

/// Two sides produced by the balancer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancedTeams {
    pub team1: Team,
    pub team2: Team,
    /// `|team1.avg_effective_skill - team2.avg_effective_skill|`
    pub skill_difference: i64,
}

/// Members drafted per role, one for each side
const PAIR_SIZE: usize = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct TeamBalancer;

impl TeamBalancer {
    pub fn new() -> Self {
        Self
    }

    /// Split `assignments` into two teams holding one member of each role.
    ///
    /// Fails with `InvalidGroupSize` when any role does not hold exactly
    /// two assignments.
    pub fn balance(&self, assignments: Vec<Assignment>) -> Result<BalancedTeams> {
        let mut by_role: BTreeMap<Role, Vec<Assignment>> =
            Role::ALL.iter().map(|role| (*role, Vec::new())).collect();
        for assignment in assignments {
            by_role.entry(assignment.role).or_default().push(assignment);
        }

        for (role, members) in &by_role {
            if members.len() != PAIR_SIZE {
                return Err(MatchmakingError::InvalidGroupSize {
                    role: *role,
                    count: members.len(),
                    expected: PAIR_SIZE,
                }
                .into());
            }
        }

        // Widest gap first; stable sort keeps role order on ties
        let mut pairs: Vec<(Role, Vec<Assignment>)> = by_role.into_iter().collect();
        pairs.sort_by_key(|(_, members)| {
            std::cmp::Reverse((members[0].effective_skill - members[1].effective_skill).abs())
        });

        let mut team1 = Vec::with_capacity(Role::COUNT);
        let mut team2 = Vec::with_capacity(Role::COUNT);
        let mut team1_total: i64 = 0;
        let mut team2_total: i64 = 0;

        for (role, mut members) in pairs {
            members.sort_by(|a, b| b.effective_skill.cmp(&a.effective_skill));
            let mut members = members.into_iter();
            let (Some(stronger), Some(weaker)) = (members.next(), members.next()) else {
                continue;
            };

            let (to_team1, to_team2) = if team1_total <= team2_total {
                (stronger, weaker)
            } else {
                (weaker, stronger)
            };
            debug!(
                "Draft {} - team1: '{}' ({}), team2: '{}' ({})",
                role,
                to_team1.participant.id,
                to_team1.effective_skill,
                to_team2.participant.id,
                to_team2.effective_skill
            );

            team1_total += to_team1.effective_skill;
            team2_total += to_team2.effective_skill;
            team1.push(to_team1);
            team2.push(to_team2);
        }

        let team1 = Team::from_assignments(team1);
        let team2 = Team::from_assignments(team2);
        let skill_difference = (team1.avg_effective_skill - team2.avg_effective_skill).abs();

        Ok(BalancedTeams {
            team1,
            team2,
            skill_difference,
        })
    }
}
