//! Common types used throughout the matchmaking service

use crate::error::{MatchmakingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for queued participants
pub type PlayerId = String;

/// Unique identifier for committed matches
pub type MatchId = Uuid;

/// Raw skill rating of a participant
pub type Skill = u32;

/// Role slot that every team must fill exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Top,
    Jungle,
    Mid,
    Adc,
    Support,
}

impl Role {
    /// All role slots in their fixed enumeration order
    pub const ALL: [Role; 5] = [Role::Top, Role::Jungle, Role::Mid, Role::Adc, Role::Support];

    /// Number of role slots per team
    pub const COUNT: usize = Self::ALL.len();
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Top => write!(f, "TOP"),
            Role::Jungle => write!(f, "JUNGLE"),
            Role::Mid => write!(f, "MID"),
            Role::Adc => write!(f, "ADC"),
            Role::Support => write!(f, "SUPPORT"),
        }
    }
}

/// Skill tier derived from the raw rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillTier {
    Iron,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Master,
    Grandmaster,
    Challenger,
}

impl SkillTier {
    pub fn from_skill(skill: Skill) -> Self {
        match skill {
            0..=499 => SkillTier::Iron,
            500..=999 => SkillTier::Bronze,
            1000..=1499 => SkillTier::Silver,
            1500..=1999 => SkillTier::Gold,
            2000..=2499 => SkillTier::Platinum,
            2500..=2799 => SkillTier::Diamond,
            2800..=2899 => SkillTier::Master,
            2900..=2949 => SkillTier::Grandmaster,
            _ => SkillTier::Challenger,
        }
    }
}

/// How a participant ended up in the role they were assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentKind {
    Primary,
    Secondary,
    Autofill,
}

impl AssignmentKind {
    pub const ALL: [AssignmentKind; 3] = [
        AssignmentKind::Primary,
        AssignmentKind::Secondary,
        AssignmentKind::Autofill,
    ];

    /// Label used for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentKind::Primary => "primary",
            AssignmentKind::Secondary => "secondary",
            AssignmentKind::Autofill => "autofill",
        }
    }
}

impl std::fmt::Display for AssignmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Skill penalty applied per assignment kind when computing effective skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyTable {
    pub primary: u32,
    pub secondary: u32,
    pub autofill: u32,
}

impl Default for PenaltyTable {
    fn default() -> Self {
        Self {
            primary: 0,
            secondary: 50,
            autofill: 100,
        }
    }
}

impl PenaltyTable {
    pub fn penalty(&self, kind: AssignmentKind) -> u32 {
        match kind {
            AssignmentKind::Primary => self.primary,
            AssignmentKind::Secondary => self.secondary,
            AssignmentKind::Autofill => self.autofill,
        }
    }

    /// Raw skill minus the penalty for `kind`, with no rounding
    pub fn effective_skill(&self, skill: Skill, kind: AssignmentKind) -> i64 {
        i64::from(skill) - i64::from(self.penalty(kind))
    }
}

/// A participant looking for a match. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: PlayerId,
    pub display_name: String,
    pub skill: Skill,
    pub tier: SkillTier,
    pub primary_role: Role,
    pub secondary_role: Role,
}

impl Participant {
    /// Create a participant, deriving the tier from the skill rating
    pub fn new(
        id: impl Into<PlayerId>,
        display_name: impl Into<String>,
        skill: Skill,
        primary_role: Role,
        secondary_role: Role,
    ) -> Result<Self> {
        let id = id.into();
        let display_name = display_name.into();

        if id.trim().is_empty() {
            return Err(MatchmakingError::InvalidParticipant {
                reason: "id must not be blank".to_string(),
            }
            .into());
        }
        if display_name.trim().is_empty() {
            return Err(MatchmakingError::InvalidParticipant {
                reason: format!("display name of '{}' must not be blank", id),
            }
            .into());
        }
        if primary_role == secondary_role {
            return Err(MatchmakingError::InvalidParticipant {
                reason: format!(
                    "primary and secondary role of '{}' must differ (both {})",
                    id, primary_role
                ),
            }
            .into());
        }

        Ok(Self {
            id,
            display_name,
            skill,
            tier: SkillTier::from_skill(skill),
            primary_role,
            secondary_role,
        })
    }

    /// Whether the participant lists `role` as primary or secondary
    pub fn prefers(&self, role: Role) -> bool {
        self.primary_role == role || self.secondary_role == role
    }
}

/// A participant's presence in the waiting pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingEntry {
    pub participant: Participant,
    pub queued_at: DateTime<Utc>,
}

impl WaitingEntry {
    pub fn new(participant: Participant, queued_at: DateTime<Utc>) -> Self {
        Self {
            participant,
            queued_at,
        }
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.participant.id
    }

    pub fn skill(&self) -> Skill {
        self.participant.skill
    }

    /// Whole seconds spent waiting as of `now`
    pub fn wait_seconds(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.queued_at)
            .num_seconds()
            .max(0)
    }
}

/// A participant bound to a role slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub participant: Participant,
    pub role: Role,
    pub kind: AssignmentKind,
    pub effective_skill: i64,
}

impl Assignment {
    pub fn new(
        participant: Participant,
        role: Role,
        kind: AssignmentKind,
        penalties: &PenaltyTable,
    ) -> Self {
        let effective_skill = penalties.effective_skill(participant.skill, kind);
        Self {
            participant,
            role,
            kind,
            effective_skill,
        }
    }
}

/// One side of a match, holding exactly one assignment per role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub roster: BTreeMap<Role, Assignment>,
    pub avg_skill: i64,
    pub avg_effective_skill: i64,
}

impl Team {
    /// Build a team from its assignments; averages truncate toward zero
    pub fn from_assignments(assignments: Vec<Assignment>) -> Self {
        let count = assignments.len() as i64;
        let total_skill: i64 = assignments
            .iter()
            .map(|a| i64::from(a.participant.skill))
            .sum();
        let total_effective: i64 = assignments.iter().map(|a| a.effective_skill).sum();

        let (avg_skill, avg_effective_skill) = if count == 0 {
            (0, 0)
        } else {
            (total_skill / count, total_effective / count)
        };

        let roster = assignments.into_iter().map(|a| (a.role, a)).collect();

        Self {
            roster,
            avg_skill,
            avg_effective_skill,
        }
    }

    pub fn get(&self, role: Role) -> Option<&Assignment> {
        self.roster.get(&role)
    }

    pub fn size(&self) -> usize {
        self.roster.len()
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &PlayerId> {
        self.roster.values().map(|a| &a.participant.id)
    }
}

/// A committed match. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub team1: Team,
    pub team2: Team,
    pub avg_skill: i64,
    pub skill_difference: i64,
    pub created_at: DateTime<Utc>,
}

impl MatchRecord {
    pub fn new(id: MatchId, team1: Team, team2: Team, created_at: DateTime<Utc>) -> Self {
        let avg_skill = (team1.avg_skill + team2.avg_skill) / 2;
        let skill_difference = (team1.avg_effective_skill - team2.avg_effective_skill).abs();
        Self {
            id,
            team1,
            team2,
            avg_skill,
            skill_difference,
            created_at,
        }
    }

    /// Every assignment across both teams
    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.team1.roster.values().chain(self.team2.roster.values())
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.assignments()
            .map(|a| a.participant.id.clone())
            .collect()
    }
}

/// Why a match attempt did not produce a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    NotEnoughPlayers { required: usize, available: usize },
    NoSuitableWindow,
    UnassignableRoles,
    #[serde(alias = "mmr_difference_too_high")]
    SkillDifferenceTooHigh { difference: i64, max: i64 },
    /// Selected participants kept leaving the pool before the commit
    Contended { attempts: u32 },
}

impl FailureReason {
    /// Stable label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::NotEnoughPlayers { .. } => "not_enough_players",
            FailureReason::NoSuitableWindow => "no_suitable_window",
            FailureReason::UnassignableRoles => "unassignable_roles",
            FailureReason::SkillDifferenceTooHigh { .. } => "skill_difference_too_high",
            FailureReason::Contended { .. } => "contended",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::NotEnoughPlayers {
                required,
                available,
            } => write!(
                f,
                "Not enough players in queue. Need {}, have {}",
                required, available
            ),
            FailureReason::NoSuitableWindow => write!(f, "Could not find suitable player window"),
            FailureReason::UnassignableRoles => write!(f, "Could not assign roles to players"),
            FailureReason::SkillDifferenceTooHigh { difference, max } => write!(
                f,
                "Skill difference too high: {} (max: {})",
                difference, max
            ),
            FailureReason::Contended { attempts } => write!(
                f,
                "Selected players left the queue during {} commit attempts",
                attempts
            ),
        }
    }
}

/// Result of a single match attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(MatchRecord),
    Failed(FailureReason),
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }

    pub fn into_match(self) -> Option<MatchRecord> {
        match self {
            MatchOutcome::Matched(record) => Some(record),
            MatchOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            MatchOutcome::Matched(_) => None,
            MatchOutcome::Failed(reason) => Some(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(SkillTier::from_skill(0), SkillTier::Iron);
        assert_eq!(SkillTier::from_skill(499), SkillTier::Iron);
        assert_eq!(SkillTier::from_skill(500), SkillTier::Bronze);
        assert_eq!(SkillTier::from_skill(1500), SkillTier::Gold);
        assert_eq!(SkillTier::from_skill(2799), SkillTier::Diamond);
        assert_eq!(SkillTier::from_skill(2949), SkillTier::Grandmaster);
        assert_eq!(SkillTier::from_skill(2950), SkillTier::Challenger);
        assert_eq!(SkillTier::from_skill(u32::MAX), SkillTier::Challenger);
    }

    #[test]
    fn test_participant_rejects_same_roles() {
        let result = Participant::new("p1", "Player1", 1500, Role::Mid, Role::Mid);
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::InvalidParticipant { .. })
        ));
    }

    #[test]
    fn test_participant_rejects_blank_id() {
        assert!(Participant::new("  ", "Player", 1500, Role::Mid, Role::Top).is_err());
        assert!(Participant::new("p1", "", 1500, Role::Mid, Role::Top).is_err());
    }

    #[test]
    fn test_participant_derives_tier() {
        let participant = Participant::new("p1", "Player1", 2100, Role::Adc, Role::Support).unwrap();
        assert_eq!(participant.tier, SkillTier::Platinum);
        assert!(participant.prefers(Role::Adc));
        assert!(participant.prefers(Role::Support));
        assert!(!participant.prefers(Role::Top));
    }

    #[test]
    fn test_effective_skill_can_go_negative() {
        let penalties = PenaltyTable::default();
        assert_eq!(penalties.effective_skill(1500, AssignmentKind::Primary), 1500);
        assert_eq!(penalties.effective_skill(1500, AssignmentKind::Secondary), 1450);
        assert_eq!(penalties.effective_skill(30, AssignmentKind::Autofill), -70);
    }

    #[test]
    fn test_team_averages_truncate() {
        let penalties = PenaltyTable::default();
        let assignments: Vec<Assignment> = Role::ALL
            .iter()
            .enumerate()
            .map(|(i, role)| {
                let secondary = Role::ALL[(i + 1) % Role::COUNT];
                let p = Participant::new(format!("p{}", i), "P", 1001 + i as u32, *role, secondary)
                    .unwrap();
                Assignment::new(p, *role, AssignmentKind::Primary, &penalties)
            })
            .collect();

        // 1001..=1005 sums to 5015
        let team = Team::from_assignments(assignments);
        assert_eq!(team.size(), 5);
        assert_eq!(team.avg_skill, 1003);
        assert_eq!(team.avg_effective_skill, 1003);
    }

    #[test]
    fn test_failure_reason_accepts_mmr_label() {
        let reason: FailureReason = serde_json::from_str(
            r#"{"reason":"mmr_difference_too_high","difference":120,"max":100}"#,
        )
        .unwrap();
        assert_eq!(
            reason,
            FailureReason::SkillDifferenceTooHigh {
                difference: 120,
                max: 100,
            }
        );
    }

    #[test]
    fn test_failure_reason_serializes_tagged() {
        let json = serde_json::to_value(FailureReason::SkillDifferenceTooHigh {
            difference: 120,
            max: 100,
        })
        .unwrap();
        assert_eq!(json["reason"], "skill_difference_too_high");
        assert_eq!(json["difference"], 120);
    }
}
