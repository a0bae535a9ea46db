//! Matchmaking engine configuration

use crate::types::{PenaltyTable, Role};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Settings consumed by the matching pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingConfig {
    /// Participants on each side
    pub players_per_team: usize,
    /// Participants drawn from the pool per match
    pub players_per_match: usize,
    /// Skill penalty per assignment kind
    pub penalties: PenaltyTable,
    /// Largest accepted difference of average effective skill between sides
    pub max_skill_difference: i64,
    /// Width of each skill bucket in the waiting pool index
    pub skill_bucket_width: u32,
    /// How often an attempt re-plans when selected players vanish before commit
    pub commit_retries: u32,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            players_per_team: 5,
            players_per_match: 10,
            penalties: PenaltyTable::default(),
            max_skill_difference: 100,
            skill_bucket_width: 100,
            commit_retries: 3,
        }
    }
}

impl MatchmakingConfig {
    /// Participants required per role slot across both sides
    pub fn players_per_role(&self) -> usize {
        self.players_per_match / Role::COUNT
    }

    /// Same configuration with a different rejection threshold
    pub fn with_max_skill_difference(mut self, max_skill_difference: i64) -> Self {
        self.max_skill_difference = max_skill_difference;
        self
    }

    /// Check internal consistency of the matchmaking settings
    pub fn validate(&self) -> Result<()> {
        if self.players_per_team != Role::COUNT {
            return Err(anyhow!(
                "players_per_team must equal the number of roles ({}), got {}",
                Role::COUNT,
                self.players_per_team
            ));
        }
        if self.players_per_match != self.players_per_team * 2 {
            return Err(anyhow!(
                "players_per_match must be twice players_per_team ({}), got {}",
                self.players_per_team * 2,
                self.players_per_match
            ));
        }
        if self.max_skill_difference < 0 {
            return Err(anyhow!("Max skill difference must not be negative"));
        }
        if self.skill_bucket_width == 0 {
            return Err(anyhow!("Skill bucket width must be greater than 0"));
        }
        if self.commit_retries == 0 {
            return Err(anyhow!("Commit retries must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MatchmakingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.players_per_role(), 2);
        assert_eq!(config.penalties.secondary, 50);
        assert_eq!(config.penalties.autofill, 100);
    }

    #[test]
    fn test_rejects_mismatched_team_sizes() {
        let config = MatchmakingConfig {
            players_per_match: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = MatchmakingConfig {
            players_per_team: 4,
            players_per_match: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_bucket_width() {
        let config = MatchmakingConfig {
            skill_bucket_width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: MatchmakingConfig = toml::from_str("max_skill_difference = 150").unwrap();
        assert_eq!(config.max_skill_difference, 150);
        assert_eq!(config.players_per_match, 10);
    }
}
