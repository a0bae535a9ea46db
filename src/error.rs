//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

use crate::types::Role;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Player {player_id} is already in queue")]
    AlreadyQueued { player_id: String },

    #[error("Invalid participant: {reason}")]
    InvalidParticipant { reason: String },

    #[error("Role {role} received {count} assignments, expected exactly {expected}")]
    InvalidGroupSize {
        role: Role,
        count: usize,
        expected: usize,
    },

    #[error("Match not found: {match_id}")]
    MatchNotFound { match_id: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Error for a poisoned lock guarding `what`
    pub(crate) fn lock_poisoned(what: &str) -> Self {
        MatchmakingError::InternalError {
            message: format!("Failed to acquire {} lock", what),
        }
    }
}
