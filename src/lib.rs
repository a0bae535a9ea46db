//! Role Queue - role-aware matchmaking for 5v5 games
//!
//! This crate keeps a skill-indexed waiting pool and drafts balanced
//! matches from it: a tight skill window is selected, every participant is
//! given a role slot, and the group is split into two even teams.

pub mod clock;
pub mod config;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod pool;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use clock::{Clock, FixedClock, SystemClock};
pub use pool::WaitingPool;
pub use scheduler::MatchScheduler;
pub use store::{InMemoryMatchStore, MatchStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
