//! Pure matching pipeline stages
//!
//! Window selection, role assignment and team balancing operate on owned
//! snapshots and never touch the waiting pool directly.

pub mod balance;
pub mod roles;
pub mod window;

pub use balance::{BalancedTeams, TeamBalancer};
pub use roles::RoleAssigner;
pub use window::{SkillWindowSelector, WindowSelection, WindowSelector, COVERAGE_WEIGHT};
