//! Waiting pool for participants queued for a match
//!
//! The pool indexes entries by id, by skill bucket and by wait time, and is
//! the only structure in the engine that is shared and mutated concurrently.

pub mod waiting_pool;

pub use waiting_pool::WaitingPool;
