//! Database query functions.
//!
//! Organized by domain:
//! - `rule`: Escalation rule CRUD
//! - `infraction`: Per-user counters and the infraction log
//! - `verification`: Single-use verification tokens
//! - `stats`: Store-wide counts

mod infraction;
mod rule;
mod stats;
mod verification;

pub use infraction::*;
pub use rule::*;
pub use stats::*;
pub use verification::*;
