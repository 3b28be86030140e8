//! Database models.
//!
//! These structs map directly to database tables via sqlx.

mod infraction;
mod rule;
mod verification;

pub use infraction::{InfractionLogEntry, NewInfraction, UserInfractionRecord};
pub use rule::{EscalationAction, EscalationRule, EscalationRuleRow};
pub use verification::{ConsumeOutcome, VerificationState};
