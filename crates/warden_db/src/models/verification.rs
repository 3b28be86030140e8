//! Verification token models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A stored verification token.
///
/// `EXPIRED` is never stored; it is derived from `expires_at` at read time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct VerificationState {
    /// Opaque random token, primary identity
    pub state: String,
    /// The user this token authorizes
    pub user_id: String,
    /// Epoch seconds after which the token is unusable
    pub expires_at: i64,
    /// Once true, never reverts
    pub consumed: bool,
    pub created_at: i64,
}

impl VerificationState {
    /// Whether the token is past its deadline at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// Result of an atomic consume attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// This call flipped `consumed` to true.
    Consumed { user_id: String },
    /// No row exists for the token.
    NotFound,
    /// Already consumed. Reported even if the token has also expired.
    AlreadyConsumed,
    /// Unconsumed but past `expires_at`.
    Expired,
}
