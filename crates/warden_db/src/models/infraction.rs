//! Infraction counter and log models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A user's running infraction count.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserInfractionRecord {
    pub user_id: String,
    pub count: i64,
    /// Epoch seconds of the last change
    pub updated_at: i64,
}

/// One recorded infraction.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct InfractionLogEntry {
    pub id: i64,
    pub user_id: String,
    /// Infraction kind label (e.g. "spam", "toxicity")
    pub kind: String,
    /// Points this infraction added to the counter
    pub points: i64,
    pub reason: Option<String>,
    /// Who recorded it; `None` for automated detections
    pub moderator: Option<String>,
    pub created_at: i64,
}

/// Input for recording an infraction.
#[derive(Debug, Clone)]
pub struct NewInfraction {
    pub user_id: String,
    pub kind: String,
    pub points: u32,
    pub reason: Option<String>,
    pub moderator: Option<String>,
}
