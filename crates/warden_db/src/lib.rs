//! Warden Database Layer
//!
//! SQLite-based storage for the Warden moderation core.
//!
//! # Architecture
//!
//! - **Single source of truth** - rules, infraction counters and verification
//!   tokens all live in one database; nothing else holds mutable state
//! - **Versioned migrations** - the schema evolves through embedded sqlx
//!   migrations applied once when the database is opened
//! - **Atomic primitives** - counter increments are single upserts and token
//!   consumption is a guarded `UPDATE`, so concurrent callers never lose an
//!   increment or double-consume a token
//!
//! # Usage
//!
//! ```rust,ignore
//! use warden_db::{WardenDb, queries};
//!
//! let db = WardenDb::open("path/to/warden.db").await?;
//! let count = queries::get_and_increment_count(db.pool(), "user-id", now).await?;
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod queries;

pub use connection::{DbOptions, WardenDb};
pub use error::{DbError, DbResult};

pub use models::{
    ConsumeOutcome, EscalationAction, EscalationRule, EscalationRuleRow, InfractionLogEntry,
    NewInfraction, UserInfractionRecord, VerificationState,
};
pub use queries::StoreStats;
