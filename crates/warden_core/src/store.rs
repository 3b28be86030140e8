//! The persistent store seam.
//!
//! [`PolicyStore`] is everything the policy core needs from durable storage.
//! `WardenDb` implements it over SQLite, running every call under the
//! database's operation deadline.

use std::fmt::Debug;

use async_trait::async_trait;
use warden_db::{
    ConsumeOutcome, DbResult, EscalationRule, InfractionLogEntry, NewInfraction, WardenDb,
    queries,
};

/// Durable, transactional access to rules, counters and verification tokens.
///
/// `get_and_increment_count`, `record_infraction` and `try_consume` must be
/// atomic with respect to concurrent callers on the same key.
#[async_trait]
pub trait PolicyStore: Send + Sync + Debug {
    /// Read-only snapshot of all rules.
    async fn get_rules(&self) -> DbResult<Vec<EscalationRule>>;

    /// Create the user's record if absent, add one, return the new count.
    async fn get_and_increment_count(&self, user_id: &str, now: i64) -> DbResult<u64>;

    /// Add the infraction's points and log it; returns the new count.
    async fn record_infraction(&self, infraction: &NewInfraction, now: i64) -> DbResult<u64>;

    async fn get_count(&self, user_id: &str) -> DbResult<u64>;

    async fn list_infractions(&self, user_id: &str, limit: i64)
    -> DbResult<Vec<InfractionLogEntry>>;

    async fn reset_count(&self, user_id: &str, now: i64) -> DbResult<bool>;

    async fn upsert_rule(&self, rule: &EscalationRule, now: i64) -> DbResult<()>;

    async fn delete_rule(&self, name: &str) -> DbResult<bool>;

    /// Fails with `DbError::DuplicateToken` if `state` already exists.
    async fn insert_verification(
        &self,
        state: &str,
        user_id: &str,
        expires_at: i64,
        now: i64,
    ) -> DbResult<()>;

    /// Check and flip `consumed` in one atomic step.
    async fn try_consume(&self, state: &str, now: i64) -> DbResult<ConsumeOutcome>;

    async fn delete_expired_verifications(&self, now: i64) -> DbResult<u64>;
}

#[async_trait]
impl PolicyStore for WardenDb {
    async fn get_rules(&self) -> DbResult<Vec<EscalationRule>> {
        self.bounded("get_rules", queries::list_rules(self.pool()))
            .await
    }

    async fn get_and_increment_count(&self, user_id: &str, now: i64) -> DbResult<u64> {
        self.bounded(
            "get_and_increment_count",
            queries::get_and_increment_count(self.pool(), user_id, now),
        )
        .await
    }

    async fn record_infraction(&self, infraction: &NewInfraction, now: i64) -> DbResult<u64> {
        self.bounded(
            "record_infraction",
            queries::record_infraction(self.pool(), infraction, now),
        )
        .await
    }

    async fn get_count(&self, user_id: &str) -> DbResult<u64> {
        self.bounded("get_count", queries::get_count(self.pool(), user_id))
            .await
    }

    async fn list_infractions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> DbResult<Vec<InfractionLogEntry>> {
        self.bounded(
            "list_infractions",
            queries::list_infractions(self.pool(), user_id, limit),
        )
        .await
    }

    async fn reset_count(&self, user_id: &str, now: i64) -> DbResult<bool> {
        self.bounded("reset_count", queries::reset_count(self.pool(), user_id, now))
            .await
    }

    async fn upsert_rule(&self, rule: &EscalationRule, now: i64) -> DbResult<()> {
        self.bounded("upsert_rule", queries::upsert_rule(self.pool(), rule, now))
            .await
    }

    async fn delete_rule(&self, name: &str) -> DbResult<bool> {
        self.bounded("delete_rule", queries::delete_rule(self.pool(), name))
            .await
    }

    async fn insert_verification(
        &self,
        state: &str,
        user_id: &str,
        expires_at: i64,
        now: i64,
    ) -> DbResult<()> {
        self.bounded(
            "insert_verification",
            queries::insert_verification(self.pool(), state, user_id, expires_at, now),
        )
        .await
    }

    async fn try_consume(&self, state: &str, now: i64) -> DbResult<ConsumeOutcome> {
        self.bounded("try_consume", queries::try_consume(self.pool(), state, now))
            .await
    }

    async fn delete_expired_verifications(&self, now: i64) -> DbResult<u64> {
        self.bounded(
            "delete_expired_verifications",
            queries::delete_expired_verifications(self.pool(), now),
        )
        .await
    }
}
