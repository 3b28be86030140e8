//! Database statistics queries.

use sqlx::SqlitePool;

use crate::error::DbResult;

/// Overall store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub rule_count: i64,
    /// Users with an infraction record
    pub tracked_users: i64,
    /// Users whose counter is above zero
    pub users_with_infractions: i64,
    pub logged_infractions: i64,
    /// Unconsumed tokens still inside their deadline
    pub pending_tokens: i64,
    pub consumed_tokens: i64,
    /// Unconsumed tokens past their deadline, awaiting a sweep
    pub expired_tokens: i64,
}

/// Get overall store statistics as of `now` (epoch seconds).
pub async fn get_stats(pool: &SqlitePool, now: i64) -> DbResult<StoreStats> {
    let rule_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM escalations")
        .fetch_one(pool)
        .await?;

    let (tracked_users, users_with_infractions): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COALESCE(SUM(CASE WHEN count > 0 THEN 1 ELSE 0 END), 0) \
         FROM user_infractions",
    )
    .fetch_one(pool)
    .await?;

    let logged_infractions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM infraction_log")
        .fetch_one(pool)
        .await?;

    let (pending_tokens, consumed_tokens, expired_tokens): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN consumed = 0 AND expires_at >= ?1 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN consumed = 1 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN consumed = 0 AND expires_at < ?1 THEN 1 ELSE 0 END), 0)
        FROM verification_states
        "#,
    )
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(StoreStats {
        rule_count,
        tracked_users,
        users_with_infractions,
        logged_infractions,
        pending_tokens,
        consumed_tokens,
        expired_tokens,
    })
}
