//! Verification token queries.

use sqlx::{Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::models::{ConsumeOutcome, VerificationState};

/// Insert a fresh, unconsumed token.
///
/// Fails with [`DbError::DuplicateToken`] if `state` already exists.
pub async fn insert_verification(
    pool: &SqlitePool,
    state: &str,
    user_id: &str,
    expires_at: i64,
    now: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO verification_states (state, user_id, expires_at, consumed, created_at)
        VALUES (?, ?, ?, 0, ?)
        "#,
    )
    .bind(state)
    .bind(user_id)
    .bind(expires_at)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DbError::DuplicateToken),
        Err(e) => Err(e.into()),
    }
}

/// Atomically consume a token.
///
/// The compare-and-swap is a single `UPDATE` guarded on `consumed = 0` and the
/// deadline, so of any number of concurrent callers at most one gets a row
/// back. When nothing matched, the row is read to report why. The read runs in
/// the same transaction as the swap, which already holds the write lock, so a
/// concurrent sweep cannot delete the row in between.
pub async fn try_consume(pool: &SqlitePool, state: &str, now: i64) -> DbResult<ConsumeOutcome> {
    let mut tx = pool.begin().await?;

    let user_id: Option<String> = sqlx::query_scalar(
        r#"
        UPDATE verification_states
        SET consumed = 1
        WHERE state = ? AND consumed = 0 AND expires_at >= ?
        RETURNING user_id
        "#,
    )
    .bind(state)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;

    if let Some(user_id) = user_id {
        tx.commit().await?;
        return Ok(ConsumeOutcome::Consumed { user_id });
    }

    let row = get_verification(&mut *tx, state).await?;
    tx.commit().await?;

    let outcome = match row {
        None => ConsumeOutcome::NotFound,
        Some(row) if row.consumed => ConsumeOutcome::AlreadyConsumed,
        Some(row) if row.is_expired_at(now) => ConsumeOutcome::Expired,
        // Unreachable while the write lock is held, kept total for the match.
        Some(_) => ConsumeOutcome::NotFound,
    };

    debug!(?outcome, "Verification consume rejected");
    Ok(outcome)
}

/// Look up a token without changing it.
pub async fn get_verification<'e, E>(
    executor: E,
    state: &str,
) -> DbResult<Option<VerificationState>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, VerificationState>(
        r#"
        SELECT state, user_id, expires_at, consumed, created_at
        FROM verification_states
        WHERE state = ?
        "#,
    )
    .bind(state)
    .fetch_optional(executor)
    .await?;

    Ok(row)
}

/// Delete tokens whose deadline has passed, consumed or not.
pub async fn delete_expired_verifications(pool: &SqlitePool, now: i64) -> DbResult<u64> {
    let result = sqlx::query("DELETE FROM verification_states WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected();
    if deleted > 0 {
        debug!("Cleaned up {} expired verification states", deleted);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WardenDb;

    #[tokio::test]
    async fn test_consume_once() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        insert_verification(pool, "tok", "user-1", 100, 0).await.unwrap();

        assert_eq!(
            try_consume(pool, "tok", 50).await.unwrap(),
            ConsumeOutcome::Consumed {
                user_id: "user-1".to_string()
            }
        );
        assert_eq!(
            try_consume(pool, "tok", 51).await.unwrap(),
            ConsumeOutcome::AlreadyConsumed
        );

        let row = get_verification(pool, "tok").await.unwrap().unwrap();
        assert!(row.consumed);
    }

    #[tokio::test]
    async fn test_deadline_is_inclusive() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        insert_verification(pool, "edge", "u", 100, 0).await.unwrap();
        insert_verification(pool, "late", "u", 100, 0).await.unwrap();

        assert!(matches!(
            try_consume(pool, "edge", 100).await.unwrap(),
            ConsumeOutcome::Consumed { .. }
        ));
        assert_eq!(
            try_consume(pool, "late", 101).await.unwrap(),
            ConsumeOutcome::Expired
        );
    }

    #[tokio::test]
    async fn test_consumed_takes_precedence_over_expired() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        insert_verification(pool, "tok", "u", 100, 0).await.unwrap();
        try_consume(pool, "tok", 10).await.unwrap();

        assert_eq!(
            try_consume(pool, "tok", 500).await.unwrap(),
            ConsumeOutcome::AlreadyConsumed
        );
    }

    #[tokio::test]
    async fn test_unknown_and_duplicate_tokens() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        assert_eq!(
            try_consume(pool, "missing", 0).await.unwrap(),
            ConsumeOutcome::NotFound
        );

        insert_verification(pool, "dup", "a", 100, 0).await.unwrap();
        let err = insert_verification(pool, "dup", "b", 100, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::DuplicateToken));

        // The original binding is untouched
        let row = get_verification(pool, "dup").await.unwrap().unwrap();
        assert_eq!(row.user_id, "a");
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        insert_verification(pool, "old", "u", 10, 0).await.unwrap();
        insert_verification(pool, "old-used", "u", 10, 0).await.unwrap();
        try_consume(pool, "old-used", 5).await.unwrap();
        insert_verification(pool, "fresh", "u", 1000, 0).await.unwrap();

        assert_eq!(delete_expired_verifications(pool, 100).await.unwrap(), 2);
        assert_eq!(delete_expired_verifications(pool, 100).await.unwrap(), 0);
        assert!(get_verification(pool, "fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_consume_racing_sweep() {
        let dir = tempfile::tempdir().unwrap();
        let db = WardenDb::open(dir.path().join("race.db")).await.unwrap();
        for i in 0..20 {
            insert_verification(db.pool(), &format!("tok-{i}"), "u", 10, 0)
                .await
                .unwrap();
        }

        let consumers = (0..20).map(|i| {
            let db = db.clone();
            tokio::spawn(async move { try_consume(db.pool(), &format!("tok-{i}"), 100).await })
        });
        let sweeper = {
            let db = db.clone();
            tokio::spawn(async move { delete_expired_verifications(db.pool(), 100).await })
        };

        for outcome in futures::future::join_all(consumers).await {
            let outcome = outcome.unwrap().unwrap();
            assert!(
                matches!(outcome, ConsumeOutcome::Expired | ConsumeOutcome::NotFound),
                "unexpected outcome {outcome:?}"
            );
        }
        sweeper.await.unwrap().unwrap();

        // Once swept, the same token reports as unknown
        assert_eq!(
            try_consume(db.pool(), "tok-0", 100).await.unwrap(),
            ConsumeOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_failed_consume_releases_connection() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        insert_verification(pool, "gone", "u", 10, 0).await.unwrap();
        assert_eq!(
            try_consume(pool, "gone", 100).await.unwrap(),
            ConsumeOutcome::Expired
        );
        // Single-connection pool: a transaction left open would block this write
        insert_verification(pool, "next", "u", 1000, 0).await.unwrap();
        assert_eq!(
            try_consume(pool, "next", 100).await.unwrap(),
            ConsumeOutcome::Consumed {
                user_id: "u".to_string()
            }
        );
    }
}
