//! Infraction counter queries.
//!
//! Counter updates are single upsert statements with `RETURNING`, so
//! concurrent increments for the same user serialize inside SQLite and no
//! update is lost.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::models::{InfractionLogEntry, NewInfraction, UserInfractionRecord};

const UPSERT_COUNT: &str = r#"
    INSERT INTO user_infractions (user_id, count, updated_at)
    VALUES (?, ?, ?)
    ON CONFLICT (user_id) DO UPDATE SET
        count = count + excluded.count,
        updated_at = excluded.updated_at
    RETURNING count
"#;

/// Atomically create-or-increment a user's counter by one and return the new count.
pub async fn get_and_increment_count(pool: &SqlitePool, user_id: &str, now: i64) -> DbResult<u64> {
    let count: i64 = sqlx::query_scalar(UPSERT_COUNT)
        .bind(user_id)
        .bind(1_i64)
        .bind(now)
        .fetch_one(pool)
        .await?;

    Ok(count as u64)
}

/// Record an infraction: add its points to the counter and append it to the log.
///
/// Both writes happen in one transaction. The counter upsert runs first so the
/// transaction takes the write lock before reading anything. An infraction
/// must add at least one point.
pub async fn record_infraction(
    pool: &SqlitePool,
    infraction: &NewInfraction,
    now: i64,
) -> DbResult<u64> {
    if infraction.points == 0 {
        return Err(DbError::invalid_data(format!(
            "infraction '{}' for {} adds no points",
            infraction.kind, infraction.user_id
        )));
    }

    let mut tx = pool.begin().await?;

    let count: i64 = sqlx::query_scalar(UPSERT_COUNT)
        .bind(&infraction.user_id)
        .bind(i64::from(infraction.points))
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO infraction_log (user_id, kind, points, reason, moderator, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&infraction.user_id)
    .bind(&infraction.kind)
    .bind(i64::from(infraction.points))
    .bind(&infraction.reason)
    .bind(&infraction.moderator)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    debug!(
        user_id = %infraction.user_id,
        kind = %infraction.kind,
        points = infraction.points,
        count,
        "Recorded infraction"
    );

    Ok(count as u64)
}

/// Current count for a user; zero if they have no record.
pub async fn get_count(pool: &SqlitePool, user_id: &str) -> DbResult<u64> {
    let count: Option<i64> =
        sqlx::query_scalar("SELECT count FROM user_infractions WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(count.unwrap_or(0) as u64)
}

/// Full counter record for a user.
pub async fn get_record(
    pool: &SqlitePool,
    user_id: &str,
) -> DbResult<Option<UserInfractionRecord>> {
    let record = sqlx::query_as::<_, UserInfractionRecord>(
        "SELECT user_id, count, updated_at FROM user_infractions WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Zero a user's counter and clear their infraction log.
///
/// Returns whether the user had a record.
pub async fn reset_count(pool: &SqlitePool, user_id: &str, now: i64) -> DbResult<bool> {
    let mut tx = pool.begin().await?;

    let updated =
        sqlx::query("UPDATE user_infractions SET count = 0, updated_at = ? WHERE user_id = ?")
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM infraction_log WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(updated > 0)
}

/// Most recent infractions for a user, newest first.
pub async fn list_infractions(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> DbResult<Vec<InfractionLogEntry>> {
    let entries = sqlx::query_as::<_, InfractionLogEntry>(
        r#"
        SELECT id, user_id, kind, points, reason, moderator, created_at
        FROM infraction_log
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{DbOptions, WardenDb};

    fn infraction(user_id: &str, kind: &str, points: u32) -> NewInfraction {
        NewInfraction {
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            points,
            reason: Some("test".to_string()),
            moderator: None,
        }
    }

    #[tokio::test]
    async fn test_increment_creates_lazily() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        assert_eq!(get_count(pool, "u1").await.unwrap(), 0);
        assert!(get_record(pool, "u1").await.unwrap().is_none());

        assert_eq!(get_and_increment_count(pool, "u1", 10).await.unwrap(), 1);
        assert_eq!(get_and_increment_count(pool, "u1", 11).await.unwrap(), 2);
        assert_eq!(get_and_increment_count(pool, "u2", 12).await.unwrap(), 1);

        let record = get_record(pool, "u1").await.unwrap().unwrap();
        assert_eq!(record.count, 2);
        assert_eq!(record.updated_at, 11);
    }

    #[tokio::test]
    async fn test_record_infraction_logs_and_weights() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        assert_eq!(
            record_infraction(pool, &infraction("u1", "spam", 1), 1).await.unwrap(),
            1
        );
        assert_eq!(
            record_infraction(pool, &infraction("u1", "slur", 5), 2).await.unwrap(),
            6
        );

        let log = list_infractions(pool, "u1", 10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, "slur");
        assert_eq!(log[0].points, 5);
        assert_eq!(log[1].kind, "spam");
    }

    #[tokio::test]
    async fn test_zero_point_infraction_is_rejected() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        let err = record_infraction(pool, &infraction("u1", "noise", 0), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidData { .. }));
        assert!(get_record(pool, "u1").await.unwrap().is_none());
        assert!(list_infractions(pool, "u1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_clears_counter_and_log() {
        let db = WardenDb::open_in_memory().await.unwrap();
        let pool = db.pool();

        record_infraction(pool, &infraction("u1", "spam", 3), 1)
            .await
            .unwrap();
        assert!(reset_count(pool, "u1", 2).await.unwrap());
        assert_eq!(get_count(pool, "u1").await.unwrap(), 0);
        assert!(list_infractions(pool, "u1", 10).await.unwrap().is_empty());

        // Counting resumes from zero
        assert_eq!(get_and_increment_count(pool, "u1", 3).await.unwrap(), 1);

        assert!(!reset_count(pool, "nobody", 4).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let db = WardenDb::open_with(dir.path().join("count.db"), DbOptions::default())
            .await
            .unwrap();

        let tasks = (0..40).map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                record_infraction(db.pool(), &infraction("racer", "spam", 1), i)
                    .await
                    .unwrap()
            })
        });
        let mut counts: Vec<u64> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        counts.sort_unstable();

        assert_eq!(get_count(db.pool(), "racer").await.unwrap(), 40);
        // Every caller observed a distinct count
        assert_eq!(counts, (1..=40).collect::<Vec<u64>>());
    }
}
