//! Escalation rule queries.

use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use crate::models::{EscalationRule, EscalationRuleRow};

/// Load every configured rule, ordered by threshold then name.
pub async fn list_rules(pool: &SqlitePool) -> DbResult<Vec<EscalationRule>> {
    let rows = sqlx::query_as::<_, EscalationRuleRow>(
        r#"
        SELECT name, threshold, action, duration
        FROM escalations
        ORDER BY threshold ASC, name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(EscalationRuleRow::into_rule).collect()
}

/// Get a single rule by name.
pub async fn get_rule(pool: &SqlitePool, name: &str) -> DbResult<Option<EscalationRule>> {
    let row = sqlx::query_as::<_, EscalationRuleRow>(
        "SELECT name, threshold, action, duration FROM escalations WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    row.map(EscalationRuleRow::into_rule).transpose()
}

/// Create a rule, or replace the rule with the same name.
pub async fn upsert_rule(pool: &SqlitePool, rule: &EscalationRule, now: i64) -> DbResult<()> {
    let threshold = to_i64(rule.threshold, "threshold")?;
    let duration = rule
        .duration_secs
        .map(|d| to_i64(d, "duration"))
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO escalations (name, threshold, action, duration, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (name) DO UPDATE SET
            threshold = excluded.threshold,
            action = excluded.action,
            duration = excluded.duration,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&rule.name)
    .bind(threshold)
    .bind(rule.action.as_str())
    .bind(duration)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete a rule by name. Returns whether a rule was removed.
pub async fn delete_rule(pool: &SqlitePool, name: &str) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM escalations WHERE name = ?")
        .bind(name)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn to_i64(value: u64, field: &str) -> DbResult<i64> {
    i64::try_from(value).map_err(|_| DbError::invalid_data(format!("{field} out of range")))
}
