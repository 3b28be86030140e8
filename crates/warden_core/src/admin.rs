//! Administrative operations: rule management, counter resets and cleanup.

use std::sync::Arc;

use tracing::info;
use warden_db::EscalationRule;

use crate::clock::Clock;
use crate::error::PolicyResult;
use crate::escalation::validate_rule;
use crate::retry::{Idempotency, RetryConfig, with_store_retry};
use crate::rules_cache::RuleCache;
use crate::store::PolicyStore;

#[derive(Debug, Clone)]
pub struct PolicyAdmin {
    store: Arc<dyn PolicyStore>,
    clock: Arc<dyn Clock>,
    rules: Arc<RuleCache>,
    retry: RetryConfig,
}

impl PolicyAdmin {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        clock: Arc<dyn Clock>,
        rules: Arc<RuleCache>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            store,
            clock,
            rules,
            retry,
        }
    }

    /// Create or replace a rule by name.
    ///
    /// Rejected rules (empty name, zero threshold, duration on warn or kick)
    /// never reach the store.
    pub async fn upsert_rule(&self, rule: &EscalationRule) -> PolicyResult<()> {
        validate_rule(rule)?;
        with_store_retry(
            &self.retry,
            "upsert_rule",
            Idempotency::Idempotent,
            || async move { Ok(self.store.upsert_rule(rule, self.clock.now()).await?) },
        )
        .await?;
        self.rules.invalidate();
        info!(
            rule = %rule.name,
            threshold = rule.threshold,
            action = %rule.action,
            duration_secs = ?rule.duration_secs,
            "Escalation rule saved"
        );
        Ok(())
    }

    /// Delete a rule by name. Returns false if no such rule existed.
    pub async fn delete_rule(&self, name: &str) -> PolicyResult<bool> {
        let deleted = with_store_retry(
            &self.retry,
            "delete_rule",
            Idempotency::Idempotent,
            || async move { Ok(self.store.delete_rule(name).await?) },
        )
        .await?;
        if deleted {
            self.rules.invalidate();
            info!(rule = name, "Escalation rule deleted");
        }
        Ok(deleted)
    }

    /// All rules as currently stored, bypassing the cache.
    pub async fn list_rules(&self) -> PolicyResult<Vec<EscalationRule>> {
        with_store_retry(
            &self.retry,
            "list_rules",
            Idempotency::Idempotent,
            || async move { Ok(self.store.get_rules().await?) },
        )
        .await
    }

    /// Set a user's count back to zero. Returns false for unknown users.
    pub async fn reset_infractions(&self, user_id: &str) -> PolicyResult<bool> {
        let reset = with_store_retry(
            &self.retry,
            "reset_count",
            Idempotency::Idempotent,
            || async move { Ok(self.store.reset_count(user_id, self.clock.now()).await?) },
        )
        .await?;
        if reset {
            info!(user_id, "Infraction count reset");
        }
        Ok(reset)
    }

    /// Delete verification tokens whose deadline has passed.
    pub async fn sweep_expired(&self) -> PolicyResult<u64> {
        let removed = with_store_retry(
            &self.retry,
            "delete_expired_verifications",
            Idempotency::Idempotent,
            || async move {
                Ok(self
                    .store
                    .delete_expired_verifications(self.clock.now())
                    .await?)
            },
        )
        .await?;
        if removed > 0 {
            info!(removed, "Swept expired verification tokens");
        }
        Ok(removed)
    }
}
