//! Policy facade: the only entry point for command handlers.
//!
//! Three operations mutate state:
//! - [`PolicyFacade::handle_infraction`] records an infraction and returns the
//!   resulting decision, if any
//! - [`PolicyFacade::request_verification`] issues a token
//! - [`PolicyFacade::complete_verification`] consumes one
//!
//! Rule administration lives on [`crate::PolicyAdmin`].

use std::sync::Arc;

use tracing::{info, warn};
use warden_db::{InfractionLogEntry, NewInfraction};

use crate::clock::Clock;
use crate::config::{InfractionConfig, WardenConfig};
use crate::error::{PolicyError, PolicyResult};
use crate::escalation::{Decision, evaluate};
use crate::retry::{Idempotency, RetryConfig, with_store_retry};
use crate::rules_cache::RuleCache;
use crate::store::PolicyStore;
use crate::verification::VerificationService;

/// An infraction reported by a command handler or detector.
#[derive(Debug, Clone)]
pub struct InfractionEvent {
    pub user_id: String,
    pub kind: String,
    pub reason: Option<String>,
    pub moderator: Option<String>,
}

impl InfractionEvent {
    pub fn new(user_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind: kind.into(),
            reason: None,
            moderator: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_moderator(mut self, moderator: impl Into<String>) -> Self {
        self.moderator = Some(moderator.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct PolicyFacade {
    store: Arc<dyn PolicyStore>,
    clock: Arc<dyn Clock>,
    rules: Arc<RuleCache>,
    verification: VerificationService,
    retry: RetryConfig,
    infractions: InfractionConfig,
    default_ttl_secs: u64,
}

impl PolicyFacade {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        clock: Arc<dyn Clock>,
        rules: Arc<RuleCache>,
        config: &WardenConfig,
    ) -> Self {
        let verification = VerificationService::new(
            store.clone(),
            clock.clone(),
            config.verification.max_generation_attempts,
        );
        Self {
            store,
            clock,
            rules,
            verification,
            retry: config.retry.clone(),
            infractions: config.infractions.clone(),
            default_ttl_secs: config.verification.default_ttl_secs,
        }
    }

    /// TTL to use when the caller has no preference.
    pub fn default_ttl_secs(&self) -> u64 {
        self.default_ttl_secs
    }

    /// Record one infraction of `kind` against `user_id` and decide what to do.
    pub async fn handle_infraction(
        &self,
        user_id: &str,
        kind: &str,
    ) -> PolicyResult<Option<Decision>> {
        self.handle_infraction_with(InfractionEvent::new(user_id, kind))
            .await
    }

    /// Like [`Self::handle_infraction`], with reason and moderator recorded in the log.
    ///
    /// The counter update commits before rules are read. If reading rules
    /// fails, the infraction stays counted and the error is returned.
    pub async fn handle_infraction_with(
        &self,
        event: InfractionEvent,
    ) -> PolicyResult<Option<Decision>> {
        if event.user_id.trim().is_empty() {
            return Err(PolicyError::invalid_argument("user_id", "must not be empty"));
        }
        if event.kind.trim().is_empty() {
            return Err(PolicyError::invalid_argument("kind", "must not be empty"));
        }

        let infraction = NewInfraction {
            points: self.infractions.points_for(&event.kind),
            user_id: event.user_id,
            kind: event.kind,
            reason: event.reason,
            moderator: event.moderator,
        };

        let infraction = &infraction;
        let count = with_store_retry(
            &self.retry,
            "record_infraction",
            Idempotency::AtMostOnce,
            || async move {
                Ok(self
                    .store
                    .record_infraction(infraction, self.clock.now())
                    .await?)
            },
        )
        .await?;

        let rules = with_store_retry(&self.retry, "get_rules", Idempotency::Idempotent, || {
            self.rules.get(self.store.as_ref())
        })
        .await?;

        let evaluation = evaluate(count, &rules);

        if let Some(ambiguity) = &evaluation.ambiguity {
            warn!(
                threshold = ambiguity.threshold,
                action = %ambiguity.action,
                rules = ?ambiguity.rules,
                chosen = %ambiguity.chosen,
                "Configuration ambiguity: several escalation rules tie on threshold and severity"
            );
        }

        match &evaluation.decision {
            Some(decision) => info!(
                user_id = %infraction.user_id,
                kind = %infraction.kind,
                count,
                action = %decision.action,
                rule = %decision.rule_name,
                "Escalation triggered"
            ),
            None => info!(
                user_id = %infraction.user_id,
                kind = %infraction.kind,
                count,
                "Infraction recorded, no escalation"
            ),
        }

        Ok(evaluation.decision)
    }

    /// Issue a verification token for `user_id`.
    pub async fn request_verification(
        &self,
        user_id: &str,
        ttl_secs: u64,
    ) -> PolicyResult<String> {
        // A retried issue mints a new token; any token from an attempt that
        // did commit simply expires unused.
        with_store_retry(
            &self.retry,
            "request_verification",
            Idempotency::Idempotent,
            || self.verification.issue(user_id, ttl_secs),
        )
        .await
    }

    /// Consume a verification token, returning the user it was issued for.
    ///
    /// Only retried when the store failed before the consume could apply; an
    /// `Ok` here is the caller's proof of success.
    pub async fn complete_verification(&self, token: &str) -> PolicyResult<String> {
        with_store_retry(
            &self.retry,
            "complete_verification",
            Idempotency::AtMostOnce,
            || self.verification.consume(token),
        )
        .await
    }

    /// Current infraction count for a user.
    pub async fn infraction_count(&self, user_id: &str) -> PolicyResult<u64> {
        with_store_retry(
            &self.retry,
            "get_count",
            Idempotency::Idempotent,
            || async move { Ok(self.store.get_count(user_id).await?) },
        )
        .await
    }

    /// Most recent infractions for a user, newest first.
    pub async fn infraction_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> PolicyResult<Vec<InfractionLogEntry>> {
        with_store_retry(
            &self.retry,
            "list_infractions",
            Idempotency::Idempotent,
            || async move { Ok(self.store.list_infractions(user_id, i64::from(limit)).await?) },
        )
        .await
    }
}
