//! Single-use verification tokens.
//!
//! A token is `PENDING` from issue until it is consumed (`CONSUMED`, terminal)
//! or its deadline passes (`EXPIRED`, derived from `expires_at`, never
//! stored).

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use tracing::{debug, info, warn};
use warden_db::{ConsumeOutcome, DbError};

use crate::clock::Clock;
use crate::error::{PolicyError, PolicyResult};
use crate::store::PolicyStore;

/// Random bytes per token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh URL-safe token from the thread-local CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues and consumes verification tokens through the store.
#[derive(Debug, Clone)]
pub struct VerificationService {
    store: Arc<dyn PolicyStore>,
    clock: Arc<dyn Clock>,
    max_generation_attempts: u32,
}

impl VerificationService {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        clock: Arc<dyn Clock>,
        max_generation_attempts: u32,
    ) -> Self {
        Self {
            store,
            clock,
            max_generation_attempts: max_generation_attempts.max(1),
        }
    }

    /// Issue a token for `user_id` valid for `ttl_secs` seconds from now.
    pub async fn issue(&self, user_id: &str, ttl_secs: u64) -> PolicyResult<String> {
        if user_id.trim().is_empty() {
            return Err(PolicyError::invalid_argument(
                "user_id",
                "must not be empty",
            ));
        }
        let ttl = i64::try_from(ttl_secs)
            .map_err(|_| PolicyError::invalid_argument("ttl_secs", "too large"))?;

        let now = self.clock.now();
        let expires_at = now.saturating_add(ttl);

        for attempt in 1..=self.max_generation_attempts {
            let token = generate_token();
            match self
                .store
                .insert_verification(&token, user_id, expires_at, now)
                .await
            {
                Ok(()) => {
                    info!(user_id, expires_at, "Issued verification token");
                    return Ok(token);
                }
                Err(DbError::DuplicateToken) => {
                    warn!(attempt, "Verification token collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(PolicyError::TokenGenerationFailed {
            attempts: self.max_generation_attempts,
        })
    }

    /// Consume a token, returning the user it was issued for.
    ///
    /// Succeeds at most once per token. A token that is both consumed and
    /// expired reports [`PolicyError::TokenAlreadyConsumed`].
    pub async fn consume(&self, token: &str) -> PolicyResult<String> {
        if token.is_empty() {
            return Err(PolicyError::InvalidToken);
        }

        let now = self.clock.now();
        match self.store.try_consume(token, now).await? {
            ConsumeOutcome::Consumed { user_id } => {
                info!(user_id = %user_id, "Verification completed");
                Ok(user_id)
            }
            ConsumeOutcome::NotFound => Err(PolicyError::InvalidToken),
            ConsumeOutcome::AlreadyConsumed => {
                debug!("Rejected replayed verification token");
                Err(PolicyError::TokenAlreadyConsumed)
            }
            ConsumeOutcome::Expired => Err(PolicyError::TokenExpired),
        }
    }
}
