//! Warden Core
//!
//! Moderation policy for the Warden bot: infraction counting, escalation
//! decisions and single-use verification tokens, all backed by one durable
//! store.
//!
//! # Architecture
//!
//! - [`PolicyFacade`] is what command handlers call. It records infractions,
//!   evaluates escalation rules and issues or consumes verification tokens.
//! - [`PolicyAdmin`] manages rules and counters.
//! - [`PolicyStore`] is the storage seam, implemented by [`warden_db::WardenDb`].
//! - [`Clock`] supplies "now" so expiry is testable.
//!
//! The core never talks to the chat platform. A returned [`Decision`] is
//! applied by the caller, optionally through a [`ModerationCapability`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_core::{SystemClock, Warden, open_store, load_config_from_standard_locations};
//!
//! let config = load_config_from_standard_locations().await?;
//! let db = open_store(&config).await?;
//! let warden = Warden::new(Arc::new(db), Arc::new(SystemClock), &config);
//!
//! if let Some(decision) = warden.policy.handle_infraction("user-id", "spam").await? {
//!     decision.apply("user-id", &discord).await?;
//! }
//! ```

pub mod admin;
pub mod clock;
pub mod config;
pub mod error;
pub mod escalation;
pub mod moderation;
pub mod policy;
pub mod retry;
pub mod rules_cache;
pub mod store;
pub mod verification;

use std::sync::Arc;

pub use admin::PolicyAdmin;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    WardenConfig, config_paths, load_config, load_config_from_standard_locations, parse_config,
    save_config,
};
pub use error::{ConfigError, PolicyError, PolicyResult};
pub use escalation::{ConfigurationAmbiguity, Decision, Evaluation, evaluate, validate_rule};
pub use moderation::ModerationCapability;
pub use policy::{InfractionEvent, PolicyFacade};
pub use retry::{Idempotency, RetryConfig};
pub use rules_cache::RuleCache;
pub use store::PolicyStore;
pub use verification::VerificationService;

pub use warden_db::{EscalationAction, EscalationRule, InfractionLogEntry, WardenDb};

/// The policy facade and admin surface sharing one store and rule cache.
#[derive(Debug, Clone)]
pub struct Warden {
    pub policy: PolicyFacade,
    pub admin: PolicyAdmin,
}

impl Warden {
    pub fn new(store: Arc<dyn PolicyStore>, clock: Arc<dyn Clock>, config: &WardenConfig) -> Self {
        let rules = Arc::new(RuleCache::new(config.rule_cache_ttl()));
        let policy = PolicyFacade::new(store.clone(), clock.clone(), rules.clone(), config);
        let admin = PolicyAdmin::new(store, clock, rules, config.retry.clone());
        Self { policy, admin }
    }
}

/// Open (and migrate) the database named by `config`.
pub async fn open_store(config: &WardenConfig) -> PolicyResult<WardenDb> {
    let db = WardenDb::open_with(&config.database.path, config.store.to_db_options()).await?;
    Ok(db)
}
