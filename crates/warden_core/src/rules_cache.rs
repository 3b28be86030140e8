//! Cached snapshot of the escalation rule set.
//!
//! Rules change rarely, so infraction handling reads them from a shared
//! snapshot. A snapshot is served for at most `ttl`; rule changes made through
//! [`crate::PolicyAdmin`] invalidate it immediately. Changes written by another
//! process are therefore visible within `ttl`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use warden_db::EscalationRule;

use crate::error::PolicyResult;
use crate::store::PolicyStore;

#[derive(Debug)]
struct Snapshot {
    rules: Arc<[EscalationRule]>,
    loaded_at: Instant,
    generation: u64,
}

#[derive(Debug)]
struct CacheState {
    snapshot: Option<Snapshot>,
    /// Bumped on every invalidation so a load that raced with one is discarded.
    generation: u64,
}

#[derive(Debug)]
pub struct RuleCache {
    state: RwLock<CacheState>,
    ttl: Duration,
}

impl RuleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState {
                snapshot: None,
                generation: 0,
            }),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current rules, loading from the store when the snapshot is missing or stale.
    pub async fn get(&self, store: &dyn PolicyStore) -> PolicyResult<Arc<[EscalationRule]>> {
        let generation = {
            let state = self.state.read();
            if let Some(snapshot) = state.snapshot.as_ref().filter(|s| {
                s.generation == state.generation && s.loaded_at.elapsed() < self.ttl
            }) {
                return Ok(snapshot.rules.clone());
            }
            state.generation
        };

        let rules: Arc<[EscalationRule]> = store.get_rules().await?.into();
        tracing::debug!(count = rules.len(), "Loaded escalation rules");

        let mut state = self.state.write();
        if state.generation == generation {
            state.snapshot = Some(Snapshot {
                rules: rules.clone(),
                loaded_at: Instant::now(),
                generation,
            });
        }
        Ok(rules)
    }

    /// Drop the snapshot so the next read goes to the store.
    pub fn invalidate(&self) {
        let mut state = self.state.write();
        state.generation += 1;
        state.snapshot = None;
    }
}
