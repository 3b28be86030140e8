//! Escalation rule engine.
//!
//! Turns a user's running infraction count into a moderation decision.
//! [`evaluate`] is a pure function of its inputs; it neither reads the store
//! nor logs, so callers decide how to report configuration problems.

use serde::{Deserialize, Serialize};
use warden_db::{EscalationAction, EscalationRule};

use crate::error::{PolicyError, PolicyResult};

/// What the moderation layer should do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: EscalationAction,
    /// Seconds, only ever set for mute and ban. `None` is permanent.
    pub duration_secs: Option<u64>,
    /// Rule that produced this decision
    pub rule_name: String,
    /// Threshold of that rule
    pub threshold: u64,
}

impl Decision {
    fn from_rule(rule: &EscalationRule) -> Self {
        Self {
            action: rule.action,
            duration_secs: rule.duration_secs.filter(|_| rule.action.takes_duration()),
            rule_name: rule.name.clone(),
            threshold: rule.threshold,
        }
    }
}

/// Several rules matched with the same threshold and severity.
///
/// The winner is the lexicographically smallest name, which keeps the outcome
/// deterministic, but the configuration should be fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationAmbiguity {
    pub threshold: u64,
    pub action: EscalationAction,
    /// All tied rule names, sorted
    pub rules: Vec<String>,
    pub chosen: String,
}

/// Result of evaluating a count against a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// `None` means no action.
    pub decision: Option<Decision>,
    pub ambiguity: Option<ConfigurationAmbiguity>,
}

impl Evaluation {
    fn no_action() -> Self {
        Self {
            decision: None,
            ambiguity: None,
        }
    }
}

/// Pick the rule that applies at `count`.
///
/// Among rules with `threshold <= count` the largest threshold wins, then the
/// most severe action, then the smallest name.
pub fn evaluate(count: u64, rules: &[EscalationRule]) -> Evaluation {
    let Some(key) = rules
        .iter()
        .filter(|r| r.threshold <= count)
        .map(|r| (r.threshold, r.action))
        .max()
    else {
        return Evaluation::no_action();
    };

    let mut tied: Vec<&EscalationRule> = rules
        .iter()
        .filter(|r| (r.threshold, r.action) == key)
        .collect();
    tied.sort_by(|a, b| a.name.cmp(&b.name));

    let chosen = tied[0];
    let ambiguity = (tied.len() > 1).then(|| ConfigurationAmbiguity {
        threshold: key.0,
        action: key.1,
        rules: tied.iter().map(|r| r.name.clone()).collect(),
        chosen: chosen.name.clone(),
    });

    Evaluation {
        decision: Some(Decision::from_rule(chosen)),
        ambiguity,
    }
}

/// Validate a rule before it is written.
pub fn validate_rule(rule: &EscalationRule) -> PolicyResult<()> {
    if rule.name.trim().is_empty() {
        return Err(PolicyError::invalid_rule(&rule.name, "name must not be empty"));
    }
    if rule.threshold < 1 {
        return Err(PolicyError::invalid_rule(
            &rule.name,
            "threshold must be at least 1",
        ));
    }
    if rule.duration_secs.is_some() && !rule.action.takes_duration() {
        return Err(PolicyError::invalid_rule(
            &rule.name,
            format!("a duration has no meaning for {}", rule.action),
        ));
    }
    Ok(())
}
