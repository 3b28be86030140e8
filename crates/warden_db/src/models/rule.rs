//! Escalation rule models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{DbError, DbResult};

/// Moderation action an escalation rule can trigger.
///
/// Variants are declared in severity order, so the derived `Ord` ranks
/// `Warn < Mute < Kick < Ban`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationAction {
    Warn,
    Mute,
    Kick,
    Ban,
}

impl EscalationAction {
    pub const ALL: [EscalationAction; 4] = [Self::Warn, Self::Mute, Self::Kick, Self::Ban];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warn => "warn",
            Self::Mute => "mute",
            Self::Kick => "kick",
            Self::Ban => "ban",
        }
    }

    /// Whether a duration means anything for this action.
    pub fn takes_duration(&self) -> bool {
        matches!(self, Self::Mute | Self::Ban)
    }
}

impl fmt::Display for EscalationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EscalationAction {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "mute" | "timeout" => Ok(Self::Mute),
            "kick" => Ok(Self::Kick),
            "ban" => Ok(Self::Ban),
            other => Err(DbError::invalid_data(format!(
                "unknown escalation action '{other}'"
            ))),
        }
    }
}

/// A configured mapping from an infraction-count threshold to an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    /// Unique human label
    pub name: String,
    /// Minimum infraction count that activates the rule (>= 1)
    pub threshold: u64,
    pub action: EscalationAction,
    /// Seconds; only meaningful for mute and ban. `None` is permanent.
    pub duration_secs: Option<u64>,
}

impl EscalationRule {
    pub fn new(name: impl Into<String>, threshold: u64, action: EscalationAction) -> Self {
        Self {
            name: name.into(),
            threshold,
            action,
            duration_secs: None,
        }
    }

    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration_secs = Some(secs);
        self
    }
}

/// Database row for the escalations table.
#[derive(Debug, Clone, FromRow)]
pub struct EscalationRuleRow {
    pub name: String,
    pub threshold: i64,
    pub action: String,
    pub duration: Option<i64>,
}

impl EscalationRuleRow {
    /// Convert a database row into a rule, rejecting values the schema should
    /// never have let through.
    pub fn into_rule(self) -> DbResult<EscalationRule> {
        let threshold = u64::try_from(self.threshold)
            .ok()
            .filter(|t| *t >= 1)
            .ok_or_else(|| {
                DbError::invalid_data(format!(
                    "rule '{}' has invalid threshold {}",
                    self.name, self.threshold
                ))
            })?;

        let duration_secs = self
            .duration
            .map(|d| {
                u64::try_from(d).map_err(|_| {
                    DbError::invalid_data(format!("rule '{}' has negative duration", self.name))
                })
            })
            .transpose()?;

        Ok(EscalationRule {
            action: self.action.parse()?,
            name: self.name,
            threshold,
            duration_secs,
        })
    }
}
