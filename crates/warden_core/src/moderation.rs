//! The moderation capability callers apply decisions with.
//!
//! The core never calls this itself; command handlers own an implementation
//! (backed by the chat platform's API) and hand it a [`Decision`].

use std::time::Duration;

use async_trait::async_trait;
use warden_db::EscalationAction;

use crate::escalation::Decision;

/// Platform moderation actions.
#[async_trait]
pub trait ModerationCapability: Send + Sync {
    type Error: Send;

    async fn ban(&self, user_id: &str, reason: &str) -> Result<(), Self::Error>;

    async fn kick(&self, user_id: &str, reason: &str) -> Result<(), Self::Error>;

    /// `None` duration means until lifted manually.
    async fn timeout(
        &self,
        user_id: &str,
        duration: Option<Duration>,
        reason: &str,
    ) -> Result<(), Self::Error>;
}

impl Decision {
    /// Audit reason attached to the platform action.
    pub fn reason(&self) -> String {
        format!(
            "Auto-punish: reached {} points (rule '{}')",
            self.threshold, self.rule_name
        )
    }

    /// Carry out this decision through `capability`.
    ///
    /// Warnings need no platform call. A ban duration is not passed on; the
    /// caller schedules the unban if it wants a temporary ban.
    pub async fn apply<M>(&self, user_id: &str, capability: &M) -> Result<(), M::Error>
    where
        M: ModerationCapability + ?Sized,
    {
        let reason = self.reason();
        match self.action {
            EscalationAction::Warn => Ok(()),
            EscalationAction::Mute => {
                capability
                    .timeout(user_id, self.duration_secs.map(Duration::from_secs), &reason)
                    .await
            }
            EscalationAction::Kick => capability.kick(user_id, &reason).await,
            EscalationAction::Ban => capability.ban(user_id, &reason).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModerationCapability for Recorder {
        type Error = std::convert::Infallible;

        async fn ban(&self, user_id: &str, _reason: &str) -> Result<(), Self::Error> {
            self.calls.lock().push(format!("ban {user_id}"));
            Ok(())
        }

        async fn kick(&self, user_id: &str, _reason: &str) -> Result<(), Self::Error> {
            self.calls.lock().push(format!("kick {user_id}"));
            Ok(())
        }

        async fn timeout(
            &self,
            user_id: &str,
            duration: Option<Duration>,
            _reason: &str,
        ) -> Result<(), Self::Error> {
            self.calls
                .lock()
                .push(format!("timeout {user_id} {:?}", duration.map(|d| d.as_secs())));
            Ok(())
        }
    }

    fn decision(action: EscalationAction, duration_secs: Option<u64>) -> Decision {
        Decision {
            action,
            duration_secs,
            rule_name: "rule".to_string(),
            threshold: 3,
        }
    }

    #[tokio::test]
    async fn maps_actions_to_capability_calls() {
        let recorder = Recorder::default();

        let decisions = [
            (EscalationAction::Warn, None),
            (EscalationAction::Mute, Some(60)),
            (EscalationAction::Mute, None),
            (EscalationAction::Kick, None),
            (EscalationAction::Ban, Some(10)),
        ];
        for (action, duration) in decisions {
            decision(action, duration).apply("u", &recorder).await.unwrap();
        }

        assert_eq!(
            *recorder.calls.lock(),
            vec![
                "timeout u Some(60)".to_string(),
                "timeout u None".to_string(),
                "kick u".to_string(),
                "ban u".to_string(),
            ]
        );
    }

    #[test]
    fn reason_names_rule_and_threshold() {
        assert_eq!(
            decision(EscalationAction::Ban, None).reason(),
            "Auto-punish: reached 3 points (rule 'rule')"
        );
    }
}
