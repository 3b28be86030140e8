//! Infraction counters and history.

use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use warden_core::{InfractionEvent, Warden};

use super::format_timestamp;
use crate::output::Output;

pub async fn record(
    warden: &Warden,
    user_id: &str,
    kind: &str,
    reason: Option<&str>,
    moderator: Option<&str>,
    json: bool,
    output: &Output,
) -> Result<()> {
    let mut event = InfractionEvent::new(user_id, kind);
    if let Some(reason) = reason {
        event = event.with_reason(reason);
    }
    if let Some(moderator) = moderator {
        event = event.with_moderator(moderator);
    }

    let decision = warden.policy.handle_infraction_with(event).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&decision).into_diagnostic()?);
        return Ok(());
    }

    let count = warden.policy.infraction_count(user_id).await?;
    output.success(&format!("Recorded {kind} infraction for {user_id}"));
    output.kv("Count", &count.to_string());
    match decision {
        Some(decision) => {
            output.kv("Action", &decision.action.bright_red().to_string());
            output.kv("Rule", &decision.rule_name);
            if let Some(d) = decision.duration_secs {
                output.kv("Duration", &format!("{d}s"));
            }
            output.kv("Reason", &decision.reason());
        }
        None => output.kv("Action", "none"),
    }
    Ok(())
}

pub async fn show(warden: &Warden, user_id: &str, limit: u32, output: &Output) -> Result<()> {
    let count = warden.policy.infraction_count(user_id).await?;
    output.section(&format!("Infractions for {user_id}"));
    output.kv("Count", &count.to_string());

    let history = warden.policy.infraction_history(user_id, limit).await?;
    if history.is_empty() {
        output.status("No infractions logged");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["When", "Kind", "Points", "Reason", "Moderator"]);
    for entry in &history {
        table.add_row(vec![
            format_timestamp(entry.created_at),
            entry.kind.clone(),
            entry.points.to_string(),
            entry.reason.clone().unwrap_or_default(),
            entry.moderator.clone().unwrap_or_else(|| "auto".to_string()),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn reset(warden: &Warden, user_id: &str, output: &Output) -> Result<()> {
    if warden.admin.reset_infractions(user_id).await? {
        output.success(&format!("Reset infraction count for {user_id}"));
    } else {
        output.warning(&format!("No infraction record for {user_id}"));
    }
    Ok(())
}
