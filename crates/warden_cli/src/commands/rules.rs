//! Escalation rule management.

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL};
use miette::Result;
use warden_core::{EscalationAction, EscalationRule, Warden};

use crate::output::Output;

pub async fn list(warden: &Warden, output: &Output) -> Result<()> {
    let mut rules = warden.admin.list_rules().await?;
    if rules.is_empty() {
        output.status("No escalation rules configured");
        return Ok(());
    }
    rules.sort_by(|a, b| (a.threshold, a.action, &a.name).cmp(&(b.threshold, b.action, &b.name)));

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Name", "Threshold", "Action", "Duration"]);
    for rule in &rules {
        table.add_row(vec![
            Cell::new(&rule.name),
            Cell::new(rule.threshold),
            Cell::new(rule.action),
            Cell::new(
                rule.duration_secs
                    .map(|d| format!("{d}s"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn set(
    warden: &Warden,
    name: &str,
    threshold: u64,
    action: &str,
    duration: Option<u64>,
    output: &Output,
) -> Result<()> {
    let action: EscalationAction = action.parse()?;
    let mut rule = EscalationRule::new(name, threshold, action);
    rule.duration_secs = duration;

    warden.admin.upsert_rule(&rule).await?;
    output.success(&format!("Saved rule '{name}'"));
    output.kv("Threshold", &threshold.to_string());
    output.kv("Action", action.as_str());
    if let Some(d) = duration {
        output.kv("Duration", &format!("{d}s"));
    }
    Ok(())
}

pub async fn remove(warden: &Warden, name: &str, output: &Output) -> Result<()> {
    if warden.admin.delete_rule(name).await? {
        output.success(&format!("Removed rule '{name}'"));
    } else {
        output.warning(&format!("No rule named '{name}'"));
    }
    Ok(())
}
