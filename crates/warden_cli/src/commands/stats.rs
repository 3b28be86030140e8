//! Database statistics.

use miette::Result;
use warden_core::{Clock, SystemClock, WardenConfig, WardenDb};
use warden_db::queries;

use crate::output::Output;

pub async fn show(db: &WardenDb, config: &WardenConfig, output: &Output) -> Result<()> {
    let now = SystemClock.now();
    let stats = db
        .bounded("get_stats", queries::get_stats(db.pool(), now))
        .await?;

    output.section("Warden Database");
    output.kv("Path", &config.database.path.display().to_string());
    if let Ok(meta) = std::fs::metadata(&config.database.path) {
        output.kv("Size", &format!("{} KiB", meta.len() / 1024));
    }

    output.section("Rules");
    output.kv("Escalation rules", &stats.rule_count.to_string());

    output.section("Infractions");
    output.kv("Tracked users", &stats.tracked_users.to_string());
    output.kv("Users above zero", &stats.users_with_infractions.to_string());
    output.kv("Logged", &stats.logged_infractions.to_string());

    output.section("Verification");
    output.kv("Pending", &stats.pending_tokens.to_string());
    output.kv("Consumed", &stats.consumed_tokens.to_string());
    output.kv("Expired", &stats.expired_tokens.to_string());
    if stats.expired_tokens > 0 {
        output.status("Run `warden sweep` to delete expired tokens");
    }
    Ok(())
}
