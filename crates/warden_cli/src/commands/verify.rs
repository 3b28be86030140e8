//! Verification tokens.

use miette::Result;
use warden_core::Warden;

use crate::output::Output;

pub async fn issue(
    warden: &Warden,
    user_id: &str,
    ttl: Option<u64>,
    output: &Output,
) -> Result<()> {
    let ttl = ttl.unwrap_or_else(|| warden.policy.default_ttl_secs());
    let token = warden.policy.request_verification(user_id, ttl).await?;
    output.success(&format!("Issued verification token for {user_id}"));
    output.kv("Token", &token);
    output.kv("Expires in", &format!("{ttl}s"));
    Ok(())
}

pub async fn complete(warden: &Warden, token: &str, output: &Output) -> Result<()> {
    let user_id = warden.policy.complete_verification(token).await?;
    output.success(&format!("Verified {user_id}"));
    Ok(())
}

pub async fn sweep(warden: &Warden, output: &Output) -> Result<()> {
    let removed = warden.admin.sweep_expired().await?;
    output.success(&format!("Removed {removed} expired token(s)"));
    Ok(())
}
