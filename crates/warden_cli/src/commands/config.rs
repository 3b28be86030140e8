//! Effective configuration.

use std::path::Path;

use miette::{IntoDiagnostic, Result};
use warden_core::{WardenConfig, save_config};

use crate::output::Output;

pub async fn show(config: &WardenConfig, path: Option<&Path>, output: &Output) -> Result<()> {
    match path {
        Some(path) => {
            save_config(config, path).await?;
            output.success(&format!("Wrote configuration to {}", path.display()));
        }
        None => print!("{}", toml::to_string_pretty(config).into_diagnostic()?),
    }
    Ok(())
}
