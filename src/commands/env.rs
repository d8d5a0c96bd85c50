// ABOUTME: `update-env` command: patch one Vercel project environment variable
// ABOUTME: Falls back to printing dashboard instructions when the API call fails

use crate::config::MirrorConfig;
use crate::deploy::vercel::{manual_instructions, read_cli_token};
use crate::deploy::VercelClient;
use anyhow::{bail, Result};
use std::path::PathBuf;

pub async fn update_env(
    config: &MirrorConfig,
    key: &str,
    value: &str,
    project_id: Option<&str>,
) -> Result<()> {
    let Some(project_id) = project_id.or(config.vercel.project_id.as_deref()) else {
        bail!("Missing Vercel project: pass --project or set vercel.project_id in the config file");
    };

    let token = match &config.vercel.token {
        Some(token) => token.clone(),
        None => {
            let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
            match read_cli_token(&home)? {
                Some(token) => token,
                None => bail!(
                    "Could not find a Vercel token. Set VERCEL_TOKEN or run 'vercel login' first."
                ),
            }
        }
    };

    tracing::info!("Updating {} in Vercel project {}...", key, project_id);
    let client = VercelClient::new(token, config.vercel.team_id.clone());
    match client.update_env(project_id, key, value).await {
        Ok(_) => {
            tracing::info!("✓ Update complete. Redeploy the project to pick it up.");
            Ok(())
        }
        Err(e) => {
            tracing::warn!("⚠ API update failed: {:#}", e);
            tracing::warn!("{}", manual_instructions(project_id, key));
            Err(e)
        }
    }
}
