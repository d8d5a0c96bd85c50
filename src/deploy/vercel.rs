// ABOUTME: Updates a project environment variable through the Vercel REST API
// ABOUTME: Keeps the variable's existing deployment targets when patching its value

use super::check_status;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const VERCEL_API_URL: &str = "https://api.vercel.com";

/// Targets used when the existing variable does not list any
pub const DEFAULT_TARGETS: [&str; 3] = ["production", "preview", "development"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvVar {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub target: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvUpdate {
    pub id: String,
    pub targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EnvListResponse {
    #[serde(default)]
    envs: Vec<EnvVar>,
}

#[derive(Debug, Serialize)]
struct PatchEnvBody<'a> {
    value: &'a str,
    target: &'a [String],
}

pub struct VercelClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    team_id: Option<String>,
}

impl VercelClient {
    pub fn new(token: impl Into<String>, team_id: Option<String>) -> Self {
        Self::with_base_url(token, team_id, VERCEL_API_URL)
    }

    pub fn with_base_url(
        token: impl Into<String>,
        team_id: Option<String>,
        base_url: &str,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            team_id,
        }
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.request(method, url).bearer_auth(&self.token);
        match &self.team_id {
            Some(team_id) => request.query(&[("teamId", team_id)]),
            None => request,
        }
    }

    pub async fn list_env(&self, project_id: &str) -> Result<Vec<EnvVar>> {
        let url = format!("{}/v9/projects/{}/env", self.base_url, project_id);
        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .context("Vercel request failed: list environment variables")?;

        let list: EnvListResponse = check_status("Vercel", response)
            .await?
            .json()
            .await
            .context("Failed to parse Vercel environment variables")?;
        Ok(list.envs)
    }

    /// Set `key` to `value` on every target the variable already applies to
    pub async fn update_env(&self, project_id: &str, key: &str, value: &str) -> Result<EnvUpdate> {
        let envs = self.list_env(project_id).await?;
        let Some(existing) = envs.into_iter().find(|env| env.key == key) else {
            bail!("{} not found in environment variables of project {}", key, project_id);
        };

        let targets: Vec<String> = if existing.target.is_empty() {
            DEFAULT_TARGETS.iter().map(|t| t.to_string()).collect()
        } else {
            existing.target
        };

        let url = format!(
            "{}/v9/projects/{}/env/{}",
            self.base_url, project_id, existing.id
        );
        let response = self
            .request(reqwest::Method::PATCH, &url)
            .json(&PatchEnvBody {
                value,
                target: &targets,
            })
            .send()
            .await
            .with_context(|| format!("Vercel request failed: update {}", key))?;
        check_status("Vercel", response).await?;

        tracing::info!("✓ Updated {} in Vercel", key);
        tracing::info!("  Environments: {}", targets.join(", "));
        Ok(EnvUpdate {
            id: existing.id,
            targets,
        })
    }
}

/// Token saved by `vercel login`, if any
pub fn read_cli_token(home: &Path) -> Result<Option<String>> {
    let auth_file = home.join(".vercel").join("auth.json");
    if !auth_file.exists() {
        return Ok(None);
    }

    #[derive(Deserialize)]
    struct AuthFile {
        token: Option<String>,
    }

    let raw = std::fs::read_to_string(&auth_file)
        .with_context(|| format!("Failed to read {}", auth_file.display()))?;
    let auth: AuthFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", auth_file.display()))?;
    Ok(auth.token)
}

/// Steps for doing the update by hand in the dashboard
pub fn manual_instructions(project: &str, key: &str) -> String {
    format!(
        "Update the variable manually:\n\
         1. Open the Vercel dashboard for project '{project}' and go to Settings > Environment Variables\n\
         2. Find {key}\n\
         3. Click 'Edit' and paste the new value\n\
         4. Save and redeploy"
    )
}
