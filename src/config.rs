// ABOUTME: Layered configuration: TOML file, then environment, then command-line flags
// ABOUTME: Connection strings and API credentials never live in source code

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SCHEMA: &str = "public";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub source_url: Option<String>,
    pub target_url: Option<String>,
    /// Schema read from the source; the target receives tables in its current schema
    pub source_schema: Option<String>,
    pub backup_path: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub git: GitSettings,
    pub github: GitHubSettings,
    pub vercel: VercelSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VercelSettings {
    pub token: Option<String>,
    pub project_id: Option<String>,
    pub team_id: Option<String>,
}

impl MirrorConfig {
    /// Read a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse TOML config at {}", path.display()))
    }

    /// File (if given) overlaid with the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()));
        Ok(config)
    }

    /// Overlay values found through `lookup`, which maps env var names to values
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SOURCE_DATABASE_URL") {
            self.source_url = Some(v);
        }
        if let Some(v) = lookup("TARGET_DATABASE_URL") {
            self.target_url = Some(v);
        }
        if let Some(v) = lookup("BACKUP_PATH") {
            self.backup_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("GITHUB_TOKEN") {
            self.github.token = Some(v);
        }
        if let Some(v) = lookup("VERCEL_TOKEN") {
            self.vercel.token = Some(v);
        }
    }

    pub fn source_schema(&self) -> &str {
        self.source_schema.as_deref().unwrap_or(DEFAULT_SCHEMA)
    }

    pub fn require_source_url(&self) -> Result<&str> {
        required(self.source_url.as_deref(), "source_url", "SOURCE_DATABASE_URL", "--source")
    }

    pub fn require_target_url(&self) -> Result<&str> {
        required(self.target_url.as_deref(), "target_url", "TARGET_DATABASE_URL", "--target")
    }

    pub fn require_backup_path(&self) -> Result<&Path> {
        match &self.backup_path {
            Some(path) => Ok(path.as_path()),
            None => bail!(missing_message("backup_path", "BACKUP_PATH", "--file")),
        }
    }

    pub fn require_github_token(&self) -> Result<&str> {
        required(self.github.token.as_deref(), "github.token", "GITHUB_TOKEN", "--token")
    }
}

fn required<'a>(value: Option<&'a str>, key: &str, env: &str, flag: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!(missing_message(key, env, flag)),
    }
}

fn missing_message(key: &str, env: &str, flag: &str) -> String {
    format!(
        "Missing required setting '{}'.\n\
         Set it with {}, the {} environment variable, or '{}' in the config file.",
        key, flag, env, key
    )
}
