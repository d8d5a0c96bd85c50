// ABOUTME: Post-migration deploy helpers: git commits, GitHub file updates, Vercel env vars
// ABOUTME: Thin wrappers over the git binary and two REST APIs

pub mod git;
pub mod github;
pub mod vercel;

pub use git::{commit_changes, CommitRequest, CommitOutcome};
pub use github::{CommitInfo, FileUpdate, GitHubClient};
pub use vercel::{EnvVar, EnvUpdate, VercelClient};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Name and email recorded on commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

/// Pass 2xx responses through; turn anything else into an error with the body
async fn check_status(service: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    bail!("{} API returned {}: {}", service, status, body.trim());
}
