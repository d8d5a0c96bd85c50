// ABOUTME: Creates or updates a single file through the GitHub contents API
// ABOUTME: Looks up the current blob sha first so existing files are updated in place

use super::{check_status, GitIdentity};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// A file to write into a repository
#[derive(Debug, Clone)]
pub struct FileUpdate {
    pub owner: String,
    pub repo: String,
    /// Path inside the repository, e.g. `src/components/Footer.tsx`
    pub path: String,
    /// Defaults to the repository's default branch
    pub branch: Option<String>,
    pub message: String,
    pub content: Vec<u8>,
    pub committer: Option<GitIdentity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub html_url: String,
}

#[derive(Debug, Serialize)]
struct PutContentsBody<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    committer: Option<&'a GitIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a GitIdentity>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    commit: CommitInfo,
}

pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    /// Client pointed at a different API root (GitHub Enterprise, test servers)
    pub fn with_base_url(token: impl Into<String>, base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("postgres-mirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.base_url,
            owner,
            repo,
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
    }

    /// Blob sha of the file as it exists now, or None if it does not exist
    pub async fn current_sha(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        branch: Option<&str>,
    ) -> Result<Option<String>> {
        let url = self.contents_url(owner, repo, path);
        let mut request = self.request(reqwest::Method::GET, &url);
        if let Some(branch) = branch {
            request = request.query(&[("ref", branch)]);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GitHub request failed: GET {}", url))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let contents: ContentsResponse = check_status("GitHub", response)
            .await?
            .json()
            .await
            .context("Failed to parse GitHub contents response")?;
        Ok(Some(contents.sha))
    }

    /// Create the file, or replace it if it already exists
    pub async fn put_file(&self, update: &FileUpdate) -> Result<CommitInfo> {
        let branch = update.branch.as_deref();
        let sha = self
            .current_sha(&update.owner, &update.repo, &update.path, branch)
            .await?;
        match &sha {
            Some(sha) => tracing::info!("Updating {} (current blob {})", update.path, sha),
            None => tracing::info!("Creating {}", update.path),
        }

        let body = PutContentsBody {
            message: &update.message,
            content: STANDARD.encode(&update.content),
            sha: sha.as_deref(),
            branch,
            committer: update.committer.as_ref(),
            author: update.committer.as_ref(),
        };

        let url = self.contents_url(&update.owner, &update.repo, &update.path);
        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("GitHub request failed: PUT {}", url))?;

        let result: PutContentsResponse = check_status("GitHub", response)
            .await?
            .json()
            .await
            .context("Failed to parse GitHub update response")?;

        tracing::info!("✓ File updated on GitHub");
        tracing::info!("  Commit SHA: {}", result.commit.sha);
        tracing::info!("  Commit URL: {}", result.commit.html_url);
        Ok(result.commit)
    }
}
