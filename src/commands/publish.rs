// ABOUTME: `publish-file` command: push one local file to GitHub via the contents API
// ABOUTME: Repository coordinates come from flags or the [github] config section

use crate::config::MirrorConfig;
use crate::deploy::{FileUpdate, GitHubClient, GitIdentity};
use anyhow::{bail, Context, Result};
use std::path::Path;

pub struct PublishArgs<'a> {
    pub local_file: &'a Path,
    /// Destination path in the repository; defaults to `local_file`
    pub repo_path: Option<&'a str>,
    pub message: &'a str,
    pub owner: Option<&'a str>,
    pub repo: Option<&'a str>,
    pub branch: Option<&'a str>,
}

pub async fn publish_file(config: &MirrorConfig, args: PublishArgs<'_>) -> Result<()> {
    let token = config.require_github_token()?;
    let Some(owner) = args.owner.or(config.github.owner.as_deref()) else {
        bail!("Missing GitHub owner: pass --owner or set github.owner in the config file");
    };
    let Some(repo) = args.repo.or(config.github.repo.as_deref()) else {
        bail!("Missing GitHub repository: pass --repo or set github.repo in the config file");
    };

    if !args.local_file.exists() {
        bail!("File {} not found", args.local_file.display());
    }
    let content = std::fs::read(args.local_file)
        .with_context(|| format!("Failed to read {}", args.local_file.display()))?;

    let path = match args.repo_path {
        Some(path) => path.to_string(),
        None => args.local_file.to_string_lossy().replace('\\', "/"),
    };

    let committer = match (&config.git.user_name, &config.git.user_email) {
        (Some(name), Some(email)) => Some(GitIdentity {
            name: name.clone(),
            email: email.clone(),
        }),
        _ => None,
    };

    tracing::info!("Updating {} on GitHub ({}/{})...", path, owner, repo);
    let client = GitHubClient::new(token)?;
    client
        .put_file(&FileUpdate {
            owner: owner.to_string(),
            repo: repo.to_string(),
            path,
            branch: args
                .branch
                .or(config.github.branch.as_deref())
                .map(str::to_string),
            message: args.message.to_string(),
            content,
            committer,
        })
        .await?;

    Ok(())
}
