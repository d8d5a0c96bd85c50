// ABOUTME: `commit` command: stage, commit and optionally push a working tree
// ABOUTME: Identity comes from the [git] config section when set

use crate::config::MirrorConfig;
use crate::deploy::{commit_changes, CommitRequest, GitIdentity};
use anyhow::Result;
use std::path::Path;

pub fn commit(
    config: &MirrorConfig,
    repo_dir: &Path,
    message: &str,
    push_branch: Option<String>,
) -> Result<()> {
    let identity = match (&config.git.user_name, &config.git.user_email) {
        (Some(name), Some(email)) => Some(GitIdentity {
            name: name.clone(),
            email: email.clone(),
        }),
        _ => None,
    };

    tracing::info!("Deploying changes from {}...", repo_dir.display());
    let outcome = commit_changes(&CommitRequest {
        repo_dir: repo_dir.to_path_buf(),
        message: message.to_string(),
        identity,
        push_branch,
    })?;

    tracing::info!("✓ Changes committed ({})", outcome.commit);
    Ok(())
}
