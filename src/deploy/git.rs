// ABOUTME: Commits (and optionally pushes) a working tree through the git binary
// ABOUTME: Every step reports git's own stderr when it fails

use super::GitIdentity;
use crate::utils::check_required_tool;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct CommitRequest {
    pub repo_dir: PathBuf,
    pub message: String,
    /// Written to the repository's local config before committing
    pub identity: Option<GitIdentity>,
    /// Push to `origin/<branch>` after committing
    pub push_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// Abbreviated hash of the new commit
    pub commit: String,
    pub pushed: bool,
}

/// Stage everything, commit, and push if asked
pub fn commit_changes(request: &CommitRequest) -> Result<CommitOutcome> {
    check_required_tool("git")?;
    let dir = request.repo_dir.as_path();

    if let Some(identity) = &request.identity {
        tracing::info!("Setting git identity to {} <{}>", identity.name, identity.email);
        run_git(dir, &["config", "user.name", &identity.name])?;
        run_git(dir, &["config", "user.email", &identity.email])?;
    }

    tracing::info!("Adding changes...");
    run_git(dir, &["add", "."]).context("Failed to add changes")?;

    tracing::info!("Committing changes...");
    run_git(dir, &["commit", "-m", &request.message]).context("Failed to commit")?;
    let commit = run_git(dir, &["rev-parse", "--short", "HEAD"])?;
    tracing::info!("✓ Committed {}", commit);

    let pushed = match &request.push_branch {
        Some(branch) => {
            tracing::info!("Pushing to origin/{}...", branch);
            run_git(dir, &["push", "origin", branch])
                .with_context(|| format!("Failed to push to origin/{}", branch))?;
            tracing::info!("✓ Pushed to origin/{}", branch);
            true
        }
        None => {
            tracing::info!("Not pushing; run 'git push' once credentials are set up");
            false
        }
    };

    Ok(CommitOutcome { commit, pushed })
}

/// Run git in `dir`, returning trimmed stdout
fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    tracing::debug!("git {}", args.join(" "));
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("Failed to run git in {}", dir.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        // "nothing to commit" goes to stdout
        let detail = if stderr.trim().is_empty() {
            stdout.trim()
        } else {
            stderr.trim()
        };
        bail!("git {} failed: {}", args[0], detail);
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
