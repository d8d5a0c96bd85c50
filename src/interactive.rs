// ABOUTME: Terminal confirmation prompts for destructive operations
// ABOUTME: Skipped entirely when the user passes --yes

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};

/// Ask before dropping and recreating tables on `target`
///
/// Returns `Ok(true)` without prompting when `assume_yes` is set.
pub fn confirm_destructive(action: &str, target: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }

    println!();
    println!("This will {} on:", action);
    println!("  {}", target);
    println!("Existing tables with the same names will be dropped.");
    println!();

    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Proceed?")
        .default(false)
        .interact()
        .context("Failed to get confirmation")
}
