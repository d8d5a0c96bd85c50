// ABOUTME: CLI entry point for postgres-mirror
// ABOUTME: Parses commands, layers configuration, and routes to handlers

use clap::{Parser, Subcommand};
use postgres_mirror::commands;
use postgres_mirror::commands::publish::PublishArgs;
use postgres_mirror::config::MirrorConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "postgres-mirror")]
#[command(about = "Mirror PostgreSQL databases and restore SQL dumps", long_about = None)]
struct Cli {
    /// TOML config file; environment variables and flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy enums, tables, rows and sequences from source to target
    Copy {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        target: Option<String>,
        /// Source schema to mirror (default: public)
        #[arg(long)]
        schema: Option<String>,
        /// Rows per insert statement
        #[arg(long)]
        batch_size: Option<usize>,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Execute a SQL dump file against the target
    Restore {
        #[arg(long)]
        target: Option<String>,
        /// Dump file to restore
        #[arg(long)]
        file: Option<PathBuf>,
        /// Quote bare timestamps and {...} objects before executing
        #[arg(long)]
        repair_literals: bool,
    },
    /// Write the source schema and rows to a typed JSON-lines archive
    Export {
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        schema: Option<String>,
        #[arg(long)]
        output: PathBuf,
    },
    /// Load a typed archive into the target
    Import {
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        batch_size: Option<usize>,
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Stage and commit all changes in a git working tree
    Commit {
        /// Repository directory
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        #[arg(short, long)]
        message: String,
        /// Push to origin/<branch> after committing
        #[arg(long)]
        push: Option<String>,
    },
    /// Create or update one file through the GitHub contents API
    PublishFile {
        /// Local file to upload
        file: PathBuf,
        /// Path in the repository (defaults to the local path)
        #[arg(long)]
        path: Option<String>,
        #[arg(short, long)]
        message: String,
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repo: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
    /// Update an environment variable of a Vercel project
    UpdateEnv {
        key: String,
        value: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = MirrorConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Copy {
            source,
            target,
            schema,
            batch_size,
            yes,
        } => {
            overlay(&mut config.source_url, source);
            overlay(&mut config.target_url, target);
            overlay(&mut config.source_schema, schema);
            overlay(&mut config.batch_size, batch_size);
            commands::copy(&config, yes).await
        }
        Commands::Restore {
            target,
            file,
            repair_literals,
        } => {
            overlay(&mut config.target_url, target);
            overlay(&mut config.backup_path, file);
            commands::restore(&config, repair_literals).await
        }
        Commands::Export {
            source,
            schema,
            output,
        } => {
            overlay(&mut config.source_url, source);
            overlay(&mut config.source_schema, schema);
            commands::export(&config, &output).await
        }
        Commands::Import {
            target,
            input,
            batch_size,
            yes,
        } => {
            overlay(&mut config.target_url, target);
            overlay(&mut config.batch_size, batch_size);
            commands::import(&config, &input, yes).await
        }
        Commands::Commit { dir, message, push } => commands::commit(&config, &dir, &message, push),
        Commands::PublishFile {
            file,
            path,
            message,
            owner,
            repo,
            branch,
            token,
        } => {
            overlay(&mut config.github.token, token);
            commands::publish_file(
                &config,
                PublishArgs {
                    local_file: &file,
                    repo_path: path.as_deref(),
                    message: &message,
                    owner: owner.as_deref(),
                    repo: repo.as_deref(),
                    branch: branch.as_deref(),
                },
            )
            .await
        }
        Commands::UpdateEnv {
            key,
            value,
            project,
            team,
            token,
        } => {
            overlay(&mut config.vercel.team_id, team);
            overlay(&mut config.vercel.token, token);
            commands::update_env(&config, &key, &value, project.as_deref()).await
        }
    }
}

/// Command-line flags win over file and environment values
fn overlay<T>(slot: &mut Option<T>, flag: Option<T>) {
    if flag.is_some() {
        *slot = flag;
    }
}
