use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::Context;
use config::AppConfig;

/// Reconcile bank statements against open payable installments.
#[derive(Parser)]
#[command(name = "baixa", version, about)]
struct Cli {
    /// Config file (default: baixa.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database, overriding the config file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Review file shared by match, review, select and commit
    #[arg(long, global = true)]
    review: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and seed the default payment methods
    Init,
    /// Score a statement CSV against the installments and save a review
    Match { statement: PathBuf },
    /// Show the saved review with candidates and conflicts
    Review,
    /// Choose an installment for a row
    Select {
        row: usize,
        installment: i64,
        /// Replace the settlement of an already settled installment
        #[arg(long = "override")]
        override_settlement: bool,
        /// Confirm the row in the same step
        #[arg(long)]
        confirm: bool,
    },
    /// Drop a row's selection
    Clear { row: usize },
    Confirm { row: usize },
    Unconfirm { row: usize },
    /// Write every confirmed row as a settlement
    Commit,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let project_dirs = directories::ProjectDirs::from("com", "baixa", "Baixa")
        .context("Failed to resolve the data directory")?;
    let data_dir = project_dirs.data_dir().to_path_buf();

    let config = AppConfig::load(cli.config.as_deref(), &data_dir)?;
    let database = cli
        .database
        .or_else(|| config.database.clone())
        .unwrap_or_else(|| data_dir.join("baixa.db"));
    let review = cli.review.unwrap_or_else(|| data_dir.join("review.json"));
    let ctx = Context {
        config,
        database,
        review,
    };

    match cli.command {
        Command::Init => commands::init(&ctx).await,
        Command::Match { statement } => commands::run_match(&ctx, &statement).await,
        Command::Review => commands::review(&ctx).await,
        Command::Select {
            row,
            installment,
            override_settlement,
            confirm,
        } => commands::select(&ctx, row, installment, override_settlement, confirm),
        Command::Clear { row } => commands::clear(&ctx, row),
        Command::Confirm { row } => commands::confirm(&ctx, row),
        Command::Unconfirm { row } => commands::unconfirm(&ctx, row),
        Command::Commit => commands::commit(&ctx).await,
    }
}
