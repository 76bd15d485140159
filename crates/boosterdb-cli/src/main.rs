mod collect;
mod history;
mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use boosterdb_core::RunSummary;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::collect::CollectCommands;

#[derive(Debug, Parser)]
#[command(name = "boosterdb")]
#[command(about = "Track booster profiles and posts and record what changes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run one collection cycle
    Collect {
        #[command(subcommand)]
        command: CollectCommands,
    },
    /// Fetch one profile and store it with a booster number
    Add {
        /// Handle, with or without a leading @
        username: String,
        /// Booster number to assign (defaults to the next free one)
        #[arg(long)]
        booster: Option<i64>,
    },
    /// Fetch and store every booster from the booster list
    Seed {
        /// Booster list to read (defaults to `BOOSTERDB_BOOSTERS_PATH`)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show recorded changes for a handle, newest first
    History {
        handle: String,
        /// Maximum number of events to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Show post engagement changes instead of profile changes
        #[arg(long)]
        posts: bool,
    },
    /// Run profile and post cycles on their cron schedules until interrupted
    Watch,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending migrations
    Migrate,
    /// Check database connectivity
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("boosterdb: no command given; run `boosterdb --help` for usage");
        return Ok(());
    };

    let config = boosterdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    let pool_config = boosterdb_db::PoolConfig::from_app_config(&config);
    let pool = boosterdb_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Migrate => {
                let applied = boosterdb_db::run_migrations(&pool).await?;
                println!("migrations applied: {applied}");
            }
            DbCommands::Ping => {
                boosterdb_db::ping(&pool).await?;
                println!("database ok");
            }
        },
        Commands::Collect { command } => {
            let summary = collect::run_collect(&pool, &config, command).await?;
            finish_run(&summary)?;
        }
        Commands::Add { username, booster } => {
            collect::run_add(&pool, &config, &username, booster).await?;
        }
        Commands::Seed { path } => {
            let path = path.unwrap_or_else(|| config.boosters_path.clone());
            let summary = collect::run_seed(&pool, &config, &path).await?;
            finish_run(&summary)?;
        }
        Commands::History {
            handle,
            limit,
            posts,
        } => {
            if posts {
                history::print_post_history(&pool, &handle, limit).await?;
            } else {
                history::print_profile_history(&pool, &handle, limit).await?;
            }
        }
        Commands::Watch => {
            let collector = Arc::new(collect::build_collector(
                &pool,
                &config,
                boosterdb_collector::CycleSettings::from_app_config(&config),
            )?);
            watch::run_watch(collector, &config).await?;
        }
    }

    Ok(())
}

/// Print the run summary; a run with any recorded failure exits non-zero.
fn finish_run(summary: &RunSummary) -> anyhow::Result<()> {
    print!("{summary}");
    if summary.has_failures() {
        anyhow::bail!(
            "{} run finished with {} failure(s)",
            summary.label,
            summary.failures.len()
        );
    }
    Ok(())
}
