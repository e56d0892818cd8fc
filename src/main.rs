use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;

use parimut::adapter::HttpLedgerClient;
use parimut::config::Config;
use parimut::service::Sweeper;
use parimut::store::db::{create_pool, run_migrations};
use parimut::store::SqliteStore;

#[derive(Parser)]
#[command(name = "parimut", about = "Parimutuel market lifecycle daemon")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sweep daemon until interrupted.
    Run,
    /// Run a single sweep pass and exit.
    Sweep,
    /// Create the database and apply migrations.
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config))?;
    config.logging.init();

    let pool = create_pool(&config.database.url).context("failed to open database")?;
    run_migrations(&pool).context("failed to apply migrations")?;

    match cli.command {
        Command::InitDb => {
            info!(url = %config.database.url, "database initialized");
            Ok(())
        }
        Command::Sweep => {
            let sweeper = build_sweeper(&config, pool)?;
            let report = sweeper
                .sweep_once(chrono::Utc::now())
                .await
                .context("sweep pass failed")?;
            info!(?report, "sweep complete");
            Ok(())
        }
        Command::Run => {
            let sweeper = build_sweeper(&config, pool)?;
            let interval = Duration::from_secs(config.sweep.interval_secs);
            info!(interval_secs = config.sweep.interval_secs, "parimut starting");

            sweeper
                .run(interval, async {
                    let _ = signal::ctrl_c().await;
                    info!("shutdown signal received");
                })
                .await;

            info!("parimut stopped");
            Ok(())
        }
    }
}

fn build_sweeper(
    config: &Config,
    pool: parimut::store::db::DbPool,
) -> anyhow::Result<Sweeper<SqliteStore, HttpLedgerClient>> {
    let store = Arc::new(SqliteStore::new(pool));
    let ledger = Arc::new(HttpLedgerClient::new(&config.ledger)?);
    let params = config.odds_params()?;
    Ok(Sweeper::new(store, ledger, params))
}
