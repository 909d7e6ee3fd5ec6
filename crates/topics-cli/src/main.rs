mod commands;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use topics_db::{PgStore, SharedStore};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "topics-cli")]
#[command(about = "Trending topics command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Run one featured-feed refresh and both enrichments inline
    Refresh {
        /// Ignore the staleness gate and always fetch the feed
        #[arg(long)]
        force: bool,
    },
    /// Print the latest ranked topics
    Top {
        /// Maximum number of topics to show
        #[arg(long, default_value = "25")]
        limit: i64,
    },
    /// Delete the entire view history (topics and enrichments are kept)
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = topics_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = topics_db::PoolConfig::from_app_config(&config);
    let pool = topics_db::connect_pool(&config.database_url, pool_config).await?;

    let store: SharedStore = Arc::new(PgStore::new(pool.clone()));

    match cli.command {
        Commands::Migrate => {
            topics_db::run_migrations(&pool).await?;
            println!("migrations applied");
        }
        Commands::Refresh { force } => commands::run_refresh(&config, store, force).await?,
        Commands::Top { limit } => commands::run_top(store.as_ref(), limit).await?,
        Commands::Reset { yes } => commands::run_reset(store.as_ref(), yes).await?,
    }

    Ok(())
}
