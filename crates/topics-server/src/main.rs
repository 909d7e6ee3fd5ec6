mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use topics_db::{PgStore, SharedStore};
use topics_pipeline::Pipeline;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = topics_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::info!(env = %config.env, bind_addr = %config.bind_addr, "starting topics-server");

    let pool_config = topics_db::PoolConfig::from_app_config(&config);
    let pool = topics_db::connect_pool(&config.database_url, pool_config).await?;
    topics_db::run_migrations(&pool).await?;
    let store: SharedStore = Arc::new(PgStore::new(pool));

    let pipeline = Pipeline::from_config(&config, Arc::clone(&store))?;
    let consumers = pipeline.spawn_consumers();
    let mut scheduler = scheduler::build_scheduler(Arc::clone(&pipeline.ingestor), &config).await?;

    let app = build_app(AppState { store });
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    drop(pipeline);
    for consumer in consumers {
        consumer.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
