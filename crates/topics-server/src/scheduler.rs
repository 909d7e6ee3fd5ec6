//! Background refresh scheduling.
//!
//! Registers the recurring refresh job and a one-shot warm-up run shortly
//! after startup. Both go through the staleness gate, so a restart within the
//! freshness window does not refetch the feed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use topics_core::AppConfig;
use topics_pipeline::{CycleOutcome, FeaturedIngestor};

/// Builds and starts the background job scheduler.
///
/// With the featured feed switched off the scheduler starts empty.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    ingestor: Arc<FeaturedIngestor>,
    config: &AppConfig,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if !config.feed_enabled {
        tracing::warn!("scheduler: featured feed disabled, no refresh jobs registered");
        scheduler.start().await?;
        return Ok(scheduler);
    }

    register_refresh_job(&scheduler, Arc::clone(&ingestor), &config.refresh_cron).await?;
    register_initial_refresh(
        &scheduler,
        ingestor,
        Duration::from_secs(config.initial_delay_secs),
    )
    .await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_refresh_job(
    scheduler: &JobScheduler,
    ingestor: Arc<FeaturedIngestor>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let ingestor = Arc::clone(&ingestor);
        Box::pin(async move {
            run_refresh(&ingestor, "scheduled").await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: refresh job registered");
    Ok(())
}

async fn register_initial_refresh(
    scheduler: &JobScheduler,
    ingestor: Arc<FeaturedIngestor>,
    delay: Duration,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_one_shot_async(delay, move |_uuid, _lock| {
        let ingestor = Arc::clone(&ingestor);
        Box::pin(async move {
            run_refresh(&ingestor, "startup").await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

async fn run_refresh(ingestor: &FeaturedIngestor, trigger: &'static str) {
    tracing::info!(trigger, "scheduler: refresh cycle starting");
    match ingestor.run_refresh_cycle(Utc::now()).await {
        Ok(CycleOutcome::Ran(_)) => tracing::info!(trigger, "scheduler: refresh cycle complete"),
        Ok(CycleOutcome::Fresh | CycleOutcome::Busy) => {}
        Err(e) => tracing::error!(trigger, error = %e, "scheduler: refresh cycle failed"),
    }
}
