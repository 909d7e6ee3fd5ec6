//! Command handlers, called from `main` once config and the store are ready.

use chrono::Utc;
use topics_core::AppConfig;
use topics_db::{RankedTopicRow, SharedStore, TopicStore};
use topics_pipeline::{CycleOutcome, Pipeline};

/// Runs one refresh cycle and, when a batch was committed, both enrichments.
///
/// Without `force` the staleness gate applies and a fresh history is left
/// alone.
///
/// # Errors
///
/// Returns an error if the feed is switched off, the pipeline cannot be
/// built, or the ingest cycle fails.
/// Enrichment failures are logged per topic and reported in the summary.
pub(crate) async fn run_refresh(
    config: &AppConfig,
    store: SharedStore,
    force: bool,
) -> anyhow::Result<()> {
    if !config.feed_enabled {
        anyhow::bail!("featured feed is disabled (TOPICS_FEED_ENABLED=false)");
    }
    let pipeline = Pipeline::from_config(config, store)?;
    let now = Utc::now();

    let event = if force {
        pipeline.ingestor.ingest(now.date_naive()).await?
    } else {
        match pipeline.ingestor.run_refresh_cycle(now).await? {
            CycleOutcome::Ran(event) => event,
            CycleOutcome::Fresh => {
                println!("view history is fresh; nothing to do (use --force to refresh anyway)");
                return Ok(());
            }
            CycleOutcome::Busy => {
                println!("another refresh is already running; nothing to do");
                return Ok(());
            }
        }
    };

    let Some(event) = event else {
        println!("featured feed had no entries; nothing recorded");
        return Ok(());
    };

    println!("recorded {} topics", event.topic_titles.len());
    let (discussions, tone) = pipeline.enrich(&event).await;
    println!(
        "discussions: {} written, {} failed; tone charts: {} written, {} failed",
        discussions.written, discussions.failed, tone.written, tone.failed
    );
    Ok(())
}

/// Prints the newest batch ranked by views.
///
/// # Errors
///
/// Returns an error if the store query fails.
pub(crate) async fn run_top(store: &dyn TopicStore, limit: i64) -> anyhow::Result<()> {
    let rows = store.list_latest_ranked_topics(limit.clamp(1, 200)).await?;
    if rows.is_empty() {
        println!("no view history recorded yet");
        return Ok(());
    }
    for (rank, row) in rows.iter().enumerate() {
        println!("{}", format_row(rank + 1, row));
    }
    Ok(())
}

/// Deletes every view-history snapshot. Requires explicit confirmation.
///
/// # Errors
///
/// Returns an error without `yes`, or if the delete fails.
pub(crate) async fn run_reset(store: &dyn TopicStore, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("refusing to delete view history without --yes");
    }
    let removed = store.delete_all_view_snapshots().await?;
    println!("deleted {removed} view-history snapshots");
    Ok(())
}

fn format_row(rank: usize, row: &RankedTopicRow) -> String {
    format!(
        "{rank:>3}. {:<50} {:>10} views  trend {:+.1}",
        row.title, row.views, row.trend
    )
}
