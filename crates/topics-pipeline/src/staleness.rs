//! Refresh gating on the age of the newest persisted snapshot.

use chrono::{DateTime, Duration, Utc};
use topics_db::TopicStore;

/// `true` when no snapshot exists or the newest is at least `threshold` old.
#[must_use]
pub fn is_stale(last: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold: Duration) -> bool {
    last.is_none_or(|last| now - last >= threshold)
}

/// Reads the newest snapshot time from `store` and applies [`is_stale`].
///
/// A failed read counts as stale.
pub async fn check_staleness(store: &dyn TopicStore, now: DateTime<Utc>, threshold: Duration) -> bool {
    match store.latest_snapshot_modified_at().await {
        Ok(last) => is_stale(last, now, threshold),
        Err(e) => {
            tracing::warn!(error = %e, "could not read last refresh time, treating data as stale");
            true
        }
    }
}
