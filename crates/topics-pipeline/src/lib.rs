//! Refresh pipeline: the gated featured-topics ingestor, the refresh-event
//! bus, and the discussion and tone consumers that enrich each batch.

pub mod discussion;
pub mod events;
pub mod ingest;
pub mod staleness;
pub mod tone;

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use topics_core::AppConfig;
use topics_db::{DbError, SharedStore};
use topics_sources::{SourceError, Sources};

pub use discussion::DiscussionEnricher;
pub use events::{RefreshBus, RefreshEvent};
pub use ingest::{CycleOutcome, FeaturedIngestor};
pub use staleness::{check_staleness, is_stale};
pub use tone::ToneEnricher;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("database error: {0}")]
    Db(#[from] DbError),
}

/// Per-event tally reported by the enrichment consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    /// Topics from the event that were found in the store.
    pub topics: usize,
    /// Topics whose enrichment was persisted.
    pub written: usize,
    /// Topics whose fetch or write failed.
    pub failed: usize,
}

/// The ingestor, both consumers, and the bus that connects them.
///
/// A consumer switched off in the config is `None` and never subscribes.
pub struct Pipeline {
    pub ingestor: Arc<FeaturedIngestor>,
    pub discussions: Option<Arc<DiscussionEnricher>>,
    pub tone: Option<Arc<ToneEnricher>>,
    pub bus: RefreshBus,
}

impl Pipeline {
    /// Builds every source client and wires them to `store`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Source`] if a source client cannot be built.
    pub fn from_config(config: &AppConfig, store: SharedStore) -> Result<Self, PipelineError> {
        let sources = Sources::from_config(config)?;
        let bus = RefreshBus::new(config.event_capacity);

        let ingestor = FeaturedIngestor::new(
            Arc::clone(&store),
            sources.feed,
            bus.clone(),
            chrono::Duration::minutes(config.staleness_minutes),
            config.feed_concurrency,
        );

        let discussions = config.discussion_enabled.then(|| {
            Arc::new(DiscussionEnricher::new(Arc::clone(&store), sources.discussion))
        });
        let tone = config
            .tone_enabled
            .then(|| Arc::new(ToneEnricher::new(store, sources.tone)));
        if discussions.is_none() {
            tracing::info!("discussion enrichment disabled");
        }
        if tone.is_none() {
            tracing::info!("tone enrichment disabled");
        }

        Ok(Self {
            ingestor: Arc::new(ingestor),
            discussions,
            tone,
            bus,
        })
    }

    /// Subscribes the enabled consumers and runs them as background tasks.
    #[must_use]
    pub fn spawn_consumers(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);
        if let Some(discussions) = &self.discussions {
            handles.push(Arc::clone(discussions).spawn(self.bus.subscribe()));
        }
        if let Some(tone) = &self.tone {
            handles.push(Arc::clone(tone).spawn(self.bus.subscribe()));
        }
        handles
    }

    /// Handles `event` with the enabled consumers concurrently, for callers
    /// that run a refresh inline instead of through the bus.
    ///
    /// A disabled consumer reports an empty summary.
    pub async fn enrich(&self, event: &RefreshEvent) -> (EnrichmentSummary, EnrichmentSummary) {
        let discussions = async {
            match &self.discussions {
                Some(enricher) => enricher.handle(event).await,
                None => EnrichmentSummary::default(),
            }
        };
        let tone = async {
            match &self.tone {
                Some(enricher) => enricher.handle(event).await,
                None => EnrichmentSummary::default(),
            }
        };
        tokio::join!(discussions, tone)
    }
}
