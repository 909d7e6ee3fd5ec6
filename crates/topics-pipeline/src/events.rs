//! Refresh-event bus between the ingestor and the enrichment consumers.

use std::future::Future;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::RecvError};

/// Published once per committed refresh batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEvent {
    /// Commit timestamp of the batch.
    pub created_at: DateTime<Utc>,
    /// Titles of every topic in the batch, in feed order.
    pub topic_titles: Vec<String>,
}

/// Typed broadcast channel; every subscriber receives every event.
#[derive(Debug, Clone)]
pub struct RefreshBus {
    tx: broadcast::Sender<RefreshEvent>,
}

impl RefreshBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
        self.tx.subscribe()
    }

    /// Sends `event` to all current subscribers and returns how many there were.
    ///
    /// Having no subscribers is not an error; the event is dropped and logged.
    pub fn publish(&self, event: RefreshEvent) -> usize {
        let topics = event.topic_titles.len();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(receivers, topics, "refresh event published");
                receivers
            }
            Err(_) => {
                tracing::info!(topics, "refresh event published with no subscribers");
                0
            }
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Drives `handler` for every event on `rx` until the bus closes.
///
/// A lagging receiver logs how many events it skipped and keeps going.
pub(crate) async fn consume<F, Fut>(
    consumer: &'static str,
    mut rx: broadcast::Receiver<RefreshEvent>,
    mut handler: F,
) where
    F: FnMut(RefreshEvent) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        match rx.recv().await {
            Ok(event) => handler(event).await,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(consumer, skipped, "consumer lagged behind refresh events");
            }
            Err(RecvError::Closed) => {
                tracing::info!(consumer, "refresh bus closed, consumer stopping");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(titles: &[&str]) -> RefreshEvent {
        RefreshEvent {
            created_at: Utc::now(),
            topic_titles: titles.iter().map(|t| (*t).to_owned()).collect(),
        }
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_event() {
        let bus = RefreshBus::new(4);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        assert_eq!(bus.publish(event(&["One"])), 2);

        assert_eq!(a.recv().await.unwrap().topic_titles, vec!["One"]);
        assert_eq!(b.recv().await.unwrap().topic_titles, vec!["One"]);
    }

    #[test]
    fn publishing_without_subscribers_returns_zero() {
        let bus = RefreshBus::new(4);
        assert_eq!(bus.publish(event(&["One"])), 0);
    }

    #[tokio::test]
    async fn consume_skips_lag_and_stops_on_close() {
        let bus = RefreshBus::new(1);
        let rx = bus.subscribe();
        bus.publish(event(&["dropped"]));
        bus.publish(event(&["kept"]));
        drop(bus);

        let mut seen = Vec::new();
        consume("test", rx, |e| {
            seen.extend(e.topic_titles);
            async {}
        })
        .await;

        assert_eq!(seen, vec!["kept"]);
    }
}
