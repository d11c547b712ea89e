use std::sync::Arc;
use std::time::Duration;

use store::OutboxStore;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{EventPublisher, RelayError};

const DEFAULT_BATCH_SIZE: usize = 100;

/// Moves outbox entries to the broker.
///
/// Entries are published oldest first and marked dispatched only after the
/// broker accepted them. A failure stops the pass; the failed entry and
/// everything after it are retried on the next pass. An entry published but
/// not yet marked may be published again, which consumers tolerate.
pub struct OutboxRelay<O: OutboxStore> {
    outbox: O,
    publisher: EventPublisher,
    batch_size: usize,
    pass: Mutex<()>,
}

impl<O: OutboxStore> OutboxRelay<O> {
    pub fn new(outbox: O, publisher: EventPublisher) -> Self {
        Self {
            outbox,
            publisher,
            batch_size: DEFAULT_BATCH_SIZE,
            pass: Mutex::new(()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Publishes every pending entry. Returns how many were dispatched.
    ///
    /// Passes never overlap, so entries leave in the order they were stored.
    pub async fn flush(&self) -> Result<usize, RelayError> {
        let _pass = self.pass.lock().await;
        let mut dispatched = 0;

        loop {
            let pending = self.outbox.pending(self.batch_size).await?;
            if pending.is_empty() {
                break;
            }
            for entry in &pending {
                self.publisher.publish_entry(entry).await?;
                self.outbox.mark_dispatched(entry.id).await?;
                metrics::counter!("outbox_dispatched_total", "routing_key" => entry.routing_key.clone())
                    .increment(1);
                dispatched += 1;
            }
        }

        if dispatched > 0 {
            tracing::debug!(dispatched, "outbox flushed");
        }
        Ok(dispatched)
    }
}

impl<O: OutboxStore + 'static> OutboxRelay<O> {
    /// Flushes every `interval` until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.flush().await {
                        tracing::warn!(error = %e, "outbox relay pass failed");
                    }
                }
            }
        }

        tracing::info!("outbox relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{OrderId, UserId};
    use domain::{LineItem, Money, Order, OrderEvent};
    use messaging::{InMemoryBroker, MessageBroker, QueueSpec};
    use store::{InMemoryOrderStore, OrderStore, OutboxEntry};

    async fn store_with_orders(n: usize) -> InMemoryOrderStore {
        let store = InMemoryOrderStore::new();
        for _ in 0..n {
            let order = Order::place(
                OrderId::new(),
                UserId::new("user123"),
                vec![LineItem::new("P1", "Widget", 1, Money::from_cents(100))],
                Utc::now(),
            )
            .unwrap();
            let entry = OutboxEntry::from_event(&OrderEvent::from(order.created_event())).unwrap();
            store.insert(&order, entry).await.unwrap();
        }
        store
    }

    async fn broker() -> InMemoryBroker {
        let broker = InMemoryBroker::default();
        broker
            .declare_queue(QueueSpec::new("created").bind("order.created"))
            .await
            .unwrap();
        broker
    }

    #[tokio::test]
    async fn test_flush_dispatches_in_order() {
        let store = store_with_orders(3).await;
        let expected: Vec<_> = store.outbox_entries().await.iter().map(|e| e.id).collect();
        let broker = broker().await;
        let relay = OutboxRelay::new(store.clone(), EventPublisher::new(Arc::new(broker.clone())))
            .with_batch_size(2);

        assert_eq!(relay.flush().await.unwrap(), 3);
        assert!(store.pending(10).await.unwrap().is_empty());

        for id in expected {
            let delivery = broker.receive("created").await.unwrap();
            assert_eq!(delivery.message.message_id, id);
        }
    }

    #[tokio::test]
    async fn test_broker_outage_keeps_entries_pending() {
        let store = store_with_orders(2).await;
        let broker = broker().await;
        let relay = OutboxRelay::new(store.clone(), EventPublisher::new(Arc::new(broker.clone())));

        broker.set_available(false);
        assert!(matches!(relay.flush().await, Err(RelayError::Publish(_))));
        assert_eq!(store.pending(10).await.unwrap().len(), 2);

        broker.set_available(true);
        assert_eq!(relay.flush().await.unwrap(), 2);
        assert_eq!(broker.queue_depth("created").await, 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = store_with_orders(1).await;
        let broker = broker().await;
        let relay = Arc::new(OutboxRelay::new(
            store.clone(),
            EventPublisher::new(Arc::new(broker.clone())),
        ));
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(relay.run(Duration::from_millis(5), shutdown.clone()));
        let delivery = broker.receive("created").await.unwrap();
        assert_eq!(delivery.message.routing_key, "order.created");

        shutdown.cancel();
        task.await.unwrap();
    }
}
