//! Integration tests for consumers running against the in-memory broker.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use messaging::{
    BrokerConfig, Consumer, HandlerError, InMemoryBroker, Message, MessageBroker, MessageHandler,
    MessagePublisher, QueueSpec,
};
use serde_json::json;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

fn message(routing_key: &str, n: u64) -> Message {
    Message::builder()
        .routing_key(routing_key)
        .payload_raw(json!({ "n": n }))
        .try_build()
        .unwrap()
}

fn broker(max_deliveries: u32) -> InMemoryBroker {
    InMemoryBroker::new(BrokerConfig {
        max_deliveries,
        redelivery_delay: Duration::from_millis(1),
        ..BrokerConfig::default()
    })
}

/// Records every payload it sees.
#[derive(Default)]
struct Recording {
    seen: Mutex<Vec<u64>>,
}

#[async_trait]
impl MessageHandler for Recording {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let n = message.payload["n"]
            .as_u64()
            .ok_or_else(|| HandlerError::reject("missing n"))?;
        self.seen.lock().await.push(n);
        Ok(())
    }
}

/// Fails the first `failures` calls, then succeeds.
struct Flaky {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl MessageHandler for Flaky {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn handle(&self, _message: &Message) -> Result<(), HandlerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(HandlerError::retry("not yet"))
        } else {
            Ok(())
        }
    }
}

async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn test_worker_pool_processes_every_message_once() {
    let broker = broker(5);
    broker
        .declare_queue(QueueSpec::new("q").bind("order.*"))
        .await
        .unwrap();
    for n in 0..50 {
        broker.publish(message("order.created", n)).await.unwrap();
    }

    let handler = Arc::new(Recording::default());
    let shutdown = CancellationToken::new();
    let handle = Consumer::new(Arc::new(broker.clone()), "q", handler.clone())
        .concurrency(4)
        .spawn(shutdown.clone());

    wait_until(|| async { handler.seen.lock().await.len() == 50 }).await;
    shutdown.cancel();
    handle.join().await;

    let mut seen = handler.seen.lock().await.clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..50).collect::<Vec<_>>());
    assert_eq!(broker.unacked_count(), 0);
}

#[tokio::test]
async fn test_retried_message_eventually_succeeds() {
    let broker = broker(5);
    broker
        .declare_queue(QueueSpec::new("q").bind("order.created"))
        .await
        .unwrap();
    broker.publish(message("order.created", 1)).await.unwrap();

    let handler = Arc::new(Flaky {
        failures: 2,
        calls: AtomicUsize::new(0),
    });
    let shutdown = CancellationToken::new();
    let handle = Consumer::new(Arc::new(broker.clone()), "q", handler.clone()).spawn(shutdown.clone());

    wait_until(|| async { handler.calls.load(Ordering::SeqCst) == 3 }).await;
    wait_until(|| async { broker.unacked_count() == 0 }).await;
    shutdown.cancel();
    handle.join().await;

    assert!(broker.drain_dead_letters("q").await.is_empty());
}

#[tokio::test]
async fn test_persistent_failure_is_dead_lettered() {
    let broker = broker(3);
    broker
        .declare_queue(QueueSpec::new("q").bind("order.created"))
        .await
        .unwrap();
    broker.publish(message("order.created", 1)).await.unwrap();

    let handler = Arc::new(Flaky {
        failures: usize::MAX,
        calls: AtomicUsize::new(0),
    });
    let shutdown = CancellationToken::new();
    let handle = Consumer::new(Arc::new(broker.clone()), "q", handler.clone()).spawn(shutdown.clone());

    wait_until(|| async { handler.calls.load(Ordering::SeqCst) == 3 }).await;
    wait_until(|| async { broker.unacked_count() == 0 }).await;
    shutdown.cancel();
    handle.join().await;

    assert_eq!(broker.drain_dead_letters("q").await.len(), 1);
}

#[tokio::test]
async fn test_malformed_message_is_rejected_without_retry() {
    let broker = broker(5);
    broker
        .declare_queue(QueueSpec::new("q").bind("order.created"))
        .await
        .unwrap();
    let malformed = Message::builder()
        .routing_key("order.created")
        .payload_raw(json!({ "n": "not a number" }))
        .try_build()
        .unwrap();
    broker.publish(malformed).await.unwrap();

    let handler = Arc::new(Recording::default());
    let shutdown = CancellationToken::new();
    let handle = Consumer::new(Arc::new(broker.clone()), "q", handler.clone()).spawn(shutdown.clone());

    wait_until(|| async { broker.queue_depth("q.dlq").await == 1 }).await;
    shutdown.cancel();
    handle.join().await;

    assert!(handler.seen.lock().await.is_empty());
}

#[tokio::test]
async fn test_closing_the_broker_stops_workers() {
    let broker = broker(5);
    broker
        .declare_queue(QueueSpec::new("q").bind("order.created"))
        .await
        .unwrap();

    let handle = Consumer::new(
        Arc::new(broker.clone()),
        "q",
        Arc::new(Recording::default()),
    )
    .concurrency(2)
    .spawn(CancellationToken::new());

    broker.close().await;
    tokio::time::timeout(Duration::from_secs(1), handle.join())
        .await
        .unwrap();
}
