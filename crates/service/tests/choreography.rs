//! End-to-end choreography: orders, reservations and notifications running
//! together on the in-memory broker.

use std::time::Duration;

use common::{ProductId, UserId};
use domain::{LineItem, Money, OrderStatus};
use messaging::InMemoryBroker;
use notification::{NotificationKind, RecordingNotifier};
use service::{Config, Platform};
use store::{InMemoryInventoryStore, InMemoryOrderStore, OutboxStore};

type TestPlatform = Platform<InMemoryOrderStore, InMemoryInventoryStore>;

fn config() -> Config {
    Config {
        consumer_concurrency: 2,
        max_deliveries: 2,
        redelivery_delay: Duration::from_millis(1),
        outbox_poll_interval: Duration::from_millis(10),
        ..Config::default()
    }
}

async fn start(config: Config) -> (TestPlatform, InMemoryBroker, RecordingNotifier) {
    let broker = InMemoryBroker::new(config.broker_config());
    let notifier = RecordingNotifier::new();
    let platform = Platform::start(
        &config,
        InMemoryOrderStore::new(),
        InMemoryInventoryStore::new(),
        broker.clone(),
        notifier.clone(),
    )
    .await
    .unwrap();

    platform
        .inventory()
        .upsert_inventory(ProductId::new("P1"), 10)
        .await
        .unwrap();
    (platform, broker, notifier)
}

fn widget(quantity: u32) -> Vec<LineItem> {
    vec![LineItem::new("P1", "Widget", quantity, Money::from_cents(5000))]
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

async fn reserved(platform: &TestPlatform) -> u32 {
    platform
        .inventory()
        .get_inventory(&ProductId::new("P1"))
        .await
        .unwrap()
        .reserved()
}

#[tokio::test]
async fn test_order_lifecycle_reserves_stock_and_notifies() {
    let (platform, _broker, notifier) = start(config()).await;
    let orders = platform.orders();

    let order = orders
        .create_order(UserId::new("user123"), widget(2))
        .await
        .unwrap();
    assert_eq!(order.total_amount(), Money::from_cents(10000));

    wait_until(|| async { reserved(&platform).await == 2 }).await;

    orders.mark_paid(order.id(), "payment123").await.unwrap();
    let shipped = orders.mark_shipped(order.id(), "1Z999AA1").await.unwrap();
    assert_eq!(shipped.status(), OrderStatus::Shipped);

    wait_until(|| async { notifier.sent().await.len() == 3 }).await;
    let sent = notifier.sent().await;
    for kind in [
        NotificationKind::OrderCreated,
        NotificationKind::OrderPaid,
        NotificationKind::OrderShipped,
    ] {
        assert_eq!(sent.iter().filter(|n| n.kind == kind).count(), 1);
    }
    let shipped_note = sent
        .iter()
        .find(|n| n.kind == NotificationKind::OrderShipped)
        .unwrap();
    assert_eq!(shipped_note.detail("Carrier"), Some("UPS"));

    platform.shutdown().await;
}

#[tokio::test]
async fn test_unreservable_order_stays_pending() {
    let (platform, broker, notifier) = start(config()).await;

    let order = platform
        .orders()
        .create_order(UserId::new("user123"), widget(11))
        .await
        .unwrap();

    wait_until(|| async {
        broker.queue_depth("inventory.order-created.dlq").await == 1
    })
    .await;

    assert_eq!(reserved(&platform).await, 0);
    let stored = platform.orders().get_order(order.id()).await.unwrap();
    assert_eq!(stored.status(), OrderStatus::Pending);

    // The customer is still told the order was created.
    wait_until(|| async { notifier.sent().await.len() == 1 }).await;
    platform.shutdown().await;
}

#[tokio::test]
async fn test_events_published_during_outage_arrive_after_recovery() {
    let (platform, broker, notifier) = start(config()).await;
    broker.set_available(false);

    let order = platform
        .orders()
        .create_order(UserId::new("user123"), widget(3))
        .await
        .unwrap();
    platform.orders().mark_paid(order.id(), "payment123").await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(reserved(&platform).await, 0);
    assert!(notifier.sent().await.is_empty());

    broker.set_available(true);
    wait_until(|| async { reserved(&platform).await == 3 }).await;
    wait_until(|| async { notifier.sent().await.len() == 2 }).await;

    platform.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_leaves_undelivered_events_in_outbox() {
    let (platform, broker, notifier) = start(Config {
        outbox_poll_interval: Duration::from_secs(3600),
        ..config()
    })
    .await;
    // Let the relay loop take its immediate first tick on an empty outbox.
    tokio::time::sleep(Duration::from_millis(20)).await;
    broker.set_available(false);

    let order = platform
        .orders()
        .create_order(UserId::new("user123"), widget(1))
        .await
        .unwrap();
    broker.set_available(true);

    let store = platform.orders().store().clone();
    platform.shutdown().await;

    let pending = store.pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].routing_key, "order.created");
    assert_eq!(pending[0].payload["orderId"], order.id().to_string());
    assert_eq!(store.dispatched_count().await, 0);
    assert_eq!(broker.queue_depth("inventory.order-created").await, 0);
    assert!(notifier.sent().await.is_empty());
}

#[tokio::test]
async fn test_notification_failures_do_not_touch_orders_or_stock() {
    let (platform, broker, notifier) = start(config()).await;
    notifier.set_failing(true);

    let order = platform
        .orders()
        .create_order(UserId::new("user123"), widget(4))
        .await
        .unwrap();

    wait_until(|| async {
        broker.queue_depth("notification.order-created.dlq").await == 1
    })
    .await;
    wait_until(|| async { reserved(&platform).await == 4 }).await;

    let stored = platform.orders().get_order(order.id()).await.unwrap();
    assert_eq!(stored.status(), OrderStatus::Pending);
    platform.shutdown().await;
}

#[tokio::test]
async fn test_guarded_transitions_reject_shipping_before_payment() {
    let (platform, _broker, _notifier) = start(Config {
        guard_transitions: true,
        ..config()
    })
    .await;

    let order = platform
        .orders()
        .create_order(UserId::new("user123"), widget(1))
        .await
        .unwrap();
    let result = platform.orders().mark_shipped(order.id(), "1Z999AA1").await;

    assert!(result.is_err());
    platform.shutdown().await;
}

#[tokio::test]
async fn test_platform_consumes_every_queue() {
    let (platform, _broker, _notifier) = start(config()).await;
    assert_eq!(
        platform.consumed_queues(),
        [
            "inventory.order-created",
            "notification.order-created",
            "notification.order-paid",
            "notification.order-shipped",
        ]
    );
    platform.shutdown().await;
}
