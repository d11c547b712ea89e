//! Process wiring.

use std::sync::Arc;

use domain::{DomainEvent, OrderCreated};
use inventory::{InventoryService, RESERVATION_QUEUE, ReservationHandler};
use messaging::{Consumer, ConsumerHandle, MessageBroker, QueueSpec};
use notification::{NotificationDispatcher, Notifier, dispatcher::QUEUES};
use orders::{EventPublisher, OrderService, OutboxRelay};
use store::{InventoryStore, OrderStore, OutboxStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Config, Result};

/// Every queue of the platform with its binding.
pub fn topology() -> Vec<QueueSpec> {
    let mut specs = vec![QueueSpec::new(RESERVATION_QUEUE).bind(OrderCreated::ROUTING_KEY)];
    specs.extend(notification::dispatcher::queue_specs());
    specs
}

/// The running order platform.
///
/// Owns the synchronous services and the background tasks: one consumer per
/// queue and the outbox relay loop. [`Platform::shutdown`] stops them and
/// waits for in-flight deliveries to finish.
pub struct Platform<O, I>
where
    O: OrderStore + OutboxStore + Clone + 'static,
    I: InventoryStore + Clone + 'static,
{
    orders: OrderService<O>,
    inventory: InventoryService<I>,
    relay: Arc<OutboxRelay<O>>,
    shutdown: CancellationToken,
    consumers: Vec<ConsumerHandle>,
    relay_task: JoinHandle<()>,
}

impl<O, I> Platform<O, I>
where
    O: OrderStore + OutboxStore + Clone + 'static,
    I: InventoryStore + Clone + 'static,
{
    /// Declares the topology, starts every consumer and the relay loop.
    #[tracing::instrument(skip_all, fields(exchange = %config.exchange))]
    pub async fn start<B, N>(
        config: &Config,
        order_store: O,
        inventory_store: I,
        broker: B,
        notifier: N,
    ) -> Result<Self>
    where
        B: MessageBroker + Clone + 'static,
        N: Notifier,
    {
        for spec in topology() {
            broker.declare_queue(spec).await?;
        }

        let relay = Arc::new(OutboxRelay::new(
            order_store.clone(),
            EventPublisher::new(Arc::new(broker.clone())),
        ));
        let orders = OrderService::new(order_store, config.order_service_config())
            .with_relay(Arc::clone(&relay));
        let inventory = InventoryService::new(inventory_store.clone());

        let shutdown = CancellationToken::new();
        let mut consumers = Vec::new();

        let reservations = ReservationHandler::new(inventory_store)
            .deduplicate(config.deduplicate_reservations);
        consumers.push(
            Consumer::new(
                Arc::new(broker.clone()),
                RESERVATION_QUEUE,
                Arc::new(reservations),
            )
            .concurrency(config.consumer_concurrency)
            .spawn(shutdown.clone()),
        );

        let dispatcher = Arc::new(NotificationDispatcher::new(notifier));
        for (queue, _) in QUEUES {
            consumers.push(
                Consumer::new(Arc::new(broker.clone()), queue, dispatcher.clone())
                    .concurrency(config.consumer_concurrency)
                    .spawn(shutdown.clone()),
            );
        }

        let relay_task = tokio::spawn(
            Arc::clone(&relay).run(config.outbox_poll_interval, shutdown.clone()),
        );

        tracing::info!(
            consumers = consumers.len(),
            deduplicate_reservations = config.deduplicate_reservations,
            guard_transitions = config.guard_transitions,
            "platform started"
        );

        Ok(Self {
            orders,
            inventory,
            relay,
            shutdown,
            consumers,
            relay_task,
        })
    }

    pub fn orders(&self) -> &OrderService<O> {
        &self.orders
    }

    pub fn inventory(&self) -> &InventoryService<I> {
        &self.inventory
    }

    pub fn relay(&self) -> &OutboxRelay<O> {
        &self.relay
    }

    /// Queues with a running consumer.
    pub fn consumed_queues(&self) -> Vec<&str> {
        self.consumers.iter().map(|c| c.queue()).collect()
    }

    /// Stops the consumers and the relay loop.
    ///
    /// Entries still pending in the outbox stay there for the relay of the
    /// next run.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for consumer in self.consumers {
            consumer.join().await;
        }
        if let Err(e) = self.relay_task.await {
            tracing::error!(error = %e, "outbox relay task panicked");
        }
        tracing::info!("platform stopped");
    }
}
