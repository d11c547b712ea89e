use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    BrokerError, Delivery, Message, MessageBroker, MessagePublisher, QueueSpec, Result,
    dead_letter_queue,
};

/// Redelivery settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Exchange name, used in logs.
    pub exchange: String,

    /// Deliveries allowed before a message is dead-lettered.
    pub max_deliveries: u32,

    /// Delay before the first redelivery; doubles on every further attempt.
    pub redelivery_delay: Duration,

    /// Upper bound on the redelivery delay.
    pub max_redelivery_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            exchange: "order-exchange".to_string(),
            max_deliveries: 5,
            redelivery_delay: Duration::from_millis(200),
            max_redelivery_delay: Duration::from_secs(30),
        }
    }
}

impl BrokerConfig {
    /// Delay before delivering attempt `next_attempt` (2 or more).
    pub fn delay_for_attempt(&self, next_attempt: u32) -> Duration {
        let exponent = next_attempt.saturating_sub(2).min(16);
        self.redelivery_delay
            .saturating_mul(1 << exponent)
            .min(self.max_redelivery_delay)
    }
}

#[derive(Debug, Clone)]
struct Envelope {
    message: Message,
    attempt: u32,
}

struct QueueState {
    spec: RwLock<QueueSpec>,
    sender: Sender<Envelope>,
    receiver: Receiver<Envelope>,
}

impl QueueState {
    fn new(spec: QueueSpec) -> Arc<Self> {
        let (sender, receiver) = async_channel::unbounded();
        Arc::new(Self {
            spec: RwLock::new(spec),
            sender,
            receiver,
        })
    }
}

struct Inner {
    config: BrokerConfig,
    queues: RwLock<HashMap<String, Arc<QueueState>>>,
    /// Never held across an await point.
    unacked: Mutex<HashMap<u64, Envelope>>,
    next_tag: AtomicU64,
    available: AtomicBool,
}

impl Inner {
    fn unacked(&self) -> MutexGuard<'_, HashMap<u64, Envelope>> {
        self.unacked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process topic exchange.
///
/// Each declared queue is an unbounded channel that buffers messages until a
/// consumer takes them, so nothing published after declaration is lost while
/// consumers are busy or not yet started. Competing consumers on one queue
/// each receive distinct messages.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(BrokerConfig::default())
    }
}

impl InMemoryBroker {
    /// Creates a broker with no queues.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                queues: RwLock::new(HashMap::new()),
                unacked: Mutex::new(HashMap::new()),
                next_tag: AtomicU64::new(1),
                available: AtomicBool::new(true),
            }),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.inner.config
    }

    /// Simulates losing or regaining the connection. While unavailable,
    /// `publish` fails with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Closes every queue. Waiting consumers get `Closed` once their queue
    /// is drained.
    pub async fn close(&self) {
        for queue in self.inner.queues.read().await.values() {
            queue.sender.close();
        }
    }

    /// Number of messages waiting in `queue`.
    pub async fn queue_depth(&self, queue: &str) -> usize {
        match self.inner.queues.read().await.get(queue) {
            Some(state) => state.receiver.len(),
            None => 0,
        }
    }

    /// Number of deliveries handed out and not yet acked or nacked.
    pub fn unacked_count(&self) -> usize {
        self.inner.unacked().len()
    }

    /// Removes and returns everything in the dead-letter queue of `queue`.
    pub async fn drain_dead_letters(&self, queue: &str) -> Vec<Message> {
        let dlq = dead_letter_queue(queue);
        let Some(state) = self.inner.queues.read().await.get(&dlq).cloned() else {
            return Vec::new();
        };
        let mut messages = Vec::new();
        while let Ok(envelope) = state.receiver.try_recv() {
            messages.push(envelope.message);
        }
        messages
    }

    async fn queue(&self, name: &str) -> Result<Arc<QueueState>> {
        self.inner
            .queues
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownQueue(name.to_string()))
    }

    async fn dead_letter(&self, queue: &str, envelope: Envelope) -> Result<()> {
        let dlq = self.queue(&dead_letter_queue(queue)).await?;
        tracing::warn!(
            exchange = %self.inner.config.exchange,
            queue,
            message_id = %envelope.message.message_id,
            routing_key = %envelope.message.routing_key,
            attempt = envelope.attempt,
            "message dead-lettered"
        );
        metrics::counter!("messages_dead_lettered_total", "queue" => queue.to_string())
            .increment(1);
        dlq.sender
            .send(envelope)
            .await
            .map_err(|_| BrokerError::Closed)
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(&self, message: Message) -> Result<()> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable(format!(
                "exchange {} is not reachable",
                self.inner.config.exchange
            )));
        }

        let queues: Vec<Arc<QueueState>> =
            self.inner.queues.read().await.values().cloned().collect();

        let mut routed = 0;
        for queue in queues {
            if !queue.spec.read().await.accepts(&message.routing_key) {
                continue;
            }
            let envelope = Envelope {
                message: message.clone(),
                attempt: 1,
            };
            queue
                .sender
                .send(envelope)
                .await
                .map_err(|_| BrokerError::Closed)?;
            routed += 1;
        }

        if routed == 0 {
            tracing::debug!(routing_key = %message.routing_key, "message matched no queue");
        }
        metrics::counter!("messages_published_total", "routing_key" => message.routing_key)
            .increment(1);
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn declare_queue(&self, spec: QueueSpec) -> Result<()> {
        let mut queues = self.inner.queues.write().await;

        let dlq = dead_letter_queue(&spec.name);
        queues
            .entry(dlq.clone())
            .or_insert_with(|| QueueState::new(QueueSpec::new(dlq)));

        match queues.get(&spec.name) {
            Some(existing) => {
                let mut current = existing.spec.write().await;
                for binding in spec.bindings {
                    if !current.bindings.contains(&binding) {
                        current.bindings.push(binding);
                    }
                }
            }
            None => {
                tracing::debug!(queue = %spec.name, bindings = ?spec.bindings, "queue declared");
                queues.insert(spec.name.clone(), QueueState::new(spec));
            }
        }
        Ok(())
    }

    /// Cancel safe: once the channel hands over an envelope, the rest of
    /// the call runs without yielding.
    async fn receive(&self, queue: &str) -> Result<Delivery> {
        let state = self.queue(queue).await?;
        let envelope = state
            .receiver
            .recv()
            .await
            .map_err(|_| BrokerError::Closed)?;

        let tag = self.inner.next_tag.fetch_add(1, Ordering::Relaxed);
        let delivery = Delivery {
            tag,
            queue: queue.to_string(),
            attempt: envelope.attempt,
            message: envelope.message.clone(),
        };
        self.inner.unacked().insert(tag, envelope);
        Ok(delivery)
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        self.inner
            .unacked()
            .remove(&delivery.tag)
            .map(|_| ())
            .ok_or(BrokerError::UnknownDelivery(delivery.tag))
    }

    async fn nack(&self, delivery: Delivery, requeue: bool) -> Result<()> {
        let envelope = self
            .inner
            .unacked()
            .remove(&delivery.tag)
            .ok_or(BrokerError::UnknownDelivery(delivery.tag))?;

        if !requeue || envelope.attempt >= self.inner.config.max_deliveries {
            return self.dead_letter(&delivery.queue, envelope).await;
        }

        let state = self.queue(&delivery.queue).await?;
        let next = Envelope {
            message: envelope.message,
            attempt: envelope.attempt + 1,
        };
        let delay = self.inner.config.delay_for_attempt(next.attempt);

        tracing::debug!(
            queue = %delivery.queue,
            message_id = %next.message.message_id,
            attempt = next.attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling redelivery"
        );
        metrics::counter!("messages_redelivered_total", "queue" => delivery.queue).increment(1);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if state.sender.send(next).await.is_err() {
                tracing::debug!("queue closed before redelivery");
            }
        });
        Ok(())
    }
}
