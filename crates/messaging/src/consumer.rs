use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{BrokerError, Delivery, HandlerError, Message, MessageBroker};

/// Processes messages taken from one queue.
///
/// Handlers must tolerate seeing the same message more than once.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}

/// A pool of workers draining one queue into one handler.
pub struct Consumer {
    broker: Arc<dyn MessageBroker>,
    queue: String,
    handler: Arc<dyn MessageHandler>,
    concurrency: usize,
}

impl Consumer {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        queue: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Self {
        Self {
            broker,
            queue: queue.into(),
            handler,
            concurrency: 1,
        }
    }

    /// Sets the number of workers. At least one worker always runs.
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    /// Starts the workers. They stop when `shutdown` is cancelled or the
    /// queue is closed; a delivery in progress is finished first.
    pub fn spawn(self, shutdown: CancellationToken) -> ConsumerHandle {
        tracing::info!(
            queue = %self.queue,
            handler = self.handler.name(),
            workers = self.concurrency,
            "starting consumer"
        );

        let workers = (0..self.concurrency)
            .map(|worker| {
                let broker = Arc::clone(&self.broker);
                let handler = Arc::clone(&self.handler);
                let queue = self.queue.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(run_worker(broker, queue, handler, worker, shutdown))
            })
            .collect();

        ConsumerHandle {
            queue: self.queue,
            workers,
        }
    }
}

/// Running consumer workers.
pub struct ConsumerHandle {
    queue: String,
    workers: Vec<JoinHandle<()>>,
}

impl ConsumerHandle {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Waits for every worker to stop.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(queue = %self.queue, error = %e, "consumer worker panicked");
            }
        }
    }
}

const RECEIVE_BACKOFF: Duration = Duration::from_millis(100);

async fn run_worker(
    broker: Arc<dyn MessageBroker>,
    queue: String,
    handler: Arc<dyn MessageHandler>,
    worker: usize,
    shutdown: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = broker.receive(&queue) => received,
        };

        match received {
            Ok(delivery) => process(broker.as_ref(), handler.as_ref(), delivery).await,
            Err(BrokerError::Closed) => break,
            Err(e) => {
                tracing::warn!(%queue, worker, error = %e, "receive failed");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(RECEIVE_BACKOFF) => {}
                }
            }
        }
    }
    tracing::debug!(%queue, worker, "consumer worker stopped");
}

#[tracing::instrument(
    skip_all,
    fields(
        handler = handler.name(),
        queue = %delivery.queue,
        routing_key = %delivery.message.routing_key,
        message_id = %delivery.message.message_id,
        attempt = delivery.attempt,
    )
)]
async fn process(broker: &dyn MessageBroker, handler: &dyn MessageHandler, delivery: Delivery) {
    let start = Instant::now();
    let result = handler.handle(&delivery.message).await;
    metrics::histogram!("message_handle_duration_seconds", "handler" => handler.name())
        .record(start.elapsed().as_secs_f64());

    let settled = match result {
        Ok(()) => broker.ack(&delivery).await,
        Err(HandlerError::Retry(reason)) => {
            tracing::warn!(%reason, "handler failed, message will be redelivered");
            broker.nack(delivery, true).await
        }
        Err(HandlerError::Reject(reason)) => {
            tracing::error!(%reason, "message rejected");
            broker.nack(delivery, false).await
        }
    };

    if let Err(e) = settled {
        tracing::error!(error = %e, "failed to settle delivery");
    }
}
