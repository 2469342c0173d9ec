//! Generic queue-polling worker lifecycle: health pings, graceful shutdown,
//! per-message dispatch.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use pipeline_queue::QueueConsumer;

use crate::disposition::Disposition;
use crate::handler::MessageHandler;

/// Fluent builder for a [`WorkerRunner`] configuration.
pub struct WorkerBuilder {
    name: String,
    health_interval: Duration,
    shutdown_timeout: Duration,
    poll_batch_size: u32,
}

impl WorkerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health_interval: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
            poll_batch_size: 10,
        }
    }

    pub fn health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = interval;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn poll_batch_size(mut self, size: u32) -> Self {
        self.poll_batch_size = size;
        self
    }

    pub fn build(self) -> WorkerRunnerConfig {
        WorkerRunnerConfig {
            name: self.name,
            health_interval: self.health_interval,
            shutdown_timeout: self.shutdown_timeout,
            poll_batch_size: self.poll_batch_size,
        }
    }
}

pub struct WorkerRunnerConfig {
    pub name: String,
    pub health_interval: Duration,
    pub shutdown_timeout: Duration,
    pub poll_batch_size: u32,
}

/// Runs a poll → handle → ack/nack loop with a concurrent health-ping task
/// and OS-signal-driven graceful shutdown.
pub struct WorkerRunner;

impl WorkerRunner {
    /// Run until a shutdown signal is received (SIGINT/SIGTERM, or
    /// `shutdown_notify` if supplied — tests use the latter to avoid
    /// touching process-wide signal handlers).
    pub async fn run(
        consumer: Arc<dyn QueueConsumer>,
        handler: Arc<dyn MessageHandler>,
        config: WorkerRunnerConfig,
        shutdown_notify: Option<Arc<Notify>>,
    ) {
        let name = config.name.clone();
        info!(worker = %name, "starting worker");

        let shutdown = Arc::new(Notify::new());

        let health_shutdown = shutdown.clone();
        let health_name = name.clone();
        let health_interval = config.health_interval;
        let health_consumer = consumer.clone();
        let health_handle = tokio::spawn(async move {
            Self::health_loop(&health_consumer, &health_name, health_interval, &health_shutdown).await;
        });

        let sig_shutdown = shutdown.clone();
        let sig_name = name.clone();
        let signal_handle = tokio::spawn(async move {
            Self::wait_for_shutdown(shutdown_notify).await;
            info!(worker = %sig_name, "shutdown signal received");
            sig_shutdown.notify_waiters();
        });

        Self::poll_loop(consumer, handler, &name, config.poll_batch_size, &shutdown).await;

        health_handle.abort();
        signal_handle.abort();

        info!(worker = %name, "worker shutdown complete");
    }

    async fn poll_loop(
        consumer: Arc<dyn QueueConsumer>,
        handler: Arc<dyn MessageHandler>,
        name: &str,
        batch_size: u32,
        shutdown: &Notify,
    ) {
        loop {
            let messages = tokio::select! {
                result = consumer.poll_batch(batch_size) => result,
                _ = shutdown.notified() => {
                    info!(worker = %name, "poll loop exiting on shutdown");
                    return;
                }
            };

            let messages = match messages {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(worker = %name, error = %e, "poll_batch failed, backing off");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            for message in messages {
                let receipt_handle = message.receipt_handle.clone();
                let disposition = match handler.handle(message).await {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(worker = %name, error = %e, "handler failed, nacking message");
                        Disposition::Nack
                    }
                };

                match disposition {
                    Disposition::Ack => {
                        if let Err(e) = consumer.ack(&receipt_handle).await {
                            warn!(worker = %name, error = %e, "ack failed");
                        }
                    }
                    Disposition::Nack => {
                        if let Err(e) = consumer.nack(&receipt_handle).await {
                            warn!(worker = %name, error = %e, "nack failed");
                        }
                    }
                    Disposition::Leave => {
                        debug!(worker = %name, "leaving message for visibility timeout to expire");
                    }
                }
            }
        }
    }

    async fn health_loop(
        consumer: &Arc<dyn QueueConsumer>,
        name: &str,
        interval: Duration,
        shutdown: &Notify,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // skip the immediate first tick

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match consumer.health_check().await {
                        Ok(health) => info!(worker = %name, %health, "health ping"),
                        Err(e) => warn!(worker = %name, error = %e, "health check failed"),
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
    }

    async fn wait_for_shutdown(external: Option<Arc<Notify>>) {
        match external {
            Some(notify) => {
                tokio::select! {
                    _ = Self::os_signal() => {}
                    _ = notify.notified() => {}
                }
            }
            None => Self::os_signal().await,
        }
    }

    async fn os_signal() {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
            let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.expect("failed to listen for ctrl_c");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pipeline_queue::{QueueError, QueueHealth, QueueMessage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct MockConsumer {
        messages: AsyncMutex<Vec<QueueMessage>>,
        acked: AsyncMutex<Vec<String>>,
        nacked: AsyncMutex<Vec<String>>,
    }

    impl MockConsumer {
        fn with_messages(messages: Vec<QueueMessage>) -> Self {
            Self {
                messages: AsyncMutex::new(messages),
                acked: AsyncMutex::new(Vec::new()),
                nacked: AsyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QueueConsumer for MockConsumer {
        async fn enqueue(&self, _: &str, _: &str, _: &str) -> Result<String, QueueError> {
            Ok("msg-id".into())
        }

        async fn poll_batch(&self, max: u32) -> Result<Vec<QueueMessage>, QueueError> {
            let mut guard = self.messages.lock().await;
            let take = (max as usize).min(guard.len());
            Ok(guard.drain(..take).collect())
        }

        async fn ack(&self, receipt_handle: &str) -> Result<(), QueueError> {
            self.acked.lock().await.push(receipt_handle.to_string());
            Ok(())
        }

        async fn nack(&self, receipt_handle: &str) -> Result<(), QueueError> {
            self.nacked.lock().await.push(receipt_handle.to_string());
            Ok(())
        }

        async fn health_check(&self) -> Result<QueueHealth, QueueError> {
            Ok(QueueHealth {
                connected: true,
                approximate_message_count: Some(0),
                provider: "mock".into(),
            })
        }
    }

    struct CountingHandler {
        calls: AtomicU32,
        disposition: Disposition,
    }

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn handle(&self, _message: QueueMessage) -> Result<Disposition, anyhow::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.disposition)
        }
    }

    fn sample_message(id: &str) -> QueueMessage {
        QueueMessage {
            id: id.into(),
            body: "{}".into(),
            receipt_handle: format!("receipt-{id}"),
            timestamp: chrono::Utc::now(),
            attempt_count: 1,
        }
    }

    #[tokio::test]
    async fn acked_messages_are_deleted() {
        let consumer = Arc::new(MockConsumer::with_messages(vec![sample_message("1")]));
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            disposition: Disposition::Ack,
        });
        let shutdown = Arc::new(Notify::new());

        let config = WorkerBuilder::new("test").health_interval(Duration::from_secs(60)).build();
        let c = consumer.clone();
        let s = shutdown.clone();
        let h = handler.clone();
        let task = tokio::spawn(async move { WorkerRunner::run(c, h, config, Some(s)).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(consumer.acked.lock().await.len(), 1);

        shutdown.notify_waiters();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn nacked_messages_are_not_deleted() {
        let consumer = Arc::new(MockConsumer::with_messages(vec![sample_message("1")]));
        let handler = Arc::new(CountingHandler {
            calls: AtomicU32::new(0),
            disposition: Disposition::Nack,
        });
        let shutdown = Arc::new(Notify::new());

        let config = WorkerBuilder::new("test").health_interval(Duration::from_secs(60)).build();
        let c = consumer.clone();
        let s = shutdown.clone();
        let h = handler.clone();
        let task = tokio::spawn(async move { WorkerRunner::run(c, h, config, Some(s)).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(consumer.nacked.lock().await.len(), 1);
        assert!(consumer.acked.lock().await.is_empty());

        shutdown.notify_waiters();
        tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    }

    #[test]
    fn builder_defaults() {
        let config = WorkerBuilder::new("default-worker").build();
        assert_eq!(config.name, "default-worker");
        assert_eq!(config.health_interval, Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert_eq!(config.poll_batch_size, 10);
    }
}
