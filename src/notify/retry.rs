use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::error::AppError;
use crate::models::notification::{Channel, QueuedMessage, RenderedMessage};
use crate::notify::transport::Transport;

/// Durable backing for a retry queue. Each mutation snapshots the full queue
/// so a restart can pick up parked messages.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn persist(&self, channel: Channel, entries: &[QueuedMessage]) -> Result<(), AppError>;
    async fn load(&self, channel: Channel) -> Result<Vec<QueuedMessage>, AppError>;
}

#[derive(Default)]
pub struct MemoryQueueStore {
    snapshots: DashMap<Channel, Vec<QueuedMessage>>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn persist(&self, channel: Channel, entries: &[QueuedMessage]) -> Result<(), AppError> {
        self.snapshots.insert(channel, entries.to_vec());
        Ok(())
    }

    async fn load(&self, channel: Channel) -> Result<Vec<QueuedMessage>, AppError> {
        Ok(self
            .snapshots
            .get(&channel)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DrainStats {
    pub sent: usize,
    pub requeued: usize,
    pub dropped: usize,
    pub depth: usize,
}

/// FIFO holding area for one channel's failed sends. Re-insertion on failure
/// may reorder entries relative to newly enqueued ones; display ordering is
/// governed by the tracking ledger, not by queue order.
pub struct RetryQueue {
    channel: Channel,
    max_retries: u32,
    entries: Mutex<VecDeque<QueuedMessage>>,
    store: Arc<dyn QueueStore>,
}

impl RetryQueue {
    pub fn new(channel: Channel, max_retries: u32, store: Arc<dyn QueueStore>) -> Self {
        Self {
            channel,
            max_retries,
            entries: Mutex::new(VecDeque::new()),
            store,
        }
    }

    /// Reload parked messages from the durable backing.
    pub async fn restore(&self) -> Result<usize, AppError> {
        let parked = self.store.load(self.channel).await?;
        let mut entries = self.entries.lock().await;
        entries.extend(parked);
        Ok(entries.len())
    }

    /// Park a message after its first failed send. Returns the queue depth.
    pub async fn enqueue(&self, message: RenderedMessage) -> usize {
        let queued = QueuedMessage {
            message,
            attempts: 1,
            enqueued_at: Utc::now(),
        };

        let depth = {
            let mut entries = self.entries.lock().await;
            entries.push_back(queued);
            entries.len()
        };

        self.persist_snapshot().await;
        depth
    }

    pub async fn depth(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// One drain pass: every currently parked message gets one re-attempt.
    /// Success removes the entry; failure increments `attempts` and requeues
    /// until the retry limit is reached, after which the message is dropped
    /// for good and only logged.
    pub async fn drain(&self, transport: &dyn Transport) -> DrainStats {
        let batch: Vec<QueuedMessage> = {
            let mut entries = self.entries.lock().await;
            entries.drain(..).collect()
        };

        let mut stats = DrainStats::default();
        let mut requeue = Vec::new();

        for mut queued in batch {
            match transport.send(&queued.message.body).await {
                Ok(_) => {
                    stats.sent += 1;
                }
                Err(err) if queued.attempts >= self.max_retries => {
                    stats.dropped += 1;
                    let exhausted = AppError::RetryExhausted {
                        channel: self.channel.to_string(),
                        attempts: queued.attempts + 1,
                    };
                    error!(
                        channel = %self.channel,
                        error = %err,
                        "{exhausted}; message dropped"
                    );
                }
                Err(err) => {
                    queued.attempts += 1;
                    warn!(
                        channel = %self.channel,
                        attempts = queued.attempts,
                        error = %err,
                        "retry failed, requeueing"
                    );
                    requeue.push(queued);
                }
            }
        }

        stats.requeued = requeue.len();
        stats.depth = {
            let mut entries = self.entries.lock().await;
            entries.extend(requeue);
            entries.len()
        };

        self.persist_snapshot().await;
        stats
    }

    async fn persist_snapshot(&self) {
        let snapshot: Vec<QueuedMessage> = {
            let entries = self.entries.lock().await;
            entries.iter().cloned().collect()
        };

        if let Err(err) = self.store.persist(self.channel, &snapshot).await {
            warn!(channel = %self.channel, error = %err, "retry queue persist failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{MemoryQueueStore, QueueStore, RetryQueue};
    use crate::error::AppError;
    use crate::models::notification::{Channel, MessageBody, RenderedMessage};
    use crate::notify::transport::{SendOutcome, Transport};

    struct ScriptedTransport {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl ScriptedTransport {
        fn failing_first(fail_first: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn channel(&self) -> Channel {
            Channel::Webhook
        }

        async fn send(&self, _body: &MessageBody) -> Result<SendOutcome, AppError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(AppError::ChannelSend("scripted failure".to_string()))
            } else {
                Ok(SendOutcome::Delivered)
            }
        }
    }

    fn chat_message() -> RenderedMessage {
        RenderedMessage {
            channel: Channel::Webhook,
            body: MessageBody::Chat {
                text: "delivery update".to_string(),
                blocks: None,
            },
        }
    }

    #[tokio::test]
    async fn message_is_dropped_on_the_fourth_failed_attempt() {
        let transport = ScriptedTransport::failing_first(u32::MAX);
        let queue = RetryQueue::new(Channel::Webhook, 3, Arc::new(MemoryQueueStore::new()));

        // First attempt already failed at dispatch time.
        assert_eq!(queue.enqueue(chat_message()).await, 1);

        let stats = queue.drain(&transport).await;
        assert_eq!((stats.sent, stats.requeued, stats.dropped), (0, 1, 0));

        let stats = queue.drain(&transport).await;
        assert_eq!((stats.sent, stats.requeued, stats.dropped), (0, 1, 0));

        // Fourth attempt overall: limit reached, dropped for good.
        let stats = queue.drain(&transport).await;
        assert_eq!((stats.sent, stats.requeued, stats.dropped), (0, 0, 1));
        assert_eq!(queue.depth().await, 0);

        // Nothing left to retry.
        let stats = queue.drain(&transport).await;
        assert_eq!(transport.calls(), 3);
        assert_eq!(stats.depth, 0);
    }

    #[tokio::test]
    async fn message_that_succeeds_on_second_attempt_is_removed() {
        // Dispatch-time attempt failed once outside the queue; the first
        // drain attempt succeeds.
        let transport = ScriptedTransport::failing_first(0);
        let queue = RetryQueue::new(Channel::Webhook, 3, Arc::new(MemoryQueueStore::new()));

        queue.enqueue(chat_message()).await;
        let stats = queue.drain(&transport).await;

        assert_eq!((stats.sent, stats.requeued, stats.dropped), (1, 0, 0));
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test]
    async fn attempts_never_exceed_the_retry_limit() {
        let transport = ScriptedTransport::failing_first(u32::MAX);
        let store = Arc::new(MemoryQueueStore::new());
        let queue = RetryQueue::new(Channel::Webhook, 3, store.clone());

        queue.enqueue(chat_message()).await;
        for _ in 0..10 {
            queue.drain(&transport).await;
        }

        let persisted = store.load(Channel::Webhook).await.unwrap();
        assert!(persisted.iter().all(|entry| entry.attempts <= 3));
        assert_eq!(queue.depth().await, 0);
    }

    #[tokio::test]
    async fn parked_messages_survive_a_restart() {
        let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
        let transport = ScriptedTransport::failing_first(u32::MAX);

        let queue = RetryQueue::new(Channel::Webhook, 3, store.clone());
        queue.enqueue(chat_message()).await;
        queue.drain(&transport).await;

        let revived = RetryQueue::new(Channel::Webhook, 3, store);
        assert_eq!(revived.restore().await.unwrap(), 1);
    }
}
