use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use crate::models::notification::{Channel, MessageBody, NotificationEvent, RenderedMessage};
use crate::notify::render::{render_chat, render_email};
use crate::notify::retry::{QueueStore, RetryQueue};
use crate::notify::transport::Transport;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct DispatchResult {
    /// true = the channel's first attempt was accepted; false = the message
    /// was parked on that channel's retry queue.
    pub per_channel: HashMap<Channel, bool>,
}

struct Lane {
    transport: Arc<dyn Transport>,
    queue: RetryQueue,
}

/// Fans one event out to every configured channel, parking failures on
/// per-channel retry queues. One dispatcher per process, injected where
/// needed; the drain loop is an owned component with start/stop, not a
/// module-level singleton.
pub struct Dispatcher {
    lanes: Vec<Lane>,
    admin_to: String,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(
        transports: Vec<Arc<dyn Transport>>,
        queue_store: Arc<dyn QueueStore>,
        max_retries: u32,
        admin_to: String,
        metrics: Metrics,
    ) -> Self {
        let lanes = transports
            .into_iter()
            .map(|transport| Lane {
                queue: RetryQueue::new(transport.channel(), max_retries, queue_store.clone()),
                transport,
            })
            .collect();

        Self {
            lanes,
            admin_to,
            metrics,
        }
    }

    /// Reload parked messages from the durable backing after a restart.
    pub async fn restore_queues(&self) {
        for lane in &self.lanes {
            match lane.queue.restore().await {
                Ok(depth) if depth > 0 => {
                    info!(channel = %lane.transport.channel(), depth, "restored retry queue");
                    self.set_depth(lane.transport.channel(), depth);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(channel = %lane.transport.channel(), error = %err, "queue restore failed");
                }
            }
        }
    }

    /// Render and attempt the event on every channel. Channel attempts are
    /// independent; one channel failing never blocks another. There is no
    /// deduplication by event identity: dispatching the same event twice
    /// sends twice.
    pub async fn dispatch(&self, event: &NotificationEvent) -> DispatchResult {
        let mut per_channel = HashMap::new();

        for lane in &self.lanes {
            let channel = lane.transport.channel();
            let Some(body) = self.render_for(channel, event) else {
                debug!(channel = %channel, "no payload for event, channel skipped");
                continue;
            };

            let start = Instant::now();
            let accepted = match lane.transport.send(&body).await {
                Ok(outcome) => {
                    self.metrics
                        .notifications_total
                        .with_label_values(&[&channel.to_string(), outcome.as_str()])
                        .inc();
                    true
                }
                Err(err) => {
                    warn!(channel = %channel, error = %err, "send failed, parking for retry");
                    let depth = lane.queue.enqueue(RenderedMessage { channel, body }).await;
                    self.metrics
                        .notifications_total
                        .with_label_values(&[&channel.to_string(), "queued"])
                        .inc();
                    self.set_depth(channel, depth);
                    false
                }
            };

            self.metrics
                .send_latency_seconds
                .with_label_values(&[&channel.to_string()])
                .observe(start.elapsed().as_secs_f64());

            per_channel.insert(channel, accepted);
        }

        DispatchResult { per_channel }
    }

    /// Attempt one message on a single channel's transport, outside the
    /// event fan-out. Used for the driver-welcome email.
    pub async fn send_direct(&self, channel: Channel, body: MessageBody) -> bool {
        let Some(lane) = self
            .lanes
            .iter()
            .find(|lane| lane.transport.channel() == channel)
        else {
            debug!(channel = %channel, "channel not configured, message discarded");
            return false;
        };

        match lane.transport.send(&body).await {
            Ok(outcome) => {
                self.metrics
                    .notifications_total
                    .with_label_values(&[&channel.to_string(), outcome.as_str()])
                    .inc();
                true
            }
            Err(err) => {
                warn!(channel = %channel, error = %err, "send failed, parking for retry");
                let depth = lane.queue.enqueue(RenderedMessage { channel, body }).await;
                self.set_depth(channel, depth);
                false
            }
        }
    }

    /// One pass over every channel's retry queue.
    pub async fn drain_once(&self) {
        for lane in &self.lanes {
            let channel = lane.transport.channel();
            let stats = lane.queue.drain(lane.transport.as_ref()).await;

            if stats.sent + stats.requeued + stats.dropped > 0 {
                info!(
                    channel = %channel,
                    sent = stats.sent,
                    requeued = stats.requeued,
                    dropped = stats.dropped,
                    "retry queue drained"
                );
            }

            for _ in 0..stats.sent {
                self.metrics
                    .notifications_total
                    .with_label_values(&[&channel.to_string(), "retried"])
                    .inc();
            }
            for _ in 0..stats.dropped {
                self.metrics
                    .notifications_total
                    .with_label_values(&[&channel.to_string(), "dropped"])
                    .inc();
            }
            self.set_depth(channel, stats.depth);
        }
    }

    pub async fn queue_depth(&self, channel: Channel) -> usize {
        for lane in &self.lanes {
            if lane.transport.channel() == channel {
                return lane.queue.depth().await;
            }
        }
        0
    }

    /// Spawn the periodic drain loop. The returned handle owns the task;
    /// dropping it without `stop` leaves the loop running for the process
    /// lifetime.
    pub fn start_drain(self: Arc<Self>, interval: Duration) -> DrainHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let dispatcher = self;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => dispatcher.drain_once().await,
                }
            }

            debug!("notification drain loop stopped");
        });

        DrainHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }

    fn render_for(&self, channel: Channel, event: &NotificationEvent) -> Option<MessageBody> {
        match channel {
            Channel::Webhook => Some(render_chat(event)),
            Channel::Email => {
                let to = event
                    .request
                    .contact_email
                    .as_deref()
                    .unwrap_or(&self.admin_to);
                Some(render_email(event, to))
            }
        }
    }

    fn set_depth(&self, channel: Channel, depth: usize) {
        self.metrics
            .retry_queue_depth
            .with_label_values(&[&channel.to_string()])
            .set(depth as i64);
    }
}

pub struct DrainHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl DrainHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

/// Worker loop consuming events enqueued by `notify`. Keeps all network
/// traffic off the caller's critical path.
pub async fn run_dispatcher(
    dispatcher: Arc<Dispatcher>,
    mut event_rx: mpsc::Receiver<NotificationEvent>,
) {
    info!("notification dispatcher started");

    while let Some(event) = event_rx.recv().await {
        let result = dispatcher.dispatch(&event).await;
        debug!(
            kind = ?event.kind,
            request_id = %event.request.id,
            channels = result.per_channel.len(),
            "event dispatched"
        );
    }

    warn!("notification dispatcher stopped: event channel closed");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::Dispatcher;
    use crate::error::AppError;
    use crate::models::notification::{Channel, EventKind, MessageBody, NotificationEvent};
    use crate::models::request::{DeliveryRequest, DeliveryStatus, Priority};
    use crate::notify::retry::MemoryQueueStore;
    use crate::notify::transport::{SendOutcome, Transport};
    use crate::observability::metrics::Metrics;

    struct CountingTransport {
        channel: Channel,
        sends: AtomicU32,
        fail: AtomicBool,
    }

    impl CountingTransport {
        fn new(channel: Channel, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                channel,
                sends: AtomicU32::new(0),
                fail: AtomicBool::new(fail),
            })
        }

        fn sends(&self) -> u32 {
            self.sends.load(Ordering::SeqCst)
        }

        fn recover(&self) {
            self.fail.store(false, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for CountingTransport {
        fn channel(&self) -> Channel {
            self.channel
        }

        async fn send(&self, _body: &MessageBody) -> Result<SendOutcome, AppError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(AppError::ChannelSend("down".to_string()))
            } else {
                Ok(SendOutcome::Delivered)
            }
        }
    }

    fn event() -> NotificationEvent {
        NotificationEvent {
            kind: EventKind::StatusUpdate,
            request: DeliveryRequest {
                id: Uuid::from_u128(11),
                tracking_id: None,
                status: DeliveryStatus::InTransit,
                pickup_location: "Lab A".to_string(),
                delivery_location: "Clinic B".to_string(),
                pickup_coordinates: None,
                delivery_coordinates: None,
                current_coordinates: None,
                assigned_driver: None,
                priority: Priority::Normal,
                package_type: "specimen".to_string(),
                contact_email: Some("requester@clinic.example".to_string()),
                created_at: Utc::now(),
            },
            status: Some(DeliveryStatus::InTransit),
            note: None,
        }
    }

    fn dispatcher(transports: Vec<Arc<dyn Transport>>) -> Dispatcher {
        Dispatcher::new(
            transports,
            Arc::new(MemoryQueueStore::new()),
            3,
            "ops@medirush.example".to_string(),
            Metrics::new(),
        )
    }

    #[tokio::test]
    async fn duplicate_dispatch_produces_duplicate_sends() {
        let webhook = CountingTransport::new(Channel::Webhook, false);
        let email = CountingTransport::new(Channel::Email, false);
        let transports: Vec<Arc<dyn Transport>> = vec![webhook.clone(), email.clone()];
        let dispatcher = dispatcher(transports);

        let event = event();
        dispatcher.dispatch(&event).await;
        dispatcher.dispatch(&event).await;

        // No deduplication by event identity.
        assert_eq!(webhook.sends(), 2);
        assert_eq!(email.sends(), 2);
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_other() {
        let webhook = CountingTransport::new(Channel::Webhook, true);
        let email = CountingTransport::new(Channel::Email, false);
        let transports: Vec<Arc<dyn Transport>> = vec![webhook.clone(), email.clone()];
        let dispatcher = dispatcher(transports);

        let result = dispatcher.dispatch(&event()).await;

        assert_eq!(result.per_channel[&Channel::Webhook], false);
        assert_eq!(result.per_channel[&Channel::Email], true);
        assert_eq!(dispatcher.queue_depth(Channel::Webhook).await, 1);
        assert_eq!(dispatcher.queue_depth(Channel::Email).await, 0);
    }

    #[tokio::test]
    async fn drain_clears_the_queue_once_the_channel_recovers() {
        let webhook = CountingTransport::new(Channel::Webhook, true);
        let transports: Vec<Arc<dyn Transport>> = vec![webhook.clone()];
        let dispatcher = dispatcher(transports);

        dispatcher.dispatch(&event()).await;
        assert_eq!(dispatcher.queue_depth(Channel::Webhook).await, 1);

        // Still down: the message stays parked with one more attempt burned.
        dispatcher.drain_once().await;
        assert_eq!(dispatcher.queue_depth(Channel::Webhook).await, 1);

        webhook.recover();
        dispatcher.drain_once().await;
        assert_eq!(dispatcher.queue_depth(Channel::Webhook).await, 0);
    }

    #[tokio::test]
    async fn driver_welcome_path_queues_on_failure() {
        let email = CountingTransport::new(Channel::Email, true);
        let transports: Vec<Arc<dyn Transport>> = vec![email.clone()];
        let dispatcher = dispatcher(transports);

        let body = MessageBody::Email {
            to: "new.driver@medirush.example".to_string(),
            subject: "Welcome".to_string(),
            html: "<p>Welcome</p>".to_string(),
            text: "Welcome".to_string(),
        };

        assert!(!dispatcher.send_direct(Channel::Email, body).await);
        assert_eq!(dispatcher.queue_depth(Channel::Email).await, 1);
    }
}
