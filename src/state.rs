use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc, Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::config::Config;
use crate::models::notification::NotificationEvent;
use crate::models::tracking::TrackingEvent;
use crate::notify::dispatcher::Dispatcher;
use crate::notify::retry::MemoryQueueStore;
use crate::notify::transport::Transport;
use crate::observability::metrics::Metrics;
use crate::sim::Simulator;
use crate::store::{MemoryStore, RecordStore};

/// Per-delivery write serialization. A transition and a simulator step for
/// the same request never interleave; requests do not contend with each
/// other.
#[derive(Default)]
pub struct RequestLocks {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl RequestLocks {
    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(id).or_default().clone();
        lock.lock_owned().await
    }
}

pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub locks: Arc<RequestLocks>,
    pub dispatcher: Arc<Dispatcher>,
    pub simulator: Simulator,
    pub notify_tx: mpsc::Sender<NotificationEvent>,
    pub tracking_events_tx: broadcast::Sender<TrackingEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: &Config,
        transports: Vec<Arc<dyn Transport>>,
    ) -> (Self, mpsc::Receiver<NotificationEvent>) {
        let metrics = Metrics::new();
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let locks = Arc::new(RequestLocks::default());

        let (notify_tx, notify_rx) = mpsc::channel(config.notify_queue_size);
        let (tracking_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        let dispatcher = Arc::new(Dispatcher::new(
            transports,
            Arc::new(MemoryQueueStore::new()),
            config.notify_max_retries,
            config.email.admin_to.clone(),
            metrics.clone(),
        ));

        let simulator = Simulator::new(
            store.clone(),
            locks.clone(),
            Duration::from_millis(config.sim_tick_ms),
            config.sim_step_fraction,
            metrics.clone(),
        );

        (
            Self {
                store,
                locks,
                dispatcher,
                simulator,
                notify_tx,
                tracking_events_tx,
                metrics,
            },
            notify_rx,
        )
    }
}
