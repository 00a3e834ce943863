//! Live-position simulation: a demo/test aid emulating a GPS feed while no
//! real courier hardware is wired in. Not a routing engine; each tick moves
//! the position a fixed fraction of the remaining straight line.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{euclidean_deg, haversine_km, step_toward, ARRIVAL_EPSILON_DEG};
use crate::models::driver::GeoPoint;
use crate::models::request::DeliveryStatus;
use crate::observability::metrics::Metrics;
use crate::state::RequestLocks;
use crate::store::{RecordStore, RequestPatch};

/// One simulated movement. Takes the per-request lock, so a step never
/// interleaves with a concurrent status transition. Returns `None` when
/// there is nothing left to simulate: request no longer in progress,
/// coordinates missing, or destination reached.
pub async fn step(
    store: &dyn RecordStore,
    locks: &RequestLocks,
    id: Uuid,
    fraction: f64,
) -> Result<Option<GeoPoint>, AppError> {
    let _guard = locks.acquire(id).await;

    let request = store.get_request(id).await?;
    if request.status != DeliveryStatus::InProgress {
        return Ok(None);
    }

    let current = request
        .current_coordinates
        .or(request.pickup_coordinates);
    let (Some(current), Some(destination)) = (current, request.delivery_coordinates) else {
        return Ok(None);
    };

    if euclidean_deg(&current, &destination) <= ARRIVAL_EPSILON_DEG {
        return Ok(None);
    }

    let next = step_toward(&current, &destination, fraction);
    store
        .update_request(id, RequestPatch::coordinates(next))
        .await?;

    debug!(
        request_id = %id,
        remaining_km = haversine_km(&next, &destination),
        "simulated position step"
    );

    Ok(Some(next))
}

struct SimTask {
    shutdown: watch::Sender<bool>,
    _handle: JoinHandle<()>,
}

/// Drives `step` on a per-request timer while the simulation toggle is on.
pub struct Simulator {
    store: Arc<dyn RecordStore>,
    locks: Arc<RequestLocks>,
    tick: Duration,
    step_fraction: f64,
    metrics: Metrics,
    running: Arc<DashMap<Uuid, SimTask>>,
}

impl Simulator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        locks: Arc<RequestLocks>,
        tick: Duration,
        step_fraction: f64,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            locks,
            tick,
            step_fraction,
            metrics,
            running: Arc::new(DashMap::new()),
        }
    }

    pub fn is_running(&self, id: Uuid) -> bool {
        self.running.contains_key(&id)
    }

    /// Start simulating a request. Returns false if a simulation for this
    /// request is already running.
    pub fn start(&self, id: Uuid) -> bool {
        let Entry::Vacant(slot) = self.running.entry(id) else {
            return false;
        };

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let store = self.store.clone();
        let locks = self.locks.clone();
        let running = self.running.clone();
        let metrics = self.metrics.clone();
        let tick = self.tick;
        let fraction = self.step_fraction;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        match step(store.as_ref(), &locks, id, fraction).await {
                            Ok(Some(_)) => metrics.sim_steps_total.inc(),
                            Ok(None) => {
                                debug!(request_id = %id, "simulation finished");
                                break;
                            }
                            Err(err) => {
                                warn!(request_id = %id, error = %err, "simulation step failed");
                                break;
                            }
                        }
                    }
                }
            }

            running.remove(&id);
        });

        slot.insert(SimTask {
            shutdown: shutdown_tx,
            _handle: handle,
        });

        info!(request_id = %id, "position simulation started");
        true
    }

    /// Stop a running simulation. The task observes the toggle at its next
    /// loop turn, so no new step is issued after one tick; an in-flight step
    /// finishes under the per-request lock and cannot race a later start.
    pub fn stop(&self, id: Uuid) -> bool {
        let Some((_, task)) = self.running.remove(&id) else {
            return false;
        };

        let _ = task.shutdown.send(true);
        info!(request_id = %id, "position simulation stopped");
        true
    }
}
