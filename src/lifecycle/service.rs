//! The operations exposed to the UI/API layer. Each one serializes writes
//! per request id, persists through the record store, appends to the
//! tracking ledger best-effort, and hands notification work to the
//! dispatcher without ever blocking on it.

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::transitions::{transition, Actor};
use crate::models::driver::GeoPoint;
use crate::models::notification::{EventKind, NotificationEvent};
use crate::models::request::{DeliveryRequest, DeliveryStatus, Priority};
use crate::models::tracking::{TrackingEvent, TrackingUpdate};
use crate::state::AppState;
use crate::store::{RecordStore, RequestPatch};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewRequest {
    pub pickup_location: String,
    pub delivery_location: String,
    pub pickup_coordinates: Option<GeoPoint>,
    pub delivery_coordinates: Option<GeoPoint>,
    pub priority: Priority,
    pub package_type: String,
    pub contact_email: Option<String>,
    pub tracking_id: Option<String>,
}

pub async fn submit_request(
    state: &AppState,
    input: NewRequest,
) -> Result<DeliveryRequest, AppError> {
    if input.pickup_location.trim().is_empty() || input.delivery_location.trim().is_empty() {
        return Err(AppError::BadRequest(
            "pickup and delivery locations are required".to_string(),
        ));
    }

    let request = DeliveryRequest {
        id: Uuid::new_v4(),
        tracking_id: input.tracking_id,
        status: DeliveryStatus::Pending,
        pickup_location: input.pickup_location.clone(),
        delivery_location: input.delivery_location,
        pickup_coordinates: input.pickup_coordinates,
        delivery_coordinates: input.delivery_coordinates,
        current_coordinates: input.pickup_coordinates,
        assigned_driver: None,
        priority: input.priority,
        package_type: input.package_type,
        contact_email: input.contact_email,
        created_at: Utc::now(),
    };

    state.store.insert_request(request.clone()).await?;

    append_update(
        state,
        request.id,
        TrackingUpdate {
            status: "Request Submitted".to_string(),
            timestamp: Utc::now(),
            location: input.pickup_location,
            note: "Delivery request has been submitted".to_string(),
        },
    )
    .await;

    notify(
        state,
        NotificationEvent {
            kind: EventKind::NewRequest,
            request: request.clone(),
            status: None,
            note: None,
        },
    );

    Ok(request)
}

pub async fn approve(state: &AppState, id: Uuid) -> Result<DeliveryRequest, AppError> {
    apply_transition(state, id, DeliveryStatus::InProgress, Actor::Admin).await
}

pub async fn decline(state: &AppState, id: Uuid) -> Result<DeliveryRequest, AppError> {
    apply_transition(state, id, DeliveryStatus::Declined, Actor::Admin).await
}

pub async fn mark_picked_up(state: &AppState, id: Uuid) -> Result<DeliveryRequest, AppError> {
    apply_transition(state, id, DeliveryStatus::PickedUp, Actor::Driver).await
}

pub async fn mark_in_transit(state: &AppState, id: Uuid) -> Result<DeliveryRequest, AppError> {
    apply_transition(state, id, DeliveryStatus::InTransit, Actor::Driver).await
}

pub async fn mark_delivered(state: &AppState, id: Uuid) -> Result<DeliveryRequest, AppError> {
    apply_transition(state, id, DeliveryStatus::Completed, Actor::Driver).await
}

/// Attach a courier to a request. Allowed until the request leaves the
/// active lifecycle; the assignment is never cleared from this side.
pub async fn assign_driver(
    state: &AppState,
    id: Uuid,
    driver_id: Uuid,
) -> Result<DeliveryRequest, AppError> {
    let _guard = state.locks.acquire(id).await;

    let request = state.store.get_request(id).await?;
    if request.status.is_terminal() {
        return Err(AppError::BadRequest(format!(
            "cannot assign a driver to a {:?} request",
            request.status
        )));
    }

    let driver = state.store.get_driver(driver_id).await?;

    let updated = state
        .store
        .update_request(
            id,
            RequestPatch {
                assigned_driver: Some(driver_id),
                ..RequestPatch::default()
            },
        )
        .await?;

    append_update(
        state,
        id,
        TrackingUpdate {
            status: "Driver Assigned".to_string(),
            timestamp: Utc::now(),
            location: "Admin Dashboard".to_string(),
            note: "A courier has been assigned to this delivery".to_string(),
        },
    )
    .await;

    notify(
        state,
        NotificationEvent {
            kind: EventKind::StatusUpdate,
            request: updated.clone(),
            status: None,
            note: Some(format!("Courier {} assigned", driver.name)),
        },
    );

    Ok(updated)
}

/// Hand an event to the dispatcher worker. Best-effort: a full or closed
/// queue is logged and swallowed, never surfaced to the caller whose
/// business operation triggered the event.
pub fn notify(state: &AppState, event: NotificationEvent) {
    if let Err(err) = state.notify_tx.try_send(event) {
        warn!(error = %err, "notification event dropped at enqueue");
    }
}

async fn apply_transition(
    state: &AppState,
    id: Uuid,
    target: DeliveryStatus,
    actor: Actor,
) -> Result<DeliveryRequest, AppError> {
    let _guard = state.locks.acquire(id).await;

    let request = state.store.get_request(id).await?;

    let outcome = match transition(&request, target, actor) {
        Ok(outcome) => outcome,
        Err(err) => {
            state
                .metrics
                .transitions_total
                .with_label_values(&[&format!("{target:?}"), "rejected"])
                .inc();
            return Err(err);
        }
    };

    // Store failure here is business-critical and aborts the operation.
    let updated = state
        .store
        .update_request(id, RequestPatch::status(target))
        .await?;

    // The ledger append rides along best-effort: the status write stands
    // even if the append fails.
    if let Some(update) = outcome.update {
        append_update(state, id, update).await;
    }

    let note = match target {
        DeliveryStatus::Declined => Some("Request was declined".to_string()),
        _ => None,
    };
    notify(
        state,
        NotificationEvent {
            kind: EventKind::StatusUpdate,
            request: updated.clone(),
            status: Some(target),
            note,
        },
    );

    state
        .metrics
        .transitions_total
        .with_label_values(&[&format!("{target:?}"), "applied"])
        .inc();

    Ok(updated)
}

async fn append_update(state: &AppState, id: Uuid, update: TrackingUpdate) {
    match state.store.append_tracking_update(id, update.clone()).await {
        Ok(()) => {
            let _ = state.tracking_events_tx.send(TrackingEvent {
                delivery_id: id,
                update,
            });
        }
        Err(err) => {
            warn!(
                request_id = %id,
                error = %err,
                "tracking append failed; status write stands"
            );
        }
    }
}
