use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::service;
use crate::models::notification::NotificationEvent;
use crate::models::request::DeliveryRequest;
use crate::models::tracking::TrackingUpdate;
use crate::state::AppState;
use crate::store::RecordStore;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/notify", post(notify_event))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/tracking", get(get_tracking))
        .route("/requests/:id/approve", post(approve))
        .route("/requests/:id/decline", post(decline))
        .route("/requests/:id/assign", post(assign_driver))
        .route("/requests/:id/pickup", post(mark_picked_up))
        .route("/requests/:id/transit", post(mark_in_transit))
        .route("/requests/:id/deliver", post(mark_delivered))
        .route("/requests/:id/simulation/start", post(start_simulation))
        .route("/requests/:id/simulation/stop", post(stop_simulation))
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<service::NewRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    let request = service::submit_request(&state, payload).await?;
    Ok(Json(request))
}

/// Hand a pre-built event to the dispatcher. Accepted means enqueued, not
/// sent; intentionally not deduplicated, so collaborators firing the same
/// event twice produce two external notifications.
async fn notify_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<NotificationEvent>,
) -> axum::http::StatusCode {
    service::notify(&state, event);
    axum::http::StatusCode::ACCEPTED
}

async fn list_requests(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DeliveryRequest>>, AppError> {
    Ok(Json(state.store.list_requests().await?))
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    Ok(Json(state.store.get_request(id).await?))
}

async fn get_tracking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TrackingUpdate>>, AppError> {
    // 404 for unknown ids rather than an empty ledger.
    state.store.get_request(id).await?;
    Ok(Json(state.store.ordered_tracking(id).await?))
}

async fn approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    Ok(Json(service::approve(&state, id).await?))
}

async fn decline(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    Ok(Json(service::decline(&state, id).await?))
}

#[derive(Deserialize)]
struct AssignDriverRequest {
    driver_id: Uuid,
}

async fn assign_driver(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignDriverRequest>,
) -> Result<Json<DeliveryRequest>, AppError> {
    Ok(Json(
        service::assign_driver(&state, id, payload.driver_id).await?,
    ))
}

async fn mark_picked_up(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    Ok(Json(service::mark_picked_up(&state, id).await?))
}

async fn mark_in_transit(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    Ok(Json(service::mark_in_transit(&state, id).await?))
}

async fn mark_delivered(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryRequest>, AppError> {
    Ok(Json(service::mark_delivered(&state, id).await?))
}

#[derive(Serialize)]
struct SimulationResponse {
    running: bool,
    changed: bool,
}

async fn start_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SimulationResponse>, AppError> {
    state.store.get_request(id).await?;
    let changed = state.simulator.start(id);

    Ok(Json(SimulationResponse {
        running: true,
        changed,
    }))
}

async fn stop_simulation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SimulationResponse>, AppError> {
    let changed = state.simulator.stop(id);

    Ok(Json(SimulationResponse {
        running: false,
        changed,
    }))
}
