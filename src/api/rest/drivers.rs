use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::{Driver, DriverStatus, GeoPoint};
use crate::models::notification::Channel;
use crate::notify::render::render_driver_welcome;
use crate::state::AppState;
use crate::store::RecordStore;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers", post(create_driver).get(list_drivers))
        .route("/drivers/:id/location", patch(update_driver_location))
}

#[derive(Deserialize)]
pub struct CreateDriverRequest {
    pub name: String,
    pub email: String,
}

async fn create_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDriverRequest>,
) -> Result<Json<Driver>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if !payload.email.contains('@') {
        return Err(AppError::BadRequest("email looks invalid".to_string()));
    }

    let driver = Driver {
        id: Uuid::new_v4(),
        name: payload.name,
        email: payload.email,
        status: DriverStatus::Pending,
        current_location: None,
        current_delivery: None,
        updated_at: Utc::now(),
    };

    state.store.insert_driver(driver.clone()).await?;

    // Welcome email rides the notification machinery off the request path.
    let dispatcher = state.dispatcher.clone();
    let welcome = render_driver_welcome(&driver);
    tokio::spawn(async move {
        dispatcher.send_direct(Channel::Email, welcome).await;
    });

    Ok(Json(driver))
}

async fn list_drivers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Driver>>, AppError> {
    Ok(Json(state.store.list_drivers().await?))
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

async fn update_driver_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Driver>, AppError> {
    Ok(Json(
        state
            .store
            .update_driver_location(id, payload.location)
            .await?,
    ))
}
