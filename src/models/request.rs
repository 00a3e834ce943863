use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::driver::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Priority {
    Normal,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    InProgress,
    PickedUp,
    InTransit,
    Completed,
    Declined,
}

impl DeliveryStatus {
    /// Terminal states have no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Completed | DeliveryStatus::Declined)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub id: Uuid,
    pub tracking_id: Option<String>,
    pub status: DeliveryStatus,
    pub pickup_location: String,
    pub delivery_location: String,
    pub pickup_coordinates: Option<GeoPoint>,
    pub delivery_coordinates: Option<GeoPoint>,
    pub current_coordinates: Option<GeoPoint>,
    pub assigned_driver: Option<Uuid>,
    pub priority: Priority,
    pub package_type: String,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
}
