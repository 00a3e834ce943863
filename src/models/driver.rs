use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DriverStatus {
    Active,
    Inactive,
    Suspended,
    Pending,
}

/// Couriers are managed elsewhere; the dispatch core reads them to resolve
/// display names and contact addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub status: DriverStatus,
    pub current_location: Option<GeoPoint>,
    pub current_delivery: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}
