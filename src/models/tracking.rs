use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One lifecycle milestone for a delivery. Immutable once appended; display
/// order is derived from the label, not from insertion time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingUpdate {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    pub note: String,
}

/// Broadcast to live subscribers whenever an update lands in the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingEvent {
    pub delivery_id: Uuid,
    pub update: TrackingUpdate,
}
