use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::ledger::TrackingLedger;
use crate::models::driver::{Driver, GeoPoint};
use crate::models::request::{DeliveryRequest, DeliveryStatus};
use crate::models::tracking::TrackingUpdate;

/// Partial write against a delivery request. Only the fields the lifecycle
/// core is allowed to touch; `assigned_driver` is set-once from this side
/// and never cleared.
#[derive(Debug, Default, Clone)]
pub struct RequestPatch {
    pub status: Option<DeliveryStatus>,
    pub assigned_driver: Option<Uuid>,
    pub current_coordinates: Option<GeoPoint>,
}

impl RequestPatch {
    pub fn status(status: DeliveryStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn coordinates(point: GeoPoint) -> Self {
        Self {
            current_coordinates: Some(point),
            ..Self::default()
        }
    }
}

/// Record storage consumed by the lifecycle core. The production deployment
/// backs this with the hosted database; the in-memory implementation below
/// serves the binary's demo mode and the tests.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_request(&self, id: Uuid) -> Result<DeliveryRequest, AppError>;
    async fn insert_request(&self, request: DeliveryRequest) -> Result<(), AppError>;
    async fn update_request(&self, id: Uuid, patch: RequestPatch)
        -> Result<DeliveryRequest, AppError>;
    async fn list_requests(&self) -> Result<Vec<DeliveryRequest>, AppError>;

    async fn append_tracking_update(
        &self,
        id: Uuid,
        update: TrackingUpdate,
    ) -> Result<(), AppError>;
    async fn ordered_tracking(&self, id: Uuid) -> Result<Vec<TrackingUpdate>, AppError>;

    async fn get_driver(&self, id: Uuid) -> Result<Driver, AppError>;
    async fn insert_driver(&self, driver: Driver) -> Result<(), AppError>;
    async fn update_driver_location(
        &self,
        id: Uuid,
        location: GeoPoint,
    ) -> Result<Driver, AppError>;
    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError>;
}

#[derive(Default)]
pub struct MemoryStore {
    requests: DashMap<Uuid, DeliveryRequest>,
    drivers: DashMap<Uuid, Driver>,
    ledger: TrackingLedger,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_request(&self, id: Uuid) -> Result<DeliveryRequest, AppError> {
        self.requests
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))
    }

    async fn insert_request(&self, request: DeliveryRequest) -> Result<(), AppError> {
        self.requests.insert(request.id, request);
        Ok(())
    }

    async fn update_request(
        &self,
        id: Uuid,
        patch: RequestPatch,
    ) -> Result<DeliveryRequest, AppError> {
        let mut request = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

        if let Some(status) = patch.status {
            request.status = status;
        }
        if let Some(driver) = patch.assigned_driver {
            request.assigned_driver = Some(driver);
        }
        if let Some(point) = patch.current_coordinates {
            request.current_coordinates = Some(point);
        }

        Ok(request.clone())
    }

    async fn list_requests(&self) -> Result<Vec<DeliveryRequest>, AppError> {
        Ok(self
            .requests
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn append_tracking_update(
        &self,
        id: Uuid,
        update: TrackingUpdate,
    ) -> Result<(), AppError> {
        if !self.requests.contains_key(&id) {
            return Err(AppError::LedgerAppend(format!(
                "request {id} not found for tracking append"
            )));
        }

        self.ledger.append(id, update);
        Ok(())
    }

    async fn ordered_tracking(&self, id: Uuid) -> Result<Vec<TrackingUpdate>, AppError> {
        Ok(self.ledger.ordered_view(id))
    }

    async fn get_driver(&self, id: Uuid) -> Result<Driver, AppError> {
        self.drivers
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))
    }

    async fn insert_driver(&self, driver: Driver) -> Result<(), AppError> {
        self.drivers.insert(driver.id, driver);
        Ok(())
    }

    async fn update_driver_location(
        &self,
        id: Uuid,
        location: GeoPoint,
    ) -> Result<Driver, AppError> {
        let mut driver = self
            .drivers
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("driver {id} not found")))?;

        driver.current_location = Some(location);
        driver.updated_at = chrono::Utc::now();

        Ok(driver.clone())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, AppError> {
        Ok(self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }
}
