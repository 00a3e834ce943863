use chrono::Utc;

use crate::error::AppError;
use crate::models::request::{DeliveryRequest, DeliveryStatus};
use crate::models::tracking::TrackingUpdate;

/// Who asked for the status change. Carried into logs; the edge table itself
/// does not branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Admin,
    Driver,
    System,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Admin => write!(f, "admin"),
            Actor::Driver => write!(f, "driver"),
            Actor::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub request: DeliveryRequest,
    /// Ledger entry derived from the edge. `None` only for a decline, which
    /// leaves no tracking trail.
    pub update: Option<TrackingUpdate>,
}

/// Validate and apply a status change, deriving the canonical tracking
/// update for the edge. Pure with respect to its inputs: persistence of the
/// returned request and update belongs to the caller.
pub fn transition(
    request: &DeliveryRequest,
    target: DeliveryStatus,
    actor: Actor,
) -> Result<TransitionOutcome, AppError> {
    let from = request.status;

    let update = match (from, target) {
        (DeliveryStatus::Pending, DeliveryStatus::InProgress) => Some(TrackingUpdate {
            status: "Request Approved".to_string(),
            timestamp: Utc::now(),
            location: "Admin Dashboard".to_string(),
            note: "Delivery request has been approved".to_string(),
        }),
        (DeliveryStatus::Pending, DeliveryStatus::Declined) => None,
        (DeliveryStatus::InProgress, DeliveryStatus::PickedUp) => Some(TrackingUpdate {
            status: "Picked Up".to_string(),
            timestamp: Utc::now(),
            location: request.pickup_location.clone(),
            note: "Picked up by courier".to_string(),
        }),
        (DeliveryStatus::PickedUp, DeliveryStatus::InTransit) => Some(TrackingUpdate {
            status: "In Transit".to_string(),
            timestamp: Utc::now(),
            location: "En route to delivery location".to_string(),
            note: "Package is in transit".to_string(),
        }),
        // "mark delivered" is allowed from any active stage, not only from
        // in_transit, so a driver can close out a delivery in one tap.
        (
            DeliveryStatus::InProgress | DeliveryStatus::PickedUp | DeliveryStatus::InTransit,
            DeliveryStatus::Completed,
        ) => Some(TrackingUpdate {
            status: "Delivered".to_string(),
            timestamp: Utc::now(),
            location: request.delivery_location.clone(),
            note: "Package delivered to destination".to_string(),
        }),
        (from, to) => return Err(AppError::InvalidTransition { from, to }),
    };

    let mut updated = request.clone();
    updated.status = target;

    tracing::debug!(
        request_id = %request.id,
        from = ?from,
        to = ?target,
        actor = %actor,
        "status transition applied"
    );

    Ok(TransitionOutcome {
        request: updated,
        update,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{transition, Actor};
    use crate::error::AppError;
    use crate::models::request::{DeliveryRequest, DeliveryStatus, Priority};

    fn request(status: DeliveryStatus) -> DeliveryRequest {
        DeliveryRequest {
            id: Uuid::from_u128(7),
            tracking_id: Some("MR-1007".to_string()),
            status,
            pickup_location: "St. Mary Lab, Door 4".to_string(),
            delivery_location: "Northside Clinic".to_string(),
            pickup_coordinates: None,
            delivery_coordinates: None,
            current_coordinates: None,
            assigned_driver: None,
            priority: Priority::Normal,
            package_type: "specimen".to_string(),
            contact_email: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn approve_derives_canonical_update() {
        let outcome = transition(
            &request(DeliveryStatus::Pending),
            DeliveryStatus::InProgress,
            Actor::Admin,
        )
        .unwrap();

        assert_eq!(outcome.request.status, DeliveryStatus::InProgress);
        let update = outcome.update.unwrap();
        assert_eq!(update.status, "Request Approved");
        assert_eq!(update.location, "Admin Dashboard");
        assert_eq!(update.note, "Delivery request has been approved");
    }

    #[test]
    fn decline_produces_no_tracking_update() {
        let outcome = transition(
            &request(DeliveryStatus::Pending),
            DeliveryStatus::Declined,
            Actor::Admin,
        )
        .unwrap();

        assert_eq!(outcome.request.status, DeliveryStatus::Declined);
        assert!(outcome.update.is_none());
    }

    #[test]
    fn pickup_uses_request_pickup_location() {
        let outcome = transition(
            &request(DeliveryStatus::InProgress),
            DeliveryStatus::PickedUp,
            Actor::Driver,
        )
        .unwrap();

        let update = outcome.update.unwrap();
        assert_eq!(update.status, "Picked Up");
        assert_eq!(update.location, "St. Mary Lab, Door 4");
        assert_eq!(update.note, "Picked up by courier");
    }

    #[test]
    fn transit_derives_canonical_update() {
        let outcome = transition(
            &request(DeliveryStatus::PickedUp),
            DeliveryStatus::InTransit,
            Actor::Driver,
        )
        .unwrap();

        let update = outcome.update.unwrap();
        assert_eq!(update.status, "In Transit");
        assert_eq!(update.location, "En route to delivery location");
        assert_eq!(update.note, "Package is in transit");
    }

    #[test]
    fn delivered_shortcut_from_every_active_stage() {
        for from in [
            DeliveryStatus::InProgress,
            DeliveryStatus::PickedUp,
            DeliveryStatus::InTransit,
        ] {
            let outcome =
                transition(&request(from), DeliveryStatus::Completed, Actor::Driver).unwrap();

            assert_eq!(outcome.request.status, DeliveryStatus::Completed);
            let update = outcome.update.unwrap();
            assert_eq!(update.status, "Delivered");
            assert_eq!(update.location, "Northside Clinic");
            assert_eq!(update.note, "Package delivered to destination");
        }
    }

    #[test]
    fn terminal_states_reject_every_target() {
        for from in [DeliveryStatus::Completed, DeliveryStatus::Declined] {
            for to in [
                DeliveryStatus::Pending,
                DeliveryStatus::InProgress,
                DeliveryStatus::PickedUp,
                DeliveryStatus::InTransit,
                DeliveryStatus::Completed,
                DeliveryStatus::Declined,
            ] {
                let result = transition(&request(from), to, Actor::Admin);
                assert!(
                    matches!(result, Err(AppError::InvalidTransition { .. })),
                    "{from:?} -> {to:?} should be rejected"
                );
            }
        }
    }

    #[test]
    fn skipping_a_stage_backward_is_rejected() {
        let result = transition(
            &request(DeliveryStatus::InTransit),
            DeliveryStatus::PickedUp,
            Actor::Driver,
        );
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));

        let result = transition(
            &request(DeliveryStatus::Pending),
            DeliveryStatus::InTransit,
            Actor::Admin,
        );
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    }
}
