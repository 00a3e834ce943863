//! Channel-specific payload rendering, keyed by event kind.

use serde_json::json;

use crate::models::driver::Driver;
use crate::models::notification::{EventKind, MessageBody, NotificationEvent};
use crate::models::request::{DeliveryRequest, DeliveryStatus, Priority};

fn status_label(status: DeliveryStatus) -> &'static str {
    match status {
        DeliveryStatus::Pending => "Pending",
        DeliveryStatus::InProgress => "In Progress",
        DeliveryStatus::PickedUp => "Picked Up",
        DeliveryStatus::InTransit => "In Transit",
        DeliveryStatus::Completed => "Delivered",
        DeliveryStatus::Declined => "Declined",
    }
}

fn reference(request: &DeliveryRequest) -> String {
    request
        .tracking_id
        .clone()
        .unwrap_or_else(|| request.id.to_string())
}

pub fn render_chat(event: &NotificationEvent) -> MessageBody {
    let request = &event.request;
    let reference = reference(request);

    let (headline, text) = match event.kind {
        EventKind::NewRequest => (
            "New delivery request".to_string(),
            format!(
                "New delivery request {reference}: {} -> {}",
                request.pickup_location, request.delivery_location
            ),
        ),
        EventKind::StatusUpdate => {
            let label = event
                .status
                .map(status_label)
                .unwrap_or("Updated")
                .to_string();
            (
                format!("Delivery {label}"),
                format!("Delivery {reference} is now {label}"),
            )
        }
    };

    let mut fields = vec![
        json!({"type": "mrkdwn", "text": format!("*Pickup:*\n{}", request.pickup_location)}),
        json!({"type": "mrkdwn", "text": format!("*Dropoff:*\n{}", request.delivery_location)}),
        json!({"type": "mrkdwn", "text": format!("*Package:*\n{}", request.package_type)}),
    ];
    if request.priority == Priority::Urgent {
        fields.push(json!({"type": "mrkdwn", "text": "*Priority:*\nURGENT"}));
    }

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": headline}
        }),
        json!({
            "type": "section",
            "fields": fields
        }),
    ];
    if let Some(note) = &event.note {
        blocks.push(json!({
            "type": "context",
            "elements": [{"type": "mrkdwn", "text": note}]
        }));
    }

    MessageBody::Chat {
        text,
        blocks: Some(json!(blocks)),
    }
}

pub fn render_email(event: &NotificationEvent, to: &str) -> MessageBody {
    let request = &event.request;
    let reference = reference(request);

    let (subject, heading, detail) = match (event.kind, event.status) {
        // request-confirmation
        (EventKind::NewRequest, _) => (
            format!("Delivery request {reference} received"),
            "We received your delivery request".to_string(),
            format!(
                "Your request from {} to {} has been submitted and is awaiting approval.",
                request.pickup_location, request.delivery_location
            ),
        ),
        // delivery-completion
        (EventKind::StatusUpdate, Some(DeliveryStatus::Completed)) => (
            format!("Delivery {reference} completed"),
            "Your delivery is complete".to_string(),
            format!(
                "Your package has been delivered to {}.",
                request.delivery_location
            ),
        ),
        // delivery-status
        (EventKind::StatusUpdate, status) => {
            let label = status.map(status_label).unwrap_or("Updated");
            (
                format!("Delivery {reference}: {label}"),
                format!("Delivery update: {label}"),
                event.note.clone().unwrap_or_else(|| {
                    format!("Your delivery {reference} status is now {label}.")
                }),
            )
        }
    };

    let html = format!(
        "<h2>{heading}</h2><p>{detail}</p><p>Reference: <strong>{reference}</strong></p>"
    );
    let text = format!("{heading}\n\n{detail}\n\nReference: {reference}");

    MessageBody::Email {
        to: to.to_string(),
        subject,
        html,
        text,
    }
}

/// driver-welcome template, sent once when a courier account is registered.
pub fn render_driver_welcome(driver: &Driver) -> MessageBody {
    let subject = "Welcome to the courier network".to_string();
    let html = format!(
        "<h2>Welcome aboard, {name}</h2>\
         <p>Your courier account is ready. You will be notified when a delivery \
         is assigned to you.</p>",
        name = driver.name
    );
    let text = format!(
        "Welcome aboard, {}\n\nYour courier account is ready. You will be \
         notified when a delivery is assigned to you.",
        driver.name
    );

    MessageBody::Email {
        to: driver.email.clone(),
        subject,
        html,
        text,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{render_chat, render_email};
    use crate::models::notification::{EventKind, MessageBody, NotificationEvent};
    use crate::models::request::{DeliveryRequest, DeliveryStatus, Priority};

    fn event(kind: EventKind, status: Option<DeliveryStatus>) -> NotificationEvent {
        NotificationEvent {
            kind,
            request: DeliveryRequest {
                id: Uuid::from_u128(42),
                tracking_id: Some("MR-2042".to_string()),
                status: status.unwrap_or(DeliveryStatus::Pending),
                pickup_location: "Central Lab".to_string(),
                delivery_location: "Hillside Pharmacy".to_string(),
                pickup_coordinates: None,
                delivery_coordinates: None,
                current_coordinates: None,
                assigned_driver: None,
                priority: Priority::Urgent,
                package_type: "medication".to_string(),
                contact_email: Some("requester@clinic.example".to_string()),
                created_at: Utc::now(),
            },
            status,
            note: None,
        }
    }

    #[test]
    fn new_request_chat_mentions_both_endpoints() {
        let MessageBody::Chat { text, blocks } = render_chat(&event(EventKind::NewRequest, None))
        else {
            panic!("chat render produced non-chat body");
        };

        assert!(text.contains("MR-2042"));
        assert!(text.contains("Central Lab"));
        assert!(text.contains("Hillside Pharmacy"));

        let blocks = blocks.unwrap();
        let rendered = blocks.to_string();
        assert!(rendered.contains("URGENT"));
    }

    #[test]
    fn completion_email_uses_completion_template() {
        let MessageBody::Email {
            to, subject, html, ..
        } = render_email(
            &event(EventKind::StatusUpdate, Some(DeliveryStatus::Completed)),
            "requester@clinic.example",
        )
        else {
            panic!("email render produced non-email body");
        };

        assert_eq!(to, "requester@clinic.example");
        assert!(subject.contains("completed"));
        assert!(html.contains("Hillside Pharmacy"));
    }

    #[test]
    fn status_email_falls_back_to_generic_template() {
        let MessageBody::Email { subject, text, .. } = render_email(
            &event(EventKind::StatusUpdate, Some(DeliveryStatus::InTransit)),
            "requester@clinic.example",
        )
        else {
            panic!("email render produced non-email body");
        };

        assert!(subject.contains("In Transit"));
        assert!(text.contains("MR-2042"));
    }
}
