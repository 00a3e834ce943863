use std::cmp::Ordering;

use dashmap::DashMap;
use uuid::Uuid;

use crate::models::tracking::TrackingUpdate;

/// Display rank for a tracking label. The most advanced lifecycle stage
/// always surfaces first, regardless of insertion order, because updates can
/// land out of order (a retried notification replaying an older event).
pub fn status_priority(label: &str) -> u32 {
    match label {
        "Delivered" => 1,
        "In Transit" => 2,
        "Picked Up" => 3,
        "Driver Assigned" => 4,
        "Request Approved" => 5,
        "Request Submitted" => 6,
        _ => 999,
    }
}

#[derive(Debug, Clone)]
struct LedgerEntry {
    seq: u64,
    update: TrackingUpdate,
}

/// Compare for display: priority ascending, then timestamp descending, then
/// insertion sequence descending. The sequence tiebreak makes the order
/// strict and total even for byte-identical updates.
fn display_order(a: &LedgerEntry, b: &LedgerEntry) -> Ordering {
    status_priority(&a.update.status)
        .cmp(&status_priority(&b.update.status))
        .then_with(|| b.update.timestamp.cmp(&a.update.timestamp))
        .then_with(|| b.seq.cmp(&a.seq))
}

/// Append-only per-delivery collection of tracking updates.
#[derive(Debug, Default)]
pub struct TrackingLedger {
    entries: DashMap<Uuid, Vec<LedgerEntry>>,
}

impl TrackingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, delivery_id: Uuid, update: TrackingUpdate) {
        let mut entries = self.entries.entry(delivery_id).or_default();
        let seq = entries.len() as u64;
        entries.push(LedgerEntry { seq, update });
    }

    pub fn ordered_view(&self, delivery_id: Uuid) -> Vec<TrackingUpdate> {
        let Some(entries) = self.entries.get(&delivery_id) else {
            return Vec::new();
        };

        let mut sorted: Vec<LedgerEntry> = entries.value().clone();
        sorted.sort_by(display_order);
        sorted.into_iter().map(|entry| entry.update).collect()
    }

    pub fn len(&self, delivery_id: Uuid) -> usize {
        self.entries
            .get(&delivery_id)
            .map(|entries| entries.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{status_priority, TrackingLedger};
    use crate::models::tracking::TrackingUpdate;

    fn update(label: &str, offset_secs: i64) -> TrackingUpdate {
        TrackingUpdate {
            status: label.to_string(),
            timestamp: Utc::now() + Duration::seconds(offset_secs),
            location: "somewhere".to_string(),
            note: "note".to_string(),
        }
    }

    #[test]
    fn priority_table_matches_lifecycle_rank() {
        assert_eq!(status_priority("Delivered"), 1);
        assert_eq!(status_priority("In Transit"), 2);
        assert_eq!(status_priority("Picked Up"), 3);
        assert_eq!(status_priority("Driver Assigned"), 4);
        assert_eq!(status_priority("Request Approved"), 5);
        assert_eq!(status_priority("Request Submitted"), 6);
        assert_eq!(status_priority("Left In Mailbox"), 999);
    }

    #[test]
    fn most_advanced_stage_surfaces_first() {
        let ledger = TrackingLedger::new();
        let id = Uuid::from_u128(1);

        ledger.append(id, update("Request Submitted", 0));
        ledger.append(id, update("Picked Up", 1));
        ledger.append(id, update("Delivered", 2));

        let labels: Vec<String> = ledger
            .ordered_view(id)
            .into_iter()
            .map(|u| u.status)
            .collect();

        assert_eq!(labels, vec!["Delivered", "Picked Up", "Request Submitted"]);
    }

    #[test]
    fn insertion_order_does_not_leak_into_view() {
        let ledger = TrackingLedger::new();
        let id = Uuid::from_u128(2);

        // A replayed older event lands after the newer one.
        ledger.append(id, update("Delivered", 10));
        ledger.append(id, update("Request Approved", 0));

        let labels: Vec<String> = ledger
            .ordered_view(id)
            .into_iter()
            .map(|u| u.status)
            .collect();

        assert_eq!(labels, vec!["Delivered", "Request Approved"]);
    }

    #[test]
    fn equal_labels_sort_newest_first() {
        let ledger = TrackingLedger::new();
        let id = Uuid::from_u128(3);

        let older = update("In Transit", 0);
        let newer = update("In Transit", 60);
        ledger.append(id, older.clone());
        ledger.append(id, newer.clone());

        let view = ledger.ordered_view(id);
        assert_eq!(view[0].timestamp, newer.timestamp);
        assert_eq!(view[1].timestamp, older.timestamp);
    }

    #[test]
    fn identical_updates_fall_back_to_insertion_sequence() {
        let ledger = TrackingLedger::new();
        let id = Uuid::from_u128(4);

        let mut first = update("Picked Up", 0);
        let second = first.clone();
        first.note = "first".to_string();
        ledger.append(id, first);
        ledger.append(id, second.clone());

        // Same label, same timestamp: the later insertion wins.
        let view = ledger.ordered_view(id);
        assert_eq!(view[0].note, second.note);
        assert_eq!(view[1].note, "first");
    }

    #[test]
    fn unrecognized_labels_sink_to_the_bottom() {
        let ledger = TrackingLedger::new();
        let id = Uuid::from_u128(5);

        ledger.append(id, update("Custom Note", 100));
        ledger.append(id, update("Request Submitted", 0));

        let labels: Vec<String> = ledger
            .ordered_view(id)
            .into_iter()
            .map(|u| u.status)
            .collect();

        assert_eq!(labels, vec!["Request Submitted", "Custom Note"]);
    }

    #[test]
    fn view_of_unknown_delivery_is_empty() {
        let ledger = TrackingLedger::new();
        assert!(ledger.ordered_view(Uuid::from_u128(99)).is_empty());
        assert_eq!(ledger.len(Uuid::from_u128(99)), 0);
    }
}
