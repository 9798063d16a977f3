use crate::assemble::READ_TICKET;
use crate::text::digits_only;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs;
use std::path::Path;

pub struct TicketCache;

impl TicketCache {
    /// The stored `latest.json` for a ticket when it is fresh enough.
    ///
    /// A `ttl_secs` of zero never expires. Missing, unreadable or foreign records
    /// are misses, never errors.
    pub fn read(store_root: &Path, ticket_id: &str, ttl_secs: u64, now: DateTime<Utc>) -> Option<Value> {
        let id = digits_only(ticket_id);
        if store_root.as_os_str().is_empty() || id.is_empty() {
            return None;
        }

        let latest_path = store_root.join("tickets").join(&id).join("latest.json");
        let raw = fs::read_to_string(&latest_path).ok()?;
        let mut record: Value = serde_json::from_str(&raw).ok()?;
        if record.get("command").and_then(Value::as_str) != Some(READ_TICKET) {
            return None;
        }

        let captured_at = record
            .get("capturedAt")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())?;
        let age_secs = (now - captured_at.with_timezone(&Utc)).num_seconds().max(0) as u64;
        if ttl_secs > 0 && age_secs > ttl_secs {
            tracing::debug!("Cached ticket {} is {}s old, ttl {}s", id, age_secs, ttl_secs);
            return None;
        }

        let fields = record.as_object_mut()?;
        fields.insert("cacheHit".to_string(), Value::Bool(true));
        fields.insert("cacheAgeSeconds".to_string(), Value::from(age_secs));
        fields.insert(
            "cachePath".to_string(),
            Value::String(latest_path.display().to_string()),
        );
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SnapshotWriter;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn stored_at(dir: &Path, captured: DateTime<Utc>) {
        let record = json!({ "command": "read-ticket", "ticketId": "42", "subject": "Cached" });
        SnapshotWriter::persist(&record, dir, captured).unwrap();
    }

    #[test]
    fn test_fresh_record_is_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let captured = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        stored_at(dir.path(), captured);

        let hit = TicketCache::read(dir.path(), "#42", 120, captured + Duration::seconds(30)).unwrap();
        assert_eq!(hit["cacheHit"], json!(true));
        assert_eq!(hit["cacheAgeSeconds"], json!(30));
        assert_eq!(hit["subject"], json!("Cached"));
        assert!(hit["cachePath"].as_str().unwrap().ends_with("latest.json"));
    }

    #[test]
    fn test_stale_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let captured = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        stored_at(dir.path(), captured);

        assert!(TicketCache::read(dir.path(), "42", 120, captured + Duration::seconds(121)).is_none());
        // zero ttl never expires
        assert!(TicketCache::read(dir.path(), "42", 0, captured + Duration::days(30)).is_some());
    }

    #[test]
    fn test_clock_skew_clamps_age() {
        let dir = tempfile::tempdir().unwrap();
        let captured = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        stored_at(dir.path(), captured);

        let hit = TicketCache::read(dir.path(), "42", 60, captured - Duration::seconds(10)).unwrap();
        assert_eq!(hit["cacheAgeSeconds"], json!(0));
    }

    #[test]
    fn test_foreign_or_missing_records_miss() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        assert!(TicketCache::read(dir.path(), "42", 120, now).is_none());
        assert!(TicketCache::read(dir.path(), "", 120, now).is_none());

        let path = dir.path().join("tickets/42/latest.json");
        SnapshotWriter::write_json(&path, &json!({ "command": "read-queue", "capturedAt": now.to_rfc3339() }))
            .unwrap();
        assert!(TicketCache::read(dir.path(), "42", 120, now).is_none());

        SnapshotWriter::write_json(&path, &json!({ "command": "read-ticket", "capturedAt": "yesterday" }))
            .unwrap();
        assert!(TicketCache::read(dir.path(), "42", 120, now).is_none());
    }
}
