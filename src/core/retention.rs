use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::core::entry::{EditQueueEntry, EntryState};

/// Cleans a queue freshly read from storage.
///
/// Drops entries without feature attributes and entries whose
/// `reportCreated` lies before `now - retention_days`. Entries left `active`
/// or `error` by an earlier session become `pending` again. Order is kept.
/// A `reportCreated` that does not parse keeps the entry.
pub fn normalize(
    queue: Vec<EditQueueEntry>,
    now: DateTime<Utc>,
    retention_days: u32,
) -> Vec<EditQueueEntry> {
    let cutoff = now - Duration::days(i64::from(retention_days));
    queue
        .into_iter()
        .filter_map(|mut entry| {
            let created = parse_report_created(&entry.attributes()?.report_created);
            if created.is_some_and(|created| created < cutoff) {
                debug!(entry_id = %entry.id, "dropping expired queue entry");
                return None;
            }
            if entry.state.is_active() || entry.state.is_error() {
                entry.state = EntryState::Pending;
            }
            Some(entry)
        })
        .collect()
}

/// Parses an ISO-8601 timestamp, with or without an offset.
pub fn parse_report_created(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    value
        .parse::<chrono::NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc())
}
