//! Captured webhook traces
//!
//! - `loader`: reads a JSON array or JSONL capture into event records
//! - `builder`: converts exported check-ins into a replayable trace file

pub mod builder;
pub mod loader;

pub use builder::{build_trace, to_webhook_payload, write_trace, TraceFormat};
pub use loader::{load_events, parse_records, RecordParse};

use chrono::{DateTime, Utc};

use crate::models::EventRecord;

/// A record together with its parsed `change_datetime`
#[derive(Debug, Clone)]
pub struct TraceEntry {
    pub record: EventRecord,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Event records ordered ascending by `change_datetime`.
///
/// Records without a usable timestamp sort as the Unix epoch. The sort is
/// stable, so captured order breaks ties.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn sorted(records: Vec<EventRecord>) -> Self {
        let mut entries: Vec<TraceEntry> = records
            .into_iter()
            .map(|record| TraceEntry {
                timestamp: record.timestamp(),
                record,
            })
            .collect();
        entries.sort_by_key(|e| {
            e.timestamp
                .map_or((0, 0), |t| (t.timestamp(), t.timestamp_subsec_nanos()))
        });
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TraceEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Wall-clock span between the first and last timestamped records
    pub fn span(&self) -> Option<chrono::Duration> {
        let first = self.entries.iter().find_map(|e| e.timestamp)?;
        let last = self.entries.iter().rev().find_map(|e| e.timestamp)?;
        Some(last - first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventId, Operation};

    fn record(id: &str, ts: Option<&str>) -> EventRecord {
        EventRecord::checkin(
            Operation::Create,
            vec![id.to_string()],
            EventId::from("ev"),
            ts.map(str::to_string),
        )
    }

    fn ids(trace: &Trace) -> Vec<String> {
        trace
            .entries()
            .iter()
            .map(|e| e.record.resource_ids()[0].clone())
            .collect()
    }

    #[test]
    fn test_sorted_by_change_datetime() {
        let trace = Trace::sorted(vec![
            record("c", Some("2024-05-01T10:00:20Z")),
            record("a", Some("2024-05-01T10:00:00Z")),
            record("b", Some("2024-05-01T10:00:10Z")),
        ]);

        assert_eq!(ids(&trace), vec!["a", "b", "c"]);
        assert_eq!(trace.span(), Some(chrono::Duration::seconds(20)));
    }

    #[test]
    fn test_missing_timestamps_sort_first_and_keep_order() {
        let trace = Trace::sorted(vec![
            record("late", Some("2024-05-01T10:00:00Z")),
            record("none-1", None),
            record("bad", Some("not a date")),
            record("none-2", None),
        ]);

        assert_eq!(ids(&trace), vec!["none-1", "bad", "none-2", "late"]);
        assert!(trace.get(0).unwrap().timestamp.is_none());
    }

    #[test]
    fn test_non_decreasing_where_present() {
        let trace = Trace::sorted(vec![
            record("x", Some("2024-05-01T10:00:05Z")),
            record("y", None),
            record("z", Some("2024-05-01T09:59:00+00:00")),
            record("w", Some("2024-05-01T10:00:05Z")),
        ]);

        let stamps: Vec<_> = trace.entries().iter().filter_map(|e| e.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }
}
