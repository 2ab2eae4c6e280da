//! Trace loader
//!
//! Accepts a JSON array of webhook payloads or one JSON object per line.
//! Every JSON object is kept as-is; entries that are not objects are
//! skipped, never fatal.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use crate::models::EventRecord;

/// Outcome of parsing one captured entry
#[derive(Debug, Clone)]
pub enum RecordParse {
    Parsed(EventRecord),
    /// `position` is the array index or the 1-based line number
    Skipped { position: usize, reason: String },
}

impl RecordParse {
    fn from_value(position: usize, value: Value) -> Self {
        match value {
            Value::Object(map) => RecordParse::Parsed(EventRecord::from(map)),
            _ => RecordParse::Skipped {
                position,
                reason: "not a JSON object".to_string(),
            },
        }
    }

    fn from_line(position: usize, line: &str) -> Self {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => Self::from_value(position, value),
            Err(e) => RecordParse::Skipped {
                position,
                reason: e.to_string(),
            },
        }
    }

    pub fn into_record(self) -> Option<EventRecord> {
        match self {
            RecordParse::Parsed(record) => Some(record),
            RecordParse::Skipped { .. } => None,
        }
    }
}

/// Parse capture text into per-entry results, in file order
pub fn parse_records(text: &str) -> Vec<RecordParse> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if text.starts_with('[') {
        match serde_json::from_str::<Vec<Value>>(text) {
            Ok(items) => {
                return items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| RecordParse::from_value(i, v))
                    .collect();
            }
            Err(e) => {
                warn!(error = %e, "Trace looks like a JSON array but does not parse; reading it line by line");
            }
        }
    }

    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim();
            (!line.is_empty()).then(|| RecordParse::from_line(i + 1, line))
        })
        .collect()
}

/// Load event records from a capture file, unsorted.
///
/// Only an unreadable file is an error; an empty or fully unparsable file
/// yields no records.
pub fn load_events(path: impl AsRef<Path>) -> Result<Vec<EventRecord>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace file {}", path.display()))?;

    let parsed = parse_records(&text);
    let total = parsed.len();
    let records: Vec<EventRecord> = parsed
        .into_iter()
        .filter_map(|p| {
            if let RecordParse::Skipped { position, reason } = &p {
                debug!(position, reason = %reason, "Skipping unparsable trace entry");
            }
            p.into_record()
        })
        .collect();

    debug!(
        path = %path.display(),
        loaded = records.len(),
        skipped = total - records.len(),
        "Trace loaded"
    );
    Ok(records)
}
