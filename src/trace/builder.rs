//! Trace builder
//!
//! Converts exported check-in objects into webhook-shaped records so a real
//! event's check-in history can be replayed against the dashboard.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::models::{EventId, EventRecord, Operation};

/// Keys checked, in order, for the check-in's timestamp
const TIMESTAMP_KEYS: [&str; 6] = [
    "change_datetime",
    "created_at",
    "created_datetime",
    "checkin_datetime",
    "updated_at",
    "timestamp",
];

/// Keys checked, in order, for the check-in's identifier
const ID_KEYS: [&str; 3] = ["id", "checkin_id", "resource_id"];

/// Output layout of a trace file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    /// One JSON object per line
    Jsonl,
    /// A single JSON array
    JsonArray,
}

impl TraceFormat {
    /// JSON array when forced or when the path ends in `.json`, JSONL otherwise
    pub fn for_path(path: &Path, force_json: bool) -> Self {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if force_json || is_json {
            TraceFormat::JsonArray
        } else {
            TraceFormat::Jsonl
        }
    }
}

/// Extract check-in objects from an export.
///
/// Accepts a bare array, a `{ "data": .. }` or `{ "checkins": .. }`
/// envelope, or JSONL. Non-object items are dropped.
pub fn checkins_from_str(text: &str) -> Vec<Map<String, Value>> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let items = match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items,
        Ok(Value::Object(envelope))
            if !envelope.contains_key("data") && !envelope.contains_key("checkins") =>
        {
            vec![Value::Object(envelope)]
        }
        Ok(Value::Object(mut envelope)) => {
            let inner = ["data", "checkins"]
                .iter()
                .find_map(|key| envelope.remove(*key).filter(is_present));
            match inner {
                Some(Value::Array(items)) => items,
                Some(obj @ Value::Object(_)) => vec![obj],
                _ => Vec::new(),
            }
        }
        Ok(_) => Vec::new(),
        Err(_) => text
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line.trim()).ok())
            .collect(),
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

fn checkin_id(checkin: &Map<String, Value>) -> Option<String> {
    ID_KEYS.iter().find_map(|key| match checkin.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn checkin_timestamp(checkin: &Map<String, Value>) -> String {
    TIMESTAMP_KEYS
        .iter()
        .find_map(|key| match checkin.get(*key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false))
}

/// Build the `create` webhook a check-in would have produced
pub fn to_webhook_payload(checkin: &Map<String, Value>, event_id: &EventId) -> EventRecord {
    EventRecord::checkin(
        Operation::Create,
        checkin_id(checkin).into_iter().collect(),
        event_id.clone(),
        Some(checkin_timestamp(checkin)),
    )
}

/// Convert check-ins to webhook records sorted by their timestamp string
pub fn build_trace(checkins: &[Map<String, Value>], event_id: &EventId) -> Vec<EventRecord> {
    let mut records: Vec<EventRecord> = checkins
        .iter()
        .map(|c| to_webhook_payload(c, event_id))
        .collect();
    records.sort_by(|a, b| {
        let a = a.change_datetime().unwrap_or("");
        let b = b.change_datetime().unwrap_or("");
        a.cmp(b)
    });
    records
}

/// Write records to `path`, returning how many were written
pub fn write_trace(path: &Path, records: &[EventRecord], format: TraceFormat) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create trace file {}", path.display()))?;
    let mut out = BufWriter::new(file);

    match format {
        TraceFormat::JsonArray => serde_json::to_writer(&mut out, records)?,
        TraceFormat::Jsonl => {
            for record in records {
                serde_json::to_writer(&mut out, record)?;
                out.write_all(b"\n")?;
            }
        }
    }
    out.flush()
        .with_context(|| format!("Failed to flush trace file {}", path.display()))?;
    Ok(records.len())
}
