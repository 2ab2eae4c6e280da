use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Webhook type emitted for attendee check-ins
pub const CHECKINS_TYPE: &str = "checkins";

/// Webhook operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create,
    Delete,
    Other(String),
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Create => "create",
            Operation::Delete => "delete",
            Operation::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for Operation {
    fn from(s: String) -> Self {
        match s.as_str() {
            "create" => Operation::Create,
            "delete" => Operation::Delete,
            _ => Operation::Other(s),
        }
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

/// Event identifier as sent by the upstream API (string or number)
#[derive(Debug, Clone, PartialEq)]
pub enum EventId {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Number(n) => write!(f, "{}", n),
            EventId::Text(s) => f.write_str(s),
        }
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        EventId::Text(s)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId::Text(s.to_string())
    }
}

impl From<EventId> for Value {
    fn from(id: EventId) -> Self {
        match id {
            EventId::Number(n) => Value::Number(n),
            EventId::Text(s) => Value::String(s),
        }
    }
}

/// One webhook-shaped payload.
///
/// The captured JSON object is kept verbatim and is exactly what gets posted.
/// Field accessors are lenient: a key that is missing or has an unexpected
/// type reads as absent and never rejects the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventRecord {
    payload: Map<String, Value>,
}

impl EventRecord {
    pub fn checkin(
        operation: Operation,
        resource_ids: Vec<String>,
        event_id: EventId,
        change_datetime: Option<String>,
    ) -> Self {
        let mut payload = Map::new();
        payload.insert("operation".into(), Value::String(operation.into()));
        payload.insert(
            "resource_ids".into(),
            Value::Array(resource_ids.into_iter().map(Value::String).collect()),
        );
        payload.insert("event_id".into(), event_id.into());
        payload.insert("type".into(), Value::String(CHECKINS_TYPE.to_string()));
        if let Some(ts) = change_datetime {
            payload.insert("change_datetime".into(), Value::String(ts));
        }
        Self { payload }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn operation(&self) -> Option<Operation> {
        self.str_field("operation")
            .map(|s| Operation::from(s.to_string()))
    }

    /// Resource ids as strings; numeric ids are stringified, other items skipped
    pub fn resource_ids(&self) -> Vec<String> {
        match self.payload.get("resource_ids") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn event_id(&self) -> Option<EventId> {
        match self.payload.get("event_id")? {
            Value::Number(n) => Some(EventId::Number(n.clone())),
            Value::String(s) => Some(EventId::Text(s.clone())),
            _ => None,
        }
    }

    /// The `type` field, unvalidated
    pub fn kind(&self) -> Option<&str> {
        self.str_field("type")
    }

    pub fn change_datetime(&self) -> Option<&str> {
        self.str_field("change_datetime")
    }

    /// Parsed `change_datetime`; `None` when absent or unparsable
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.change_datetime().and_then(parse_timestamp)
    }
}

impl From<Map<String, Value>> for EventRecord {
    fn from(payload: Map<String, Value>) -> Self {
        Self { payload }
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 timestamp. Offsets are honoured; naive values are UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_parse_webhook_payload() {
        let json = r#"{"operation":"create","resource_ids":["chk_1","chk_2"],"event_id":123,"type":"checkins","change_datetime":"2024-05-01T10:00:00Z"}"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.operation(), Some(Operation::Create));
        assert_eq!(record.resource_ids(), vec!["chk_1", "chk_2"]);
        assert_eq!(record.event_id().unwrap().to_string(), "123");
        assert_eq!(record.kind(), Some("checkins"));
        assert_eq!(
            record.timestamp(),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_loosely_typed_fields_read_as_absent() {
        let json = r#"{"operation":7,"resource_ids":[12345,null,"chk_9"],"event_id":true,"type":null,"change_datetime":42}"#;
        let record: EventRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.operation(), None);
        assert_eq!(record.resource_ids(), vec!["12345", "chk_9"]);
        assert_eq!(record.event_id(), None);
        assert_eq!(record.kind(), None);
        assert_eq!(record.timestamp(), None);

        let record: EventRecord = serde_json::from_str(r#"{"resource_ids":null}"#).unwrap();
        assert!(record.resource_ids().is_empty());
    }

    #[test]
    fn test_payload_is_posted_verbatim() {
        let captured = json!({
            "operation": "update",
            "change_datetime": null,
            "event_id": null,
            "source": "capture"
        });
        let record: EventRecord = serde_json::from_value(captured.clone()).unwrap();

        assert_eq!(record.operation(), Some(Operation::Other("update".into())));
        assert!(record.resource_ids().is_empty());
        assert_eq!(serde_json::to_value(&record).unwrap(), captured);
    }

    #[test]
    fn test_checkin_builder_shape() {
        let record = EventRecord::checkin(
            Operation::Delete,
            vec!["chk_1".into()],
            EventId::from("ev-1"),
            None,
        );
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"operation": "delete", "resource_ids": ["chk_1"], "event_id": "ev-1", "type": "checkins"})
        );
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-05-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-05-01 10:00:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-05-01T10:00:00.250"),
            Some(expected + chrono::Duration::milliseconds(250))
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
