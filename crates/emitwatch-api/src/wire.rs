// ── Telemetry payload shapes ──
//
// Each frame body is one of three JSON shapes:
//
//   {"status":"connected"}                       control
//   [{"uuid","lat","lon",...}, ...]               full snapshot
//   {"uuid","lat","lon","heading"?,"name"?...}    single update
//
// Fields are read leniently from `serde_json::Value`: a record with a
// wrong-typed field is still returned so the domain layer can decide
// whether it is usable.

use serde_json::Value;

use crate::error::Error;

/// Status value the server sends once the stream is established.
pub const STATUS_CONNECTED: &str = "connected";

/// One emitter position as it appears on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordRecord {
    pub uuid: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// Degrees clockwise from north.
    pub heading: Option<f64>,
    /// `clientName` (camelCase producers).
    pub client_name: Option<String>,
    /// `client_name` (snake_case producers).
    pub client_name_snake: Option<String>,
    pub name: Option<String>,
}

impl CoordRecord {
    /// Build a record from any JSON value. Non-objects yield an empty record.
    pub fn from_value(value: &Value) -> Self {
        let string = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);
        let number = |key: &str| value.get(key).and_then(Value::as_f64);

        Self {
            uuid: string("uuid"),
            lat: number("lat"),
            lon: number("lon"),
            heading: number("heading"),
            client_name: string("clientName"),
            client_name_snake: string("client_name"),
            name: string("name"),
        }
    }
}

/// A classified frame body.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordsMessage {
    /// A control message carrying a `status` field.
    Status(String),
    /// An ordered list of records; replaces everything the client knows.
    Snapshot(Vec<CoordRecord>),
    /// A single record; inserted or overwritten by id.
    Single(CoordRecord),
    /// Valid JSON of no recognized shape.
    Unknown(Value),
}

impl CoordsMessage {
    /// Parse and classify one frame payload.
    pub fn parse(payload: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(payload).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: payload.to_owned(),
        })?;
        Ok(Self::classify(value))
    }

    /// Classify an already-parsed payload.
    ///
    /// Only `status: "connected"` takes precedence over record detection.
    /// Any other status on an object carrying a `uuid` is treated as a
    /// record; on an object without one it is reported as
    /// [`Status`](Self::Status).
    pub fn classify(value: Value) -> Self {
        if let Some(items) = value.as_array() {
            return Self::Snapshot(
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .map(CoordRecord::from_value)
                    .collect(),
            );
        }

        let status = value.get("status").and_then(Value::as_str);
        if status == Some(STATUS_CONNECTED) {
            return Self::Status(STATUS_CONNECTED.to_owned());
        }
        if value.get("uuid").is_some() {
            return Self::Single(CoordRecord::from_value(&value));
        }
        match status {
            Some(other) => Self::Status(other.to_owned()),
            None => Self::Unknown(value),
        }
    }

    /// `true` for the control message announcing an established stream.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Status(s) if s == STATUS_CONNECTED)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connected_status_is_control() {
        let msg = CoordsMessage::parse(r#"{"status":"connected"}"#).unwrap();
        assert!(msg.is_connected());
        let other = CoordsMessage::parse(r#"{"status":"closing"}"#).unwrap();
        assert_eq!(other, CoordsMessage::Status("closing".into()));
        assert!(!other.is_connected());
    }

    #[test]
    fn other_status_on_a_record_is_still_a_record() {
        let msg = CoordsMessage::parse(r#"{"status":"moving","uuid":"a1","lat":1,"lon":2}"#)
            .unwrap();
        assert!(matches!(msg, CoordsMessage::Single(ref r) if r.uuid.as_deref() == Some("a1")));

        let msg = CoordsMessage::parse(r#"{"status":"connected","uuid":"a1"}"#).unwrap();
        assert!(msg.is_connected());
    }

    #[test]
    fn array_is_snapshot_and_skips_non_objects() {
        let msg = CoordsMessage::parse(
            r#"[{"uuid":"a1","lat":37.5,"lon":127.0}, 42, {"uuid":"b2","lat":1,"lon":2}]"#,
        )
        .unwrap();
        let CoordsMessage::Snapshot(records) = msg else {
            panic!("expected snapshot");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].uuid.as_deref(), Some("a1"));
        assert_eq!(records[1].lat, Some(1.0));
    }

    #[test]
    fn single_record_reads_all_name_variants() {
        let value = json!({
            "uuid": "a1",
            "lat": 37.5,
            "lon": 127.0,
            "heading": 90.5,
            "clientName": "camel",
            "client_name": "snake",
            "name": "plain"
        });
        let CoordsMessage::Single(rec) = CoordsMessage::classify(value) else {
            panic!("expected single record");
        };
        assert_eq!(rec.heading, Some(90.5));
        assert_eq!(rec.client_name.as_deref(), Some("camel"));
        assert_eq!(rec.client_name_snake.as_deref(), Some("snake"));
        assert_eq!(rec.name.as_deref(), Some("plain"));
    }

    #[test]
    fn wrong_typed_fields_read_as_absent() {
        let rec = CoordRecord::from_value(&json!({"uuid": 7, "lat": "37.5", "lon": null}));
        assert_eq!(rec, CoordRecord::default());
    }

    #[test]
    fn unparsable_payload_keeps_body() {
        let err = CoordsMessage::parse("{not json").unwrap_err();
        assert!(matches!(err, Error::Deserialization { ref body, .. } if body == "{not json"));
    }

    #[test]
    fn object_without_uuid_is_unknown() {
        let msg = CoordsMessage::parse(r#"{"lat":1,"lon":2}"#).unwrap();
        assert!(matches!(msg, CoordsMessage::Unknown(_)));
    }
}
