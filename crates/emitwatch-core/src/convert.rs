// ── Wire-to-domain conversion ──
//
// Turns lenient `CoordRecord`s into `TelemetryEntity` values. A record is
// either fully valid or dropped; nothing half-valid reaches the map.

use chrono::{DateTime, Utc};

use emitwatch_api::CoordRecord;

use crate::model::TelemetryEntity;

/// Characters of the id used in the fallback label.
const LABEL_ID_PREFIX: usize = 8;

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// Display label: the first non-empty of `clientName`, `client_name`,
/// `name`; otherwise `Drone <id prefix>`.
pub fn label_for(record: &CoordRecord, id: &str) -> String {
    non_empty(record.client_name.as_ref())
        .or_else(|| non_empty(record.client_name_snake.as_ref()))
        .or_else(|| non_empty(record.name.as_ref()))
        .map_or_else(
            || {
                let prefix: String = id.chars().take(LABEL_ID_PREFIX).collect();
                format!("Drone {prefix}")
            },
            String::from,
        )
}

impl TelemetryEntity {
    /// Build an entity from a wire record received at `now`.
    ///
    /// Returns `None` unless the id is a non-empty string and both
    /// coordinates are finite numbers. A non-finite heading is dropped
    /// without rejecting the record.
    pub fn from_record(record: &CoordRecord, now: DateTime<Utc>) -> Option<Self> {
        let id = non_empty(record.uuid.as_ref())?;
        let latitude = finite(record.lat)?;
        let longitude = finite(record.lon)?;

        Some(Self {
            id: id.to_owned(),
            latitude,
            longitude,
            heading: finite(record.heading),
            label: label_for(record, id),
            last_update: now,
        })
    }
}
