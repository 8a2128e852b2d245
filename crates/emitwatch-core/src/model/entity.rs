// ── Telemetry entity domain type ──

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One tracked emitter as held in the live map.
///
/// Only constructed from a record whose coordinates are present and
/// finite; see [`crate::convert`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEntity {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees clockwise from north, as reported.
    pub heading: Option<f64>,
    pub label: String,
    /// Client-side receipt time of the last upsert or replace.
    pub last_update: DateTime<Utc>,
}

impl TelemetryEntity {
    /// Heading folded into `[0, 360)`, for renderers that rotate a marker.
    pub fn normalized_heading(&self) -> Option<f64> {
        self.heading.map(|h| {
            let folded = h.rem_euclid(360.0);
            // rem_euclid can round up to exactly 360.0 for tiny negatives.
            if folded >= 360.0 { 0.0 } else { folded }
        })
    }
}
