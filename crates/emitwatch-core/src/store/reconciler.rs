// ── Entity reconciler ──
//
// Applies decoded frame payloads to the live entity map. Sequence
// payloads replace the map wholesale; single records upsert by id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use emitwatch_api::wire::STATUS_CONNECTED;
use emitwatch_api::{CoordRecord, CoordsMessage};

use super::collection::EntityCollection;
use crate::model::TelemetryEntity;
use crate::stream::EntityStream;

/// Immutable view of the live map, ordered by id.
pub type EntitySnapshot = Arc<Vec<Arc<TelemetryEntity>>>;

/// What a single payload did to the map.
#[derive(Debug, Clone)]
pub enum Ingest {
    /// The map changed; carries the snapshot published for the change.
    MapChanged(EntitySnapshot),
    /// The server confirmed the stream is established. Map untouched.
    Connected,
    /// Unparsable, unrecognized, or invalid. Map untouched.
    Ignored,
}

/// Owner of the live entity map.
pub struct Reconciler {
    entities: EntityCollection<TelemetryEntity>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            entities: EntityCollection::new(),
        }
    }

    /// Parse and apply one frame payload, stamping changes with the
    /// current time.
    pub fn ingest(&self, payload: &str) -> Ingest {
        self.ingest_at(payload, Utc::now())
    }

    /// Parse and apply one frame payload received at `now`.
    pub fn ingest_at(&self, payload: &str, now: DateTime<Utc>) -> Ingest {
        match CoordsMessage::parse(payload) {
            Ok(message) => self.apply(message, now),
            Err(e) => {
                warn!(error = %e, "dropping unparsable telemetry payload");
                Ingest::Ignored
            }
        }
    }

    /// Apply an already-classified message.
    pub fn apply(&self, message: CoordsMessage, now: DateTime<Utc>) -> Ingest {
        match message {
            CoordsMessage::Status(status) if status == STATUS_CONNECTED => Ingest::Connected,
            CoordsMessage::Status(status) => {
                debug!(status = %status, "ignoring status message");
                Ingest::Ignored
            }
            CoordsMessage::Snapshot(records) => self.replace(&records, now),
            CoordsMessage::Single(record) => self.upsert(&record, now),
            CoordsMessage::Unknown(_) => {
                warn!("ignoring telemetry payload of unrecognized shape");
                Ingest::Ignored
            }
        }
    }

    fn replace(&self, records: &[CoordRecord], now: DateTime<Utc>) -> Ingest {
        let valid: Vec<TelemetryEntity> = records
            .iter()
            .filter_map(|r| TelemetryEntity::from_record(r, now))
            .collect();

        let dropped = records.len() - valid.len();
        if dropped > 0 {
            debug!(dropped, "skipping invalid records in snapshot");
        }
        debug!(count = valid.len(), "replacing entity map");

        self.entities
            .replace_all(valid.into_iter().map(|e| (e.id.clone(), e)));
        Ingest::MapChanged(self.entities.snapshot())
    }

    fn upsert(&self, record: &CoordRecord, now: DateTime<Utc>) -> Ingest {
        let Some(entity) = TelemetryEntity::from_record(record, now) else {
            debug!(uuid = ?record.uuid, "skipping invalid record");
            return Ingest::Ignored;
        };
        self.entities.upsert(entity.id.clone(), entity);
        Ingest::MapChanged(self.entities.snapshot())
    }

    // ── Direct mutation ──────────────────────────────────────────────

    /// Remove one entity. Returns `true` if it was present.
    pub fn remove(&self, id: &str) -> bool {
        self.entities.remove(id).is_some()
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<Arc<TelemetryEntity>> {
        self.entities.get(id)
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        self.entities.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<EntitySnapshot> {
        self.entities.subscribe()
    }

    /// Subscription handle for reactive consumers.
    pub fn stream(&self) -> EntityStream<TelemetryEntity> {
        EntityStream::new(self.entities.subscribe())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped on every change to the map.
    pub fn version(&self) -> u64 {
        self.entities.version()
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
