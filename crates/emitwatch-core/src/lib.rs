//! Reactive data layer between `emitwatch-api` and its consumers (CLI,
//! map renderers, dashboards).
//!
//! - **[`Monitor`]**: the control surface. [`start()`](Monitor::start) opens
//!   the telemetry stream and pumps decoded frames into the reconciler;
//!   [`stop()`](Monitor::stop) tears it down so that nothing is published
//!   afterwards. [`stop_entity()`](Monitor::stop_entity) issues the remote
//!   stop command for one simulation.
//!
//! - **[`Reconciler`]**: owns the live entity map. Classifies each frame
//!   payload and applies it as a full replace or a single upsert, then
//!   publishes an immutable snapshot.
//!
//! - **[`EntityStream<T>`]**: subscription handle over the snapshot
//!   channel, with `current()` / `latest()` / `changed()` for reactive
//!   rendering.
//!
//! - **Domain model** ([`model`]): [`TelemetryEntity`], the only entity
//!   type the map holds.

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod monitor;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{MonitorConfig, TlsVerification};
pub use error::CoreError;
pub use model::TelemetryEntity;
pub use monitor::{ConnectionState, Monitor, MonitorEvent, StopOutcome};
pub use store::{Ingest, Reconciler};
pub use stream::EntityStream;

pub use emitwatch_api::{SessionEvent, SessionSignal};
