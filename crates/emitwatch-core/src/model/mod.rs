// ── Domain model ──

pub mod entity;

pub use entity::TelemetryEntity;
