// ── Live entity storage ──

mod collection;
mod reconciler;

pub use reconciler::{EntitySnapshot, Ingest, Reconciler};
