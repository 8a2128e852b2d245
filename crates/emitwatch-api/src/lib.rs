// emitwatch-api: Async client for the emitter simulator telemetry stream.
//
// Wire layer only: framing, transport, payload shapes, and the job-control
// call used to stop a running simulation. Domain types live in
// `emitwatch-core`.

pub mod auth;
pub mod client;
pub mod error;
pub mod session;
pub mod sse;
pub mod stream;
pub mod transport;
pub mod wire;

pub use auth::BearerToken;
pub use client::ApiClient;
pub use error::Error;
pub use session::{SessionEvent, SessionSignal};
pub use sse::{FrameDecoder, StreamFrame};
pub use stream::StreamHandle;
pub use transport::{TlsMode, TransportConfig};
pub use wire::{CoordRecord, CoordsMessage};
