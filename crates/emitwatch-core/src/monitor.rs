// ── Monitor ──
//
// Lifecycle of one telemetry stream plus the job-control command that
// stops a simulation. Frames flow transport -> decoder -> reconciler on
// the stream's read task; consumers observe through watch/broadcast
// channels.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashSet;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use emitwatch_api::{ApiClient, FrameDecoder, SessionSignal, StreamHandle};

use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::TelemetryEntity;
use crate::store::{EntitySnapshot, Ingest, Reconciler};
use crate::stream::EntityStream;

const EVENT_CHANNEL_SIZE: usize = 256;

/// User-visible message for any stream failure.
pub const CONNECTION_ERROR_MESSAGE: &str = "monitoring connection error";

/// User-visible message when a stop fails without a server message.
pub const STOP_FAILED_MESSAGE: &str = "failed to stop simulation";

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        })
    }
}

// ── Events ───────────────────────────────────────────────────────

/// Notifications published on [`Monitor::events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// The server confirmed the stream.
    Connected,
    /// The live map changed; read it through [`Monitor::entities`].
    EntitiesChanged { count: usize },
    /// A failure the user should see.
    Error { message: String, detail: String },
    /// A simulation was stopped and its entity removed.
    EntityStopped { id: String },
}

/// Result of a [`Monitor::stop_entity`] call that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// The session expired; the session signal has been raised and the
    /// map was left untouched.
    SessionExpired,
}

// ── Shared state ─────────────────────────────────────────────────

/// State reachable from the stream's read task.
struct Shared {
    reconciler: Reconciler,
    connection_state: watch::Sender<ConnectionState>,
    event_tx: broadcast::Sender<MonitorEvent>,
    last_error: Mutex<Option<String>>,
}

impl Shared {
    fn new() -> Self {
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            reconciler: Reconciler::new(),
            connection_state,
            event_tx,
            last_error: Mutex::new(None),
        }
    }

    /// Update the state even with no subscribers; notify only on change.
    fn set_state(&self, state: ConnectionState) {
        self.connection_state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    fn emit(&self, event: MonitorEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn surface_error(&self, message: &str, detail: String) {
        *lock(&self.last_error) = Some(message.to_owned());
        self.emit(MonitorEvent::Error {
            message: message.to_owned(),
            detail,
        });
    }

    /// Run one frame payload through the reconciler and publish.
    fn dispatch(&self, payload: &str) {
        match self.reconciler.ingest(payload) {
            Ingest::Connected => {
                info!("telemetry stream connected");
                self.set_state(ConnectionState::Connected);
                *lock(&self.last_error) = None;
                self.emit(MonitorEvent::Connected);
            }
            Ingest::MapChanged(snapshot) => {
                debug!(count = snapshot.len(), "entity map changed");
                self.emit(MonitorEvent::EntitiesChanged {
                    count: snapshot.len(),
                });
            }
            Ingest::Ignored => {}
        }
    }

    fn stream_failed(&self, err: &emitwatch_api::Error) {
        self.set_state(ConnectionState::Failed);
        if err.is_auth_expired() {
            debug!(error = %err, "stream rejected: session expired");
            return;
        }
        warn!(error = %err, "telemetry stream failed");
        self.surface_error(CONNECTION_ERROR_MESSAGE, err.to_string());
    }
}

/// Open/closed flag held while a frame is dispatched. `stop()` takes the
/// same lock to close it, so it never interleaves with a frame.
type PumpGate = Arc<Mutex<bool>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Chunk callback: decode frames and dispatch each one while the gate is open.
fn frame_pump(shared: Arc<Shared>, gate: PumpGate) -> impl FnMut(&str) + Send + 'static {
    let mut decoder = FrameDecoder::new();
    move |text| {
        for frame in decoder.feed(text) {
            let open = lock(&gate);
            if !*open {
                return;
            }
            shared.dispatch(&frame.payload);
        }
    }
}

/// Error callback: report the failure unless the gate was closed first.
fn error_sink(
    shared: Arc<Shared>,
    gate: PumpGate,
) -> impl FnOnce(emitwatch_api::Error) + Send + 'static {
    move |err| {
        let open = lock(&gate);
        if !*open {
            debug!(error = %err, "stream error after stop, ignoring");
            return;
        }
        shared.stream_failed(&err);
    }
}

struct ActiveStream {
    handle: StreamHandle,
    gate: PumpGate,
}

// ── Monitor ──────────────────────────────────────────────────────

/// The control surface for live telemetry.
///
/// Cheaply cloneable via `Arc<MonitorInner>`. Holds at most one open
/// stream at a time.
#[derive(Clone)]
pub struct Monitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    config: MonitorConfig,
    client: ApiClient,
    shared: Arc<Shared>,
    stream: Mutex<Option<ActiveStream>>,
    /// Ids with a stop request in flight.
    stopping: DashSet<String>,
}

/// Clears an id from the in-flight set when the stop call ends, however
/// it ends.
struct StoppingGuard<'a> {
    set: &'a DashSet<String>,
    id: &'a str,
}

impl Drop for StoppingGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(self.id);
    }
}

impl Monitor {
    /// Build a monitor and its HTTP clients from configuration. Does NOT
    /// connect; call [`start()`](Self::start).
    pub fn new(config: MonitorConfig, session: SessionSignal) -> Result<Self, CoreError> {
        let client = ApiClient::new(
            config.base_url.clone(),
            config.token.clone(),
            &config.transport(),
        )?
        .with_session(session);
        Ok(Self::with_client(config, client))
    }

    /// Build a monitor around an existing client.
    pub fn with_client(config: MonitorConfig, client: ApiClient) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                config,
                client,
                shared: Arc::new(Shared::new()),
                stream: Mutex::new(None),
                stopping: DashSet::new(),
            }),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    // ── Stream lifecycle ─────────────────────────────────────────

    /// Open the telemetry stream.
    ///
    /// Fails with [`CoreError::AlreadyStarted`] while a previous stream
    /// is still running. A finished or stopped stream may be restarted.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<(), CoreError> {
        let mut slot = lock(&self.inner.stream);
        if slot.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            return Err(CoreError::AlreadyStarted);
        }
        // A finished stream is released before the new one opens.
        if let Some(previous) = slot.take() {
            *lock(&previous.gate) = false;
        }

        let shared = &self.inner.shared;
        shared.set_state(ConnectionState::Connecting);

        let gate: PumpGate = Arc::new(Mutex::new(true));
        let handle = match self.inner.client.open_coords_stream(
            frame_pump(Arc::clone(shared), Arc::clone(&gate)),
            error_sink(Arc::clone(shared), Arc::clone(&gate)),
        ) {
            Ok(handle) => handle,
            Err(e) => {
                shared.set_state(ConnectionState::Failed);
                return Err(e.into());
            }
        };

        info!(url = %self.inner.client.base_url(), "monitoring started");
        *slot = Some(ActiveStream { handle, gate });
        Ok(())
    }

    /// Stop the stream.
    ///
    /// Once this returns, no frame, connectivity notification, or error
    /// from the stopped stream is published. Idempotent, and a no-op
    /// when never started.
    pub fn stop(&self) {
        let active = lock(&self.inner.stream).take();
        if let Some(active) = active {
            active.handle.cancel();
            // Waits for an in-flight frame to finish.
            *lock(&active.gate) = false;
            info!("monitoring stopped");
        }
        self.inner.shared.set_state(ConnectionState::Disconnected);
    }

    /// `true` while a stream task is running.
    pub fn is_streaming(&self) -> bool {
        lock(&self.inner.stream)
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    // ── Job control ──────────────────────────────────────────────

    /// Stop the simulation behind `id` and drop it from the live map.
    pub async fn stop_entity(&self, id: &str) -> Result<StopOutcome, CoreError> {
        if !self.inner.stopping.insert(id.to_owned()) {
            return Err(CoreError::StopInProgress { id: id.to_owned() });
        }
        let _guard = StoppingGuard {
            set: &self.inner.stopping,
            id,
        };

        let shared = &self.inner.shared;
        match self.inner.client.stop_simulator(id).await {
            Ok(()) => {
                info!(id, "simulation stopped");
                shared.reconciler.remove(id);
                shared.emit(MonitorEvent::EntityStopped { id: id.to_owned() });
                Ok(StopOutcome::Stopped)
            }
            Err(e) if e.is_auth_expired() => {
                info!(id, "stop rejected: session expired");
                Ok(StopOutcome::SessionExpired)
            }
            Err(e) => {
                let message = e.server_message().unwrap_or(STOP_FAILED_MESSAGE).to_owned();
                warn!(id, error = %e, "stop failed");
                shared.surface_error(&message, e.to_string());
                Err(CoreError::CommandFailed {
                    id: id.to_owned(),
                    message,
                })
            }
        }
    }

    /// `true` while a stop request for `id` is in flight.
    pub fn is_stopping(&self, id: &str) -> bool {
        self.inner.stopping.contains(id)
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.connection_state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.shared.connection_state.borrow()
    }

    /// Subscribe to monitor events.
    pub fn events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.shared.event_tx.subscribe()
    }

    /// The last user-visible error, cleared when the server confirms a
    /// (re)started stream.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.shared.last_error).clone()
    }

    // ── Snapshot accessors ───────────────────────────────────────

    pub fn entities(&self) -> EntityStream<TelemetryEntity> {
        self.inner.shared.reconciler.stream()
    }

    pub fn entities_snapshot(&self) -> EntitySnapshot {
        self.inner.shared.reconciler.snapshot()
    }

    pub fn entity(&self, id: &str) -> Option<Arc<TelemetryEntity>> {
        self.inner.shared.reconciler.get(id)
    }
}
