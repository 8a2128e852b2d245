use thiserror::Error;

/// Error code the backend puts in the body when a JWT has expired.
pub const JWT_EXPIRED_CODE: &str = "J403";

/// Top-level error type for the `emitwatch-api` crate.
///
/// Covers every failure mode of the wire layer: authentication,
/// transport, the telemetry stream, and the job-control API.
/// `emitwatch-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Request rejected as unauthenticated (HTTP 401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The bearer token has expired (`J403` error code).
    #[error("Session expired -- sign in again")]
    SessionExpired,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// An entity id that cannot stand as a single path segment.
    #[error("Invalid entity id: {0:?}")]
    InvalidId(String),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Stream ──────────────────────────────────────────────────────
    /// The stream endpoint answered with a non-success status.
    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16 },

    /// The response body failed mid-stream.
    #[error("Stream read failed: {0}")]
    StreamRead(String),

    // ── Job-control API ─────────────────────────────────────────────
    /// Structured error from the REST backend.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        message: String,
        code: Option<String>,
        status: u16,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the credentials are no longer
    /// accepted and the user has to sign in again.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::SessionExpired => true,
            Self::Api { code, status, .. } => {
                *status == 401 || code.as_deref() == Some(JWT_EXPIRED_CODE)
            }
            Self::HttpStatus { status } => *status == 401,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::StreamRead(_) => true,
            Self::HttpStatus { status } => *status >= 500,
            _ => false,
        }
    }

    /// Extract the API error code, if available.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            Self::SessionExpired => Some(JWT_EXPIRED_CODE),
            _ => None,
        }
    }

    /// The server-supplied message, if the backend sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }
}
