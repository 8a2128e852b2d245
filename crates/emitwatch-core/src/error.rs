// ── Core error types ──
//
// User-facing errors from emitwatch-core. Consumers never match on HTTP
// status codes or reqwest errors directly; the `From<emitwatch_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session expired -- sign in again")]
    SessionExpired,

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Monitoring is already running")]
    AlreadyStarted,

    #[error("A stop request for {id} is already in flight")]
    StopInProgress { id: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("{message}")]
    CommandFailed { id: String, message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Backend error code from the response body, if any.
        code: Option<String>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// `true` when the credentials are no longer accepted.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::SessionExpired
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<emitwatch_api::Error> for CoreError {
    fn from(err: emitwatch_api::Error) -> Self {
        use emitwatch_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::SessionExpired => CoreError::SessionExpired,
            Api::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                CoreError::ConnectionFailed {
                    url: e
                        .url()
                        .map_or_else(|| "<unknown>".into(), ToString::to_string),
                    reason: e.to_string(),
                }
            }
            Api::Transport(e) => CoreError::Api {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
                code: None,
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::InvalidId(id) => CoreError::Config {
                message: format!("Invalid entity id: {id:?}"),
            },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::HttpStatus { status: 401 } => CoreError::AuthenticationFailed {
                message: "HTTP error! status: 401".into(),
            },
            Api::HttpStatus { status } => CoreError::Api {
                message: format!("HTTP error! status: {status}"),
                code: None,
                status: Some(status),
            },
            Api::StreamRead(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            Api::Api {
                message,
                code,
                status,
            } => {
                if status == 401 || code.as_deref() == Some(emitwatch_api::error::JWT_EXPIRED_CODE)
                {
                    CoreError::SessionExpired
                } else {
                    CoreError::Api {
                        message,
                        code,
                        status: Some(status),
                    }
                }
            }
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
