//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use emitwatch_config::ConfigError;
use emitwatch_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(emitwatch::connection_failed),
        help(
            "{reason}\n\
             Check that the backend is running and reachable.\n\
             For self-signed certificates, try --insecure (-k)."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Monitoring stream failed: {message}")]
    #[diagnostic(code(emitwatch::stream_failed), help("{detail}"))]
    StreamFailed { message: String, detail: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Session expired or token rejected")]
    #[diagnostic(
        code(emitwatch::session_expired),
        help(
            "Sign in again and store the new token with: emitwatch config set-token\n\
             Or pass --token / set EMITWATCH_TOKEN."
        )
    )]
    SessionExpired,

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Failed to stop {id}: {message}")]
    #[diagnostic(code(emitwatch::stop_failed))]
    StopFailed { id: String, message: String },

    #[error("A stop request for {id} is already in flight")]
    #[diagnostic(code(emitwatch::conflict))]
    Conflict { id: String },

    #[error("API error{}: {message}", .code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    #[diagnostic(code(emitwatch::api_error))]
    ApiError {
        code: Option<String>,
        message: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(emitwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(emitwatch::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: emitwatch config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No backend server configured")]
    #[diagnostic(
        code(emitwatch::no_server),
        help(
            "Pass --server (-s), set EMITWATCH_SERVER, or create a profile with:\n\
             emitwatch config init\n\
             Expected config at: {path}"
        )
    )]
    NoServer { path: String },

    #[error("{0}")]
    #[diagnostic(code(emitwatch::config))]
    Config(String),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("No telemetry received within {seconds}s")]
    #[diagnostic(
        code(emitwatch::timeout),
        help("Check that a simulation is running, or raise --timeout.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(emitwatch::render))]
    Render(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<toml::ser::Error> for CliError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StreamFailed { .. } => exit_code::CONNECTION,
            Self::SessionExpired => exit_code::AUTH,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoServer { .. } | Self::ProfileNotFound { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { .. } | CoreError::SessionExpired => {
                CliError::SessionExpired
            }

            CoreError::StopInProgress { id } => CliError::Conflict { id },

            CoreError::CommandFailed { id, message } => CliError::StopFailed { id, message },

            CoreError::Api { message, code, .. } => CliError::ApiError { code, message },

            CoreError::Config { message } => CliError::Config(message),

            CoreError::AlreadyStarted => CliError::Internal("monitor already started".into()),

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name, available } => {
                CliError::ProfileNotFound { name, available }
            }
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_auth_exit_code() {
        let err = CliError::from(CoreError::SessionExpired);
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err = CliError::from(CoreError::AuthenticationFailed {
            message: "401".into(),
        });
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn stop_failure_keeps_server_message() {
        let err = CliError::from(CoreError::CommandFailed {
            id: "a1".into(),
            message: "simulation not found".into(),
        });
        assert_eq!(err.to_string(), "Failed to stop a1: simulation not found");
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn api_error_code_is_optional_in_message() {
        let with = CliError::ApiError {
            code: Some("S500".into()),
            message: "boom".into(),
        };
        let without = CliError::ApiError {
            code: None,
            message: "boom".into(),
        };
        assert_eq!(with.to_string(), "API error (S500): boom");
        assert_eq!(without.to_string(), "API error: boom");
    }

    #[test]
    fn missing_profile_is_a_usage_error() {
        let err = CliError::from(ConfigError::ProfileNotFound {
            name: "lab".into(),
            available: "(none)".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
