// ── Runtime connection configuration ──
//
// Describes how to reach the simulator backend. Carries the credential
// and connection tuning, but never touches disk: the CLI builds a
// `MonitorConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use emitwatch_api::transport::{TlsMode, TransportConfig};

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed dev backends).
    DangerAcceptInvalid,
}

/// Configuration for one monitoring session.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Backend root, e.g. `https://sim.example:8443`.
    pub base_url: Url,
    /// Bearer token. `None` sends an empty `Authorization` header.
    pub token: Option<SecretString>,
    pub tls: TlsVerification,
    /// Bound on establishing a connection (stream and commands).
    pub connect_timeout: Duration,
    /// Whole-request bound for commands. The stream has none.
    pub request_timeout: Duration,
}

impl MonitorConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            tls: TlsVerification::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Build the transport settings for the api layer.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: tls_to_transport(&self.tls),
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
        }
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
