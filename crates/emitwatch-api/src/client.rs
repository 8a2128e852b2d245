// Emitter simulator HTTP client
//
// Owns the two reqwest clients (bounded for commands, unbounded for the
// stream), the base URL, and the bearer token. Every path that detects an
// expired session raises the shared `SessionSignal` before returning.

use secrecy::SecretString;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::auth::BearerToken;
use crate::error::{Error, JWT_EXPIRED_CODE};
use crate::session::SessionSignal;
use crate::stream::{self, StreamHandle};
use crate::transport::TransportConfig;

const COORDS_PATH: &str = "/api/v1/emitter/simulator/monitoring/coords";
const SIMULATOR_PATH: &str = "/api/v1/emitter/simulator";

/// Error body the backend returns on failed commands.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// HTTP client for the emitter simulator backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    base_url: Url,
    token: BearerToken,
    session: Option<SessionSignal>,
}

impl ApiClient {
    /// Build a client with fresh reqwest clients from `transport`.
    pub fn new(
        base_url: Url,
        token: Option<SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            stream_http: transport.build_stream_client()?,
            base_url,
            token: BearerToken::from(token),
            session: None,
        })
    }

    /// Wrap an existing `reqwest::Client`, used for both commands and the stream.
    pub fn from_reqwest(http: reqwest::Client, base_url: Url, token: Option<SecretString>) -> Self {
        Self {
            stream_http: http.clone(),
            http,
            base_url,
            token: BearerToken::from(token),
            session: None,
        }
    }

    /// Attach the signal raised whenever the session is found expired.
    #[must_use]
    pub fn with_session(mut self, session: SessionSignal) -> Self {
        self.session = Some(session);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> Option<&SessionSignal> {
        self.session.as_ref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_present()
    }

    // ── URL builders ─────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}{path}"))?)
    }

    /// `{base}/api/v1/emitter/simulator/monitoring/coords`
    pub fn coords_url(&self) -> Result<Url, Error> {
        self.url(COORDS_PATH)
    }

    /// `{base}/api/v1/emitter/simulator/{uuid}`
    ///
    /// `uuid` is pushed as one percent-encoded segment, so `/`, `?` and `#`
    /// cannot leave the simulator path. Empty, `.` and `..` are rejected.
    pub fn simulator_url(&self, uuid: &str) -> Result<Url, Error> {
        if matches!(uuid, "" | "." | "..") {
            return Err(Error::InvalidId(uuid.to_owned()));
        }
        let mut url = self.url(SIMULATOR_PATH)?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidId(uuid.to_owned()))?
            .push(uuid);
        Ok(url)
    }

    // ── Telemetry stream ─────────────────────────────────────────────

    /// Open the coordinates stream.
    ///
    /// `on_chunk` receives raw text chunks. `on_error` receives the
    /// terminal error, if any; an auth-expiry error raises the session
    /// signal first and is still forwarded so the caller can update its
    /// own state.
    pub fn open_coords_stream<C, E>(&self, on_chunk: C, on_error: E) -> Result<StreamHandle, Error>
    where
        C: FnMut(&str) + Send + 'static,
        E: FnOnce(Error) + Send + 'static,
    {
        let url = self.coords_url()?;
        let session = self.session.clone();

        Ok(stream::open(
            &self.stream_http,
            url,
            &self.token,
            on_chunk,
            move |err| {
                if err.is_auth_expired() {
                    if let Some(session) = &session {
                        session.expire();
                    }
                }
                on_error(err);
            },
        ))
    }

    // ── Job control ──────────────────────────────────────────────────

    /// Stop the simulation identified by `uuid`.
    pub async fn stop_simulator(&self, uuid: &str) -> Result<(), Error> {
        let url = self.simulator_url(uuid)?;
        debug!("DELETE {}", url);

        let resp = self
            .http
            .delete(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::AUTHORIZATION, self.token.header_value())
            .send()
            .await?;

        self.check_response(resp).await
    }

    /// Map a command response to `Ok(())` or a classified error.
    async fn check_response(&self, resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let result = if status == reqwest::StatusCode::UNAUTHORIZED {
            Error::Authentication {
                message: "token rejected (HTTP 401)".into(),
            }
        } else {
            let body = resp.text().await.unwrap_or_default();
            let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
            if parsed.code.as_deref() == Some(JWT_EXPIRED_CODE) {
                Error::SessionExpired
            } else {
                Error::Api {
                    message: parsed.message.unwrap_or_default(),
                    code: parsed.code,
                    status: status.as_u16(),
                }
            }
        };

        if result.is_auth_expired() {
            if let Some(session) = &self.session {
                session.expire();
            }
        } else {
            warn!(status = status.as_u16(), error = %result, "command failed");
        }

        Err(result)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::from_reqwest(reqwest::Client::new(), Url::parse(base).unwrap(), None)
    }

    #[test]
    fn coords_url_ignores_trailing_slash() {
        assert_eq!(
            client("http://sim.local:8080/").coords_url().unwrap().as_str(),
            "http://sim.local:8080/api/v1/emitter/simulator/monitoring/coords"
        );
        assert_eq!(
            client("http://sim.local:8080").coords_url().unwrap().as_str(),
            "http://sim.local:8080/api/v1/emitter/simulator/monitoring/coords"
        );
    }

    #[test]
    fn simulator_url_keeps_base_path() {
        assert_eq!(
            client("https://gw.example/sim").simulator_url("a1b2").unwrap().as_str(),
            "https://gw.example/sim/api/v1/emitter/simulator/a1b2"
        );
    }

    #[test]
    fn simulator_url_encodes_id_as_one_segment() {
        let c = client("http://h");
        assert_eq!(
            c.simulator_url("../../../admin").unwrap().as_str(),
            "http://h/api/v1/emitter/simulator/..%2F..%2F..%2Fadmin"
        );
        for id in ["a1?force=true", "a1#x", "a/b"] {
            let url = c.simulator_url(id).unwrap();
            assert_eq!(url.query(), None, "{id}");
            assert_eq!(url.fragment(), None, "{id}");
            let segments: Vec<_> = url.path_segments().unwrap().collect();
            assert_eq!(segments.len(), 5, "{id}: {url}");
            assert_eq!(segments[..4], ["api", "v1", "emitter", "simulator"]);
        }
    }

    #[test]
    fn simulator_url_rejects_dot_segments() {
        let c = client("http://h");
        for id in ["", ".", ".."] {
            assert!(matches!(c.simulator_url(id), Err(Error::InvalidId(_))), "{id:?}");
        }
    }

    #[test]
    fn token_presence_is_reported() {
        assert!(!client("http://h").has_token());
        let c = ApiClient::from_reqwest(
            reqwest::Client::new(),
            Url::parse("http://h").unwrap(),
            Some(SecretString::from("t".to_string())),
        );
        assert!(c.has_token());
    }
}
