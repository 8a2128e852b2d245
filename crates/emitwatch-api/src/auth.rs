use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

/// Bearer credential attached to every request.
///
/// The token comes from an external credential store and may be absent.
/// An absent token still produces an (empty) `Authorization` header: the
/// server decides whether to reject the request, the client never
/// pre-validates it.
#[derive(Debug, Clone, Default)]
pub struct BearerToken(Option<SecretString>);

impl BearerToken {
    pub fn new(token: SecretString) -> Self {
        Self(Some(token))
    }

    /// A token-less credential; requests go out with an empty header.
    pub fn anonymous() -> Self {
        Self(None)
    }

    pub fn is_present(&self) -> bool {
        self.0
            .as_ref()
            .is_some_and(|t| !t.expose_secret().is_empty())
    }

    /// The `Authorization` header value: `Bearer <token>`, or empty.
    ///
    /// Marked sensitive so it never shows up in reqwest's debug output.
    pub fn header_value(&self) -> HeaderValue {
        let raw = match &self.0 {
            Some(token) if !token.expose_secret().is_empty() => {
                format!("Bearer {}", token.expose_secret())
            }
            _ => String::new(),
        };
        let mut value =
            HeaderValue::from_str(&raw).unwrap_or_else(|_| HeaderValue::from_static(""));
        value.set_sensitive(true);
        value
    }
}

impl From<Option<SecretString>> for BearerToken {
    fn from(token: Option<SecretString>) -> Self {
        Self(token)
    }
}
