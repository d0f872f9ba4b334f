use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::Error;

/// Normalize a configured hub address into a base URL.
///
/// Accepts a full URL (`https://ha.example.org`) or a bare `host:port`
/// (`homeassistant.local:8123`). Bare addresses default to plain `http`.
pub fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    Ok(Url::parse(&candidate)?)
}

/// Long-lived access token credentials for a single hub.
///
/// Produced by [`Credentials::long_lived`]; the same value drives the
/// WebSocket `auth` handshake and the REST bearer header.
#[derive(Debug, Clone)]
pub struct Credentials {
    base_url: Url,
    token: SecretString,
}

impl Credentials {
    /// Derive credentials from a raw base address and a long-lived token.
    pub fn long_lived(base_url: &str, token: SecretString) -> Result<Self, Error> {
        if token.expose_secret().trim().is_empty() {
            return Err(Error::Authentication {
                message: "access token is empty".into(),
            });
        }
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            token,
        })
    }

    /// The normalized hub base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The long-lived access token.
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// The WebSocket endpoint: `ws(s)://host[:port][/prefix]/api/websocket`.
    pub fn websocket_url(&self) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot derive {scheme} URL")))?;
        let prefix = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{prefix}/api/websocket"));
        url.set_query(None);
        Ok(url)
    }

    /// Join a REST path onto the base URL, keeping any path prefix the base carries.
    pub fn api_url(&self, path: &str) -> Result<Url, Error> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }
}
