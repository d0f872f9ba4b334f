// Home Assistant REST client for the history and logbook endpoints.
//
// Both are stateless pass-throughs: the response JSON is returned as-is
// and nothing here touches the WebSocket connection or the state cache.

use reqwest::header::CONTENT_TYPE;
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::Credentials;
use crate::error::{Error, body_snippet};
use crate::transport::TransportConfig;

/// Parameters for `GET /api/history/period[/{since}]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Start of the period (ISO-8601). The hub defaults to one day ago.
    pub since: Option<String>,
    pub end_time: Option<String>,
    /// Sent as a comma-separated `filter_entity_id`.
    pub entity_ids: Vec<String>,
    pub minimal_response: bool,
    pub no_attributes: bool,
    pub significant_changes_only: bool,
}

/// Parameters for `GET /api/logbook[/{since}]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogbookQuery {
    pub since: Option<String>,
    pub end_time: Option<String>,
    pub entity_id: Option<String>,
}

/// Bearer-authenticated HTTP client bound to one hub.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    credentials: Credentials,
}

impl RestClient {
    /// Build a client with TLS and timeout settings from `transport`.
    pub fn new(credentials: Credentials, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            credentials,
        })
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, credentials: Credentials) -> Self {
        Self { http, credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// State history over a period.
    pub async fn history(&self, query: &HistoryQuery) -> Result<Value, Error> {
        let path = with_since("api/history/period", query.since.as_deref());

        let mut params = Vec::new();
        if !query.entity_ids.is_empty() {
            params.push(("filter_entity_id", query.entity_ids.join(",")));
        }
        if let Some(ref end) = query.end_time {
            params.push(("end_time", end.clone()));
        }
        for (flag, set) in [
            ("minimal_response", query.minimal_response),
            ("no_attributes", query.no_attributes),
            ("significant_changes_only", query.significant_changes_only),
        ] {
            if set {
                params.push((flag, "1".to_string()));
            }
        }

        self.fetch_json(&path, &params).await
    }

    /// Logbook entries over a period.
    pub async fn logbook(&self, query: &LogbookQuery) -> Result<Value, Error> {
        let path = with_since("api/logbook", query.since.as_deref());

        let mut params = Vec::new();
        if let Some(ref entity) = query.entity_id {
            params.push(("entity", entity.clone()));
        }
        if let Some(ref end) = query.end_time {
            params.push(("end_time", end.clone()));
        }

        self.fetch_json(&path, &params).await
    }

    /// `GET {base}/{path}?{query}` with the bearer header.
    ///
    /// A non-JSON success body is returned as a JSON string.
    pub async fn fetch_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, Error> {
        let mut url: Url = self.credentials.api_url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .bearer_auth(self.credentials.token().expose_secret())
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body: body_snippet(&body),
            });
        }

        let is_json = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));
        let body = resp.text().await.map_err(Error::Transport)?;

        if !is_json {
            return Ok(Value::String(body));
        }
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", body_snippet(&body)),
            body,
        })
    }
}

/// Append an optional start timestamp as a fully escaped path segment.
fn with_since(base: &str, since: Option<&str>) -> String {
    match since {
        Some(since) => {
            let segment: String = url::form_urlencoded::byte_serialize(since.as_bytes()).collect();
            format!("{base}/{}", segment.replace('+', "%20"))
        }
        None => base.to_string(),
    }
}
