use thiserror::Error;

/// Top-level error type for the `hassbridge-api` crate.
///
/// Covers every failure mode across both API surfaces:
/// authentication, transport, the WebSocket command channel, and REST.
/// `hassbridge-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The hub rejected the access token (`auth_invalid`), or no token was given.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed while a command was outstanding.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The hub sent something that does not follow the WebSocket protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The hub answered a command with `success: false`.
    #[error("Home Assistant rejected the request ({code}): {message}")]
    HubRejected { code: String, message: String },

    // ── REST ────────────────────────────────────────────────────────
    /// Non-success HTTP status from a REST endpoint.
    #[error("HTTP {status} {status_text}: {body}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Capability ──────────────────────────────────────────────────
    /// The connection implementation does not support this operation.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
}

/// Trim a response body down to a short, char-boundary-safe preview.
pub(crate) fn body_snippet(body: &str) -> String {
    const MAX_CHARS: usize = 200;
    if body.chars().count() <= MAX_CHARS {
        return body.to_string();
    }
    let mut preview: String = body.chars().take(MAX_CHARS).collect();
    preview.push('…');
    preview
}
