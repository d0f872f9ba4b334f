// ── Core error types ──
//
// User-facing errors from hassbridge-core. Consumers never see raw
// WebSocket frames or reqwest errors; the `From<hassbridge_api::Error>`
// impl translates transport failures into this taxonomy.
//
// `CoreError` is `Clone` because one failed establishment attempt is
// handed to every caller that was waiting on it.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to Home Assistant: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Home Assistant did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation not supported by this connection: {operation}")]
    Unsupported { operation: String },

    #[error("Home Assistant rejected the request ({code}): {message}")]
    Rejected { code: String, message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// Hub error code, when the hub sent one.
        code: Option<String>,
        /// HTTP status code (REST surface only).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hassbridge_api::Error> for CoreError {
    fn from(err: hassbridge_api::Error) -> Self {
        use hassbridge_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        code: None,
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid Home Assistant URL: {e}"),
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Tls(reason) | Api::WebSocketConnect(reason) => {
                CoreError::ConnectionFailed { reason }
            }
            Api::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                reason: format!("connection closed (code {code}): {reason}"),
            },
            Api::Protocol(message) => CoreError::Api {
                message,
                code: None,
                status: None,
            },
            Api::HubRejected { code, message } => CoreError::Rejected { code, message },
            Api::Http {
                status,
                status_text,
                body,
            } => {
                let message = format!("HTTP {status} {status_text}: {body}");
                if status == 401 || status == 403 {
                    CoreError::AuthenticationFailed { message }
                } else {
                    CoreError::Api {
                        message,
                        code: None,
                        status: Some(status),
                    }
                }
            }
            Api::Deserialization { message, .. } => CoreError::Api {
                message: format!("malformed response: {message}"),
                code: None,
                status: None,
            },
            Api::UnsupportedOperation(operation) => CoreError::Unsupported {
                operation: operation.to_string(),
            },
        }
    }
}
