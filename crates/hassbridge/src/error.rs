//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError`, `ConfigError` and `ToolError` into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use hassbridge_config::ConfigError;
use hassbridge_core::CoreError;

use crate::tools::ToolError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to Home Assistant: {reason}")]
    #[diagnostic(
        code(hassbridge::connection_failed),
        help(
            "Check that the hub is running and reachable.\n\
             A bare host:port is treated as http://host:port."
        )
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(hassbridge::auth_failed),
        help(
            "Create a long-lived access token under your Home Assistant profile\n\
             and pass it with --token, HASS_TOKEN, or a profile's token_env."
        )
    )]
    AuthFailed { message: String },

    #[error("No access token configured for profile '{profile}'")]
    #[diagnostic(
        code(hassbridge::no_token),
        help(
            "Set HASS_TOKEN, pass --token, or run:\n\
             hassbridge config init --url <URL> --token-env <VAR>"
        )
    )]
    NoToken { profile: String },

    // ── Hub responses ────────────────────────────────────────────────
    #[error("{resource} '{identifier}' not found")]
    #[diagnostic(
        code(hassbridge::not_found),
        help("Run: hassbridge {list_command} to see what the hub knows about")
    )]
    NotFound {
        resource: String,
        identifier: String,
        list_command: String,
    },

    #[error("Home Assistant rejected the request ({code}): {message}")]
    #[diagnostic(code(hassbridge::rejected))]
    Rejected { code: String, message: String },

    #[error("API error: {message}")]
    #[diagnostic(code(hassbridge::api_error))]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("Operation '{operation}' is not supported by this connection")]
    #[diagnostic(code(hassbridge::unsupported))]
    Unsupported { operation: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hassbridge::validation))]
    Validation { field: String, reason: String },

    #[error("Invalid input for tool '{tool}': {reason}")]
    #[diagnostic(
        code(hassbridge::tool_input),
        help("Run: hassbridge tools list to see each tool's purpose")
    )]
    ToolInput { tool: String, reason: String },

    #[error("Unknown tool '{name}'")]
    #[diagnostic(
        code(hassbridge::unknown_tool),
        help("Run: hassbridge tools list")
    )]
    UnknownTool { name: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(hassbridge::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: hassbridge config init --url <URL>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No Home Assistant URL configured")]
    #[diagnostic(
        code(hassbridge::no_config),
        help(
            "Pass --url (or set HASS_URL), or create a profile with:\n\
             hassbridge config init --url <URL>\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(hassbridge::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(hassbridge::timeout),
        help("Increase timeout with --timeout or check hub responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(hassbridge::json), help("Pass a JSON object, e.g. '{{\"entity_id\": \"light.kitchen\"}}'"))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoToken { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. }
            | Self::ToolInput { .. }
            | Self::UnknownTool { .. }
            | Self::Json(_)
            | Self::NoConfig { .. }
            | Self::ProfileNotFound { .. } => exit_code::USAGE,
            Self::Api {
                status: Some(404), ..
            } => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => Self::ConnectionFailed { reason },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::Unsupported { operation } => Self::Unsupported { operation },
            CoreError::Rejected { code, message } => Self::Rejected { code, message },
            CoreError::Api {
                message, status, ..
            } => Self::Api { message, status },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoToken { profile } => Self::NoToken { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl From<ToolError> for CliError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidInput { tool, reason } => Self::ToolInput { tool, reason },
            ToolError::UnknownTool { name } => Self::UnknownTool { name },
            ToolError::Hub(core) => core.into(),
        }
    }
}
