// ── Runtime connection configuration ──
//
// These types describe how to reach one Home Assistant hub. They carry
// the access token and connection tuning, but never touch disk: the CLI
// (via hassbridge-config) builds a `BridgeConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use hassbridge_api::{Credentials, TlsMode, TransportConfig};
use secrecy::{ExposeSecret, SecretString};

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed hubs).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one hub.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Hub address: a full URL or a bare `host:port`.
    pub url: String,
    /// Long-lived access token.
    pub token: SecretString,
    pub tls: TlsVerification,
    /// Upper bound on every hub round trip, including connect + auth.
    pub timeout: Duration,
    /// Fetch a full state snapshot before subscribing.
    pub prime_states: bool,
}

impl BridgeConfig {
    pub fn new(url: impl Into<String>, token: SecretString) -> Self {
        Self {
            url: url.into(),
            token,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            prime_states: true,
        }
    }

    /// Reject configurations that can never connect.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.url.trim().is_empty() {
            return Err(CoreError::Config {
                message: "Home Assistant URL is empty".into(),
            });
        }
        if self.token.expose_secret().trim().is_empty() {
            return Err(CoreError::Config {
                message: "access token is empty".into(),
            });
        }
        if self.timeout.is_zero() {
            return Err(CoreError::Config {
                message: "timeout must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub(crate) fn credentials(&self) -> Result<Credentials, CoreError> {
        Ok(Credentials::long_lived(&self.url, self.token.clone())?)
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(raw: &str) -> SecretString {
        SecretString::from(raw.to_string())
    }

    #[test]
    fn defaults() {
        let config = BridgeConfig::new("homeassistant.local:8123", token("tok"));
        assert!(config.prime_states);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.tls, TlsVerification::SystemDefaults);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_url_or_token_is_rejected() {
        let err = BridgeConfig::new(" ", token("tok")).validate().unwrap_err();
        assert!(matches!(err, CoreError::Config { ref message } if message.contains("URL")));

        let err = BridgeConfig::new("ha.local", token("")).validate().unwrap_err();
        assert!(matches!(err, CoreError::Config { ref message } if message.contains("token")));
    }

    #[test]
    fn tls_maps_to_transport_mode() {
        let mut config = BridgeConfig::new("ha.local", token("tok"));
        config.tls = TlsVerification::DangerAcceptInvalid;
        assert!(matches!(config.transport().tls, TlsMode::DangerAcceptInvalid));
    }
}
