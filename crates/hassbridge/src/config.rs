//! Profile selection and CLI flag overrides on top of `hassbridge-config`.

use clap::ValueEnum;
use secrecy::SecretString;

pub use hassbridge_config::{Config, Profile, config_path, load_config, save_config};
use hassbridge_core::BridgeConfig;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Profile name in effect: `--profile`, then `default_profile`, then "default".
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| cfg.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// `--output`, then the config's `defaults.output`, then table.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&cfg.defaults.output, true).unwrap_or(OutputFormat::Table)
    })
}

/// Build a `BridgeConfig` from the active profile with flag overrides.
///
/// With no matching profile, `--url` alone (or `HASS_URL`) is enough as
/// long as a token can be found.
pub fn resolve_bridge_config(global: &GlobalOpts, cfg: &Config) -> Result<BridgeConfig, CliError> {
    let name = active_profile_name(global, cfg);

    let mut profile = match cfg.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        None => Profile::default(),
    };

    if let Some(ref url) = global.url {
        profile.url.clone_from(url);
    }
    if profile.url.trim().is_empty() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }

    let token = match global.token.as_deref().map(str::trim) {
        Some(token) if !token.is_empty() => SecretString::from(token.to_string()),
        _ => hassbridge_config::resolve_token(&profile, &name)?,
    };

    Ok(hassbridge_config::build_bridge_config(
        &profile,
        &cfg.defaults,
        token,
    )?)
}
