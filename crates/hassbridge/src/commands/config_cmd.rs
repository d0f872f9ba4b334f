//! Config subcommand handlers.

use std::fmt::Write as _;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output::Printer;

/// Render the config as TOML with plaintext tokens masked.
pub(crate) fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "insecure = {}", cfg.defaults.insecure);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "url = \"{}\"", p.url);
        if p.token.is_some() {
            let _ = writeln!(out, "token = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = writeln!(out, "token_env = \"{env}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = writeln!(out, "ca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = writeln!(out, "insecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
        if let Some(prime) = p.prime_states {
            let _ = writeln!(out, "prime_states = {prime}");
        }
    }

    out
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts, out: Printer) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init {
            url,
            token_env,
            plaintext_token,
            set_default,
        } => {
            if url.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "url".into(),
                    reason: "must not be empty".into(),
                });
            }
            let mut cfg = config::load_config()?;
            let name = global.profile.clone().unwrap_or_else(|| "default".into());

            let existing = cfg.profiles.remove(&name).unwrap_or_default();
            let profile = Profile {
                url: url.trim().to_string(),
                token: plaintext_token.or(existing.token),
                token_env: token_env.or(existing.token_env),
                ..existing
            };
            cfg.profiles.insert(name.clone(), profile);
            if set_default || cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }

            let path = config::save_config(&cfg)?;
            out.status(&format!(
                "Profile '{name}' saved to {}",
                path.display()
            ));
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            out.print(format_config_redacted(&cfg).trim_end());
            Ok(())
        }

        ConfigCommand::Path => {
            out.print(&config::config_path().display().to_string());
            Ok(())
        }
    }
}
