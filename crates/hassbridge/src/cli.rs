//! Clap derive structures for the `hassbridge` CLI.
//!
//! Defines the command tree, global flags, and shared value types.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Number;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hassbridge -- Home Assistant state and control from the command line
#[derive(Debug, Parser)]
#[command(
    name = "hassbridge",
    version,
    about = "Query and control a Home Assistant hub",
    long_about = "Bridge between a Home Assistant hub and tool-calling agents.\n\n\
        Entity state is mirrored from the hub's WebSocket subscription;\n\
        history and logbook queries go through the REST API.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Hub profile to use
    #[arg(long, short = 'p', env = "HASSBRIDGE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Hub URL (overrides profile)
    #[arg(long, env = "HASS_URL", global = true)]
    pub url: Option<String>,

    /// Long-lived access token (overrides profile and HASS_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Output format [default: table, or the config's `defaults.output`]
    #[arg(long, short = 'o', env = "HASSBRIDGE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates on the REST API
    #[arg(long, short = 'k', env = "HASSBRIDGE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "HASSBRIDGE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read cached entity state
    #[command(alias = "st")]
    States(StatesArgs),

    /// List areas from the area registry
    Areas(ListOnlyArgs),

    /// List devices from the device registry
    #[command(alias = "dev")]
    Devices(ListOnlyArgs),

    /// List entries from the entity registry
    #[command(alias = "ent")]
    Entities(EntitiesArgs),

    /// List available services
    #[command(alias = "svc")]
    Services(ServicesArgs),

    /// Switch single lights or every light in an area
    #[command(alias = "l")]
    Lights(LightsArgs),

    /// Call an arbitrary service
    Call(CallArgs),

    /// State history over a period (REST)
    History(HistoryArgs),

    /// Logbook entries over a period (REST)
    Logbook(LogbookArgs),

    /// List or invoke agent-facing tools
    Tools(ToolsArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── States ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatesArgs {
    #[command(subcommand)]
    pub command: StatesCommand,
}

#[derive(Debug, Subcommand)]
pub enum StatesCommand {
    /// List every cached entity
    #[command(alias = "ls")]
    List {
        /// Only entities of this domain (e.g. `light`)
        #[arg(long, short = 'd')]
        domain: Option<String>,
    },

    /// Show one entity
    Get {
        /// Entity id, e.g. `light.kitchen`
        entity_id: String,
    },
}

// ── Registries ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListOnlyArgs {
    #[command(subcommand)]
    pub command: ListCommand,
}

#[derive(Debug, Subcommand)]
pub enum ListCommand {
    /// List all entries
    #[command(alias = "ls")]
    List,
}

#[derive(Debug, Args)]
pub struct EntitiesArgs {
    #[command(subcommand)]
    pub command: EntitiesCommand,
}

#[derive(Debug, Subcommand)]
pub enum EntitiesCommand {
    /// List registry entries
    #[command(alias = "ls")]
    List {
        /// Only entities assigned directly to this area
        #[arg(long, short = 'a')]
        area: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct ServicesArgs {
    #[command(subcommand)]
    pub command: ServicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum ServicesCommand {
    /// List services per domain
    #[command(alias = "ls")]
    List {
        /// Only services of this domain
        #[arg(long, short = 'd')]
        domain: Option<String>,
    },
}

// ── Lights ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LightsArgs {
    #[command(subcommand)]
    pub command: LightsCommand,
}

#[derive(Debug, Subcommand)]
pub enum LightsCommand {
    /// Turn one light on
    On { entity_id: String },

    /// Turn one light off
    Off { entity_id: String },

    /// Turn on every light assigned to an area
    AreaOn {
        area_id: String,

        /// Brightness in percent (0-100)
        #[arg(long, short = 'b', value_parser = clap::value_parser!(u8).range(0..=100))]
        brightness: Option<u8>,

        /// Transition time in seconds
        #[arg(long, short = 't', value_parser = parse_transition)]
        transition: Option<Number>,

        /// Print the targeted lights without switching them
        #[arg(long)]
        dry_run: bool,
    },

    /// Turn off every light assigned to an area
    AreaOff {
        area_id: String,

        /// Transition time in seconds
        #[arg(long, short = 't', value_parser = parse_transition)]
        transition: Option<Number>,

        /// Print the targeted lights without switching them
        #[arg(long)]
        dry_run: bool,
    },
}

/// Seconds as a JSON number, so `5` stays an integer on the wire.
fn parse_transition(raw: &str) -> Result<Number, String> {
    let secs: Number = raw.trim().parse().map_err(|e| format!("{e}"))?;
    if secs.as_f64().is_some_and(|v| v >= 0.0) {
        Ok(secs)
    } else {
        Err("must be a non-negative number of seconds".into())
    }
}

// ── Service call ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CallArgs {
    /// Service domain, e.g. `switch`
    pub domain: String,

    /// Service name, e.g. `toggle`
    pub service: String,

    /// Service data as a JSON object
    #[arg(long, short = 'd')]
    pub data: Option<String>,
}

// ── History / logbook ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Start of the period (RFC 3339). Defaults to one day ago on the hub.
    #[arg(long)]
    pub since: Option<String>,

    /// End of the period (RFC 3339)
    #[arg(long)]
    pub end_time: Option<String>,

    /// Restrict to these entities (repeatable)
    #[arg(long = "entity", short = 'e')]
    pub entities: Vec<String>,

    /// Only state and timestamps for intermediate rows
    #[arg(long)]
    pub minimal: bool,

    /// Drop attributes from every row
    #[arg(long)]
    pub no_attributes: bool,

    /// Only significant state changes
    #[arg(long)]
    pub significant_only: bool,
}

#[derive(Debug, Args)]
pub struct LogbookArgs {
    /// Start of the period (RFC 3339)
    #[arg(long)]
    pub since: Option<String>,

    /// End of the period (RFC 3339)
    #[arg(long)]
    pub end_time: Option<String>,

    /// Restrict to one entity
    #[arg(long, short = 'e')]
    pub entity: Option<String>,
}

// ── Tools ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ToolsArgs {
    #[command(subcommand)]
    pub command: ToolsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ToolsCommand {
    /// List tool names and descriptions
    #[command(alias = "ls")]
    List,

    /// Validate input and invoke a tool, printing its JSON result
    Call {
        /// Tool name, e.g. `ha_get_state`
        name: String,

        /// Tool input as a JSON object
        #[arg(long, short = 'i')]
        input: Option<String>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile
    Init {
        /// Hub URL
        #[arg(long)]
        url: String,

        /// Environment variable to read the token from
        #[arg(long)]
        token_env: Option<String>,

        /// Store this token in plaintext
        #[arg(long, conflicts_with = "token_env")]
        plaintext_token: Option<String>,

        /// Make this profile the default
        #[arg(long)]
        set_default: bool,
    },

    /// Print the configuration with secrets masked
    Show,

    /// Print the configuration file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn transition_keeps_integer_shape() {
        let secs = parse_transition("5").unwrap();
        assert!(secs.is_u64());
        assert_eq!(serde_json::to_string(&secs).unwrap(), "5");
        assert_eq!(parse_transition("2.5").unwrap().as_f64(), Some(2.5));
    }

    #[test]
    fn transition_rejects_negative_and_garbage() {
        assert!(parse_transition("-1").is_err());
        assert!(parse_transition("soon").is_err());
    }

    #[test]
    fn area_off_parses_transition() {
        let cli = Cli::try_parse_from(["hassbridge", "lights", "area-off", "living", "-t", "5"])
            .unwrap();
        let Command::Lights(args) = cli.command else {
            panic!("expected lights command");
        };
        assert!(matches!(
            args.command,
            LightsCommand::AreaOff { transition: Some(ref t), .. } if t.is_u64()
        ));
    }
}
