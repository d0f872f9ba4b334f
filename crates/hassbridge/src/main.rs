mod cli;
mod commands;
mod config;
mod error;
mod output;
mod tools;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hassbridge_core::HubClient;

use crate::cli::{Cli, Command, ToolsCommand};
use crate::error::CliError;
use crate::output::Printer;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;

    if let Command::Completions(args) = command {
        use clap::CommandFactory;
        use clap_complete::generate;

        let mut cmd = Cli::command();
        generate(args.shell, &mut cmd, "hassbridge", &mut std::io::stdout());
        return Ok(());
    }

    let cfg = config::load_config()?;
    let out = Printer {
        format: config::output_format(&global, &cfg),
        quiet: global.quiet,
    };

    match command {
        // Config commands never touch the hub
        Command::Config(args) => commands::config_cmd::handle(args, &global, out),

        Command::Tools(args) => match args.command {
            ToolsCommand::List => {
                commands::tool::list(out);
                Ok(())
            }
            ToolsCommand::Call { name, input } => {
                // Reject bad input before resolving credentials or connecting
                let call = commands::tool::prepare(&name, input.as_deref())?;
                let client = HubClient::new(config::resolve_bridge_config(&global, &cfg)?)?;
                let result = commands::tool::call(&client, call, out).await;
                client.disconnect().await;
                result
            }
        },

        cmd => {
            let client = HubClient::new(config::resolve_bridge_config(&global, &cfg)?)?;
            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &client, out).await;
            client.disconnect().await;
            result
        }
    }
}
