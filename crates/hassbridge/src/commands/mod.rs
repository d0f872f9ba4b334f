//! Command dispatch: bridges CLI args -> `HubClient` calls -> output formatting.

pub mod config_cmd;
pub mod history;
pub mod lights;
pub mod registry;
pub mod services;
pub mod states;
pub mod tool;

use hassbridge_core::{HubClient, HubGateway};

use crate::cli::Command;
use crate::error::CliError;
use crate::output::Printer;

/// Dispatch a hub-bound command to the appropriate handler.
pub async fn dispatch<G: HubGateway>(
    cmd: Command,
    client: &HubClient<G>,
    out: Printer,
) -> Result<(), CliError> {
    match cmd {
        Command::States(args) => states::handle(client, args, out).await,
        Command::Areas(_) => registry::areas(client, out).await,
        Command::Devices(_) => registry::devices(client, out).await,
        Command::Entities(args) => registry::entities(client, args, out).await,
        Command::Services(args) => services::list(client, args, out).await,
        Command::Call(args) => services::call(client, args, out).await,
        Command::Lights(args) => lights::handle(client, args, out).await,
        Command::History(args) => history::history(client, args, out).await,
        Command::Logbook(args) => history::logbook(client, args, out).await,
        Command::Tools(_) | Command::Config(_) | Command::Completions(_) => Err(
            CliError::Internal("tools, config and completions are handled before connecting".into()),
        ),
    }
}
