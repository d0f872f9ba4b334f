//! Light command handlers.

use hassbridge_core::{AreaLightsOutcome, HubClient, HubGateway};

use crate::cli::{LightsArgs, LightsCommand};
use crate::error::CliError;
use crate::output::{self, Printer};

use super::registry;

fn render_outcome(out: Printer, area_id: &str, outcome: &AreaLightsOutcome) {
    out.print(&output::render_single(
        out.format,
        outcome,
        |o| format!("{} light(s) switched in area '{area_id}'", o.changed),
        |o| o.changed.to_string(),
    ));
}

pub async fn handle<G: HubGateway>(
    client: &HubClient<G>,
    args: LightsArgs,
    out: Printer,
) -> Result<(), CliError> {
    match args.command {
        LightsCommand::On { entity_id } => {
            client.turn_on_light(&entity_id).await?;
            out.status(&format!("Turned on {entity_id}"));
            Ok(())
        }

        LightsCommand::Off { entity_id } => {
            client.turn_off_light(&entity_id).await?;
            out.status(&format!("Turned off {entity_id}"));
            Ok(())
        }

        LightsCommand::AreaOn {
            area_id,
            brightness,
            transition,
            dry_run,
        } => {
            if dry_run {
                return preview(client, &area_id, out).await;
            }
            let outcome = client
                .turn_on_area_lights(&area_id, brightness, transition)
                .await?;
            render_outcome(out, &area_id, &outcome);
            Ok(())
        }

        LightsCommand::AreaOff {
            area_id,
            transition,
            dry_run,
        } => {
            if dry_run {
                return preview(client, &area_id, out).await;
            }
            let outcome = client.turn_off_area_lights(&area_id, transition).await?;
            render_outcome(out, &area_id, &outcome);
            Ok(())
        }
    }
}

async fn preview<G: HubGateway>(
    client: &HubClient<G>,
    area_id: &str,
    out: Printer,
) -> Result<(), CliError> {
    let targets = registry::area_lights(client, area_id).await?;
    if targets.is_empty() {
        out.status(&format!("No lights assigned to area '{area_id}'"));
        return Ok(());
    }
    out.print(&output::render_single(
        out.format,
        &targets,
        |t| t.join("\n"),
        |t| t.join("\n"),
    ));
    Ok(())
}
