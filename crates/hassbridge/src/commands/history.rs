//! History and logbook pass-through.

use hassbridge_core::{HistoryQuery, HubClient, HubGateway, LogbookQuery};

use crate::cli::{HistoryArgs, LogbookArgs};
use crate::error::CliError;
use crate::output::{self, Printer};

fn check_timestamp(field: &str, value: Option<&str>) -> Result<(), CliError> {
    if let Some(ts) = value {
        chrono::DateTime::parse_from_rfc3339(ts).map_err(|e| CliError::Validation {
            field: field.into(),
            reason: format!("expected an RFC 3339 timestamp: {e}"),
        })?;
    }
    Ok(())
}

pub async fn history<G: HubGateway>(
    client: &HubClient<G>,
    args: HistoryArgs,
    out: Printer,
) -> Result<(), CliError> {
    check_timestamp("since", args.since.as_deref())?;
    check_timestamp("end_time", args.end_time.as_deref())?;

    let query = HistoryQuery {
        since: args.since,
        end_time: args.end_time,
        entity_ids: args.entities,
        minimal_response: args.minimal,
        no_attributes: args.no_attributes,
        significant_changes_only: args.significant_only,
    };
    let rows = client.history(&query).await?;
    out.print(&output::render_value(out.format, &rows));
    Ok(())
}

pub async fn logbook<G: HubGateway>(
    client: &HubClient<G>,
    args: LogbookArgs,
    out: Printer,
) -> Result<(), CliError> {
    check_timestamp("since", args.since.as_deref())?;
    check_timestamp("end_time", args.end_time.as_deref())?;

    let query = LogbookQuery {
        since: args.since,
        end_time: args.end_time,
        entity_id: args.entity,
    };
    let entries = client.logbook(&query).await?;
    out.print(&output::render_value(out.format, &entries));
    Ok(())
}
