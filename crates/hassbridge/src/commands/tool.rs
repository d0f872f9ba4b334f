//! `tools list` and `tools call`.

use serde::Serialize;
use serde_json::Value;
use strum::IntoEnumIterator;
use tabled::Tabled;

use hassbridge_core::{HubClient, HubGateway};

use crate::error::CliError;
use crate::output::{self, Printer};
use crate::tools::{self, Tool, ToolCall};

#[derive(Serialize)]
struct ToolInfo {
    name: &'static str,
    description: &'static str,
}

#[derive(Tabled)]
struct ToolRow {
    #[tabled(rename = "Tool")]
    name: &'static str,
    #[tabled(rename = "Description")]
    description: &'static str,
}

pub fn list(out: Printer) {
    let tools: Vec<ToolInfo> = Tool::iter()
        .map(|t| ToolInfo {
            name: t.name(),
            description: t.description(),
        })
        .collect();
    out.print(&output::render_list(
        out.format,
        &tools,
        |t| ToolRow {
            name: t.name,
            description: t.description,
        },
        |t| t.name.to_string(),
    ));
}

/// Parse `--input` and validate it for `name`. Runs before any connection.
pub fn prepare(name: &str, input: Option<&str>) -> Result<ToolCall, CliError> {
    let raw = match input {
        Some(text) => serde_json::from_str(text)?,
        None => Value::Null,
    };
    Ok(ToolCall::validate(name, raw)?)
}

pub async fn call<G: HubGateway>(
    client: &HubClient<G>,
    call: ToolCall,
    out: Printer,
) -> Result<(), CliError> {
    let result = tools::dispatch(client, call).await?;
    out.print(&output::render_value(out.format, &result));
    Ok(())
}
