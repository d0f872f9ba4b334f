//! Service catalog and generic service calls.

use serde::Serialize;
use serde_json::{Map, Value};
use tabled::Tabled;

use hassbridge_core::{HubClient, HubGateway};

use crate::cli::{CallArgs, ServicesArgs, ServicesCommand};
use crate::error::CliError;
use crate::output::{self, Printer};

#[derive(Serialize)]
struct ServiceItem {
    domain: String,
    service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "Service")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&ServiceItem> for ServiceRow {
    fn from(s: &ServiceItem) -> Self {
        Self {
            name: format!("{}.{}", s.domain, s.service),
            description: s.description.clone().unwrap_or_default(),
        }
    }
}

pub async fn list<G: HubGateway>(
    client: &HubClient<G>,
    args: ServicesArgs,
    out: Printer,
) -> Result<(), CliError> {
    let ServicesCommand::List { domain } = args.command;
    let catalog = client.list_services().await?;

    let items: Vec<ServiceItem> = catalog
        .iter()
        .filter(|(d, _)| domain.as_deref().is_none_or(|want| want == d.as_str()))
        .flat_map(|(d, services)| {
            services.iter().map(move |(name, spec)| ServiceItem {
                domain: d.clone(),
                service: name.clone(),
                description: spec
                    .get("description")
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string),
            })
        })
        .collect();

    out.print(&output::render_list(
        out.format,
        &items,
        |s| ServiceRow::from(s),
        |s| format!("{}.{}", s.domain, s.service),
    ));
    Ok(())
}

pub async fn call<G: HubGateway>(
    client: &HubClient<G>,
    args: CallArgs,
    out: Printer,
) -> Result<(), CliError> {
    let data = parse_data(args.data.as_deref())?;
    let ack = client.call_service(&args.domain, &args.service, data).await?;
    out.print(&output::render_single(
        out.format,
        &ack,
        |_| format!("Called {}.{}", args.domain, args.service),
        |a| a.ok.to_string(),
    ));
    Ok(())
}

/// `--data` must be a JSON object when given.
pub(crate) fn parse_data(raw: Option<&str>) -> Result<Map<String, Value>, CliError> {
    match raw {
        None => Ok(Map::new()),
        Some(text) => match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Ok(map),
            _ => Err(CliError::Validation {
                field: "data".into(),
                reason: "must be a JSON object".into(),
            }),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn data_defaults_to_empty_object() {
        assert!(parse_data(None).unwrap().is_empty());
    }

    #[test]
    fn data_must_be_an_object() {
        let map = parse_data(Some(r#"{"entity_id":"switch.fan"}"#)).unwrap();
        assert_eq!(map["entity_id"], "switch.fan");

        assert!(matches!(
            parse_data(Some("[1,2]")),
            Err(CliError::Validation { .. })
        ));
        assert!(matches!(parse_data(Some("{nope")), Err(CliError::Json(_))));
    }
}
