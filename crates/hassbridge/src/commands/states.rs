//! Entity state command handlers.

use std::sync::Arc;

use tabled::Tabled;

use hassbridge_core::{EntityState, HubClient, HubGateway};

use crate::cli::{StatesArgs, StatesCommand};
use crate::error::CliError;
use crate::output::{self, Printer};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct StateRow {
    #[tabled(rename = "Entity")]
    entity_id: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Last Changed")]
    last_changed: String,
}

impl From<&Arc<EntityState>> for StateRow {
    fn from(s: &Arc<EntityState>) -> Self {
        Self {
            entity_id: s.entity_id.clone(),
            state: s.state.clone(),
            name: s.friendly_name().unwrap_or_default().to_string(),
            last_changed: s.last_changed.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

fn detail(s: &EntityState) -> String {
    let mut pairs = vec![
        ("Entity", s.entity_id.clone()),
        ("State", s.state.clone()),
        ("Last Changed", s.last_changed.to_rfc3339()),
        ("Last Updated", s.last_updated.to_rfc3339()),
    ];
    let attributes: Vec<(&str, String)> = s
        .attributes
        .iter()
        .map(|(k, v)| (k.as_str(), v.to_string()))
        .collect();
    pairs.extend(attributes);
    output::detail_lines(&pairs)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle<G: HubGateway>(
    client: &HubClient<G>,
    args: StatesArgs,
    out: Printer,
) -> Result<(), CliError> {
    match args.command {
        StatesCommand::List { domain } => {
            let snapshot = client.list_states().await?;
            let mut states: Vec<Arc<EntityState>> = snapshot
                .values()
                .filter(|s| domain.as_deref().is_none_or(|d| s.domain() == Some(d)))
                .cloned()
                .collect();
            states.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

            out.print(&output::render_list(
                out.format,
                &states,
                |s| StateRow::from(s),
                |s| s.entity_id.clone(),
            ));
            Ok(())
        }

        StatesCommand::Get { entity_id } => {
            let state = client
                .get_state(&entity_id)
                .await?
                .ok_or_else(|| CliError::NotFound {
                    resource: "entity".into(),
                    identifier: entity_id.clone(),
                    list_command: "states list".into(),
                })?;
            out.print(&output::render_single(
                out.format,
                &*state,
                detail,
                |s| s.state.clone(),
            ));
            Ok(())
        }
    }
}
