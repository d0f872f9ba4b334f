//! Area, device, and entity registry listings.

use tabled::Tabled;

use hassbridge_core::{
    AreaEntry, DeviceEntry, EntityRegistryEntry, HubClient, HubGateway, lights_in_area,
};

use crate::cli::{EntitiesArgs, EntitiesCommand};
use crate::error::CliError;
use crate::output::{self, Printer};

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct AreaRow {
    #[tabled(rename = "Area")]
    area_id: String,
    #[tabled(rename = "Name")]
    name: String,
}

impl From<&AreaEntry> for AreaRow {
    fn from(a: &AreaEntry) -> Self {
        Self {
            area_id: a.area_id.clone(),
            name: a.name.clone(),
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Area")]
    area: String,
    #[tabled(rename = "Model")]
    model: String,
}

impl From<&DeviceEntry> for DeviceRow {
    fn from(d: &DeviceEntry) -> Self {
        Self {
            id: d.id.clone(),
            name: or_dash(d.name.as_deref()),
            area: or_dash(d.area_id.as_deref()),
            model: or_dash(d.extra.get("model").and_then(|v| v.as_str())),
        }
    }
}

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "Entity")]
    entity_id: String,
    #[tabled(rename = "Area")]
    area: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Platform")]
    platform: String,
}

impl From<&EntityRegistryEntry> for EntityRow {
    fn from(e: &EntityRegistryEntry) -> Self {
        Self {
            entity_id: e.entity_id.clone(),
            area: or_dash(e.area_id.as_deref()),
            device: or_dash(e.device_id.as_deref()),
            platform: or_dash(e.extra.get("platform").and_then(|v| v.as_str())),
        }
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn areas<G: HubGateway>(client: &HubClient<G>, out: Printer) -> Result<(), CliError> {
    let areas = client.list_areas().await?;
    out.print(&output::render_list(
        out.format,
        &areas,
        |a| AreaRow::from(a),
        |a| a.area_id.clone(),
    ));
    Ok(())
}

pub async fn devices<G: HubGateway>(client: &HubClient<G>, out: Printer) -> Result<(), CliError> {
    let devices = client.list_devices().await?;
    out.print(&output::render_list(
        out.format,
        &devices,
        |d| DeviceRow::from(d),
        |d| d.id.clone(),
    ));
    Ok(())
}

pub async fn entities<G: HubGateway>(
    client: &HubClient<G>,
    args: EntitiesArgs,
    out: Printer,
) -> Result<(), CliError> {
    let EntitiesCommand::List { area } = args.command;
    let mut entries = client.list_entity_registry().await?;
    if let Some(area) = area {
        entries.retain(|e| e.area_id.as_deref() == Some(area.as_str()));
    }
    out.print(&output::render_list(
        out.format,
        &entries,
        |e| EntityRow::from(e),
        |e| e.entity_id.clone(),
    ));
    Ok(())
}

/// Lights an area command would target, for the `--dry-run` preview.
pub async fn area_lights<G: HubGateway>(
    client: &HubClient<G>,
    area_id: &str,
) -> Result<Vec<String>, CliError> {
    let entries = client.list_entity_registry().await?;
    Ok(lights_in_area(&entries, area_id))
}
