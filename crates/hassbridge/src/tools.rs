//! Agent-facing tool surface.
//!
//! Every tool takes a JSON object, validates it into a typed [`ToolCall`]
//! before anything touches the hub, and answers with JSON.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::DateTime;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use strum::{Display, EnumIter, EnumMessage, EnumString, IntoStaticStr};
use thiserror::Error;

use hassbridge_core::{CoreError, HistoryQuery, HubClient, HubGateway, LogbookQuery};

// ── Tool table ───────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, EnumMessage, IntoStaticStr,
)]
pub enum Tool {
    #[strum(
        to_string = "ha_get_state",
        message = "Get the current state of a Home Assistant entity by entity_id."
    )]
    GetState,
    #[strum(
        to_string = "ha_list_states",
        message = "List all cached Home Assistant entity states."
    )]
    ListStates,
    #[strum(
        to_string = "ha_list_services",
        message = "List Home Assistant services and their fields."
    )]
    ListServices,
    #[strum(
        to_string = "ha_list_areas",
        message = "List Home Assistant areas from the area registry."
    )]
    ListAreas,
    #[strum(
        to_string = "ha_list_devices",
        message = "List Home Assistant devices from the device registry."
    )]
    ListDevices,
    #[strum(
        to_string = "ha_list_entity_registry",
        message = "List Home Assistant entity registry entries."
    )]
    ListEntityRegistry,
    #[strum(to_string = "ha_light_turn_on", message = "Turn on a light by entity_id.")]
    LightTurnOn,
    #[strum(to_string = "ha_light_turn_off", message = "Turn off a light by entity_id.")]
    LightTurnOff,
    #[strum(
        to_string = "ha_call_service",
        message = "Call a Home Assistant service (domain/service) with a data payload."
    )]
    CallService,
    #[strum(
        to_string = "ha_area_lights_on",
        message = "Turn on every light assigned to an area, optionally with brightness_pct and transition."
    )]
    AreaLightsOn,
    #[strum(
        to_string = "ha_area_lights_off",
        message = "Turn off every light assigned to an area, optionally with a transition."
    )]
    AreaLightsOff,
    #[strum(
        to_string = "ha_history",
        message = "State history over a period, optionally filtered by entity_ids."
    )]
    History,
    #[strum(
        to_string = "ha_logbook",
        message = "Logbook entries over a period, optionally for one entity_id."
    )]
    Logbook,
}

impl Tool {
    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn description(self) -> &'static str {
        self.get_message().unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid input for {tool}: {reason}")]
    InvalidInput { tool: String, reason: String },

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error(transparent)]
    Hub(#[from] CoreError),
}

// ── Inputs ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EntityInput {
    entity_id: String,
}

#[derive(Debug, Deserialize)]
struct CallServiceInput {
    domain: String,
    service: String,
    #[serde(default)]
    data: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AreaOnInput {
    area_id: String,
    brightness_pct: Option<i64>,
    transition: Option<Number>,
}

#[derive(Debug, Deserialize)]
struct AreaOffInput {
    area_id: String,
    transition: Option<Number>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HistoryInput {
    since: Option<String>,
    end_time: Option<String>,
    entity_ids: Vec<String>,
    minimal_response: bool,
    no_attributes: bool,
    significant_changes_only: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogbookInput {
    since: Option<String>,
    end_time: Option<String>,
    entity_id: Option<String>,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    GetState {
        entity_id: String,
    },
    ListStates,
    ListServices,
    ListAreas,
    ListDevices,
    ListEntityRegistry,
    LightTurnOn {
        entity_id: String,
    },
    LightTurnOff {
        entity_id: String,
    },
    CallService {
        domain: String,
        service: String,
        data: Map<String, Value>,
    },
    AreaLightsOn {
        area_id: String,
        brightness_pct: Option<u8>,
        transition: Option<Number>,
    },
    AreaLightsOff {
        area_id: String,
        transition: Option<Number>,
    },
    History(HistoryQuery),
    Logbook(LogbookQuery),
}

impl ToolCall {
    /// Resolve `name` and validate `raw` into a typed call. `null` input
    /// is treated as an empty object.
    pub fn validate(name: &str, raw: Value) -> Result<Self, ToolError> {
        let tool = Tool::from_str(name).map_err(|_| ToolError::UnknownTool { name: name.into() })?;
        let raw = match raw {
            Value::Null => Value::Object(Map::new()),
            obj @ Value::Object(_) => obj,
            other => {
                return Err(invalid(
                    tool,
                    format!("expected a JSON object, got {}", json_kind(&other)),
                ));
            }
        };
        let check = Checker { tool };

        Ok(match tool {
            Tool::GetState => {
                let input: EntityInput = check.parse(raw)?;
                Self::GetState {
                    entity_id: check.non_empty("entity_id", input.entity_id)?,
                }
            }
            Tool::ListStates => Self::ListStates,
            Tool::ListServices => Self::ListServices,
            Tool::ListAreas => Self::ListAreas,
            Tool::ListDevices => Self::ListDevices,
            Tool::ListEntityRegistry => Self::ListEntityRegistry,
            Tool::LightTurnOn => {
                let input: EntityInput = check.parse(raw)?;
                Self::LightTurnOn {
                    entity_id: check.non_empty("entity_id", input.entity_id)?,
                }
            }
            Tool::LightTurnOff => {
                let input: EntityInput = check.parse(raw)?;
                Self::LightTurnOff {
                    entity_id: check.non_empty("entity_id", input.entity_id)?,
                }
            }
            Tool::CallService => {
                let input: CallServiceInput = check.parse(raw)?;
                Self::CallService {
                    domain: check.non_empty("domain", input.domain)?,
                    service: check.non_empty("service", input.service)?,
                    data: input.data,
                }
            }
            Tool::AreaLightsOn => {
                let input: AreaOnInput = check.parse(raw)?;
                Self::AreaLightsOn {
                    area_id: check.non_empty("area_id", input.area_id)?,
                    brightness_pct: input
                        .brightness_pct
                        .map(|pct| check.brightness(pct))
                        .transpose()?,
                    transition: check.transition(input.transition)?,
                }
            }
            Tool::AreaLightsOff => {
                let input: AreaOffInput = check.parse(raw)?;
                Self::AreaLightsOff {
                    area_id: check.non_empty("area_id", input.area_id)?,
                    transition: check.transition(input.transition)?,
                }
            }
            Tool::History => {
                let input: HistoryInput = check.parse(raw)?;
                let entity_ids = input
                    .entity_ids
                    .into_iter()
                    .map(|id| check.non_empty("entity_ids[]", id))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::History(HistoryQuery {
                    since: check.timestamp("since", input.since)?,
                    end_time: check.timestamp("end_time", input.end_time)?,
                    entity_ids,
                    minimal_response: input.minimal_response,
                    no_attributes: input.no_attributes,
                    significant_changes_only: input.significant_changes_only,
                })
            }
            Tool::Logbook => {
                let input: LogbookInput = check.parse(raw)?;
                Self::Logbook(LogbookQuery {
                    since: check.timestamp("since", input.since)?,
                    end_time: check.timestamp("end_time", input.end_time)?,
                    entity_id: input
                        .entity_id
                        .map(|id| check.non_empty("entity_id", id))
                        .transpose()?,
                })
            }
        })
    }
}

struct Checker {
    tool: Tool,
}

impl Checker {
    fn parse<T: DeserializeOwned>(&self, raw: Value) -> Result<T, ToolError> {
        serde_json::from_value(raw).map_err(|e| invalid(self.tool, e.to_string()))
    }

    fn non_empty(&self, field: &str, value: String) -> Result<String, ToolError> {
        if value.trim().is_empty() {
            Err(invalid(self.tool, format!("{field} must not be empty")))
        } else {
            Ok(value)
        }
    }

    fn brightness(&self, pct: i64) -> Result<u8, ToolError> {
        u8::try_from(pct)
            .ok()
            .filter(|pct| *pct <= 100)
            .ok_or_else(|| {
                invalid(
                    self.tool,
                    format!("brightness_pct must be between 0 and 100, got {pct}"),
                )
            })
    }

    fn transition(&self, secs: Option<Number>) -> Result<Option<Number>, ToolError> {
        match secs {
            Some(s) if !s.as_f64().is_some_and(|v| v >= 0.0) => Err(invalid(
                self.tool,
                format!("transition must be a non-negative number, got {s}"),
            )),
            other => Ok(other),
        }
    }

    fn timestamp(&self, field: &str, value: Option<String>) -> Result<Option<String>, ToolError> {
        match value {
            Some(ts) => match DateTime::parse_from_rfc3339(&ts) {
                Ok(_) => Ok(Some(ts)),
                Err(e) => Err(invalid(
                    self.tool,
                    format!("{field} must be an RFC 3339 timestamp: {e}"),
                )),
            },
            None => Ok(None),
        }
    }
}

fn invalid(tool: Tool, reason: String) -> ToolError {
    ToolError::InvalidInput {
        tool: tool.name().into(),
        reason,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────

/// Run a validated call against the hub.
pub async fn dispatch<G: HubGateway>(
    client: &HubClient<G>,
    call: ToolCall,
) -> Result<Value, ToolError> {
    tracing::debug!(?call, "dispatching tool call");
    match call {
        ToolCall::GetState { entity_id } => {
            let state = client.get_state(&entity_id).await?;
            to_json(&state)
        }
        ToolCall::ListStates => {
            let states = client.list_states().await?;
            let ordered: BTreeMap<_, _> = states.iter().collect();
            to_json(&ordered)
        }
        ToolCall::ListServices => to_json(&client.list_services().await?),
        ToolCall::ListAreas => to_json(&client.list_areas().await?),
        ToolCall::ListDevices => to_json(&client.list_devices().await?),
        ToolCall::ListEntityRegistry => to_json(&client.list_entity_registry().await?),
        ToolCall::LightTurnOn { entity_id } => to_json(&client.turn_on_light(&entity_id).await?),
        ToolCall::LightTurnOff { entity_id } => {
            to_json(&client.turn_off_light(&entity_id).await?)
        }
        ToolCall::CallService {
            domain,
            service,
            data,
        } => to_json(&client.call_service(&domain, &service, data).await?),
        ToolCall::AreaLightsOn {
            area_id,
            brightness_pct,
            transition,
        } => to_json(
            &client
                .turn_on_area_lights(&area_id, brightness_pct, transition)
                .await?,
        ),
        ToolCall::AreaLightsOff {
            area_id,
            transition,
        } => to_json(&client.turn_off_area_lights(&area_id, transition).await?),
        ToolCall::History(query) => Ok(client.history(&query).await?),
        ToolCall::Logbook(query) => Ok(client.logbook(&query).await?),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value)
        .map_err(|e| ToolError::Hub(CoreError::Internal(format!("result encoding failed: {e}"))))
}
