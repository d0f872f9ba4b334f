//! Area light selection and payload construction.
//!
//! Membership is decided from a fresh entity-registry read on every
//! call: an entity belongs to an area only when its own `area_id`
//! matches. Entities that inherit an area through their device are not
//! included.

use hassbridge_api::{EntityRegistryEntry, LIGHT_DOMAIN};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use strum::{Display, IntoStaticStr};

/// `light.*` service used for a whole-area switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LightAction {
    TurnOn,
    TurnOff,
}

/// Result of an area-wide light command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AreaLightsOutcome {
    pub ok: bool,
    /// Number of light entities targeted by the command.
    pub changed: usize,
}

impl AreaLightsOutcome {
    pub(crate) fn targeted(changed: usize) -> Self {
        Self { ok: true, changed }
    }
}

/// Acknowledgement for a plain service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceAck {
    pub ok: bool,
}

impl ServiceAck {
    pub(crate) fn ok() -> Self {
        Self { ok: true }
    }
}

/// Light entities assigned directly to `area_id`, in registry order.
pub fn lights_in_area(entries: &[EntityRegistryEntry], area_id: &str) -> Vec<String> {
    entries
        .iter()
        .filter(|entry| entry.area_id.as_deref() == Some(area_id))
        .filter(|entry| entry.domain() == Some(LIGHT_DOMAIN))
        .map(|entry| entry.entity_id.clone())
        .collect()
}

/// Service data for a batched light command. Optional fields are only
/// present when supplied.
pub(crate) fn light_payload(
    entity_ids: Vec<String>,
    brightness_pct: Option<u8>,
    transition: Option<Number>,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(
        "entity_id".into(),
        Value::Array(entity_ids.into_iter().map(Value::String).collect()),
    );
    if let Some(pct) = brightness_pct {
        data.insert("brightness_pct".into(), Value::from(pct));
    }
    if let Some(secs) = transition {
        data.insert("transition".into(), Value::Number(secs));
    }
    data
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn registry() -> Vec<EntityRegistryEntry> {
        serde_json::from_value(json!([
            { "entity_id": "light.a", "area_id": "kitchen" },
            { "entity_id": "switch.fan", "area_id": "kitchen" },
            { "entity_id": "light.hall", "area_id": "hall" },
            { "entity_id": "light.b", "area_id": "kitchen", "device_id": "d1" },
            { "entity_id": "light.orphan", "area_id": null, "device_id": "d2" },
            { "entity_id": "lightbulb.fake", "area_id": "kitchen" }
        ]))
        .unwrap()
    }

    #[test]
    fn selects_lights_in_registry_order() {
        assert_eq!(lights_in_area(&registry(), "kitchen"), vec!["light.a", "light.b"]);
    }

    #[test]
    fn unknown_area_selects_nothing() {
        assert!(lights_in_area(&registry(), "garage").is_empty());
    }

    #[test]
    fn device_area_is_not_inherited() {
        assert!(!lights_in_area(&registry(), "kitchen").contains(&"light.orphan".to_string()));
    }

    #[test]
    fn payload_omits_unsupplied_fields() {
        let data = light_payload(vec!["light.a".into()], None, None);
        assert_eq!(Value::Object(data), json!({ "entity_id": ["light.a"] }));

        let half = Number::from_f64(2.5).unwrap();
        let data = light_payload(vec!["light.a".into(), "light.b".into()], Some(40), Some(half));
        assert_eq!(
            Value::Object(data),
            json!({ "entity_id": ["light.a", "light.b"], "brightness_pct": 40, "transition": 2.5 })
        );
    }

    #[test]
    fn integer_transition_stays_integer() {
        let data = light_payload(vec!["light.a".into()], None, Some(Number::from(5)));
        assert_eq!(data["transition"], json!(5));
        assert!(data["transition"].is_u64());
    }

    #[test]
    fn action_names_match_services() {
        let on: &'static str = LightAction::TurnOn.into();
        assert_eq!(on, "turn_on");
        assert_eq!(LightAction::TurnOff.to_string(), "turn_off");
    }
}
