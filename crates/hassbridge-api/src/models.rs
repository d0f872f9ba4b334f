//! Wire models shared by the WebSocket and REST surfaces.
//!
//! Registry rows keep every field the hub sends via `#[serde(flatten)]`,
//! so callers can forward them verbatim.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entity domain used by the area light helpers.
pub const LIGHT_DOMAIN: &str = "light";

/// Return the domain segment of a `domain.object_id` identifier.
pub fn entity_domain(entity_id: &str) -> Option<&str> {
    entity_id.split_once('.').map(|(domain, _)| domain)
}

// ── Entity state ─────────────────────────────────────────────────────

/// Latest known state of a single entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// `domain.object_id`, e.g. `light.kitchen`.
    pub entity_id: String,

    /// Current state value (`"on"`, `"21.5"`, `"unavailable"`, ...).
    pub state: String,

    #[serde(default)]
    pub attributes: Map<String, Value>,

    pub last_changed: DateTime<Utc>,

    pub last_updated: DateTime<Utc>,

    /// Opaque context of the change that produced this state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl EntityState {
    pub fn domain(&self) -> Option<&str> {
        entity_domain(&self.entity_id)
    }

    /// `friendly_name` attribute, if the hub set one.
    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.get("friendly_name").and_then(Value::as_str)
    }
}

// ── Subscription deliveries ──────────────────────────────────────────

/// One push from the entity subscription.
///
/// A `Snapshot` replaces the whole cache; a `Patch` merges per identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDelivery {
    Snapshot(Vec<EntityState>),
    Patch(EntityPatch),
}

/// Incremental changes carried by a single delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPatch {
    /// Full records for new (or fully re-sent) entities.
    pub added: Vec<EntityState>,
    /// Partial updates against records already known.
    pub changed: Vec<EntityDiff>,
    /// Entities that no longer exist.
    pub removed: Vec<String>,
}

impl EntityPatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Partial update for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDiff {
    pub entity_id: String,
    pub state: Option<String>,
    /// Attributes to insert or overwrite.
    pub attributes_set: Map<String, Value>,
    /// Attribute keys to drop.
    pub attributes_removed: Vec<String>,
    pub last_changed: Option<DateTime<Utc>>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Context fields to merge over the existing context.
    pub context: Option<Value>,
}

impl EntityDiff {
    /// Produce the updated record. `base` is left untouched.
    ///
    /// A new `last_changed` also moves `last_updated`; an explicit
    /// `last_updated` alone only moves `last_updated`.
    pub fn apply_to(&self, base: &EntityState) -> EntityState {
        let mut next = base.clone();
        if let Some(ref state) = self.state {
            next.state.clone_from(state);
        }
        for (key, value) in &self.attributes_set {
            next.attributes.insert(key.clone(), value.clone());
        }
        for key in &self.attributes_removed {
            next.attributes.remove(key);
        }
        if let Some(changed) = self.last_changed {
            next.last_changed = changed;
            next.last_updated = changed;
        } else if let Some(updated) = self.last_updated {
            next.last_updated = updated;
        }
        if let Some(ref context) = self.context {
            next.context = Some(merge_context(next.context.take(), context));
        }
        next
    }
}

fn merge_context(base: Option<Value>, update: &Value) -> Value {
    match (base, update) {
        (Some(Value::Object(mut base)), Value::Object(fields)) => {
            for (key, value) in fields {
                base.insert(key.clone(), value.clone());
            }
            Value::Object(base)
        }
        (_, other) => other.clone(),
    }
}

// ── Registries ───────────────────────────────────────────────────────

/// Row from `config/area_registry/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaEntry {
    pub area_id: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Row from `config/device_registry/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Row from `config/entity_registry/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRegistryEntry {
    pub entity_id: String,
    /// Area assigned directly to the entity. `None` when unassigned.
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EntityRegistryEntry {
    pub fn domain(&self) -> Option<&str> {
        entity_domain(&self.entity_id)
    }
}

/// `domain -> service -> description`, as returned by `get_services`.
pub type ServiceCatalog = BTreeMap<String, BTreeMap<String, Value>>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn lamp() -> EntityState {
        serde_json::from_value(json!({
            "entity_id": "light.lamp",
            "state": "off",
            "attributes": { "friendly_name": "Lamp", "brightness": 10 },
            "last_changed": "2026-01-01T00:00:00+00:00",
            "last_updated": "2026-01-01T00:00:00+00:00",
            "context": { "id": "abc" }
        }))
        .unwrap()
    }

    #[test]
    fn entity_domain_splits_on_first_dot() {
        assert_eq!(entity_domain("light.kitchen"), Some("light"));
        assert_eq!(entity_domain("sensor.a.b"), Some("sensor"));
        assert_eq!(entity_domain("nodot"), None);
    }

    #[test]
    fn deserialize_rest_state() {
        let state = lamp();
        assert_eq!(state.domain(), Some("light"));
        assert_eq!(state.friendly_name(), Some("Lamp"));
        assert_eq!(state.attributes["brightness"], 10);
    }

    #[test]
    fn diff_merges_attributes_and_timestamps() {
        let base = lamp();
        let ts = "2026-01-02T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let mut set = Map::new();
        set.insert("brightness".into(), json!(200));
        let diff = EntityDiff {
            entity_id: "light.lamp".into(),
            state: Some("on".into()),
            attributes_set: set,
            attributes_removed: vec!["friendly_name".into()],
            last_changed: Some(ts),
            ..EntityDiff::default()
        };

        let next = diff.apply_to(&base);
        assert_eq!(next.state, "on");
        assert_eq!(next.attributes["brightness"], 200);
        assert!(!next.attributes.contains_key("friendly_name"));
        assert_eq!(next.last_changed, ts);
        assert_eq!(next.last_updated, ts);
        assert_eq!(base.state, "off");
    }

    #[test]
    fn diff_with_only_last_updated_keeps_last_changed() {
        let base = lamp();
        let ts = "2026-01-03T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let diff = EntityDiff {
            entity_id: "light.lamp".into(),
            last_updated: Some(ts),
            ..EntityDiff::default()
        };
        let next = diff.apply_to(&base);
        assert_eq!(next.last_changed, base.last_changed);
        assert_eq!(next.last_updated, ts);
    }

    #[test]
    fn diff_context_merges_into_existing_context() {
        let mut base = lamp();
        base.context = Some(json!({ "id": "abc", "user_id": "u1", "parent_id": null }));
        let diff = EntityDiff {
            entity_id: "light.lamp".into(),
            context: Some(json!({ "id": "def" })),
            ..EntityDiff::default()
        };

        let next = diff.apply_to(&base);
        assert_eq!(
            next.context,
            Some(json!({ "id": "def", "user_id": "u1", "parent_id": null }))
        );

        let mut bare = lamp();
        bare.context = None;
        assert_eq!(diff.apply_to(&bare).context, Some(json!({ "id": "def" })));
    }

    #[test]
    fn registry_entry_keeps_unknown_fields() {
        let raw = json!({
            "entity_id": "light.a",
            "area_id": null,
            "device_id": "dev1",
            "platform": "hue",
            "labels": ["x"]
        });
        let entry: EntityRegistryEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.area_id, None);
        assert_eq!(entry.domain(), Some("light"));
        assert_eq!(entry.extra["platform"], "hue");

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["labels"], json!(["x"]));
    }
}
