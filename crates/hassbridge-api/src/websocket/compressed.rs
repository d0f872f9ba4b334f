// ── subscribe_entities payload decoding ──
//
// The hub sends entity pushes in a compressed shape:
//
//   { "a": { id: { s, a, c, lc, lu } },          added / full records
//     "c": { id: { "+": {..}, "-": { a: [..] } } }, diffs
//     "r": [id, ..] }                              removals
//
// `lc` / `lu` are fractional unix seconds; `c` is a context id string
// or a full context object.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Error;
use crate::models::{EntityDelivery, EntityDiff, EntityPatch, EntityState};

#[derive(Debug, Deserialize)]
struct CompressedEvent {
    #[serde(default)]
    a: BTreeMap<String, CompressedState>,
    #[serde(default)]
    c: BTreeMap<String, CompressedDiff>,
    #[serde(default)]
    r: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CompressedState {
    s: String,
    #[serde(default)]
    a: Map<String, Value>,
    #[serde(default)]
    c: Option<Value>,
    lc: f64,
    #[serde(default)]
    lu: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CompressedDiff {
    #[serde(rename = "+", default)]
    plus: Option<CompressedPartial>,
    #[serde(rename = "-", default)]
    minus: Option<CompressedRemovals>,
}

#[derive(Debug, Default, Deserialize)]
struct CompressedPartial {
    #[serde(default)]
    s: Option<String>,
    #[serde(default)]
    a: Option<Map<String, Value>>,
    #[serde(default)]
    c: Option<Value>,
    #[serde(default)]
    lc: Option<f64>,
    #[serde(default)]
    lu: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CompressedRemovals {
    #[serde(default)]
    a: Vec<String>,
}

/// Decode one `subscribe_entities` event.
///
/// The first event of a subscription lists every entity and becomes a
/// [`EntityDelivery::Snapshot`]; later events become patches.
pub(crate) fn decode_event(event: Value, first: bool) -> Result<EntityDelivery, Error> {
    let raw = event.to_string();
    let event: CompressedEvent =
        serde_json::from_value(event).map_err(|e| Error::Deserialization {
            message: format!("subscribe_entities event: {e}"),
            body: raw,
        })?;

    let added = event
        .a
        .into_iter()
        .map(|(entity_id, state)| expand_state(entity_id, state))
        .collect::<Result<Vec<_>, _>>()?;

    if first {
        return Ok(EntityDelivery::Snapshot(added));
    }

    let changed = event
        .c
        .into_iter()
        .map(|(entity_id, diff)| expand_diff(entity_id, diff))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EntityDelivery::Patch(EntityPatch {
        added,
        changed,
        removed: event.r,
    }))
}

fn expand_state(entity_id: String, state: CompressedState) -> Result<EntityState, Error> {
    let last_changed = unix_to_utc(state.lc)?;
    let last_updated = match state.lu {
        Some(lu) => unix_to_utc(lu)?,
        None => last_changed,
    };
    Ok(EntityState {
        entity_id,
        state: state.s,
        attributes: state.a,
        last_changed,
        last_updated,
        context: state.c.map(expand_context),
    })
}

fn expand_diff(entity_id: String, diff: CompressedDiff) -> Result<EntityDiff, Error> {
    let plus = diff.plus.unwrap_or_default();
    let minus = diff.minus.unwrap_or_default();
    Ok(EntityDiff {
        entity_id,
        state: plus.s,
        attributes_set: plus.a.unwrap_or_default(),
        attributes_removed: minus.a,
        last_changed: plus.lc.map(unix_to_utc).transpose()?,
        last_updated: plus.lu.map(unix_to_utc).transpose()?,
        context: plus.c.map(expand_context),
    })
}

/// A bare context id is shorthand for `{ "id": .. }`.
fn expand_context(raw: Value) -> Value {
    match raw {
        Value::String(id) => {
            let mut ctx = Map::new();
            ctx.insert("id".into(), Value::String(id));
            Value::Object(ctx)
        }
        other => other,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn unix_to_utc(secs: f64) -> Result<DateTime<Utc>, Error> {
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
        .ok_or_else(|| Error::Protocol(format!("timestamp out of range: {secs}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn first_event_is_a_snapshot() {
        let event = json!({
            "a": {
                "light.a": { "s": "on", "a": { "brightness": 255 }, "c": "ctx1", "lc": 1_767_225_600.5 },
                "switch.x": { "s": "off", "a": {}, "c": "ctx2", "lc": 1_767_225_600.0, "lu": 1_767_225_700.0 }
            }
        });

        let EntityDelivery::Snapshot(states) = decode_event(event, true).unwrap() else {
            panic!("expected snapshot");
        };
        assert_eq!(states.len(), 2);
        let light = states.iter().find(|s| s.entity_id == "light.a").unwrap();
        assert_eq!(light.state, "on");
        assert_eq!(light.attributes["brightness"], 255);
        assert_eq!(light.context, Some(json!({ "id": "ctx1" })));
        assert_eq!(light.last_changed.timestamp_subsec_millis(), 500);
        assert_eq!(light.last_changed, light.last_updated);

        let switch = states.iter().find(|s| s.entity_id == "switch.x").unwrap();
        assert_eq!(
            (switch.last_updated - switch.last_changed).num_seconds(),
            100
        );
    }

    #[test]
    fn later_events_are_patches() {
        let event = json!({
            "c": {
                "light.a": {
                    "+": { "s": "off", "a": { "brightness": 0 }, "lc": 1_767_225_800.0 },
                    "-": { "a": ["color_mode"] }
                }
            },
            "r": ["switch.x"]
        });

        let EntityDelivery::Patch(patch) = decode_event(event, false).unwrap() else {
            panic!("expected patch");
        };
        assert!(patch.added.is_empty());
        assert_eq!(patch.removed, vec!["switch.x".to_string()]);
        let diff = &patch.changed[0];
        assert_eq!(diff.entity_id, "light.a");
        assert_eq!(diff.state.as_deref(), Some("off"));
        assert_eq!(diff.attributes_set["brightness"], 0);
        assert_eq!(diff.attributes_removed, vec!["color_mode".to_string()]);
        assert!(diff.last_changed.is_some());
        assert!(diff.last_updated.is_none());
    }

    #[test]
    fn bare_context_id_in_diff_keeps_other_context_fields() {
        let base = expand_state(
            "light.a".into(),
            serde_json::from_value(json!({
                "s": "on",
                "c": { "id": "ctx1", "user_id": "u1" },
                "lc": 1_767_225_600.0
            }))
            .unwrap(),
        )
        .unwrap();
        let event = json!({ "c": { "light.a": { "+": { "s": "off", "c": "ctx2" } } } });

        let EntityDelivery::Patch(patch) = decode_event(event, false).unwrap() else {
            panic!("expected patch");
        };
        let next = patch.changed[0].apply_to(&base);
        assert_eq!(next.context, Some(json!({ "id": "ctx2", "user_id": "u1" })));
    }

    #[test]
    fn malformed_event_is_a_deserialization_error() {
        let err = decode_event(json!({ "a": { "light.a": { "s": 1 } } }), true).unwrap_err();
        assert!(matches!(err, Error::Deserialization { .. }));
    }
}
