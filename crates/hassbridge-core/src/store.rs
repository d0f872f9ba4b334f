// ── Entity state cache ──
//
// Lock-free mirror of the hub's entity states. The whole map lives
// behind one `ArcSwap` pointer: readers load a complete map without
// locking, and each delivery is applied as a single pointer swap, so no
// reader ever observes a half-applied delivery. A `watch` version
// counter lets consumers react to changes.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use hassbridge_api::{EntityDelivery, EntityPatch, EntityState};
use tokio::sync::watch;
use tracing::{debug, trace};

/// `entity_id -> latest record`.
pub type StateMap = HashMap<String, Arc<EntityState>>;

pub struct StateStore {
    states: ArcSwap<StateMap>,
    version: watch::Sender<u64>,
}

impl StateStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            states: ArcSwap::from_pointee(StateMap::new()),
            version,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, entity_id: &str) -> Option<Arc<EntityState>> {
        self.states.load().get(entity_id).cloned()
    }

    /// The current map. Later deliveries never mutate the returned value.
    pub fn snapshot(&self) -> Arc<StateMap> {
        self.states.load_full()
    }

    pub fn len(&self) -> usize {
        self.states.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.load().is_empty()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Receiver that is notified after every applied delivery.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Apply one subscription delivery.
    pub fn apply(&self, delivery: EntityDelivery) {
        match delivery {
            EntityDelivery::Snapshot(states) => self.replace(states),
            EntityDelivery::Patch(patch) => {
                if patch.is_empty() {
                    return;
                }
                self.states.rcu(|current| merge(current, &patch));
                trace!(
                    added = patch.added.len(),
                    changed = patch.changed.len(),
                    removed = patch.removed.len(),
                    "applied entity patch"
                );
                self.bump_version();
            }
        }
    }

    /// Replace the whole map with `states`.
    pub fn replace(&self, states: Vec<EntityState>) {
        let map: StateMap = states
            .into_iter()
            .map(|state| (state.entity_id.clone(), Arc::new(state)))
            .collect();
        debug!(entities = map.len(), "entity snapshot applied");
        self.states.store(Arc::new(map));
        self.bump_version();
    }

    pub fn clear(&self) {
        self.states.store(Arc::new(StateMap::new()));
        self.bump_version();
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn merge(current: &StateMap, patch: &EntityPatch) -> StateMap {
    let mut next = current.clone();
    for state in &patch.added {
        next.insert(state.entity_id.clone(), Arc::new(state.clone()));
    }
    for diff in &patch.changed {
        match next.get(&diff.entity_id) {
            Some(base) => {
                let updated = diff.apply_to(base);
                next.insert(diff.entity_id.clone(), Arc::new(updated));
            }
            None => trace!(entity_id = %diff.entity_id, "diff for unknown entity ignored"),
        }
    }
    for entity_id in &patch.removed {
        next.remove(entity_id);
    }
    next
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use hassbridge_api::EntityDiff;
    use serde_json::Map;

    use super::*;

    fn state(id: &str, value: &str) -> EntityState {
        EntityState {
            entity_id: id.into(),
            state: value.into(),
            attributes: Map::new(),
            last_changed: Utc::now(),
            last_updated: Utc::now(),
            context: None,
        }
    }

    #[test]
    fn starts_empty() {
        let store = StateStore::new();
        assert!(store.is_empty());
        assert!(store.get("light.a").is_none());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn snapshot_replaces_everything() {
        let store = StateStore::new();
        store.replace(vec![state("light.a", "on"), state("light.b", "off")]);
        store.apply(EntityDelivery::Snapshot(vec![state("switch.c", "on")]));

        assert_eq!(store.len(), 1);
        assert!(store.get("light.a").is_none());
        assert_eq!(store.get("switch.c").unwrap().state, "on");
    }

    #[test]
    fn patch_merges_per_entity() {
        let store = StateStore::new();
        store.replace(vec![state("light.a", "on"), state("light.b", "off")]);

        store.apply(EntityDelivery::Patch(EntityPatch {
            added: vec![state("sensor.t", "21.5")],
            changed: vec![EntityDiff {
                entity_id: "light.a".into(),
                state: Some("off".into()),
                ..EntityDiff::default()
            }],
            removed: vec!["light.b".into()],
        }));

        assert_eq!(store.get("light.a").unwrap().state, "off");
        assert_eq!(store.get("sensor.t").unwrap().state, "21.5");
        assert!(store.get("light.b").is_none());
    }

    #[test]
    fn diff_for_unknown_entity_is_ignored() {
        let store = StateStore::new();
        store.apply(EntityDelivery::Patch(EntityPatch {
            changed: vec![EntityDiff {
                entity_id: "light.ghost".into(),
                state: Some("on".into()),
                ..EntityDiff::default()
            }],
            ..EntityPatch::default()
        }));
        assert!(store.get("light.ghost").is_none());
    }

    #[test]
    fn earlier_snapshot_is_not_mutated() {
        let store = StateStore::new();
        store.replace(vec![state("light.a", "on")]);
        let before = store.snapshot();

        store.apply(EntityDelivery::Patch(EntityPatch {
            removed: vec!["light.a".into()],
            ..EntityPatch::default()
        }));

        assert_eq!(before["light.a"].state, "on");
        assert!(store.get("light.a").is_none());
    }

    #[test]
    fn version_bumps_on_each_delivery_but_not_on_empty_patch() {
        let store = StateStore::new();
        let rx = store.subscribe();

        store.replace(vec![state("light.a", "on")]);
        store.apply(EntityDelivery::Patch(EntityPatch::default()));
        store.clear();

        assert_eq!(store.version(), 2);
        assert!(rx.has_changed().unwrap());
    }
}
