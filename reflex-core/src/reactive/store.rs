//! Dependency Store
//!
//! Two-level map from observed object to field key to the set of effects
//! subscribed to that field:
//!
//! ```text
//! ObjectId ──► FieldKey ──► { Effect, Effect, ... }
//! ```
//!
//! The store never holds an observed object, only its [`ObjectId`], so an
//! object's lifetime is independent of its subscriptions. It does own the
//! subscriber sets, and it prunes them (and the per-object map above them)
//! as soon as they become empty.
//!
//! This type is plain data. Serialized access and the track/trigger protocol
//! live in [`Runtime`](super::Runtime).

use std::collections::HashMap;

use indexmap::IndexSet;

use super::effect::Effect;
use super::{EffectId, FieldKey, ObjectId};

/// Subscriber set for one field. Effects compare by identity.
type DepSet = IndexSet<Effect>;

#[derive(Default)]
pub struct DependencyStore {
    targets: HashMap<ObjectId, HashMap<FieldKey, DepSet>>,
}

impl DependencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `effect` to the subscriber set for `(object, key)`, creating the
    /// set on first use.
    ///
    /// Returns `true` if the effect was not already subscribed.
    pub fn subscribe(&mut self, object: ObjectId, key: &FieldKey, effect: &Effect) -> bool {
        self.targets
            .entry(object)
            .or_default()
            .entry(key.clone())
            .or_default()
            .insert(effect.clone())
    }

    /// Remove `effect` from the subscriber set for `(object, key)`.
    ///
    /// Returns the removed handle. Callers should let it drop only after
    /// they have released any borrow of the store, since it may be the last
    /// handle to the effect.
    pub fn unsubscribe(&mut self, object: ObjectId, key: &FieldKey, effect: EffectId) -> Option<Effect> {
        let fields = self.targets.get_mut(&object)?;
        let deps = fields.get_mut(key)?;
        let removed = deps.shift_remove_full(&effect).map(|(_, effect)| effect);

        if deps.is_empty() {
            fields.remove(key);
            if fields.is_empty() {
                self.targets.remove(&object);
            }
        }

        removed
    }

    /// Copy the current members of the subscriber set for `(object, key)`.
    ///
    /// Returns `None` when nothing has ever subscribed (or everything has
    /// since left).
    pub fn snapshot(&self, object: ObjectId, key: &FieldKey) -> Option<Vec<Effect>> {
        self.targets
            .get(&object)
            .and_then(|fields| fields.get(key))
            .map(|deps| deps.iter().cloned().collect())
    }

    pub fn subscriber_count(&self, object: ObjectId, key: &str) -> usize {
        self.targets
            .get(&object)
            .and_then(|fields| fields.get(key))
            .map_or(0, IndexSet::len)
    }

    pub fn contains(&self, object: ObjectId, key: &str, effect: EffectId) -> bool {
        self.targets
            .get(&object)
            .and_then(|fields| fields.get(key))
            .is_some_and(|deps| deps.contains(&effect))
    }

    /// Number of keys of `object` that have at least one subscriber.
    pub fn key_count(&self, object: ObjectId) -> usize {
        self.targets.get(&object).map_or(0, HashMap::len)
    }

    /// Number of objects that have at least one subscribed key.
    pub fn object_count(&self) -> usize {
        self.targets.len()
    }
}
