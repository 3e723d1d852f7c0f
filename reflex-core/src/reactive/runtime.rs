//! Reactive Runtime
//!
//! The runtime connects reactive objects and effects. It owns the process-wide
//! [`DependencyStore`] and implements the track / trigger / cleanup protocol
//! on top of it.
//!
//! # How It Works
//!
//! 1. When an effect runs, it first leaves every subscriber set it joined on
//!    its previous run ([`Runtime::cleanup`]), then pushes itself onto the
//!    reactive context.
//!
//! 2. When a reactive field is read inside that effect, [`Runtime::track`]
//!    subscribes the effect to `(object, key)` and records the key in the
//!    effect's own dependency list.
//!
//! 3. When a reactive field is written, [`Runtime::trigger`]:
//!    a. Copies the subscriber set for `(object, key)`
//!    b. Re-runs every effect in that copy, synchronously
//!
//! Re-running an effect changes the live set (cleanup, then re-subscribe), so
//! the copy in step 3a is what keeps a trigger pass bounded.
//!
//! # Thread Safety
//!
//! The store sits behind a re-entrant mutex. Tracked reads, writes and effect
//! runs hold it for their whole duration, so the read/write/track/trigger path
//! is serialized across threads while the owning thread may re-enter it from
//! nested effects. `RefCell` borrows of the store are never held across a
//! user computation.

use std::cell::RefCell;
use std::sync::OnceLock;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::effect::Effect;
use super::store::DependencyStore;
use super::{EffectId, FieldKey, ObjectId};
use crate::error::Result;

type SharedStore = ReentrantMutex<RefCell<DependencyStore>>;

/// Guard returned by [`Runtime::serialize`].
pub(crate) type RuntimeGuard = ReentrantMutexGuard<'static, RefCell<DependencyStore>>;

static STORE: OnceLock<SharedStore> = OnceLock::new();

fn get_store() -> &'static SharedStore {
    STORE.get_or_init(|| ReentrantMutex::new(RefCell::new(DependencyStore::new())))
}

/// The global reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Acquire exclusive access to the reactive runtime for this thread.
    ///
    /// Re-entrant: nested calls from the same thread succeed immediately.
    pub(crate) fn serialize() -> RuntimeGuard {
        get_store().lock()
    }

    /// Subscribe the current effect to `(object, key)`.
    ///
    /// Does nothing when no effect is being tracked on this thread.
    pub fn track(object: ObjectId, key: &FieldKey) {
        let Some(effect) = ReactiveContext::current_effect() else {
            return;
        };

        let store = Self::serialize();
        let inserted = store.borrow_mut().subscribe(object, key, &effect);
        if inserted {
            effect.record_dependency(object, key.clone());
            tracing::trace!(effect = %effect.id(), %object, %key, "tracked");
        }
    }

    /// Re-run every effect subscribed to `(object, key)`.
    ///
    /// The subscriber set is copied before any effect runs. Effects that join
    /// the set during this pass do not run again in it, and an effect that is
    /// already running is skipped. The first failing effect aborts the pass
    /// and its error is returned.
    pub fn trigger(object: ObjectId, key: &FieldKey) -> Result<()> {
        let store = Self::serialize();
        let snapshot = store.borrow().snapshot(object, key);
        let Some(effects) = snapshot else {
            return Ok(());
        };

        tracing::debug!(%object, %key, subscribers = effects.len(), "trigger");

        for effect in effects {
            effect.run()?;
        }
        Ok(())
    }

    /// Remove `effect` from every subscriber set it joined, and clear its
    /// dependency list.
    pub(crate) fn cleanup(effect: &Effect) {
        let store = Self::serialize();
        let deps = effect.take_dependencies();
        if deps.is_empty() {
            return;
        }

        // Handles removed from the store are dropped after the borrow ends.
        let removed: SmallVec<[Effect; 4]> = {
            let mut store = store.borrow_mut();
            deps.iter()
                .filter_map(|(object, key)| store.unsubscribe(*object, key, effect.id()))
                .collect()
        };

        tracing::trace!(effect = %effect.id(), released = removed.len(), "cleanup");
    }

    /// Number of effects subscribed to `(object, key)`.
    pub fn subscriber_count(object: ObjectId, key: &str) -> usize {
        Self::serialize().borrow().subscriber_count(object, key)
    }

    /// Whether `effect` is subscribed to `(object, key)`.
    pub fn is_subscribed(effect: EffectId, object: ObjectId, key: &str) -> bool {
        Self::serialize().borrow().contains(object, key, effect)
    }

    /// Number of keys of `object` with at least one subscriber.
    pub fn key_count(object: ObjectId) -> usize {
        Self::serialize().borrow().key_count(object)
    }

    /// Get the effect currently being tracked on this thread, if any.
    pub fn current_effect() -> Option<EffectId> {
        ReactiveContext::current_id()
    }

    /// Check if reads on this thread are currently being tracked.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}
