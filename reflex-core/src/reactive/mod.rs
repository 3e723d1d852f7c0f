//! Reactive Primitives
//!
//! This module implements the core reactive system: reactive objects, effects,
//! and the dependency store that connects them.
//!
//! # Concepts
//!
//! ## Reactive Objects
//!
//! A [`ReactiveObject`] is a record of named fields. Reading a field inside an
//! effect subscribes that effect to the field; writing a field re-runs every
//! effect subscribed to it.
//!
//! ## Effects
//!
//! An [`Effect`] is a side-effecting computation that runs once when it is
//! registered and again whenever a field it read on its last run is written.
//! Effects are used to synchronize reactive state with external systems, such
//! as a rendering layer.
//!
//! ## Dependency Store
//!
//! The [`DependencyStore`] maps each observed object to its field keys and
//! each key to the set of subscribed effects. Before every run an effect
//! leaves all the sets it joined last time, so its subscriptions always
//! reflect exactly what its most recent run read.
//!
//! # Implementation Notes
//!
//! The current effect lives on a thread-local stack ([`ReactiveContext`]),
//! which is what lets nested effects attribute their reads correctly. There
//! is no proxy magic: reads and writes must go through the object's
//! accessors.

mod context;
mod effect;
mod ids;
mod object;
mod runtime;
mod store;

pub use context::ReactiveContext;
pub use effect::{effect, try_effect, untracked, Effect, EffectResult, EffectState};
pub use ids::{EffectId, FieldKey, ObjectId};
pub use object::{reactive, ReactiveObject};
pub use runtime::Runtime;
pub use store::DependencyStore;
