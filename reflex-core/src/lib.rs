//! Reflex Core
//!
//! This crate provides a dependency-tracking reactivity engine. It
//! implements:
//!
//! - Reactive objects whose field reads and writes are intercepted
//! - Effects that re-run automatically when the fields they read change
//! - A self-adjusting subscription graph that drops stale dependencies on
//!   every re-run
//!
//! Rendering layers and other collaborators sit on top of it: they register
//! effects and read and write state through reactive objects.
//!
//! # Architecture
//!
//! - `reactive`: reactive objects, effects, the dependency store and runtime
//! - `error`: the crate's error type
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use reflex_core::reactive::{effect, reactive, Runtime};
//! use serde_json::json;
//!
//! let obj = reactive(&json!({ "ok": true, "other": 1 }))?;
//! let saw_other = Arc::new(AtomicBool::new(false));
//!
//! let (obj_clone, saw_clone) = (obj.clone(), saw_other.clone());
//! let e = effect(move || {
//!     if obj_clone.get("ok") == Some(json!(true)) {
//!         obj_clone.get("other");
//!         saw_clone.store(true, Ordering::SeqCst);
//!     }
//! });
//! assert!(Runtime::is_subscribed(e.id(), obj.id(), "other"));
//!
//! // Taking the other branch drops the subscription to `other`.
//! obj.set("ok", false)?;
//! assert!(!Runtime::is_subscribed(e.id(), obj.id(), "other"));
//!
//! obj.set("other", 2)?;
//! assert_eq!(e.run_count(), 2);
//! # Ok::<(), reflex_core::ReactiveError>(())
//! ```

pub mod error;
pub mod reactive;

pub use error::{BoxError, ReactiveError, Result};
