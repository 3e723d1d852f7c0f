//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a reactive
//! field it read on its last run is written.
//!
//! # How Effects Work
//!
//! 1. When registered, the effect runs immediately to establish its initial
//!    dependencies.
//!
//! 2. Every run starts by leaving all subscriber sets the previous run joined
//!    (cleanup), then pushes the effect onto the reactive context, runs the
//!    computation, and pops the context again.
//!
//! 3. Reads during the computation subscribe the effect afresh. A branch that
//!    is no longer taken therefore stops triggering the effect.
//!
//! # Nesting
//!
//! An effect may register or run other effects from inside its computation.
//! Each run pushes its own context frame, so reads inside the inner effect are
//! attributed to the inner effect only, and the outer effect is current again
//! once the inner one returns.
//!
//! # Re-entrancy
//!
//! At most one run of a given effect is in flight. Asking a running effect to
//! run again (it wrote a field it also reads, or a chain of effects loops back
//! to it) is a no-op, which keeps a single write from recursing forever.
//!
//! # Failure
//!
//! A failing computation still pops its context frame and returns to `Idle`
//! before the error reaches the caller of [`Effect::run`]. The same holds for
//! panics, which unwind through drop guards.

use std::borrow::Borrow;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::{EffectId, FieldKey, ObjectId};
use crate::error::{BoxError, ReactiveError, Result};

/// Outcome of a fallible effect computation.
pub type EffectResult = std::result::Result<(), BoxError>;

type Computation = dyn Fn() -> EffectResult + Send + Sync;

/// Subscriber sets an effect belongs to, as handles into the store.
pub(crate) type DependencyList = SmallVec<[(ObjectId, FieldKey); 4]>;

/// Execution state of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectState {
    /// Not executing. The initial state and the state after every run,
    /// successful or not.
    Idle,
    /// The computation is executing on some thread.
    Running,
}

struct EffectInner {
    id: EffectId,
    computation: Box<Computation>,
    dependencies: Mutex<DependencyList>,
    running: AtomicBool,
    run_count: AtomicUsize,
}

/// A registered reactive computation.
///
/// Cloning an `Effect` yields another handle to the same effect.
///
/// # Example
///
/// ```rust
/// use reflex_core::reactive::{effect, reactive};
/// use serde_json::json;
///
/// let user = reactive(&json!({ "name": "Ada" }))?;
///
/// let user_clone = user.clone();
/// let greeter = effect(move || {
///     let name = user_clone.get("name");
///     println!("hello {name:?}");
/// });
///
/// user.set("name", "Grace")?;  // prints again
/// assert_eq!(greeter.run_count(), 2);
/// # Ok::<(), reflex_core::ReactiveError>(())
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Register an infallible computation and run it immediately.
    pub fn new<F>(computation: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self::lazy(computation);
        // An infallible computation never fails its run.
        let _ = effect.run();
        effect
    }

    /// Register a fallible computation and run it immediately.
    ///
    /// An error from the first run is returned to the caller. Subscriptions
    /// made before the failure stay in place, so later writes still re-run
    /// the effect.
    pub fn try_new<F>(computation: F) -> Result<Self>
    where
        F: Fn() -> EffectResult + Send + Sync + 'static,
    {
        let effect = Self::try_lazy(computation);
        effect.run()?;
        Ok(effect)
    }

    /// Create an effect without running it.
    ///
    /// It tracks nothing until the first call to [`run`](Self::run).
    pub fn lazy<F>(computation: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::try_lazy(move || {
            computation();
            Ok(())
        })
    }

    pub fn try_lazy<F>(computation: F) -> Self
    where
        F: Fn() -> EffectResult + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EffectInner {
                id: EffectId::new(),
                computation: Box::new(computation),
                dependencies: Mutex::new(SmallVec::new()),
                running: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Run the computation with dependency tracking.
    ///
    /// Leaves every subscriber set joined by the previous run, executes the
    /// computation as the current effect, and restores the previous current
    /// effect afterwards. Returns immediately if this effect is already
    /// running.
    ///
    /// The skip applies to every running effect, not only the innermost one.
    /// If an outer effect's write re-runs an inner effect that writes a field
    /// the outer effect already read, the outer effect is not re-run for it
    /// and finishes with the value it read before that write.
    pub fn run(&self) -> Result<()> {
        let _serial = Runtime::serialize();

        if self.inner.running.swap(true, Ordering::SeqCst) {
            tracing::trace!(effect = %self.id(), "already running, skipped");
            return Ok(());
        }
        let _running = RunningGuard(&self.inner.running);

        Runtime::cleanup(self);

        tracing::debug!(effect = %self.id(), "run");
        let result = {
            let _ctx = ReactiveContext::enter(self.clone());
            (self.inner.computation)()
        };
        self.inner.run_count.fetch_add(1, Ordering::Relaxed);

        result.map_err(|source| {
            let error = ReactiveError::computation(self.id(), source);
            tracing::warn!(effect = %self.id(), %error, "effect failed");
            error
        })
    }

    pub fn state(&self) -> EffectState {
        if self.inner.running.load(Ordering::SeqCst) {
            EffectState::Running
        } else {
            EffectState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == EffectState::Running
    }

    /// Number of runs that returned, including those that returned `Err`.
    ///
    /// A run that panics is not counted.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::Relaxed)
    }

    /// Number of `(object, key)` pairs this effect is subscribed to.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    pub(crate) fn record_dependency(&self, object: ObjectId, key: FieldKey) {
        self.inner.dependencies.lock().push((object, key));
    }

    /// Empty this effect's dependency list, returning what it held.
    pub(crate) fn take_dependencies(&self) -> DependencyList {
        std::mem::take(&mut *self.inner.dependencies.lock())
    }
}

/// Resets the running flag when a run ends, including by panic.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Effect {}

impl Hash for Effect {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl Borrow<EffectId> for Effect {
    fn borrow(&self) -> &EffectId {
        &self.inner.id
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Register `computation` as an effect and run it immediately.
pub fn effect<F>(computation: F) -> Effect
where
    F: Fn() + Send + Sync + 'static,
{
    Effect::new(computation)
}

/// Register a fallible `computation` as an effect and run it immediately.
pub fn try_effect<F>(computation: F) -> Result<Effect>
where
    F: Fn() -> EffectResult + Send + Sync + 'static,
{
    Effect::try_new(computation)
}

/// Run `f` without attributing its reads to the current effect.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let _effect = Effect::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::lazy(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 0);
        assert_eq!(effect.run_count(), 0);

        effect.run().expect("run failed");
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_is_current_while_running() {
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();

        let effect = Effect::new(move || {
            *seen_clone.lock() = Runtime::current_effect();
        });

        assert_eq!(*seen.lock(), Some(effect.id()));
        assert!(!Runtime::is_tracking());
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = Effect::new(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1, effect2);
        assert_eq!(effect2.run_count(), 1);

        effect1.run().expect("run failed");
        assert_eq!(effect2.run_count(), 2);
    }

    #[test]
    fn try_new_surfaces_first_run_error() {
        let result = Effect::try_new(|| Err("no luck".into()));

        match result {
            Err(ReactiveError::Computation { source, .. }) => {
                assert_eq!(source.to_string(), "no luck");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(!Runtime::is_tracking());
    }

    #[test]
    fn failed_run_returns_to_idle() {
        let fail = Arc::new(AtomicBool::new(false));
        let fail_clone = fail.clone();

        let effect = Effect::try_new(move || {
            if fail_clone.load(Ordering::SeqCst) {
                Err("failed".into())
            } else {
                Ok(())
            }
        })
        .expect("first run failed");

        fail.store(true, Ordering::SeqCst);
        let err = effect.run().expect_err("run should fail");

        assert_eq!(err.effect(), Some(effect.id()));
        assert_eq!(effect.state(), EffectState::Idle);
        assert_eq!(effect.run_count(), 2);
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn panicking_run_returns_to_idle() {
        let effect = Effect::lazy(|| panic!("computation panicked"));

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| effect.run()));

        assert!(result.is_err());
        assert_eq!(effect.state(), EffectState::Idle);
        assert_eq!(effect.run_count(), 0);
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn running_effect_does_not_reenter() {
        let slot: Arc<Mutex<Option<Effect>>> = Arc::new(Mutex::new(None));
        let slot_clone = slot.clone();
        let depth = Arc::new(AtomicI32::new(0));
        let depth_clone = depth.clone();

        let effect = Effect::lazy(move || {
            depth_clone.fetch_add(1, Ordering::SeqCst);
            let me = slot_clone.lock().clone();
            if let Some(me) = me {
                assert!(me.is_running());
                me.run().expect("nested run failed");
            }
        });
        *slot.lock() = Some(effect.clone());

        effect.run().expect("run failed");

        assert_eq!(depth.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);

        // Break the handle cycle held in the slot.
        slot.lock().take();
    }

    #[test]
    fn untracked_hides_current_effect() {
        let inside = Arc::new(Mutex::new(Some(EffectId::new())));
        let inside_clone = inside.clone();

        let _effect = Effect::new(move || {
            *inside_clone.lock() = untracked(Runtime::current_effect);
        });

        assert_eq!(*inside.lock(), None);
    }
}
