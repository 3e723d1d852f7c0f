//! Reactive Context
//!
//! The reactive context is the current-effect register: it records which
//! effect is executing right now, so that a field read can subscribe that
//! effect to the field.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Running an effect pushes a frame
//! holding the effect; when the computation returns (or unwinds) the frame is
//! popped and the previous top becomes current again. Nested effects therefore
//! restore their outer effect's tracking context on exit.
//!
//! A frame may also be empty. [`untracked`](super::untracked) pushes one so
//! reads inside it are not attributed to the enclosing effect.

use std::cell::RefCell;

use super::effect::Effect;
use super::EffectId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Clone)]
struct ContextEntry {
    /// The effect being tracked, or `None` for an untracked frame.
    effect: Option<Effect>,
}

impl ContextEntry {
    fn id(&self) -> Option<EffectId> {
        self.effect.as_ref().map(Effect::id)
    }
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    effect_id: Option<EffectId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given effect.
    ///
    /// The context is exited when the returned guard is dropped.
    pub fn enter(effect: Effect) -> Self {
        Self::push(Some(effect))
    }

    /// Enter a frame in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        Self::push(None)
    }

    fn push(effect: Option<Effect>) -> Self {
        let entry = ContextEntry { effect };
        let effect_id = entry.id();
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry));
        Self { effect_id }
    }

    /// Check if an effect is currently being tracked.
    pub fn is_active() -> bool {
        Self::current_id().is_some()
    }

    /// The innermost effect, if the top frame tracks one.
    pub fn current_effect() -> Option<Effect> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.effect.clone()))
    }

    /// ID of the innermost effect, if the top frame tracks one.
    pub fn current_id() -> Option<EffectId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(ContextEntry::id))
    }

    /// Number of frames on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Bind the popped entry so the effect handle it holds is released
        // after the stack borrow ends.
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.id(),
                self.effect_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.effect_id,
                entry.id()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::AssertUnwindSafe;

    #[test]
    fn context_tracks_effect() {
        let effect = Effect::lazy(|| {});

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_id().is_none());

        {
            let _ctx = ReactiveContext::enter(effect.clone());

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_id(), Some(effect.id()));
        }

        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_contexts() {
        let outer = Effect::lazy(|| {});
        let inner = Effect::lazy(|| {});

        {
            let _ctx1 = ReactiveContext::enter(outer.clone());
            assert_eq!(ReactiveContext::current_id(), Some(outer.id()));

            {
                let _ctx2 = ReactiveContext::enter(inner.clone());
                assert_eq!(ReactiveContext::current_id(), Some(inner.id()));
                assert_eq!(ReactiveContext::depth(), 2);
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_id(), Some(outer.id()));
        }

        assert!(ReactiveContext::current_id().is_none());
    }

    #[test]
    fn untracked_frame_hides_outer_effect() {
        let outer = Effect::lazy(|| {});
        let _ctx = ReactiveContext::enter(outer.clone());

        {
            let _untracked = ReactiveContext::enter_untracked();
            assert!(!ReactiveContext::is_active());
            assert!(ReactiveContext::current_effect().is_none());
        }

        assert_eq!(ReactiveContext::current_id(), Some(outer.id()));
    }

    #[test]
    fn context_pops_on_panic() {
        let effect = Effect::lazy(|| {});

        let result = std::panic::catch_unwind(AssertUnwindSafe(move || {
            let _ctx = ReactiveContext::enter(effect);
            panic!("computation failed");
        }));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
