//! Reactive Context
//!
//! The reactive context tracks which subscriber is currently running, so
//! that a read can be attributed to it.
//!
//! # Implementation
//!
//! A thread-local stack of scopes. Running an effect, derived value or
//! watcher pushes a scope for that subscriber; the returned guard pops it on
//! drop, including during unwinding. Nested scopes are normal: a derived
//! value read inside an effect pushes its own scope on top of the effect's.
//!
//! [`untrack`] pushes an empty scope, so reads inside it are attributed to
//! nobody even when an outer subscriber is running.

use std::cell::RefCell;

use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone, Copy)]
struct ContextEntry {
    /// The subscriber whose reads are being recorded, if any.
    subscriber_id: Option<SubscriberId>,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking scope for the given subscriber.
    ///
    /// While the guard is alive, reads register `subscriber_id` as a
    /// dependent of the cells they touch.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    /// Enter a scope in which reads are not tracked.
    pub fn untracked() -> Self {
        Self::push(None)
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry { subscriber_id });
        });
        Self { subscriber_id }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the subscriber reads are attributed to, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Nesting depth of the context stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // The stack may already be gone if a container is dropped during
        // thread teardown.
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

/// Run `f` without recording any reads.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::untracked();
    f()
}
