//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation is registered as a subscriber.
//!
//! # Implementation
//!
//! The context is an explicit, cheaply cloneable value rather than ambient
//! process-wide state. Every signal, computed value and effect is created
//! against a context and only ever consults that context, so two contexts
//! never observe each other's computations. Inside a context we keep a stack
//! of frames: running an effect pushes it, leaving pops it. An untracked
//! scope pushes an empty frame so reads inside it register nothing.
//!
//! The stack is guarded by a mutex, which is enough for the single-threaded
//! event-loop hosts this runtime targets. It is never held while user code
//! runs.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use super::effect::Effect;
use super::SubscriberId;
use crate::config::RuntimeConfig;

/// An entry in the context stack.
#[derive(Clone)]
enum Frame {
    /// An effect is running and collects the subscriptions made by reads.
    Tracking(Effect),
    /// Reads inside this frame never subscribe.
    Untracked,
}

struct ContextInner {
    stack: Mutex<Vec<Frame>>,
    config: RuntimeConfig,
}

/// Handle to a reactive context.
///
/// Clones share the same stack.
#[derive(Clone)]
pub struct ReactiveContext {
    inner: Arc<ContextInner>,
}

/// Guard that pops the frame it pushed when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub(crate) struct ContextGuard {
    cx: ReactiveContext,
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                stack: Mutex::new(Vec::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Make `effect` the current computation until the guard drops.
    pub(crate) fn enter(&self, effect: Effect) -> ContextGuard {
        let subscriber_id = effect.subscriber_id();
        let depth = {
            let mut stack = self.inner.stack.lock();
            stack.push(Frame::Tracking(effect));
            stack.len()
        };

        let limit = self.inner.config.max_effect_depth;
        if limit > 0 && depth == limit + 1 {
            warn!(depth, limit, "computations nested past the configured depth");
        }

        ContextGuard {
            cx: self.clone(),
            subscriber_id: Some(subscriber_id),
        }
    }

    fn enter_untracked(&self) -> ContextGuard {
        self.inner.stack.lock().push(Frame::Untracked);
        ContextGuard {
            cx: self.clone(),
            subscriber_id: None,
        }
    }

    /// Check if an effect is currently collecting dependencies.
    pub fn is_tracking(&self) -> bool {
        self.current().is_some()
    }

    /// The effect that reads should currently subscribe, if any.
    pub fn current(&self) -> Option<Effect> {
        match self.inner.stack.lock().last() {
            Some(Frame::Tracking(effect)) => Some(effect.clone()),
            Some(Frame::Untracked) | None => None,
        }
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.current().map(|effect| effect.subscriber_id())
    }

    /// Number of frames on the stack.
    pub fn depth(&self) -> usize {
        self.inner.stack.lock().len()
    }

    pub(crate) fn is_untracked(&self) -> bool {
        matches!(self.inner.stack.lock().last(), Some(Frame::Untracked))
    }

    /// Run `f` with no current computation.
    ///
    /// Reads performed inside never create subscriptions and never warn.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter_untracked();
        f()
    }

    /// Register a cleanup on the current effect.
    ///
    /// Returns `false` (and drops `f` without calling it) when there is no
    /// current effect.
    pub fn on_cleanup<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.current() {
            Some(effect) => {
                effect.on_cleanup(f);
                true
            }
            None => false,
        }
    }

    /// Diagnose a read that happened outside any computation.
    pub(crate) fn report_untracked_read(&self, source: &'static str, id: u64) {
        if self.inner.config.warn_untracked_reads && !self.is_untracked() {
            warn!(
                source,
                id, "reactive value read outside of any effect; no subscription was made"
            );
        }
    }

    /// Whether both handles refer to the same context.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReactiveContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveContext")
            .field("depth", &self.depth())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let popped = self.cx.inner.stack.lock().pop();

        // Verify we're popping the right frame.
        // This helps catch bugs where guards are dropped out of order.
        let popped_id = match popped {
            Some(Frame::Tracking(effect)) => Some(effect.subscriber_id()),
            Some(Frame::Untracked) | None => None,
        };
        debug_assert_eq!(
            popped_id, self.subscriber_id,
            "ReactiveContext mismatch: expected {:?}, got {:?}",
            self.subscriber_id, popped_id
        );
    }
}
