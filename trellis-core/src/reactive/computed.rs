//! Computed Implementation
//!
//! A Computed is a cached derived value driven by an internal effect.
//!
//! # How Computed Values Work
//!
//! 1. On creation, the internal effect runs the derivation, subscribing to
//!    everything it reads, and caches the result.
//!
//! 2. When an upstream value notifies, the internal effect re-runs the
//!    derivation and compares the result with the cache.
//!
//! 3. Only if the result differs is the cache replaced and are the
//!    computed value's own subscribers notified. An upstream write that
//!    leaves the derived value identical stops here.
//!
//! Reads never re-derive. A read returns whatever the last run cached.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::Effect;
use super::subscriber::SubscriberSet;
use super::value::Gettable;

/// Counter for generating unique computed IDs.
static COMPUTED_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_computed_id() -> u64 {
    COMPUTED_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct ComputedState<T> {
    /// The cached value. Always `Some` once construction returns.
    value: RwLock<Option<T>>,

    /// Effects that read this value during their last run.
    subscribers: SubscriberSet,
}

/// A derived value with change-suppressed notification.
///
/// The `PartialEq` bound is what lets a recomputation that produces the same
/// value skip notifying dependents.
pub struct Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    id: u64,
    cx: ReactiveContext,
    state: Arc<ComputedState<T>>,
    effect: Effect,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Create a new computed value.
    ///
    /// The derivation runs immediately. If an effect is running at that
    /// moment, the internal effect becomes its child and is torn down with it.
    pub fn new<F>(cx: &ReactiveContext, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let id = next_computed_id();
        let state = Arc::new(ComputedState {
            value: RwLock::new(None),
            subscribers: SubscriberSet::new(),
        });

        let weak = Arc::downgrade(&state);
        let effect = Effect::new(cx, move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let next = compute();
            {
                let mut slot = state.value.write();
                if slot.as_ref() == Some(&next) {
                    trace!(id, "computed value unchanged; not notifying");
                    return;
                }
                *slot = Some(next);
            }
            state.subscribers.notify("computed", id);
        });

        Self {
            id,
            cx: cx.clone(),
            state,
            effect,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the cached value, subscribing the current effect if any.
    pub fn get(&self) -> T {
        self.state.subscribers.track(&self.cx, "computed", self.id);
        self.get_untracked()
    }

    /// Get the cached value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.state
            .value
            .read()
            .clone()
            .expect("computed value is initialised on construction")
    }

    /// The internal effect driving re-derivation.
    pub fn effect(&self) -> &Effect {
        &self.effect
    }

    /// Get the number of dependents.
    pub fn subscriber_count(&self) -> usize {
        self.state.subscribers.len()
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cx: self.cx.clone(),
            state: Arc::clone(&self.state),
            effect: self.effect.clone(),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id)
            .field("value", &*self.state.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<T> Gettable<T> for Computed<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    fn get(&self) -> T {
        Computed::get(self)
    }

    fn get_untracked(&self) -> T {
        Computed::get_untracked(self)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
