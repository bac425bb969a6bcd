//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which effects depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while an effect is running in its context, the
//!    signal registers that effect as a subscriber.
//!
//! 2. When a signal is written, every current subscriber is scheduled
//!    synchronously, in subscription order.
//!
//! 3. Writes are never compared with the previous value. A write of the value
//!    already held still notifies; suppressing no-op updates is the job of
//!    [`Computed`](super::Computed) and of the render tree's change tracking.
//!
//! Multiple writes before a subscriber runs are not queued: the subscriber
//! observes whatever value the signal holds when it reads.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::subscriber::SubscriberSet;
use super::value::{Gettable, Settable};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust,ignore
/// let cx = ReactiveContext::new();
/// let count = Signal::new(&cx, 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get_untracked(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unique identifier for this signal.
    id: u64,

    /// The context reads are tracked in.
    cx: ReactiveContext,

    /// The current value.
    value: Arc<RwLock<T>>,

    /// Effects that read this signal during their last run.
    subscribers: SubscriberSet,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(cx: &ReactiveContext, value: T) -> Self {
        Self {
            id: next_signal_id(),
            cx: cx.clone(),
            value: Arc::new(RwLock::new(value)),
            subscribers: SubscriberSet::new(),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value.
    ///
    /// If called while an effect is running, this also registers that effect
    /// as a subscriber.
    pub fn get(&self) -> T {
        self.subscribers.track(&self.cx, "signal", self.id);
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.value.read().clone()
    }

    /// Borrow the current value without cloning it or tracking.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Set a new value and notify subscribers.
    pub fn set(&self, value: T) {
        *self.value.write() = value;
        self.subscribers.notify("signal", self.id);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.value.read());
        self.set(next);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            cx: self.cx.clone(),
            value: Arc::clone(&self.value),
            subscribers: self.subscribers.clone(),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<T> Gettable<T> for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn get_untracked(&self) -> T {
        Signal::get_untracked(self)
    }
}

impl<T> Settable<T> for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn set(&self, value: T) {
        Signal::set(self, value)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn signal_get_and_set() {
        let cx = ReactiveContext::new();
        let signal = Signal::new(&cx, 0);
        assert_eq!(signal.get_untracked(), 0);

        signal.set(42);
        assert_eq!(signal.get_untracked(), 42);
    }

    #[test]
    fn signal_update() {
        let cx = ReactiveContext::new();
        let signal = Signal::new(&cx, 10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get_untracked(), 15);
    }

    #[test]
    fn read_outside_effect_does_not_subscribe() {
        let cx = ReactiveContext::new();
        let signal = Signal::new(&cx, 1);
        assert_eq!(signal.get(), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_notifies_subscribers() {
        let cx = ReactiveContext::new();
        let signal = Signal::new(&cx, 0);
        let call_count = Arc::new(AtomicUsize::new(0));

        let s = signal.clone();
        let calls = call_count.clone();
        let _effect = Effect::new(&cx, move || {
            s.get();
            calls.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 2);

        // Writing the same value still notifies.
        signal.set(1);
        assert_eq!(call_count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn writes_notify_synchronously_even_when_untracked() {
        let cx = ReactiveContext::new();
        let signal = Signal::new(&cx, 0);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let s = signal.clone();
        let seen_clone = seen.clone();
        let _effect = Effect::new(&cx, move || {
            seen_clone.lock().push(s.get());
        });

        cx.untrack(|| {
            signal.set(1);
            signal.set(2);
        });
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
        assert_eq!(signal.get_untracked(), 2);
    }

    #[test]
    fn untracked_reads_inside_effects_do_not_subscribe() {
        let cx = ReactiveContext::new();
        let signal = Signal::new(&cx, 0);

        let s = signal.clone();
        let cx_clone = cx.clone();
        Effect::new(&cx, move || {
            cx_clone.untrack(|| s.get());
            s.get_untracked();
        });

        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let cx = ReactiveContext::new();
        let signal1 = Signal::new(&cx, 0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get_untracked(), 42);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let cx = ReactiveContext::new();
        let s1 = Signal::new(&cx, 0);
        let s2 = Signal::new(&cx, 0);
        assert_ne!(s1.id(), s2.id());
    }
}
