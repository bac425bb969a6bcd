//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever a reactive
//! value it read during its last run changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies. If another effect is running at that moment, the
//!    new effect becomes its child.
//!
//! 2. When any dependency changes, the effect is scheduled and re-runs
//!    synchronously.
//!
//! 3. Before re-running, the effect tears down everything its previous run
//!    registered: child effects first (depth-first), then its own cleanup
//!    callbacks. Subscriptions are cleanups too, so every run starts with a
//!    fresh dependency set.
//!
//! # Re-entrancy
//!
//! An effect carries a `scheduled` flag. Scheduling an effect that is already
//! running as a result of its own scheduling is a no-op, which breaks an
//! effect that writes to a signal it reads. Longer cycles through several
//! effects are not detected.
//!
//! # Ownership
//!
//! Subscriber sets only hold weak references. A root effect lives as long as
//! its returned handle (or a clone of it); an effect declared while another
//! runs is also owned by that parent until the parent's next run. Dropping
//! the last handle runs the pending cleanups, which unsubscribes the effect.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::SubscriberId;

/// A cleanup callback registered during an effect run.
pub(crate) type Cleanup = Box<dyn FnOnce() + Send>;

struct EffectInner {
    /// The subscriber ID used for dependency tracking.
    subscriber_id: SubscriberId,

    /// The context this effect tracks in.
    cx: ReactiveContext,

    /// The effect function.
    run: Box<dyn Fn() + Send + Sync>,

    /// Set while a scheduled run is in flight.
    scheduled: AtomicBool,

    /// Effects declared during the last run.
    children: Mutex<Vec<Effect>>,

    /// Cleanups registered during the last run, in registration order.
    cleanups: Mutex<Vec<Cleanup>>,

    /// Number of times the effect has run.
    run_count: AtomicUsize,
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        for cleanup in self.cleanups.get_mut().drain(..) {
            cleanup();
        }
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let cx = ReactiveContext::new();
/// let count = Signal::new(&cx, 0);
///
/// let c = count.clone();
/// let effect = Effect::new(&cx, move || {
///     println!("Count is: {}", c.get());
/// });
///
/// count.set(5);  // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    pub fn new<F>(cx: &ReactiveContext, run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let effect = Self {
            inner: Arc::new(EffectInner {
                subscriber_id: SubscriberId::new(),
                cx: cx.clone(),
                run: Box::new(run),
                scheduled: AtomicBool::new(false),
                children: Mutex::new(Vec::new()),
                cleanups: Mutex::new(Vec::new()),
                run_count: AtomicUsize::new(0),
            }),
        };

        if let Some(parent) = cx.current() {
            parent.inner.children.lock().push(effect.clone());
        }

        effect.run();
        effect
    }

    pub(crate) fn downgrade(&self) -> WeakEffect {
        WeakEffect {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Get the subscriber ID for this effect.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Execute the effect function.
    ///
    /// Tears down the previous run, then runs the function as the current
    /// computation of its context.
    pub fn run(&self) {
        self.clean();

        let _guard = self.inner.cx.enter(self.clone());
        (self.inner.run)();

        self.inner.run_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Schedule the effect to re-run.
    ///
    /// Called when a dependency changes. A notification that arrives while
    /// the effect is already running because of an earlier notification is
    /// dropped.
    pub fn schedule(&self) {
        if self.inner.scheduled.swap(true, Ordering::SeqCst) {
            trace!(subscriber = ?self.inner.subscriber_id, "effect already scheduled");
            return;
        }
        self.run();
        self.inner.scheduled.store(false, Ordering::SeqCst);
    }

    /// Register a callback to run before the next run of this effect.
    pub fn on_cleanup<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.cleanups.lock().push(Box::new(f));
    }

    /// Tear down child effects (depth-first) and then run own cleanups.
    fn clean(&self) {
        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in &children {
            child.clean();
        }

        let cleanups = std::mem::take(&mut *self.inner.cleanups.lock());
        if !children.is_empty() || !cleanups.is_empty() {
            trace!(
                subscriber = ?self.inner.subscriber_id,
                children = children.len(),
                cleanups = cleanups.len(),
                "tearing down previous run"
            );
        }
        for cleanup in cleanups {
            cleanup();
        }
    }

    /// Whether a scheduled run is currently in flight.
    pub fn is_scheduled(&self) -> bool {
        self.inner.scheduled.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Number of child effects declared during the last run.
    pub fn child_count(&self) -> usize {
        self.inner.children.lock().len()
    }
}

/// Non-owning reference to an effect, as kept by subscriber sets.
#[derive(Clone)]
pub(crate) struct WeakEffect {
    inner: Weak<EffectInner>,
}

impl WeakEffect {
    pub(crate) fn upgrade(&self) -> Option<Effect> {
        self.inner.upgrade().map(|inner| Effect { inner })
    }
}

impl PartialEq for Effect {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Effect {}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("run_count", &self.run_count())
            .field("child_count", &self.child_count())
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn effect_runs_on_creation() {
        let cx = ReactiveContext::new();
        let run_count = Arc::new(AtomicUsize::new(0));
        let run_count_clone = run_count.clone();

        let effect = Effect::new(&cx, move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_runs_on_schedule() {
        let cx = ReactiveContext::new();
        let effect = Effect::new(&cx, || {});

        effect.schedule();
        assert_eq!(effect.run_count(), 2);

        effect.schedule();
        assert_eq!(effect.run_count(), 3);
        assert!(!effect.is_scheduled());
    }

    #[test]
    fn self_triggering_effect_does_not_loop() {
        let cx = ReactiveContext::new();
        let count = Signal::new(&cx, 0);

        let c = count.clone();
        let effect = Effect::new(&cx, move || {
            let value = c.get();
            if value < 100 {
                c.set(value + 1);
            }
        });

        // The creation run writes 1, which schedules one nested run that
        // writes 2; the write made inside the scheduled run is swallowed.
        assert_eq!(count.get_untracked(), 2);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn cleanups_run_before_the_next_run() {
        let cx = ReactiveContext::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        let cx_clone = cx.clone();
        let effect = Effect::new(&cx, move || {
            log_clone.lock().push("run");
            let log_cleanup = log_clone.clone();
            cx_clone.on_cleanup(move || log_cleanup.lock().push("cleanup"));
        });

        effect.run();
        assert_eq!(*log.lock(), vec!["run", "cleanup", "run"]);
    }

    #[test]
    fn children_are_torn_down_before_parent_cleanups() {
        let cx = ReactiveContext::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_clone = log.clone();
        let cx_clone = cx.clone();
        let parent = Effect::new(&cx, move || {
            let child_log = log_clone.clone();
            let child_cx = cx_clone.clone();
            Effect::new(&cx_clone, move || {
                let l = child_log.clone();
                child_cx.on_cleanup(move || l.lock().push("child"));
            });
            let l = log_clone.clone();
            cx_clone.on_cleanup(move || l.lock().push("parent"));
        });
        assert_eq!(parent.child_count(), 1);

        parent.run();
        assert_eq!(*log.lock(), vec!["child", "parent"]);
        // The re-run declared a fresh child.
        assert_eq!(parent.child_count(), 1);
    }

    #[test]
    fn stale_child_effects_stop_reacting() {
        let cx = ReactiveContext::new();
        let source = Signal::new(&cx, 0);
        let child_runs = Arc::new(AtomicUsize::new(0));

        let s = source.clone();
        let runs = child_runs.clone();
        let cx_clone = cx.clone();
        let parent = Effect::new(&cx, move || {
            let s = s.clone();
            let runs = runs.clone();
            Effect::new(&cx_clone, move || {
                s.get();
                runs.fetch_add(1, Ordering::SeqCst);
            });
        });
        assert_eq!(child_runs.load(Ordering::SeqCst), 1);

        // Re-running the parent replaces the child; only the new one reacts.
        parent.run();
        assert_eq!(child_runs.load(Ordering::SeqCst), 2);
        assert_eq!(source.subscriber_count(), 1);

        source.set(1);
        assert_eq!(child_runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn effect_clone_shares_state() {
        let cx = ReactiveContext::new();
        let effect1 = Effect::new(&cx, || {});
        let effect2 = effect1.clone();

        assert_eq!(effect1, effect2);
        assert_eq!(effect1.subscriber_id(), effect2.subscriber_id());

        effect1.run();
        assert_eq!(effect2.run_count(), 2);
    }

    #[test]
    fn dropped_effects_release_what_they_captured() {
        let cx = ReactiveContext::new();
        let payload = Arc::new(());
        let payload_ref = Arc::downgrade(&payload);
        let source = Signal::new(&cx, payload);

        let s = source.clone();
        let effect = Effect::new(&cx, move || {
            s.get();
        });
        assert_eq!(source.subscriber_count(), 1);

        drop(effect);
        assert_eq!(source.subscriber_count(), 0);
        drop(source);
        assert!(payload_ref.upgrade().is_none());
    }

    #[test]
    fn dropping_the_handle_stops_reactions() {
        let cx = ReactiveContext::new();
        let source = Signal::new(&cx, 0);
        let runs = Arc::new(AtomicUsize::new(0));

        let (s, r) = (source.clone(), runs.clone());
        let effect = Effect::new(&cx, move || {
            s.get();
            r.fetch_add(1, Ordering::SeqCst);
        });
        source.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        drop(effect);
        source.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
