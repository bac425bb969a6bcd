//! Subscriber types for the reactive system.
//!
//! A subscriber is an effect that read a reactive value during its last run.
//! Signals and computed values both keep a [`SubscriberSet`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

use super::context::ReactiveContext;
use super::effect::WeakEffect;

/// Unique identifier for a subscriber.
///
/// Each effect gets a unique ID when created. The ID keys subscriber sets so
/// that repeated reads within one run subscribe only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The effects subscribed to one reactive value.
///
/// Entries hold the effect weakly, so a subscription never keeps an effect
/// (or whatever its closure captured) alive. An entry is removed by a cleanup
/// that the subscribing effect runs before its next execution or on drop.
#[derive(Clone, Default)]
pub(crate) struct SubscriberSet {
    inner: Arc<Mutex<IndexMap<SubscriberId, WeakEffect>>>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Subscribe the context's current effect, if any.
    ///
    /// `source` and `id` only feed the diagnostic logged for reads made
    /// outside any computation.
    pub(crate) fn track(&self, cx: &ReactiveContext, source: &'static str, id: u64) {
        let Some(effect) = cx.current() else {
            cx.report_untracked_read(source, id);
            return;
        };

        let subscriber_id = effect.subscriber_id();
        let inserted = self
            .inner
            .lock()
            .insert(subscriber_id, effect.downgrade())
            .is_none();

        if inserted {
            let set = Arc::downgrade(&self.inner);
            effect.on_cleanup(move || {
                if let Some(set) = set.upgrade() {
                    set.lock().shift_remove(&subscriber_id);
                }
            });
        }
    }

    /// Schedule every current subscriber.
    ///
    /// The set is snapshotted first; effects that subscribe or unsubscribe
    /// while the notification runs do not disturb the iteration.
    pub(crate) fn notify(&self, source: &'static str, id: u64) {
        let subscribers: Vec<WeakEffect> = self.inner.lock().values().cloned().collect();
        trace!(source, id, subscribers = subscribers.len(), "notifying subscribers");
        for effect in subscribers.iter().filter_map(WeakEffect::upgrade) {
            effect.schedule();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.inner.lock().contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn tracking_outside_an_effect_subscribes_nothing() {
        let cx = ReactiveContext::new();
        let set = SubscriberSet::new();
        set.track(&cx, "test", 0);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn repeated_reads_subscribe_once_and_rerun_unsubscribes() {
        let cx = ReactiveContext::new();
        let set = SubscriberSet::new();

        let set_clone = set.clone();
        let cx_clone = cx.clone();
        let effect = Effect::new(&cx, move || {
            set_clone.track(&cx_clone, "test", 0);
            set_clone.track(&cx_clone, "test", 0);
        });
        assert_eq!(set.len(), 1);
        assert!(set.contains(effect.subscriber_id()));

        // Re-running tears the old subscription down and makes a fresh one.
        effect.run();
        assert_eq!(set.len(), 1);
    }
}
