//! Read and write capabilities shared by reactive values.
//!
//! Builder helpers accept anything [`Gettable`] so that a signal, a computed
//! value and a plain constant can be bound the same way.

use super::context::ReactiveContext;

/// Something that yields a value, possibly subscribing the reader.
pub trait Gettable<T> {
    fn get(&self) -> T;

    fn get_untracked(&self) -> T;
}

/// Something that accepts a new value.
pub trait Settable<T> {
    fn set(&self, value: T);
}

/// A plain, non-reactive value.
///
/// Reading it never subscribes and never warns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Value<T>(T);

impl<T: Clone> Value<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Clone> Gettable<T> for Value<T> {
    fn get(&self) -> T {
        self.0.clone()
    }

    fn get_untracked(&self) -> T {
        self.0.clone()
    }
}

/// Read `source` inside an untracked scope of `cx`.
///
/// Unlike [`Gettable::get_untracked`] this also silences nested reads that
/// `source` performs on other values of the same context.
pub fn untrack_get<T, G>(cx: &ReactiveContext, source: &G) -> T
where
    G: Gettable<T> + ?Sized,
{
    cx.untrack(|| source.get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Effect, Signal};

    #[test]
    fn plain_values_read_back() {
        let value = Value::new("hello".to_string());
        assert_eq!(value.get(), "hello");
        assert_eq!(value.get_untracked(), "hello");
        assert_eq!(value.into_inner(), "hello");
    }

    #[test]
    fn untrack_get_does_not_subscribe() {
        let cx = ReactiveContext::new();
        let signal = Signal::new(&cx, 7);

        let s = signal.clone();
        let cx_clone = cx.clone();
        let observed = std::sync::Arc::new(parking_lot::Mutex::new(0));
        let observed_clone = observed.clone();
        Effect::new(&cx, move || {
            *observed_clone.lock() = untrack_get(&cx_clone, &s);
        });

        assert_eq!(*observed.lock(), 7);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn settable_through_trait_object() {
        let cx = ReactiveContext::new();
        let signal = Signal::new(&cx, 0);
        let sink: &dyn Settable<i32> = &signal;
        sink.set(3);
        assert_eq!(signal.get_untracked(), 3);
    }
}
