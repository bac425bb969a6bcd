//! The mutable tree sink.
//!
//! A sink is the live document that reconciliation patches are applied to.
//! The reconciler only ever talks to it through [`TreeSink`], so a browser
//! binding, a native widget tree or the in-memory
//! [`MemorySink`](super::MemorySink) are interchangeable.

use std::fmt;
use std::sync::Arc;

/// Opaque handle to an element owned by a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SinkHandle(pub u64);

impl fmt::Display for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of event a listener is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    Input,
    Change,
    Submit,
    KeyDown,
    Custom(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Click => "click",
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::Submit => "submit",
            EventKind::KeyDown => "keydown",
            EventKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event delivered by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub kind: EventKind,
    /// The target's current value, for input-like elements.
    pub value: Option<String>,
}

impl DomEvent {
    pub fn new(kind: EventKind) -> Self {
        Self { kind, value: None }
    }

    pub fn with_value(kind: EventKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
        }
    }
}

/// Callback a sink invokes when a bound event fires.
pub type EventCallback = Arc<dyn Fn(DomEvent) + Send + Sync>;

/// The document capability consumed by the reconciler.
///
/// Methods take `&self`; implementations keep their own interior state.
/// None of these calls may re-enter the render tree.
pub trait TreeSink: Send + Sync {
    fn create_element(&self, tag: &str) -> SinkHandle;

    fn set_id(&self, handle: SinkHandle, id: &str);

    fn set_attribute(&self, handle: SinkHandle, name: &str, value: &str);

    fn remove_attribute(&self, handle: SinkHandle, name: &str);

    fn set_text(&self, handle: SinkHandle, text: &str);

    /// Set the live value of an input-like element.
    fn set_value(&self, handle: SinkHandle, value: &str);

    /// Replace the whole inline style with a serialized style string.
    fn set_style(&self, handle: SinkHandle, style: &str);

    fn add_class(&self, handle: SinkHandle, name: &str);

    fn remove_class(&self, handle: SinkHandle, name: &str);

    /// Append `child` as the last child of `parent`, moving it if it is
    /// already attached elsewhere.
    fn append_child(&self, parent: SinkHandle, child: SinkHandle);

    fn remove_child(&self, parent: SinkHandle, child: SinkHandle);

    fn add_event_listener(&self, handle: SinkHandle, kind: &EventKind, callback: EventCallback);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kinds_render_as_dom_names() {
        assert_eq!(EventKind::Click.as_str(), "click");
        assert_eq!(EventKind::KeyDown.to_string(), "keydown");
        assert_eq!(EventKind::Custom("drop".into()).as_str(), "drop");
    }

    #[test]
    fn events_carry_optional_values() {
        assert_eq!(DomEvent::new(EventKind::Click).value, None);
        assert_eq!(
            DomEvent::with_value(EventKind::Input, "abc").value.as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn handles_display_compactly() {
        assert_eq!(SinkHandle(4).to_string(), "#4");
    }
}
