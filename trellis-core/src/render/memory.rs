//! In-memory document.
//!
//! [`MemorySink`] is a complete [`TreeSink`] backed by an arena of elements.
//! It records every call it receives so hosts and tests can inspect exactly
//! what a pass did, and it can fire bound listeners.

use std::fmt::Write as _;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::sink::{DomEvent, EventCallback, EventKind, SinkHandle, TreeSink};

/// One call received by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOp {
    Create { handle: SinkHandle, tag: String },
    SetId { handle: SinkHandle, id: String },
    SetAttribute { handle: SinkHandle, name: String, value: String },
    RemoveAttribute { handle: SinkHandle, name: String },
    SetText { handle: SinkHandle, text: String },
    SetValue { handle: SinkHandle, value: String },
    SetStyle { handle: SinkHandle, style: String },
    AddClass { handle: SinkHandle, name: String },
    RemoveClass { handle: SinkHandle, name: String },
    AppendChild { parent: SinkHandle, child: SinkHandle },
    RemoveChild { parent: SinkHandle, child: SinkHandle },
    AddEventListener { handle: SinkHandle, kind: EventKind },
}

/// An element as the in-memory document holds it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryElement {
    pub tag: String,
    pub id: Option<String>,
    pub text: String,
    pub value: String,
    /// Includes the serialized inline style under `style`.
    pub attributes: IndexMap<String, String>,
    pub classes: IndexSet<String>,
    pub parent: Option<SinkHandle>,
    pub children: Vec<SinkHandle>,
}

#[derive(Default)]
struct Document {
    elements: Vec<MemoryElement>,
    listeners: Vec<(SinkHandle, EventKind, EventCallback)>,
    ops: Vec<SinkOp>,
}

impl Document {
    fn element_mut(&mut self, handle: SinkHandle) -> Option<&mut MemoryElement> {
        let element = self.elements.get_mut(handle.0 as usize);
        if element.is_none() {
            debug!(%handle, "unknown element handle");
        }
        element
    }

    fn detach(&mut self, child: SinkHandle) {
        let Some(parent) = self.element_mut(child).and_then(|el| el.parent.take()) else {
            return;
        };
        if let Some(parent) = self.element_mut(parent) {
            parent.children.retain(|c| *c != child);
        }
    }
}

#[derive(Default)]
pub struct MemorySink {
    doc: Mutex<Document>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an element to mount a tree on. Not recorded as an operation.
    pub fn create_root(&self, tag: &str) -> SinkHandle {
        let mut doc = self.doc.lock();
        let handle = SinkHandle(doc.elements.len() as u64);
        doc.elements.push(MemoryElement {
            tag: tag.to_string(),
            ..MemoryElement::default()
        });
        handle
    }

    /// Every operation received so far.
    pub fn ops(&self) -> Vec<SinkOp> {
        self.doc.lock().ops.clone()
    }

    /// Forget the recorded operations.
    pub fn clear_ops(&self) {
        self.doc.lock().ops.clear();
    }

    pub fn count_ops(&self, predicate: impl Fn(&SinkOp) -> bool) -> usize {
        self.doc.lock().ops.iter().filter(|op| predicate(op)).count()
    }

    pub fn element(&self, handle: SinkHandle) -> Option<MemoryElement> {
        self.doc.lock().elements.get(handle.0 as usize).cloned()
    }

    pub fn element_count(&self) -> usize {
        self.doc.lock().elements.len()
    }

    /// Fire `event` on `handle`. Returns how many callbacks ran.
    pub fn dispatch(&self, handle: SinkHandle, event: DomEvent) -> usize {
        let callbacks: Vec<EventCallback> = self
            .doc
            .lock()
            .listeners
            .iter()
            .filter(|(h, kind, _)| *h == handle && *kind == event.kind)
            .map(|(_, _, callback)| callback.clone())
            .collect();
        for callback in &callbacks {
            callback(event.clone());
        }
        callbacks.len()
    }

    /// Serialize the element and its descendants.
    pub fn outer_html(&self, handle: SinkHandle) -> String {
        let doc = self.doc.lock();
        let mut out = String::new();
        write_element(&doc, handle, &mut out);
        out
    }

    fn record(&self, op: SinkOp, apply: impl FnOnce(&mut Document)) {
        trace!(?op, "sink operation");
        let mut doc = self.doc.lock();
        apply(&mut doc);
        doc.ops.push(op);
    }
}

fn write_element(doc: &Document, handle: SinkHandle, out: &mut String) {
    let Some(element) = doc.elements.get(handle.0 as usize) else {
        return;
    };
    let tag = element.tag.to_ascii_lowercase();
    let _ = write!(out, "<{tag}");
    if let Some(id) = &element.id {
        let _ = write!(out, " id=\"{id}\"");
    }
    if !element.classes.is_empty() {
        let classes: Vec<&str> = element.classes.iter().map(String::as_str).collect();
        let _ = write!(out, " class=\"{}\"", classes.join(" "));
    }
    for (name, value) in &element.attributes {
        let _ = write!(out, " {name}=\"{value}\"");
    }
    out.push('>');
    out.push_str(&element.text);
    for child in &element.children {
        write_element(doc, *child, out);
    }
    let _ = write!(out, "</{tag}>");
}

impl TreeSink for MemorySink {
    fn create_element(&self, tag: &str) -> SinkHandle {
        let mut doc = self.doc.lock();
        let handle = SinkHandle(doc.elements.len() as u64);
        doc.elements.push(MemoryElement {
            tag: tag.to_string(),
            ..MemoryElement::default()
        });
        doc.ops.push(SinkOp::Create {
            handle,
            tag: tag.to_string(),
        });
        handle
    }

    fn set_id(&self, handle: SinkHandle, id: &str) {
        let op = SinkOp::SetId {
            handle,
            id: id.to_string(),
        };
        self.record(op, |doc| {
            if let Some(el) = doc.element_mut(handle) {
                el.id = Some(id.to_string());
            }
        });
    }

    fn set_attribute(&self, handle: SinkHandle, name: &str, value: &str) {
        let op = SinkOp::SetAttribute {
            handle,
            name: name.to_string(),
            value: value.to_string(),
        };
        self.record(op, |doc| {
            if let Some(el) = doc.element_mut(handle) {
                el.attributes.insert(name.to_string(), value.to_string());
            }
        });
    }

    fn remove_attribute(&self, handle: SinkHandle, name: &str) {
        let op = SinkOp::RemoveAttribute {
            handle,
            name: name.to_string(),
        };
        self.record(op, |doc| {
            if let Some(el) = doc.element_mut(handle) {
                el.attributes.shift_remove(name);
            }
        });
    }

    fn set_text(&self, handle: SinkHandle, text: &str) {
        let op = SinkOp::SetText {
            handle,
            text: text.to_string(),
        };
        self.record(op, |doc| {
            if let Some(el) = doc.element_mut(handle) {
                el.text = text.to_string();
            }
        });
    }

    fn set_value(&self, handle: SinkHandle, value: &str) {
        let op = SinkOp::SetValue {
            handle,
            value: value.to_string(),
        };
        self.record(op, |doc| {
            if let Some(el) = doc.element_mut(handle) {
                el.value = value.to_string();
            }
        });
    }

    fn set_style(&self, handle: SinkHandle, style: &str) {
        let op = SinkOp::SetStyle {
            handle,
            style: style.to_string(),
        };
        self.record(op, |doc| {
            if let Some(el) = doc.element_mut(handle) {
                el.attributes.insert("style".to_string(), style.to_string());
            }
        });
    }

    fn add_class(&self, handle: SinkHandle, name: &str) {
        let op = SinkOp::AddClass {
            handle,
            name: name.to_string(),
        };
        self.record(op, |doc| {
            if let Some(el) = doc.element_mut(handle) {
                el.classes.insert(name.to_string());
            }
        });
    }

    fn remove_class(&self, handle: SinkHandle, name: &str) {
        let op = SinkOp::RemoveClass {
            handle,
            name: name.to_string(),
        };
        self.record(op, |doc| {
            if let Some(el) = doc.element_mut(handle) {
                el.classes.shift_remove(name);
            }
        });
    }

    fn append_child(&self, parent: SinkHandle, child: SinkHandle) {
        self.record(SinkOp::AppendChild { parent, child }, |doc| {
            doc.detach(child);
            if let Some(el) = doc.element_mut(parent) {
                el.children.push(child);
            }
            if let Some(el) = doc.element_mut(child) {
                el.parent = Some(parent);
            }
        });
    }

    fn remove_child(&self, parent: SinkHandle, child: SinkHandle) {
        self.record(SinkOp::RemoveChild { parent, child }, |doc| {
            let attached = doc
                .element_mut(child)
                .is_some_and(|el| el.parent == Some(parent));
            if attached {
                doc.detach(child);
            } else {
                debug!(%parent, %child, "remove_child on an element that is not a child");
            }
        });
    }

    fn add_event_listener(&self, handle: SinkHandle, kind: &EventKind, callback: EventCallback) {
        let op = SinkOp::AddEventListener {
            handle,
            kind: kind.clone(),
        };
        self.record(op, |doc| {
            doc.listeners.push((handle, kind.clone(), callback));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn builds_and_serializes_a_document() {
        let sink = MemorySink::new();
        let root = sink.create_root("BODY");
        let div = sink.create_element("DIV");
        sink.set_id(div, "main");
        sink.add_class(div, "card");
        sink.set_attribute(div, "title", "hi");
        sink.set_text(div, "hello");
        sink.append_child(root, div);

        assert_eq!(
            sink.outer_html(root),
            "<body><div id=\"main\" class=\"card\" title=\"hi\">hello</div></body>"
        );
        assert_eq!(sink.ops().len(), 6);
    }

    #[test]
    fn append_moves_between_parents() {
        let sink = MemorySink::new();
        let a = sink.create_root("DIV");
        let b = sink.create_root("DIV");
        let child = sink.create_element("SPAN");
        sink.append_child(a, child);
        sink.append_child(b, child);

        assert!(sink.element(a).unwrap().children.is_empty());
        assert_eq!(sink.element(b).unwrap().children, vec![child]);
        assert_eq!(sink.element(child).unwrap().parent, Some(b));
    }

    #[test]
    fn remove_child_detaches() {
        let sink = MemorySink::new();
        let root = sink.create_root("DIV");
        let child = sink.create_element("P");
        sink.append_child(root, child);
        sink.remove_child(root, child);

        assert!(sink.element(root).unwrap().children.is_empty());
        assert_eq!(sink.element(child).unwrap().parent, None);
        assert_eq!(
            sink.count_ops(|op| matches!(op, SinkOp::RemoveChild { .. })),
            1
        );
    }

    #[test]
    fn style_lives_in_the_style_attribute() {
        let sink = MemorySink::new();
        let el = sink.create_element("DIV");
        sink.set_style(el, "color:red;");
        assert_eq!(
            sink.element(el).unwrap().attributes.get("style").map(String::as_str),
            Some("color:red;")
        );
        sink.remove_attribute(el, "style");
        assert!(sink.element(el).unwrap().attributes.is_empty());
    }

    #[test]
    fn dispatch_fires_matching_listeners() {
        let sink = MemorySink::new();
        let el = sink.create_element("BUTTON");
        let clicks = Arc::new(AtomicUsize::new(0));
        let clicks_clone = clicks.clone();
        sink.add_event_listener(
            el,
            &EventKind::Click,
            Arc::new(move |_| {
                clicks_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(sink.dispatch(el, DomEvent::new(EventKind::Click)), 1);
        assert_eq!(sink.dispatch(el, DomEvent::new(EventKind::Input)), 0);
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }
}
