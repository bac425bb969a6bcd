//! Render tree nodes.
//!
//! A [`Node`] is a shared handle to one entity of the render tree. Parents own
//! their children; a child keeps only a weak back-reference to its parent,
//! used for path walks and never for lifetime management.
//!
//! Every builder operation records the change in the node (pending values,
//! dirty dimensions), marks the node on its renderer and asks for a render
//! pass. Nothing reaches the sink until that pass runs.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bitflags::bitflags;
use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, warn};

use super::tracked::{ChangeStatus, ChangeTracked};
use crate::error::{validate_attribute, validate_class_name};
use crate::reactive::{Effect, Gettable, ReactiveContext};
use crate::render::{DomEvent, EventKind, NoopRenderer, Renderer, SinkHandle};

/// Unique identifier for a node in the render tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

bitflags! {
    /// Dimensions of a node with pending changes.
    ///
    /// Text, value and id carry their own status and are not listed here.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Dirty: u8 {
        const STYLES     = 1 << 0;
        const CLASSES    = 1 << 1;
        const ATTRIBUTES = 1 << 2;
        const LISTENERS  = 1 << 3;
        const CHILDREN   = 1 << 4;
    }
}

/// Lifecycle of a node relative to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    /// Materialized and attached.
    Unchanged,
    /// Waiting to be materialized and attached by the next pass.
    New,
    /// Tombstone; excised and unlinked by the next pass.
    Deleted,
}

/// What an event handler receives.
pub struct EventContext {
    pub target: Node,
    pub event: DomEvent,
}

pub type EventHandler = Arc<dyn Fn(&EventContext) + Send + Sync>;

pub(crate) struct Listener {
    pub(crate) handler: EventHandler,
    /// Set once the sink has a callback for this kind.
    pub(crate) bound: bool,
}

pub(crate) struct NodeInner {
    pub(crate) tag: String,
    pub(crate) status: NodeStatus,
    pub(crate) parent: Option<WeakNode>,
    pub(crate) renderer: Arc<dyn Renderer>,
    pub(crate) handle: Option<SinkHandle>,

    pub(crate) dom_id: ChangeTracked<String>,
    pub(crate) text: ChangeTracked<String>,
    pub(crate) value: ChangeTracked<String>,

    pub(crate) styles: IndexMap<String, ChangeTracked<String>>,
    pub(crate) classes: IndexMap<String, ChangeStatus>,
    pub(crate) attributes: IndexMap<String, ChangeTracked<String>>,
    pub(crate) listeners: IndexMap<EventKind, Listener>,
    pub(crate) children: Vec<Node>,
    /// Effects that keep this node in sync; they live as long as the node.
    pub(crate) bindings: Vec<Effect>,

    pub(crate) dirty: Dirty,
}

impl NodeInner {
    pub(crate) fn is_fragment(&self) -> bool {
        self.tag.is_empty()
    }
}

/// Shared handle to a render tree node.
///
/// Clones refer to the same node. Equality is identity.
#[derive(Clone)]
pub struct Node {
    id: NodeId,
    inner: Arc<Mutex<NodeInner>>,
}

/// Non-owning reference to a node.
#[derive(Clone)]
pub struct WeakNode {
    id: NodeId,
    inner: Weak<Mutex<NodeInner>>,
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<Node> {
        self.inner.upgrade().map(|inner| Node { id: self.id, inner })
    }

    pub fn node_id(&self) -> NodeId {
        self.id
    }
}

impl Node {
    /// Create a detached node. An empty tag makes a fragment.
    pub fn new(tag: impl Into<String>) -> Self {
        Self::build(tag.into(), NodeStatus::New, Arc::new(NoopRenderer), None)
    }

    /// Create a structural node that never materializes in the sink.
    pub fn fragment() -> Self {
        Self::new("")
    }

    /// A root node wrapping an element the sink already has.
    pub(crate) fn mounted(
        tag: impl Into<String>,
        handle: SinkHandle,
        renderer: Arc<dyn Renderer>,
    ) -> Self {
        Self::build(tag.into(), NodeStatus::Unchanged, renderer, Some(handle))
    }

    fn build(
        tag: String,
        status: NodeStatus,
        renderer: Arc<dyn Renderer>,
        handle: Option<SinkHandle>,
    ) -> Self {
        Self {
            id: NodeId::new(),
            inner: Arc::new(Mutex::new(NodeInner {
                tag,
                status,
                parent: None,
                renderer,
                handle,
                dom_id: ChangeTracked::default(),
                text: ChangeTracked::default(),
                value: ChangeTracked::default(),
                styles: IndexMap::new(),
                classes: IndexMap::new(),
                attributes: IndexMap::new(),
                listeners: IndexMap::new(),
                children: Vec::new(),
                bindings: Vec::new(),
                dirty: Dirty::empty(),
            })),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, NodeInner> {
        self.inner.lock()
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            id: self.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    pub fn node_id(&self) -> NodeId {
        self.id
    }

    pub fn tag(&self) -> String {
        self.state().tag.clone()
    }

    pub fn is_fragment(&self) -> bool {
        self.state().is_fragment()
    }

    pub fn status(&self) -> NodeStatus {
        self.state().status
    }

    pub fn dirty(&self) -> Dirty {
        self.state().dirty
    }

    pub fn is_dirty(&self, flag: Dirty) -> bool {
        self.state().dirty.contains(flag)
    }

    /// The sink element backing this node, once materialized.
    pub fn handle(&self) -> Option<SinkHandle> {
        self.state().handle
    }

    pub fn parent(&self) -> Option<Node> {
        self.state().parent.as_ref().and_then(WeakNode::upgrade)
    }

    /// Current children, tombstones included until the next pass excises them.
    pub fn child_nodes(&self) -> Vec<Node> {
        self.state().children.clone()
    }

    /// Pending text.
    pub fn text_content(&self) -> String {
        self.state().text.value().clone()
    }

    pub fn committed_text(&self) -> String {
        self.state().text.committed().clone()
    }

    pub fn text_status(&self) -> ChangeStatus {
        self.state().text.status()
    }

    /// Pending bound value.
    pub fn bound_value(&self) -> String {
        self.state().value.value().clone()
    }

    /// Pending element id.
    pub fn dom_id(&self) -> String {
        self.state().dom_id.value().clone()
    }

    pub fn attribute_value(&self, name: &str) -> Option<String> {
        self.state()
            .attributes
            .get(name)
            .filter(|cell| cell.status() != ChangeStatus::Deleted)
            .map(|cell| cell.value().clone())
    }

    /// Pending attributes with their status, in insertion order.
    pub fn attributes(&self) -> Vec<(String, String, ChangeStatus)> {
        snapshot(&self.state().attributes)
    }

    /// Pending styles with their status, in insertion order.
    pub fn styles(&self) -> Vec<(String, String, ChangeStatus)> {
        snapshot(&self.state().styles)
    }

    pub fn classes(&self) -> Vec<(String, ChangeStatus)> {
        self.state()
            .classes
            .iter()
            .map(|(name, status)| (name.clone(), *status))
            .collect()
    }

    pub fn has_class(&self, name: &str) -> bool {
        matches!(
            self.state().classes.get(name),
            Some(status) if *status != ChangeStatus::Deleted
        )
    }

    pub fn listener_kinds(&self) -> Vec<EventKind> {
        self.state().listeners.keys().cloned().collect()
    }

    /// This node followed by each ancestor up to the root.
    pub fn path_to_root(&self) -> SmallVec<[Node; 8]> {
        let mut path: SmallVec<[Node; 8]> = smallvec![self.clone()];
        let mut current = self.parent();
        while let Some(parent) = current {
            current = parent.parent();
            path.push(parent);
        }
        path
    }

    /// This node and all its descendants, parents before children.
    pub fn subtree(&self) -> Vec<Node> {
        let mut nodes = vec![self.clone()];
        let mut index = 0;
        while index < nodes.len() {
            let children = nodes[index].child_nodes();
            nodes.extend(children);
            index += 1;
        }
        nodes
    }

    /// Sink handle of the closest materialized ancestor, excluding self.
    pub fn nearest_materialized_ancestor(&self) -> Option<SinkHandle> {
        let mut current = self.parent();
        while let Some(node) = current {
            if let Some(handle) = node.handle() {
                return Some(handle);
            }
            current = node.parent();
        }
        None
    }

    // ------------------------------------------------------------------
    // Builder operations
    // ------------------------------------------------------------------

    /// Set the element id.
    pub fn id(&self, id: impl Into<String>) -> Self {
        if self.ignored_on_fragment("id") {
            return self.clone();
        }
        let changed = self.state().dom_id.assign(id.into(), ChangeStatus::Modified);
        if changed {
            self.request_render();
        }
        self.clone()
    }

    pub fn text(&self, text: impl Into<String>) -> Self {
        if self.ignored_on_fragment("text") {
            return self.clone();
        }
        let changed = self.state().text.assign(text.into(), ChangeStatus::Modified);
        if changed {
            self.request_render();
        }
        self.clone()
    }

    /// Set the live value of an input-like element.
    pub fn value(&self, value: impl Into<String>) -> Self {
        if self.ignored_on_fragment("value") {
            return self.clone();
        }
        let changed = self.state().value.assign(value.into(), ChangeStatus::Modified);
        if changed {
            self.request_render();
        }
        self.clone()
    }

    /// Keep the text in sync with `source` through an effect.
    pub fn bind_text<G>(&self, cx: &ReactiveContext, source: G) -> Self
    where
        G: Gettable<String> + Send + Sync + 'static,
    {
        let node = self.downgrade();
        let binding = Effect::new(cx, move || {
            if let Some(node) = node.upgrade() {
                node.text(source.get());
            }
        });
        self.own_effect(binding);
        self.clone()
    }

    /// Tie `effect` to the lifetime of this node.
    pub(crate) fn own_effect(&self, effect: Effect) {
        self.state().bindings.push(effect);
    }

    pub fn attribute(&self, key: &str, value: &str) -> Self {
        if self.ignored_on_fragment("attribute") {
            return self.clone();
        }
        if let Err(err) = validate_attribute(key, value) {
            debug!(node = %self.id, %err, "attribute ignored");
            return self.clone();
        }
        let changed = assign_entry(&mut self.state().attributes, key, value);
        if changed {
            self.set_dirty(Dirty::ATTRIBUTES);
        }
        self.clone()
    }

    pub fn remove_attribute(&self, key: &str) -> Self {
        let changed = remove_entry(&mut self.state().attributes, key);
        if changed {
            self.set_dirty(Dirty::ATTRIBUTES);
        }
        self.clone()
    }

    pub fn style(&self, key: &str, value: &str) -> Self {
        if self.ignored_on_fragment("style") {
            return self.clone();
        }
        if let Err(err) = validate_attribute(key, value) {
            debug!(node = %self.id, %err, "style ignored");
            return self.clone();
        }
        let changed = assign_entry(&mut self.state().styles, key, value);
        if changed {
            self.set_dirty(Dirty::STYLES);
        }
        self.clone()
    }

    pub fn remove_style(&self, key: &str) -> Self {
        let changed = remove_entry(&mut self.state().styles, key);
        if changed {
            self.set_dirty(Dirty::STYLES);
        }
        self.clone()
    }

    /// Add classes. Names containing whitespace are dropped with a warning.
    pub fn class<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.ignored_on_fragment("class") {
            return self.clone();
        }
        let mut changed = false;
        {
            let mut inner = self.state();
            for name in names {
                let name = name.as_ref();
                if let Err(err) = validate_class_name(name) {
                    warn!(node = %self.id, %err, "class ignored");
                    continue;
                }
                match inner.classes.get_mut(name) {
                    None => {
                        inner.classes.insert(name.to_string(), ChangeStatus::New);
                        changed = true;
                    }
                    // Re-adding cancels a pending removal.
                    Some(status) if *status == ChangeStatus::Deleted => {
                        *status = ChangeStatus::Unchanged;
                        changed = true;
                    }
                    Some(_) => {}
                }
            }
        }
        if changed {
            self.set_dirty(Dirty::CLASSES);
        }
        self.clone()
    }

    pub fn remove_class<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut changed = false;
        {
            let mut inner = self.state();
            for name in names {
                let name = name.as_ref();
                match inner.classes.get(name).copied() {
                    Some(ChangeStatus::New) => {
                        inner.classes.shift_remove(name);
                        changed = true;
                    }
                    Some(ChangeStatus::Unchanged) | Some(ChangeStatus::Modified) => {
                        inner.classes.insert(name.to_string(), ChangeStatus::Deleted);
                        changed = true;
                    }
                    Some(ChangeStatus::Deleted) | None => {}
                }
            }
        }
        if changed {
            self.set_dirty(Dirty::CLASSES);
        }
        self.clone()
    }

    /// Bind a handler for `kind`.
    ///
    /// A kind can be bound once; later registrations for the same kind are
    /// ignored. After the handler runs a render pass is requested.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&EventContext) + Send + Sync + 'static,
    {
        if self.ignored_on_fragment("on") {
            return self.clone();
        }
        {
            let mut inner = self.state();
            if inner.listeners.contains_key(&kind) {
                warn!(node = %self.id, %kind, "listener already bound; ignoring");
                return self.clone();
            }
            inner.listeners.insert(
                kind,
                Listener {
                    handler: Arc::new(handler),
                    bound: false,
                },
            );
        }
        self.set_dirty(Dirty::LISTENERS);
        self.clone()
    }

    pub fn on_click<F>(&self, handler: F) -> Self
    where
        F: Fn(&EventContext) + Send + Sync + 'static,
    {
        self.on(EventKind::Click, handler)
    }

    /// Replace the children.
    ///
    /// Previous children missing from `children` become tombstones; every
    /// node in `children` is (re)inserted as new, in order. There is no keyed
    /// matching: a node that stays is moved to its new position.
    pub fn children<I>(&self, children: I) -> Self
    where
        I: IntoIterator<Item = Node>,
    {
        let ancestors: HashSet<NodeId> =
            self.path_to_root().iter().map(Node::node_id).collect();
        let mut seen = HashSet::new();
        let mut incoming = Vec::new();
        for child in children {
            if ancestors.contains(&child.id) {
                warn!(node = %self.id, child = %child.id, "refusing to insert an ancestor as a child");
                continue;
            }
            if seen.insert(child.id) {
                incoming.push(child);
            }
        }

        for child in &incoming {
            if let Some(previous) = child.parent() {
                if previous != *self {
                    previous.forget_child(child);
                    child.unlink_from(&previous);
                }
            }
        }

        let (previous, renderer) = {
            let mut inner = self.state();
            (std::mem::take(&mut inner.children), inner.renderer.clone())
        };

        let mut next = Vec::with_capacity(previous.len() + incoming.len());
        for old in previous {
            if !seen.contains(&old.id) {
                old.state().status = NodeStatus::Deleted;
                next.push(old);
            }
        }
        for child in &incoming {
            {
                let mut state = child.state();
                state.status = NodeStatus::New;
                state.parent = Some(self.downgrade());
            }
            child.adopt_renderer(&renderer);
            next.push(child.clone());
        }

        {
            let mut inner = self.state();
            inner.children = next;
            inner.dirty |= Dirty::CHILDREN;
        }
        self.request_render();
        self.clone()
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn ignored_on_fragment(&self, operation: &'static str) -> bool {
        let fragment = self.is_fragment();
        if fragment {
            debug!(node = %self.id, operation, "ignored on a fragment node");
        }
        fragment
    }

    fn set_dirty(&self, flag: Dirty) {
        self.state().dirty |= flag;
        self.request_render();
    }

    /// Mark this node on its renderer and ask for a pass.
    pub(crate) fn request_render(&self) {
        let renderer = self.state().renderer.clone();
        renderer.mark(self);
        renderer.schedule_render();
    }

    /// Hand the subtree to `renderer`, marking every node on it.
    fn adopt_renderer(&self, renderer: &Arc<dyn Renderer>) {
        for node in self.subtree() {
            {
                let mut state = node.state();
                state.renderer = renderer.clone();
                state.dirty |= Dirty::CHILDREN;
            }
            renderer.mark(&node);
        }
    }

    fn forget_child(&self, child: &Node) {
        self.state().children.retain(|c| c != child);
    }

    /// Ask the current renderer to take this node's elements out of the
    /// element that stood for `previous`.
    fn unlink_from(&self, previous: &Node) {
        let Some(anchor) = previous
            .handle()
            .or_else(|| previous.nearest_materialized_ancestor())
        else {
            return;
        };
        let roots = self.materialized_roots();
        if roots.is_empty() {
            return;
        }
        let renderer = self.state().renderer.clone();
        for root in roots {
            renderer.unlink(anchor, root);
        }
        renderer.schedule_render();
    }

    /// The sink elements that stand for this node: its own, or for a
    /// fragment those of its children.
    pub(crate) fn materialized_roots(&self) -> Vec<SinkHandle> {
        let (fragment, handle, children) = {
            let state = self.state();
            (state.is_fragment(), state.handle, state.children.clone())
        };
        if !fragment {
            return handle.into_iter().collect();
        }
        children.iter().flat_map(Node::materialized_roots).collect()
    }

    /// Cut the node loose from its parent and from the live renderer.
    pub(crate) fn detach(&self) {
        self.state().parent = None;
        let noop: Arc<dyn Renderer> = Arc::new(NoopRenderer);
        for node in self.subtree() {
            node.state().renderer = noop.clone();
        }
    }

    /// Run the handler bound for `kind`, then request a pass.
    pub(crate) fn dispatch(&self, kind: &EventKind, event: DomEvent) {
        let (handler, renderer) = {
            let inner = self.state();
            (
                inner.listeners.get(kind).map(|l| l.handler.clone()),
                inner.renderer.clone(),
            )
        };
        let Some(handler) = handler else {
            debug!(node = %self.id, %kind, "event without handler");
            return;
        };
        handler(&EventContext {
            target: self.clone(),
            event,
        });
        renderer.schedule_render();
    }
}

fn assign_entry(map: &mut IndexMap<String, ChangeTracked<String>>, key: &str, value: &str) -> bool {
    match map.get_mut(key) {
        Some(cell) => {
            let status = if cell.status() == ChangeStatus::New {
                ChangeStatus::New
            } else {
                ChangeStatus::Modified
            };
            cell.assign(value.to_string(), status)
        }
        None => {
            map.insert(key.to_string(), ChangeTracked::fresh(value.to_string()));
            true
        }
    }
}

fn remove_entry(map: &mut IndexMap<String, ChangeTracked<String>>, key: &str) -> bool {
    match map.get(key).map(ChangeTracked::status) {
        None | Some(ChangeStatus::Deleted) => false,
        // Never applied, so there is nothing to remove from the sink.
        Some(ChangeStatus::New) => {
            map.shift_remove(key);
            true
        }
        Some(_) => {
            if let Some(cell) = map.get_mut(key) {
                cell.delete();
            }
            true
        }
    }
}

fn snapshot(map: &IndexMap<String, ChangeTracked<String>>) -> Vec<(String, String, ChangeStatus)> {
    map.iter()
        .map(|(key, cell)| (key.clone(), cell.value().clone(), cell.status()))
        .collect()
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl std::hash::Hash for Node {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.state();
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("tag", &inner.tag)
            .field("status", &inner.status)
            .field("dirty", &inner.dirty)
            .field("children", &inner.children.len())
            .finish()
    }
}
