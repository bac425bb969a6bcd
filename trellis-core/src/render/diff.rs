//! Diff Renderer
//!
//! The reconciler. Nodes report changes with [`Renderer::mark`]; the first
//! [`Renderer::schedule_render`] after a pass requests one frame, and every
//! change made before that frame ticks is handled by the same pass.
//!
//! # Algorithm
//!
//! 0. Take moved elements out of the elements they were appended to.
//! 1. Group the marked nodes by the mounted tree they belong to, and find the
//!    lowest common ancestor (LCA) of each group. Marked nodes that no longer
//!    belong to a mounted tree are dropped.
//! 2. Structural sync, depth first from each LCA:
//!    - deleted nodes are removed from the sink, detached and excised from
//!      their parent's children
//!    - new nodes are created (unless they are fragments) and appended to
//!      their nearest materialized ancestor
//!    - fragments splice their children into that ancestor instead
//! 3. Patch every node still marked: text, value, listeners, classes,
//!    attributes, styles, id, then the children that changed structure.
//!    Nodes visited by the sync walk are patched in walk order, parents
//!    before children; the rest follow in the order they were marked.
//!
//! Dirty flags are cleared and pending values committed as each node is
//! patched, so a settled tree produces no sink calls at all.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::frame::FrameScheduler;
use super::sink::{EventCallback, EventKind, SinkHandle, TreeSink};
use super::Renderer;
use crate::tree::{ChangeStatus, ChangeTracked, Dirty, Node, NodeId, NodeStatus};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Nodes marked when the pass started.
    pub marked: usize,
    /// Sink elements created.
    pub created: usize,
    /// Nodes excised from the tree.
    pub removed: usize,
    /// Nodes that produced at least one sink call during patching.
    pub patched: usize,
}

struct RendererState {
    sink: Arc<dyn TreeSink>,
    frames: Arc<dyn FrameScheduler>,
    marked: Mutex<IndexMap<NodeId, Node>>,
    /// Roots handed out by `mount`.
    mounted: Mutex<IndexSet<NodeId>>,
    /// `(parent, child)` element pairs to take apart before the next sync.
    unlinks: Mutex<Vec<(SinkHandle, SinkHandle)>>,
    scheduled: AtomicBool,
    passes: AtomicUsize,
    last_pass: Mutex<PassStats>,
}

/// Reconciler patching a [`TreeSink`] once per frame.
///
/// Cheap to clone; clones share the marked set and the scheduled flag.
#[derive(Clone)]
pub struct DiffRenderer {
    state: Arc<RendererState>,
}

enum Patch {
    Text(String),
    Value(String),
    Listen(EventKind),
    AddClass(String),
    RemoveClass(String),
    SetAttribute(String, String),
    RemoveAttribute(String),
    Style(String),
    Id(String),
}

impl DiffRenderer {
    pub fn new(sink: Arc<dyn TreeSink>, frames: Arc<dyn FrameScheduler>) -> Self {
        Self {
            state: Arc::new(RendererState {
                sink,
                frames,
                marked: Mutex::new(IndexMap::new()),
                mounted: Mutex::new(IndexSet::new()),
                unlinks: Mutex::new(Vec::new()),
                scheduled: AtomicBool::new(false),
                passes: AtomicUsize::new(0),
                last_pass: Mutex::new(PassStats::default()),
            }),
        }
    }

    /// Wrap an element the sink already has as the root of a tree.
    pub fn mount(&self, root: SinkHandle, tag: impl Into<String>) -> Node {
        let renderer: Arc<dyn Renderer> = Arc::new(self.clone());
        let node = Node::mounted(tag, root, renderer);
        self.state.mounted.lock().insert(node.node_id());
        node
    }

    pub fn marked_count(&self) -> usize {
        self.state.marked.lock().len()
    }

    pub fn is_marked(&self, node: &Node) -> bool {
        self.state.marked.lock().contains_key(&node.node_id())
    }

    /// Whether a frame has been requested and has not finished yet.
    pub fn is_scheduled(&self) -> bool {
        self.state.scheduled.load(Ordering::Acquire)
    }

    /// Number of passes run so far.
    pub fn pass_count(&self) -> usize {
        self.state.passes.load(Ordering::Relaxed)
    }

    pub fn last_pass(&self) -> PassStats {
        *self.state.last_pass.lock()
    }

    /// Run a reconciliation pass now.
    ///
    /// This is what the scheduled frame does. An empty marked set makes it a
    /// no-op.
    pub fn render_now(&self) -> PassStats {
        let unlinks = std::mem::take(&mut *self.state.unlinks.lock());
        let marked: Vec<Node> = self.state.marked.lock().values().cloned().collect();
        let mut stats = PassStats {
            marked: marked.len(),
            ..PassStats::default()
        };
        if marked.is_empty() && unlinks.is_empty() {
            trace!("nothing marked; skipping pass");
            return stats;
        }
        debug!(marked = stats.marked, unlinks = unlinks.len(), "render pass started");

        for (parent, child) in unlinks {
            self.state.sink.remove_child(parent, child);
        }

        let mut walk = Vec::new();
        for (tree, nodes) in self.group_by_tree(marked) {
            let Some(root) = lowest_common_ancestor(&nodes) else {
                continue;
            };
            trace!(%tree, root = %root.node_id(), nodes = nodes.len(), "syncing tree");
            let anchor = root.nearest_materialized_ancestor();
            if !self.sync_node(&root, anchor, false, &mut walk, &mut stats) {
                if let Some(parent) = root.parent() {
                    parent.state().children.retain(|child| *child != root);
                }
            }
        }

        for node in &walk {
            if self.is_marked(node) {
                self.patch_node(node, &mut stats);
            }
        }
        loop {
            let next = self.state.marked.lock().shift_remove_index(0);
            let Some((_, node)) = next else {
                break;
            };
            self.patch_node(&node, &mut stats);
        }

        self.state.passes.fetch_add(1, Ordering::Relaxed);
        *self.state.last_pass.lock() = stats;
        debug!(
            created = stats.created,
            removed = stats.removed,
            patched = stats.patched,
            "render pass complete"
        );
        stats
    }

    /// Split `marked` by the mounted root each node hangs from. Nodes outside
    /// every mounted tree are unmarked.
    fn group_by_tree(&self, marked: Vec<Node>) -> IndexMap<NodeId, Vec<Node>> {
        let mounted = self.state.mounted.lock().clone();
        let mut trees: IndexMap<NodeId, Vec<Node>> = IndexMap::new();
        for node in marked {
            let root = node
                .path_to_root()
                .last()
                .map(Node::node_id)
                .unwrap_or_else(|| node.node_id());
            if mounted.contains(&root) {
                trees.entry(root).or_default().push(node);
            } else {
                debug!(node = %node.node_id(), "marked node is not in a mounted tree; dropping mark");
                self.state.marked.lock().shift_remove(&node.node_id());
            }
        }
        trees
    }

    /// Bring the sink membership of `node` and its subtree in line with the
    /// tree. Returns `false` when the node was excised.
    ///
    /// `reattach` asks an already materialized node to append itself to
    /// `anchor` again, which is how a re-inserted fragment moves its
    /// children.
    fn sync_node(
        &self,
        node: &Node,
        anchor: Option<SinkHandle>,
        reattach: bool,
        walk: &mut Vec<Node>,
        stats: &mut PassStats,
    ) -> bool {
        let (status, fragment, handle, tag) = {
            let state = node.state();
            (state.status, state.is_fragment(), state.handle, state.tag.clone())
        };

        if status == NodeStatus::Deleted {
            self.excise(node, anchor);
            stats.removed += 1;
            return false;
        }

        let attach = status == NodeStatus::New || reattach;
        if attach {
            let Some(anchor) = anchor else {
                debug!(node = %node.node_id(), "no materialized ancestor; leaving node pending");
                return true;
            };
            if !fragment {
                let handle = match handle {
                    Some(handle) => handle,
                    None => {
                        let handle = self.state.sink.create_element(&tag);
                        node.state().handle = Some(handle);
                        stats.created += 1;
                        trace!(node = %node.node_id(), %tag, %handle, "element created");
                        handle
                    }
                };
                self.state.sink.append_child(anchor, handle);
            }
            node.state().status = NodeStatus::Unchanged;
            // Newly materialized nodes need their pending values applied.
            self.mark(node);
        }
        walk.push(node.clone());

        let (child_anchor, child_reattach) = if fragment {
            (anchor, attach)
        } else {
            (node.handle(), false)
        };
        let children = node.child_nodes();
        let mut kept = Vec::with_capacity(children.len());
        for child in &children {
            if self.sync_node(child, child_anchor, child_reattach, walk, stats) {
                kept.push(child.clone());
            }
        }
        if kept.len() != children.len() {
            node.state().children = kept;
        }
        true
    }

    /// Remove a deleted node from the sink and the renderer.
    fn excise(&self, node: &Node, anchor: Option<SinkHandle>) {
        let roots = node.materialized_roots();
        match anchor {
            Some(anchor) => {
                for root in &roots {
                    self.state.sink.remove_child(anchor, *root);
                }
            }
            None if !roots.is_empty() => {
                debug!(node = %node.node_id(), "deleted node has no materialized ancestor");
            }
            None => {}
        }
        node.detach();

        let subtree = node.subtree();
        let mut marked = self.state.marked.lock();
        for gone in &subtree {
            marked.shift_remove(&gone.node_id());
        }
        trace!(node = %node.node_id(), elements = roots.len(), "node excised");
    }

    fn patch_node(&self, node: &Node, stats: &mut PassStats) {
        self.state.marked.lock().shift_remove(&node.node_id());

        let (handle, patches, children) = {
            let mut state = node.state();
            if state.status != NodeStatus::Unchanged {
                trace!(node = %node.node_id(), status = ?state.status, "not materialized; patch skipped");
                return;
            }
            let fragment = state.is_fragment();
            let handle = state.handle;
            if !fragment && handle.is_none() {
                return;
            }

            let mut patches = Vec::new();
            if !fragment {
                collect_cell(&mut state.text, &mut patches, Patch::Text);
                collect_cell(&mut state.value, &mut patches, Patch::Value);

                if state.dirty.contains(Dirty::LISTENERS) {
                    for (kind, listener) in state.listeners.iter_mut() {
                        if !listener.bound {
                            listener.bound = true;
                            patches.push(Patch::Listen(kind.clone()));
                        }
                    }
                }

                if state.dirty.contains(Dirty::CLASSES) {
                    for (name, status) in state.classes.iter_mut() {
                        match *status {
                            ChangeStatus::New => patches.push(Patch::AddClass(name.clone())),
                            ChangeStatus::Deleted => patches.push(Patch::RemoveClass(name.clone())),
                            ChangeStatus::Unchanged | ChangeStatus::Modified => {}
                        }
                        if *status != ChangeStatus::Deleted {
                            *status = ChangeStatus::Unchanged;
                        }
                    }
                    state.classes.retain(|_, status| *status != ChangeStatus::Deleted);
                }

                if state.dirty.contains(Dirty::ATTRIBUTES) {
                    for (key, cell) in state.attributes.iter_mut() {
                        match cell.status() {
                            ChangeStatus::New | ChangeStatus::Modified => {
                                patches.push(Patch::SetAttribute(key.clone(), cell.value().clone()));
                                cell.tick();
                            }
                            ChangeStatus::Deleted => patches.push(Patch::RemoveAttribute(key.clone())),
                            ChangeStatus::Unchanged => {}
                        }
                    }
                    state
                        .attributes
                        .retain(|_, cell| cell.status() != ChangeStatus::Deleted);
                }

                if state.dirty.contains(Dirty::STYLES) {
                    state
                        .styles
                        .retain(|_, cell| cell.status() != ChangeStatus::Deleted);
                    for cell in state.styles.values_mut() {
                        cell.tick();
                    }
                    let style = style_string(&state.styles);
                    if style.is_empty() {
                        patches.push(Patch::RemoveAttribute("style".to_string()));
                    } else {
                        patches.push(Patch::Style(style));
                    }
                }

                collect_cell(&mut state.dom_id, &mut patches, Patch::Id);
            }

            let children = if state.dirty.contains(Dirty::CHILDREN) {
                state.children.clone()
            } else {
                Vec::new()
            };
            state.dirty = Dirty::empty();
            (handle, patches, children)
        };

        if let Some(handle) = handle {
            if !patches.is_empty() {
                trace!(node = %node.node_id(), %handle, patches = patches.len(), "patching node");
                stats.patched += 1;
            }
            for patch in patches {
                self.apply(node, handle, patch);
            }
        }

        for child in &children {
            self.patch_node(child, stats);
        }
    }

    fn apply(&self, node: &Node, handle: SinkHandle, patch: Patch) {
        let sink = &self.state.sink;
        match patch {
            Patch::Text(text) => sink.set_text(handle, &text),
            Patch::Value(value) => sink.set_value(handle, &value),
            Patch::Listen(kind) => {
                let target = node.downgrade();
                let bound_kind = kind.clone();
                let callback: EventCallback = Arc::new(move |event| {
                    if let Some(node) = target.upgrade() {
                        node.dispatch(&bound_kind, event);
                    }
                });
                sink.add_event_listener(handle, &kind, callback);
            }
            Patch::AddClass(name) => sink.add_class(handle, &name),
            Patch::RemoveClass(name) => sink.remove_class(handle, &name),
            Patch::SetAttribute(key, value) => sink.set_attribute(handle, &key, &value),
            Patch::RemoveAttribute(key) => sink.remove_attribute(handle, &key),
            Patch::Style(style) => sink.set_style(handle, &style),
            Patch::Id(id) => sink.set_id(handle, &id),
        }
    }

    fn finish_frame(&self) {
        self.render_now();
        self.state.scheduled.store(false, Ordering::Release);
        // Marks that raced with the end of the pass still need a frame.
        if self.marked_count() > 0 || !self.state.unlinks.lock().is_empty() {
            self.schedule_render();
        }
    }
}

impl Renderer for DiffRenderer {
    fn mark(&self, node: &Node) {
        self.state
            .marked
            .lock()
            .entry(node.node_id())
            .or_insert_with(|| node.clone());
    }

    fn schedule_render(&self) {
        if self.state.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let renderer = self.clone();
        self.state
            .frames
            .request_frame(Box::new(move || renderer.finish_frame()));
    }

    fn unlink(&self, parent: SinkHandle, child: SinkHandle) {
        self.state.unlinks.lock().push((parent, child));
    }
}

/// Lowest common ancestor of `nodes`.
///
/// The path of the first node seeds the search; every other node walks up
/// from itself until it meets the seed path, and the highest meeting point
/// wins. A node in an unrelated tree never meets the seed and is ignored.
/// Returns `None` for an empty slice.
pub fn lowest_common_ancestor(nodes: &[Node]) -> Option<Node> {
    let (first, rest) = nodes.split_first()?;
    let seed: SmallVec<[Node; 8]> = first.path_to_root();
    let mut lca = 0;
    for node in rest {
        let mut current = Some(node.clone());
        while let Some(candidate) = current {
            if let Some(index) = seed.iter().position(|n| *n == candidate) {
                lca = lca.max(index);
                break;
            }
            current = candidate.parent();
        }
    }
    Some(seed[lca].clone())
}

fn collect_cell(cell: &mut ChangeTracked<String>, patches: &mut Vec<Patch>, patch: fn(String) -> Patch) {
    if !cell.status().is_unchanged() {
        patches.push(patch(cell.value().clone()));
        cell.tick();
    }
}

fn style_string(styles: &IndexMap<String, ChangeTracked<String>>) -> String {
    styles
        .iter()
        .map(|(key, cell)| format!("{}:{};", key, cell.value()))
        .collect::<Vec<_>>()
        .join(" ")
}
