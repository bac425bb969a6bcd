//! Rendering
//!
//! Consumers of the render tree. The tree itself only knows the [`Renderer`]
//! capability: somewhere to mark changed nodes and to ask for a pass. Which
//! policy answers that is up to the consumer:
//!
//! - [`DiffRenderer`] coalesces marks into one reconciliation pass per frame
//!   and patches a [`TreeSink`].
//! - [`HtmlRenderer`] and [`NoopRenderer`] ignore marks entirely; the former
//!   serializes a tree on demand.

mod diff;
mod frame;
mod html;
mod memory;
mod sink;

pub use diff::{lowest_common_ancestor, DiffRenderer, PassStats};
pub use frame::{FrameCallback, FrameScheduler, ManualFrames, TokioFrames};
pub use html::{to_html, HtmlRenderer};
pub use memory::{MemoryElement, MemorySink, SinkOp};
pub use sink::{DomEvent, EventCallback, EventKind, SinkHandle, TreeSink};

use crate::tree::Node;

/// The scheduling capability a node reports its changes to.
pub trait Renderer: Send + Sync {
    /// Queue `node` for the next pass. Marking twice is the same as once.
    fn mark(&self, node: &Node);

    /// Make sure a pass will run.
    fn schedule_render(&self);

    /// Queue removing `child` from `parent` in the sink, for a node that moved
    /// away from the element it was appended to.
    fn unlink(&self, _parent: SinkHandle, _child: SinkHandle) {}
}

/// Renderer for trees that are not attached to anything live.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl Renderer for NoopRenderer {
    fn mark(&self, _node: &Node) {}

    fn schedule_render(&self) {}
}
