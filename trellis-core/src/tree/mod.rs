//! Render Tree
//!
//! The tree the reconciler diffs against the sink. Builder operations only
//! record pending changes; a render pass applies them.

mod node;
pub mod operators;
pub mod tags;
mod tracked;

pub use node::{Dirty, EventContext, EventHandler, Node, NodeId, NodeStatus, WeakNode};
pub use operators::{each, when};
pub use tracked::{ChangeStatus, ChangeTracked};
