//! Control-flow helpers for building trees from reactive values.
//!
//! Both read their source with a tracked `get`, so calling them inside an
//! effect rebuilds the affected children when the source changes.

use super::node::Node;
use super::tags::span;
use crate::reactive::Gettable;

/// `child` when `condition` holds.
pub fn when<G>(condition: &G, child: Node) -> Option<Node>
where
    G: Gettable<bool> + ?Sized,
{
    condition.get().then_some(child)
}

/// One node per list entry, wrapped in a `<span>`.
pub fn each<G, F>(list: &G, mut render_one: F) -> Node
where
    G: Gettable<Vec<String>> + ?Sized,
    F: FnMut(usize, &str) -> Node,
{
    let items = list.get();
    let children: Vec<Node> = items
        .iter()
        .enumerate()
        .map(|(index, item)| render_one(index, item))
        .collect();
    span().children(children)
}
