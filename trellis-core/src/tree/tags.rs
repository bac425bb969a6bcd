//! Tag constructors and element-specific helpers.
//!
//! Every constructor returns a detached [`Node`] with an upper-case tag, the
//! way a live document reports tag names.

use super::node::Node;
use crate::reactive::{Effect, Gettable, ReactiveContext, Settable};
use crate::render::EventKind;

macro_rules! tags {
    ($($name:ident => $tag:literal),* $(,)?) => {
        $(
            #[doc = concat!("A new `<", $tag, ">` node.")]
            pub fn $name() -> Node {
                Node::new($tag)
            }
        )*
    };
}

tags! {
    div => "DIV",
    span => "SPAN",
    p => "P",
    button => "BUTTON",
    a => "A",
    h1 => "H1",
    h2 => "H2",
    h3 => "H3",
    h4 => "H4",
    h5 => "H5",
    h6 => "H6",
    strong => "STRONG",
    em => "EM",
    small => "SMALL",
    img => "IMG",
    input => "INPUT",
    label => "LABEL",
    form => "FORM",
    select => "SELECT",
    option => "OPTION",
    textarea => "TEXTAREA",
    ul => "UL",
    ol => "OL",
    li => "LI",
    table => "TABLE",
    thead => "THEAD",
    tbody => "TBODY",
    tfoot => "TFOOT",
    tr => "TR",
    th => "TH",
    td => "TD",
    nav => "NAV",
    header => "HEADER",
    footer => "FOOTER",
    main => "MAIN",
    section => "SECTION",
    article => "ARTICLE",
    aside => "ASIDE",
    video => "VIDEO",
    audio => "AUDIO",
    source => "SOURCE",
    canvas => "CANVAS",
    svg => "SVG",
    path => "PATH",
    br => "BR",
    hr => "HR",
}

/// A structural node: its children are spliced into the nearest real element.
pub fn fragment() -> Node {
    Node::fragment()
}

/// Keep the value of `node` in sync with `source`.
pub fn bind_value<G>(cx: &ReactiveContext, node: &Node, source: G) -> Node
where
    G: Gettable<String> + Send + Sync + 'static,
{
    let target = node.downgrade();
    let binding = Effect::new(cx, move || {
        if let Some(node) = target.upgrade() {
            node.value(source.get());
        }
    });
    node.own_effect(binding);
    node.clone()
}

/// Write every input event's value into `target`.
pub fn bind_on_input<S>(node: &Node, target: S) -> Node
where
    S: Settable<String> + Send + Sync + 'static,
{
    node.on(EventKind::Input, move |cx| {
        if let Some(value) = &cx.event.value {
            target.set(value.clone());
        }
    })
}

pub fn placeholder(node: &Node, text: &str) -> Node {
    node.attribute("placeholder", text)
}

pub fn input_type(node: &Node, kind: &str) -> Node {
    node.attribute("type", kind)
}

pub fn href(node: &Node, url: &str) -> Node {
    node.attribute("href", url)
}

pub fn src(node: &Node, url: &str) -> Node {
    node.attribute("src", url)
}
