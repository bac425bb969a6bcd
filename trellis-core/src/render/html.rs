//! HTML serialization.
//!
//! Reads a tree through its public accessors and writes markup from the
//! pending values. No sink is involved, so the same tree that a
//! [`DiffRenderer`](super::DiffRenderer) patches can be rendered headless.

use html_escape::{encode_double_quoted_attribute, encode_text};

use super::Renderer;
use crate::tree::{ChangeStatus, Node, NodeStatus};

const VOID_ELEMENTS: &[&str] = &[
    "AREA", "BASE", "BR", "COL", "EMBED", "HR", "IMG", "INPUT", "LINK", "META", "PARAM", "SOURCE",
    "TRACK", "WBR",
];

/// Serializes trees to HTML. As a [`Renderer`] it ignores every mark.
#[derive(Debug, Default)]
pub struct HtmlRenderer {
    buffer: String,
}

impl HtmlRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the markup for `node` to the buffer.
    pub fn render(&mut self, node: &Node) -> &mut Self {
        write_node(node, &mut self.buffer);
        self
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Renderer for HtmlRenderer {
    fn mark(&self, _node: &Node) {}

    fn schedule_render(&self) {}
}

/// Markup for `node` and its subtree.
pub fn to_html(node: &Node) -> String {
    let mut out = String::new();
    write_node(node, &mut out);
    out
}

fn write_node(node: &Node, out: &mut String) {
    if node.status() == NodeStatus::Deleted {
        return;
    }
    if node.is_fragment() {
        for child in node.child_nodes() {
            write_node(&child, out);
        }
        return;
    }

    let tag = node.tag();
    let name = tag.to_ascii_lowercase();
    out.push('<');
    out.push_str(&name);

    let id = node.dom_id();
    if !id.is_empty() {
        push_attribute(out, "id", &id);
    }

    let classes: Vec<String> = node
        .classes()
        .into_iter()
        .filter(|(_, status)| *status != ChangeStatus::Deleted)
        .map(|(name, _)| name)
        .collect();
    if !classes.is_empty() {
        push_attribute(out, "class", &classes.join(" "));
    }

    let styles: Vec<String> = node
        .styles()
        .into_iter()
        .filter(|(_, _, status)| *status != ChangeStatus::Deleted)
        .map(|(key, value, _)| format!("{key}:{value};"))
        .collect();
    if !styles.is_empty() {
        push_attribute(out, "style", &styles.join(" "));
    }

    for (key, value, status) in node.attributes() {
        if status != ChangeStatus::Deleted {
            push_attribute(out, &key, &value);
        }
    }

    let value = node.bound_value();
    if !value.is_empty() {
        push_attribute(out, "value", &value);
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&tag.to_ascii_uppercase().as_str()) {
        return;
    }

    out.push_str(&encode_text(&node.text_content()));
    for child in node.child_nodes() {
        write_node(&child, out);
    }
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

fn push_attribute(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(&encode_double_quoted_attribute(value));
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_pending_values() {
        let node = Node::new("DIV")
            .id("main")
            .class(["a", "b"])
            .style("color", "red")
            .attribute("title", "say \"hi\"")
            .children([Node::new("P").text("1 < 2")]);

        assert_eq!(
            to_html(&node),
            "<div id=\"main\" class=\"a b\" style=\"color:red;\" title=\"say &quot;hi&quot;\"><p>1 &lt; 2</p></div>"
        );
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let node = Node::new("INPUT").attribute("type", "text").value("x");
        assert_eq!(to_html(&node), "<input type=\"text\" value=\"x\">");
    }

    #[test]
    fn fragments_and_tombstones() {
        let list = Node::new("UL");
        let gone = Node::new("LI").text("gone");
        list.children([gone.clone()]);
        let group = Node::fragment().children([Node::new("LI").text("a"), Node::new("LI").text("b")]);
        list.children([group]);

        assert_eq!(to_html(&list), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn buffer_accumulates_until_reset() {
        let mut html = HtmlRenderer::new();
        html.render(&Node::new("BR")).render(&Node::new("HR"));
        assert_eq!(html.as_str(), "<br><hr>");
        html.reset();
        assert_eq!(html.as_str(), "");
    }
}
