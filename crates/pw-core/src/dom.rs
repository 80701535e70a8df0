//! Live DOM model.
//!
//! The rendering runtime owns the real document; this is the tree the engine
//! scans, edits, and regenerates from. Nodes live in a `StableDiGraph` arena
//! so handles stay valid while siblings are removed. Edges go parent → child;
//! sibling order is kept explicitly per parent.
//!
//! A `DomHandle` is a session-scoped lookup key. It is meaningless once the
//! runtime tears the document down on reload.

use crate::css::{Color, InlineStyle};
use crate::id::{ElementTag, LOCK_ATTR, ROOT_TAG, TAG_ATTR};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Handle to a node in the live document.
pub type DomHandle = NodeIndex;

/// A plain (non-style) attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Element payload: name, attributes, and inline style.
///
/// The `style` attribute is kept parsed in `style`; it never appears in
/// `attributes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: SmallVec<[Attribute; 4]>,
    pub style: InlineStyle,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: SmallVec::new(),
            style: InlineStyle::default(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Set an attribute. `style` is routed into the parsed inline style.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        if name == "style" {
            self.style = InlineStyle::parse(value);
            return;
        }
        if let Some(attr) = self.attributes.iter_mut().find(|a| a.name == name) {
            attr.value = value.to_string();
        } else {
            self.attributes.push(Attribute {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        if name == "style" {
            let old = self.style.to_css_text();
            self.style = InlineStyle::default();
            return Some(old);
        }
        let pos = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(pos).value)
    }

    /// The element's `data-tag`, if any.
    pub fn tag(&self) -> Option<ElementTag> {
        self.attribute(TAG_ATTR).map(ElementTag::intern)
    }

    pub fn is_locked(&self) -> bool {
        self.attribute(LOCK_ATTR).is_some_and(|v| v != "false")
    }

    /// First class in the `class` attribute.
    pub fn first_class(&self) -> Option<&str> {
        self.attribute("class")
            .and_then(|c| c.split_whitespace().next())
    }
}

/// A node in the live document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNode {
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

/// The live document tree.
#[derive(Debug, Clone)]
pub struct DomTree {
    /// Node arena. Edges go parent → child.
    pub graph: StableDiGraph<DomNode, ()>,

    /// The `Document` node.
    pub document: DomHandle,

    /// Child order per parent.
    child_order: HashMap<DomHandle, Vec<DomHandle>>,
}

impl DomTree {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let document = graph.add_node(DomNode::Document);
        Self {
            graph,
            document,
            child_order: HashMap::new(),
        }
    }

    // ─── Construction ────────────────────────────────────────────────────

    /// Create a detached element.
    pub fn create_element(&mut self, name: &str) -> DomHandle {
        self.graph.add_node(DomNode::Element(Element::new(name)))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> DomHandle {
        self.graph.add_node(DomNode::Text(text.to_string()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, text: &str) -> DomHandle {
        self.graph.add_node(DomNode::Comment(text.to_string()))
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: DomHandle, child: DomHandle) {
        self.detach(child);
        self.graph.add_edge(parent, child, ());
        self.child_order.entry(parent).or_default().push(child);
    }

    /// Insert `child` before `reference` (or at the end when `None`).
    pub fn insert_before(&mut self, parent: DomHandle, child: DomHandle, reference: Option<DomHandle>) {
        self.detach(child);
        self.graph.add_edge(parent, child, ());
        let order = self.child_order.entry(parent).or_default();
        let pos = reference
            .and_then(|r| order.iter().position(|&c| c == r))
            .unwrap_or(order.len());
        order.insert(pos, child);
    }

    /// Unlink a node from its parent, keeping its subtree.
    pub fn detach(&mut self, child: DomHandle) {
        if let Some(parent) = self.parent(child) {
            if let Some(edge) = self.graph.find_edge(parent, child) {
                self.graph.remove_edge(edge);
            }
            if let Some(order) = self.child_order.get_mut(&parent) {
                order.retain(|&c| c != child);
            }
        }
    }

    /// Remove a node and its whole subtree.
    pub fn remove(&mut self, handle: DomHandle) -> Option<DomNode> {
        if handle == self.document {
            return None;
        }
        self.detach(handle);
        let subtree = self.descendants(handle);
        for idx in subtree.into_iter().rev() {
            self.child_order.remove(&idx);
            self.graph.remove_node(idx);
        }
        self.child_order.remove(&handle);
        self.graph.remove_node(handle)
    }

    // ─── Navigation ──────────────────────────────────────────────────────

    pub fn contains(&self, handle: DomHandle) -> bool {
        self.graph.contains_node(handle)
    }

    pub fn node(&self, handle: DomHandle) -> Option<&DomNode> {
        self.graph.node_weight(handle)
    }

    pub fn element(&self, handle: DomHandle) -> Option<&Element> {
        match self.graph.node_weight(handle)? {
            DomNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, handle: DomHandle) -> Option<&mut Element> {
        match self.graph.node_weight_mut(handle)? {
            DomNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn parent(&self, handle: DomHandle) -> Option<DomHandle> {
        self.graph
            .neighbors_directed(handle, Direction::Incoming)
            .next()
    }

    /// Children in document order.
    pub fn children(&self, handle: DomHandle) -> &[DomHandle] {
        self.child_order.get(&handle).map_or(&[], Vec::as_slice)
    }

    /// All descendants of `handle` in document (pre-)order, excluding itself.
    pub fn descendants(&self, handle: DomHandle) -> Vec<DomHandle> {
        let mut out = Vec::new();
        let mut stack: Vec<DomHandle> = self.children(handle).iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            out.push(idx);
            stack.extend(self.children(idx).iter().rev().copied());
        }
        out
    }

    /// Ancestors of `handle`, nearest first (excluding the document node).
    pub fn ancestors(&self, handle: DomHandle) -> impl Iterator<Item = DomHandle> + '_ {
        std::iter::successors(self.parent(handle), move |&p| self.parent(p))
            .filter(move |&p| p != self.document)
    }

    // ─── Attributes ──────────────────────────────────────────────────────

    pub fn attribute(&self, handle: DomHandle, name: &str) -> Option<&str> {
        self.element(handle)?.attribute(name)
    }

    /// Set an attribute. Returns `false` if `handle` is not an element.
    pub fn set_attribute(&mut self, handle: DomHandle, name: &str, value: &str) -> bool {
        match self.element_mut(handle) {
            Some(el) => {
                el.set_attribute(name, value);
                true
            }
            None => false,
        }
    }

    pub fn remove_attribute(&mut self, handle: DomHandle, name: &str) -> Option<String> {
        self.element_mut(handle)?.remove_attribute(name)
    }

    pub fn tag_of(&self, handle: DomHandle) -> Option<ElementTag> {
        self.element(handle)?.tag()
    }

    // ─── Text ────────────────────────────────────────────────────────────

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, handle: DomHandle) -> String {
        if let Some(DomNode::Text(t)) = self.node(handle) {
            return t.clone();
        }
        self.descendants(handle)
            .into_iter()
            .filter_map(|idx| match self.node(idx) {
                Some(DomNode::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Text of direct text-node children only.
    pub fn direct_text(&self, handle: DomHandle) -> String {
        self.children(handle)
            .iter()
            .filter_map(|&idx| match self.node(idx) {
                Some(DomNode::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node (`textContent = …`).
    pub fn set_text_content(&mut self, handle: DomHandle, text: &str) {
        let children: Vec<DomHandle> = self.children(handle).to_vec();
        for child in children {
            self.remove(child);
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(handle, node);
        }
    }

    // ─── Tagged elements ─────────────────────────────────────────────────

    /// All tagged elements in document order.
    pub fn tagged_elements(&self) -> Vec<DomHandle> {
        self.descendants(self.document)
            .into_iter()
            .filter(|&idx| self.element(idx).is_some_and(|el| el.has_attribute(TAG_ATTR)))
            .collect()
    }

    /// First element carrying `data-tag == tag`.
    pub fn find_by_tag(&self, tag: &str) -> Option<DomHandle> {
        self.descendants(self.document)
            .into_iter()
            .find(|&idx| self.attribute(idx, TAG_ATTR) == Some(tag))
    }

    /// The designated root: the `root`-tagged element, else the first tagged
    /// element in document order.
    pub fn designated_root(&self) -> Option<DomHandle> {
        self.find_by_tag(ROOT_TAG)
            .or_else(|| self.tagged_elements().into_iter().next())
    }

    /// Nearest tagged ancestor of `handle`.
    pub fn tagged_parent(&self, handle: DomHandle) -> Option<DomHandle> {
        self.ancestors(handle)
            .find(|&p| self.element(p).is_some_and(|el| el.has_attribute(TAG_ATTR)))
    }

    /// Tagged descendants whose nearest tagged ancestor is `handle`.
    /// Untagged wrappers are looked through.
    pub fn tagged_children(&self, handle: DomHandle) -> Vec<DomHandle> {
        let mut out = Vec::new();
        self.collect_tagged_children(handle, &mut out);
        out
    }

    fn collect_tagged_children(&self, handle: DomHandle, out: &mut Vec<DomHandle>) {
        for &child in self.children(handle) {
            if let Some(el) = self.element(child) {
                if el.has_attribute(TAG_ATTR) {
                    out.push(child);
                } else {
                    self.collect_tagged_children(child, out);
                }
            }
        }
    }

    // ─── Computed style ──────────────────────────────────────────────────

    /// Resolve a property the way `getComputedStyle` would for this model:
    /// inline declaration, then the parent's value for inherited properties,
    /// then the user-agent default. Colors come back as `rgb()`.
    pub fn computed_style(&self, handle: DomHandle, property: &str) -> String {
        let Some(el) = self.element(handle) else {
            return String::new();
        };
        if let Some(value) = el.style.get(property) {
            return normalize_computed(property, value);
        }
        if INHERITED_PROPERTIES.contains(&property)
            && let Some(parent) = self.parent(handle)
            && self.element(parent).is_some()
        {
            return self.computed_style(parent, property);
        }
        normalize_computed(property, user_agent_default(&el.name, property))
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

const INHERITED_PROPERTIES: &[&str] = &[
    "color",
    "font-family",
    "font-size",
    "font-weight",
    "line-height",
    "text-align",
];

const BLOCK_ELEMENTS: &[&str] = &[
    "html", "body", "div", "p", "section", "header", "footer", "main", "nav", "article", "aside",
    "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "form", "figure", "blockquote", "hr",
];

fn user_agent_default(element: &str, property: &str) -> &'static str {
    match property {
        "display" => match element {
            "li" => "list-item",
            "button" | "input" | "select" | "textarea" => "inline-block",
            "head" | "script" | "style" | "template" => "none",
            e if BLOCK_ELEMENTS.contains(&e) => "block",
            _ => "inline",
        },
        "position" => "static",
        "width" | "height" => "auto",
        "margin" => match element {
            "p" | "blockquote" | "ul" | "ol" => "16px 0px",
            "h1" => "21.44px 0px",
            "h2" => "19.92px 0px",
            "h3" => "18.72px 0px",
            "body" => "8px",
            _ => "0px",
        },
        "padding" => match element {
            "button" => "1px 6px",
            "ul" | "ol" => "0px 0px 0px 40px",
            _ => "0px",
        },
        "font-family" => "serif",
        "font-size" => match element {
            "h1" => "32px",
            "h2" => "24px",
            "h3" => "18.72px",
            "small" => "13.33px",
            _ => "16px",
        },
        "font-weight" => match element {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "strong" | "b" | "th" => "700",
            _ => "400",
        },
        "line-height" => "normal",
        "text-align" => "start",
        "color" => "rgb(0, 0, 0)",
        "background-color" => "rgba(0, 0, 0, 0)",
        "border" => "0px none rgb(0, 0, 0)",
        "border-radius" => "0px",
        _ => "",
    }
}

fn normalize_computed(property: &str, value: &str) -> String {
    if matches!(property, "color" | "background-color" | "border-color")
        && let Some(color) = Color::parse(value)
    {
        return color.to_css_rgb();
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomTree, DomHandle, DomHandle, DomHandle) {
        let mut dom = DomTree::new();
        let root = dom.create_element("div");
        dom.set_attribute(root, TAG_ATTR, "root");
        let doc = dom.document;
        dom.append_child(doc, root);

        let wrapper = dom.create_element("div");
        dom.append_child(root, wrapper);
        let title = dom.create_element("h1");
        dom.set_attribute(title, TAG_ATTR, "title");
        dom.append_child(wrapper, title);
        let text = dom.create_text("Hello");
        dom.append_child(title, text);
        (dom, root, wrapper, title)
    }

    #[test]
    fn tree_basics() {
        let (dom, root, wrapper, title) = sample();
        assert_eq!(dom.children(root), &[wrapper]);
        assert_eq!(dom.parent(title), Some(wrapper));
        assert_eq!(dom.text_content(root), "Hello");
        assert_eq!(dom.designated_root(), Some(root));
        assert_eq!(dom.find_by_tag("title"), Some(title));
        assert_eq!(dom.tagged_parent(title), Some(root));
        assert_eq!(dom.tagged_children(root), vec![title]);
        assert_eq!(dom.tagged_elements(), vec![root, title]);
    }

    #[test]
    fn insert_before_and_remove() {
        let (mut dom, root, wrapper, _title) = sample();
        let first = dom.create_element("p");
        dom.insert_before(root, first, Some(wrapper));
        assert_eq!(dom.children(root), &[first, wrapper]);

        dom.remove(wrapper);
        assert_eq!(dom.children(root), &[first]);
        assert!(dom.find_by_tag("title").is_none());
        assert_eq!(dom.graph.node_count(), 3); // document, root, p
    }

    #[test]
    fn set_text_content_replaces_children() {
        let (mut dom, _root, _wrapper, title) = sample();
        dom.set_text_content(title, "Bye");
        assert_eq!(dom.direct_text(title), "Bye");
        assert_eq!(dom.children(title).len(), 1);
    }

    #[test]
    fn style_attribute_is_parsed() {
        let (mut dom, root, _, _) = sample();
        dom.set_attribute(root, "style", "color: red; fontSize: 12px");
        let el = dom.element(root).unwrap();
        assert_eq!(el.style.get("font-size"), Some("12px"));
        assert!(el.attribute("style").is_none());
    }

    #[test]
    fn computed_style_cascade() {
        let (mut dom, root, _wrapper, title) = sample();
        assert_eq!(dom.computed_style(title, "color"), "rgb(0, 0, 0)");
        assert_eq!(dom.computed_style(title, "font-weight"), "700");
        assert_eq!(dom.computed_style(title, "display"), "block");

        dom.set_attribute(root, "style", "color: #ff0000");
        assert_eq!(dom.computed_style(title, "color"), "rgb(255, 0, 0)");
        // Non-inherited properties do not flow down.
        dom.set_attribute(root, "style", "color: #ff0000; width: 10px");
        assert_eq!(dom.computed_style(title, "width"), "auto");
    }

    #[test]
    fn lock_attribute() {
        let (mut dom, _root, _wrapper, title) = sample();
        assert!(!dom.element(title).unwrap().is_locked());
        dom.set_attribute(title, LOCK_ATTR, "");
        assert!(dom.element(title).unwrap().is_locked());
        dom.set_attribute(title, LOCK_ATTR, "false");
        assert!(!dom.element(title).unwrap().is_locked());
    }
}
