//! DOM Scanner: live document → layer tree.
//!
//! Collects every tagged element in document order and rebuilds the layer
//! hierarchy from nearest-tagged-ancestor links. Depth and links are always
//! recomputed; nothing is carried over from an earlier scan.

use crate::dom::{DomHandle, DomTree};
use crate::id::ElementTag;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One entry of the layer panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerNode {
    pub tag: ElementTag,
    /// Display name: tag (when it differs from the element name), `id`,
    /// first class, then element name.
    pub name: String,
    /// Lower-case element name.
    pub element: String,
    /// Tagged children in document order.
    pub children: Vec<ElementTag>,
    pub visible: bool,
    pub locked: bool,
    /// Tagged ancestors up to and including the designated root.
    pub depth: usize,
    pub parent: Option<ElementTag>,
    /// Scan-time position in document order.
    pub order: usize,
    /// Live node. Only meaningful for the document this scan came from.
    #[serde(skip)]
    pub handle: Option<DomHandle>,
}

/// Structural projection of a layer, for comparing scans across reloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerShape {
    pub tag: ElementTag,
    pub element: String,
    pub parent: Option<ElementTag>,
    pub depth: usize,
    pub order: usize,
}

/// All layers of one document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerTree {
    pub layers: Vec<LayerNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// The document holds no tagged elements.
    Empty,
    Layers(LayerTree),
}

impl ScanOutcome {
    pub fn layers(&self) -> Option<&LayerTree> {
        match self {
            ScanOutcome::Layers(tree) => Some(tree),
            ScanOutcome::Empty => None,
        }
    }

    pub fn into_layers(self) -> Option<LayerTree> {
        match self {
            ScanOutcome::Layers(tree) => Some(tree),
            ScanOutcome::Empty => None,
        }
    }
}

impl LayerTree {
    pub fn iter(&self) -> impl Iterator<Item = &LayerNode> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, tag: ElementTag) -> Option<&LayerNode> {
        self.layers.iter().find(|l| l.tag == tag)
    }

    /// Layers without a tagged parent.
    pub fn roots(&self) -> impl Iterator<Item = &LayerNode> {
        self.layers.iter().filter(|l| l.parent.is_none())
    }

    pub fn children_of(&self, tag: ElementTag) -> Vec<&LayerNode> {
        self.get(tag)
            .map(|l| l.children.iter().filter_map(|&c| self.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn shape(&self) -> Vec<LayerShape> {
        self.layers
            .iter()
            .map(|l| LayerShape {
                tag: l.tag,
                element: l.element.clone(),
                parent: l.parent,
                depth: l.depth,
                order: l.order,
            })
            .collect()
    }

    /// Copy without live handles, safe to persist or compare across sessions.
    pub fn snapshot(&self) -> LayerTree {
        let mut copy = self.clone();
        for layer in &mut copy.layers {
            layer.handle = None;
        }
        copy
    }
}

/// Scan the document for tagged elements.
#[must_use]
pub fn scan(document: &DomTree) -> ScanOutcome {
    let tagged = document.tagged_elements();
    if tagged.is_empty() {
        return ScanOutcome::Empty;
    }
    let root = document.designated_root();

    let mut seen = HashSet::new();
    let mut layers: Vec<LayerNode> = Vec::with_capacity(tagged.len());
    // Layer index by live node; parents are linked by node, not by tag.
    let mut by_handle: HashMap<DomHandle, usize> = HashMap::with_capacity(tagged.len());
    for handle in tagged {
        let Some(el) = document.element(handle) else {
            continue;
        };
        let Some(tag) = el.tag() else {
            continue;
        };
        if !seen.insert(tag) {
            log::warn!("duplicate tag {tag} in document; keeping the first occurrence");
            continue;
        }

        let element = el.name.to_ascii_lowercase();
        let name = display_name(tag.as_str(), el, &element);
        // Document order puts every ancestor's layer before its descendants.
        let parent = if Some(handle) == root {
            None
        } else {
            document
                .ancestors(handle)
                .find_map(|a| by_handle.get(&a).copied())
        };
        let depth = parent.map_or(0, |p| layers[p].depth + 1);
        if let Some(p) = parent {
            layers[p].children.push(tag);
        }

        let parent_tag = parent.map(|p| layers[p].tag);
        let order = layers.len();
        by_handle.insert(handle, order);
        layers.push(LayerNode {
            tag,
            name,
            element,
            children: Vec::new(),
            visible: el.style.get("display").is_none_or(|d| d.trim() != "none"),
            locked: el.is_locked(),
            depth,
            parent: parent_tag,
            order,
            handle: Some(handle),
        });
    }

    log::trace!("scanned {} layers", layers.len());
    ScanOutcome::Layers(LayerTree { layers })
}

fn display_name(tag: &str, el: &crate::dom::Element, element: &str) -> String {
    if tag != element {
        return tag.to_string();
    }
    if let Some(id) = el.attribute("id").filter(|s| !s.is_empty()) {
        return id.to_string();
    }
    if let Some(class) = el.first_class() {
        return class.to_string();
    }
    element.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{LOCK_ATTR, TAG_ATTR};
    use crate::render::mount;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"export default function App() {
  return (
    <div data-tag="root">
      <header data-tag="header" className="top bar">
        <nav data-tag="nav" id="main-nav">
          <a data-tag="a" href="/">Home</a>
        </nav>
      </header>
      <div>
        <p data-tag="p" style={{ display: 'none' }}>hidden</p>
      </div>
      <img data-tag="logo" src="x.png" data-locked />
    </div>
  );
}
"#;

    #[test]
    fn scan_layers() {
        let dom = mount(PAGE).unwrap();
        let tree = scan(&dom).into_layers().unwrap();
        let tags: Vec<_> = tree.iter().map(|l| l.tag.as_str()).collect();
        assert_eq!(tags, vec!["root", "header", "nav", "a", "p", "logo"]);

        let root = tree.get(ElementTag::root()).unwrap();
        assert_eq!(root.depth, 0);
        assert_eq!(root.parent, None);
        let kids: Vec<_> = root.children.iter().map(|t| t.as_str()).collect();
        assert_eq!(kids, vec!["header", "p", "logo"]);

        let a = tree.get(ElementTag::intern("a")).unwrap();
        assert_eq!(a.depth, 3);
        assert_eq!(a.parent, Some(ElementTag::intern("nav")));
        // Tag equals element name, so the display name falls through.
        assert_eq!(a.name, "a");

        // Untagged wrapper does not add depth.
        let p = tree.get(ElementTag::intern("p")).unwrap();
        assert_eq!(p.depth, 1);
        assert!(!p.visible);
        assert_eq!(p.name, "p");

        assert!(tree.get(ElementTag::intern("logo")).unwrap().locked);
        assert_eq!(tree.get(ElementTag::intern("header")).unwrap().name, "top");
        assert_eq!(tree.roots().count(), 1);
        assert_eq!(tree.children_of(ElementTag::intern("header")).len(), 1);
    }

    #[test]
    fn display_name_precedence() {
        let mut dom = DomTree::new();
        let doc = dom.document;
        let nav = dom.create_element("nav");
        dom.set_attribute(nav, TAG_ATTR, "nav");
        dom.set_attribute(nav, "id", "main");
        dom.append_child(doc, nav);
        let p = dom.create_element("p");
        dom.set_attribute(p, TAG_ATTR, "p");
        dom.set_attribute(p, "class", "lead big");
        dom.append_child(nav, p);
        let tree = scan(&dom).into_layers().unwrap();
        assert_eq!(tree.layers[0].name, "main");
        assert_eq!(tree.layers[1].name, "lead");
    }

    #[test]
    fn scan_is_idempotent() {
        let dom = mount(PAGE).unwrap();
        assert_eq!(scan(&dom), scan(&dom));
    }

    #[test]
    fn empty_document() {
        let dom = mount("export default function App() { return null; }").unwrap();
        assert_eq!(scan(&dom), ScanOutcome::Empty);
    }

    #[test]
    fn snapshot_drops_handles() {
        let mut dom = mount(PAGE).unwrap();
        let logo = dom.find_by_tag("logo").unwrap();
        dom.set_attribute(logo, LOCK_ATTR, "false");
        let tree = scan(&dom).into_layers().unwrap();
        assert!(!tree.get(ElementTag::intern("logo")).unwrap().locked);
        let snap = tree.snapshot();
        assert!(snap.iter().all(|l| l.handle.is_none()));
        assert_eq!(snap.shape(), tree.shape());
    }

    #[test]
    fn duplicate_tags_keep_first() {
        let mut dom = mount(PAGE).unwrap();
        let root = dom.designated_root().unwrap();
        let dup = dom.create_element("span");
        dom.set_attribute(dup, TAG_ATTR, "nav");
        dom.append_child(root, dup);
        let tree = scan(&dom).into_layers().unwrap();
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.get(ElementTag::intern("nav")).unwrap().element, "nav");
    }

    #[test]
    fn duplicate_tag_children_link_by_node() {
        let mut dom = mount(PAGE).unwrap();
        let root = dom.designated_root().unwrap();
        let dup = dom.create_element("section");
        dom.set_attribute(dup, TAG_ATTR, "nav");
        dom.append_child(root, dup);
        let child = dom.create_element("em");
        dom.set_attribute(child, TAG_ATTR, "note");
        dom.append_child(dup, child);

        let tree = scan(&dom).into_layers().unwrap();
        // The duplicate has no layer, so its child hangs off the next
        // layered ancestor rather than the first `nav`.
        let note = tree.get(ElementTag::intern("note")).unwrap();
        assert_eq!(note.parent, Some(ElementTag::root()));
        assert_eq!(note.depth, 1);
        let nav_kids: Vec<_> = tree
            .children_of(ElementTag::intern("nav"))
            .iter()
            .map(|l| l.tag.as_str())
            .collect();
        assert_eq!(nav_kids, vec!["a"]);
    }
}
