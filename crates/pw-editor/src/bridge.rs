//! Source-to-DOM bridge: selection snapshots and property edits on the
//! live document.
//!
//! Edits land on the live DOM first. The controller then regenerates source
//! from it, so a rejected or rolled-back edit never reaches the file.

use pw_core::css::{self, CssError, camel_to_kebab};
use pw_core::dom::{DomHandle, DomTree};
use pw_core::id::{ElementTag, LOCK_ATTR, SELECTED_ATTR};
use std::collections::HashMap;
use thiserror::Error;

/// Computed properties captured in every selection snapshot, in panel order.
pub const OBSERVED_PROPERTIES: &[&str] = &[
    "display",
    "position",
    "width",
    "height",
    "margin",
    "padding",
    "font-family",
    "font-size",
    "font-weight",
    "line-height",
    "text-align",
    "color",
    "background-color",
    "border",
    "border-radius",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("node is not a tagged element")]
    NotTagged,

    #[error("element not found: {0}")]
    NotFound(ElementTag),

    #[error("element {0} is locked")]
    Locked(ElementTag),

    #[error("unknown property `{0}`")]
    UnknownProperty(String),

    #[error("invalid value: {0}")]
    InvalidValue(#[from] CssError),

    #[error("`{value}` is not a valid {attribute}")]
    InvalidAttribute { attribute: &'static str, value: String },

    #[error("{property} did not take `{expected}` (read back {found:?}); edit rolled back")]
    VerificationFailed {
        property: String,
        expected: String,
        found: String,
    },
}

/// Plain snapshot of the selected element. Replaced wholesale on every
/// selection or edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedElement {
    pub tag: ElementTag,
    /// Lower-case element name.
    pub element: String,
    pub id: Option<String>,
    pub class: Option<String>,
    pub text: String,
    pub locked: bool,
    /// Computed values for [`OBSERVED_PROPERTIES`], in that order.
    pub styles: Vec<(String, String)>,
}

impl SelectedElement {
    /// Computed value of an observed property.
    pub fn style(&self, property: &str) -> Option<&str> {
        self.styles
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }
}

/// What an `apply_property` key addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKey {
    /// Inline style declaration, kebab-case.
    Style(String),
    TextContent,
    Id,
    Class,
}

impl PropertyKey {
    /// Parse `style.<camelOrKebab>`, `textContent`, `id`, `class`/`className`.
    pub fn parse(key: &str) -> Result<Self, BridgeError> {
        if let Some(name) = key.strip_prefix("style.") {
            let kebab = camel_to_kebab(name.trim());
            css::validate_property(&kebab)?;
            return Ok(PropertyKey::Style(kebab));
        }
        match key {
            "textContent" => Ok(PropertyKey::TextContent),
            "id" => Ok(PropertyKey::Id),
            "class" | "className" => Ok(PropertyKey::Class),
            _ => Err(BridgeError::UnknownProperty(key.to_string())),
        }
    }

    fn label(&self) -> String {
        match self {
            PropertyKey::Style(p) => format!("style.{p}"),
            PropertyKey::TextContent => "textContent".to_string(),
            PropertyKey::Id => "id".to_string(),
            PropertyKey::Class => "class".to_string(),
        }
    }
}

/// Snapshot a tagged element without touching the selection marker.
pub fn snapshot(document: &DomTree, handle: DomHandle) -> Result<SelectedElement, BridgeError> {
    let el = document.element(handle).ok_or(BridgeError::NotTagged)?;
    let tag = el.tag().ok_or(BridgeError::NotTagged)?;
    let styles = OBSERVED_PROPERTIES
        .iter()
        .map(|&p| (p.to_string(), document.computed_style(handle, p)))
        .collect();
    Ok(SelectedElement {
        tag,
        element: el.name.to_ascii_lowercase(),
        id: el.attribute("id").map(str::to_string),
        class: el.attribute("class").map(str::to_string),
        text: document.text_content(handle),
        locked: el.is_locked(),
        styles,
    })
}

/// Select a node. The `data-selected` marker moves to it exclusively.
pub fn select_at(document: &mut DomTree, handle: DomHandle) -> Result<SelectedElement, BridgeError> {
    let selected = snapshot(document, handle)?;
    clear_selection(document);
    document.set_attribute(handle, SELECTED_ATTR, "");
    log::debug!("selected {}", selected.tag);
    Ok(selected)
}

/// Remove the selection marker from every node.
pub fn clear_selection(document: &mut DomTree) {
    let marked: Vec<DomHandle> = document
        .descendants(document.document)
        .into_iter()
        .filter(|&h| document.attribute(h, SELECTED_ATTR).is_some())
        .collect();
    for h in marked {
        document.remove_attribute(h, SELECTED_ATTR);
    }
}

/// Validate, write, and verify one property edit on the selected element.
///
/// The element is re-resolved by tag, so a selection taken before a reload
/// still addresses the same element afterwards. On verification failure the
/// document is restored and nothing else changes.
pub fn apply_property(
    document: &mut DomTree,
    selection: &SelectedElement,
    property: &str,
    value: &str,
) -> Result<SelectedElement, BridgeError> {
    let handle = document
        .find_by_tag(selection.tag.as_str())
        .ok_or(BridgeError::NotFound(selection.tag))?;
    if document.element(handle).is_some_and(|el| el.is_locked()) {
        return Err(BridgeError::Locked(selection.tag));
    }
    let key = PropertyKey::parse(property)?;
    validate(&key, value)?;

    let before = document.clone();
    write(document, handle, &key, value);
    let found = read_back(document, handle, &key);
    let expected = value.trim().to_string();
    if found != expected {
        *document = before;
        log::warn!("rolled back {} on {}: read back {found:?}", key.label(), selection.tag);
        return Err(BridgeError::VerificationFailed {
            property: key.label(),
            expected,
            found,
        });
    }
    log::debug!("applied {} = {value:?} on {}", key.label(), selection.tag);
    snapshot(document, handle)
}

fn validate(key: &PropertyKey, value: &str) -> Result<(), BridgeError> {
    match key {
        PropertyKey::Style(p) => Ok(css::validate_value(p, value)?),
        PropertyKey::TextContent => Ok(()),
        PropertyKey::Id => {
            if value.chars().any(|c| c.is_whitespace() || c == '"') {
                Err(BridgeError::InvalidAttribute {
                    attribute: "id",
                    value: value.to_string(),
                })
            } else {
                Ok(())
            }
        }
        PropertyKey::Class => {
            if value.contains('"') {
                Err(BridgeError::InvalidAttribute {
                    attribute: "class",
                    value: value.to_string(),
                })
            } else {
                Ok(())
            }
        }
    }
}

/// Write the way a browser would: style edits go through the declaration
/// text, so anything the style parser would drop is dropped here too.
fn write(document: &mut DomTree, handle: DomHandle, key: &PropertyKey, value: &str) {
    let value = value.trim();
    match key {
        PropertyKey::Style(p) => {
            let Some(el) = document.element_mut(handle) else {
                return;
            };
            let mut style = el.style.clone();
            if value.is_empty() {
                style.remove(p);
            } else {
                style.set(p, value);
            }
            el.set_attribute("style", &style.to_css_text());
        }
        PropertyKey::TextContent => document.set_text_content(handle, value),
        PropertyKey::Id | PropertyKey::Class => {
            let name = if *key == PropertyKey::Id { "id" } else { "class" };
            if value.is_empty() {
                document.remove_attribute(handle, name);
            } else {
                document.set_attribute(handle, name, value);
            }
        }
    }
}

fn read_back(document: &DomTree, handle: DomHandle, key: &PropertyKey) -> String {
    match key {
        PropertyKey::Style(p) => document
            .element(handle)
            .and_then(|el| el.style.get(p))
            .unwrap_or_default()
            .to_string(),
        PropertyKey::TextContent => document.text_content(handle),
        PropertyKey::Id => document.attribute(handle, "id").unwrap_or_default().to_string(),
        PropertyKey::Class => document.attribute(handle, "class").unwrap_or_default().to_string(),
    }
}

// ─── Layer-panel operations ──────────────────────────────────────────────

/// Visibility and lock toggles for the layer panel.
///
/// Hiding remembers the element's previous inline `display` so showing it
/// again restores that value rather than dropping the declaration.
#[derive(Debug, Default)]
pub struct LayerControls {
    hidden_display: HashMap<ElementTag, String>,
}

impl LayerControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_visible(&mut self, document: &mut DomTree, tag: ElementTag, visible: bool) -> Result<(), BridgeError> {
        let handle = document.find_by_tag(tag.as_str()).ok_or(BridgeError::NotFound(tag))?;
        let el = document.element_mut(handle).ok_or(BridgeError::NotTagged)?;
        let current = el.style.get("display").map(str::to_string);
        if visible {
            if current.as_deref() != Some("none") {
                return Ok(());
            }
            match self.hidden_display.remove(&tag) {
                Some(prior) => el.style.set("display", &prior),
                None => {
                    el.style.remove("display");
                }
            }
        } else {
            if current.as_deref() == Some("none") {
                return Ok(());
            }
            if let Some(prior) = current {
                self.hidden_display.insert(tag, prior);
            }
            el.style.set("display", "none");
        }
        log::debug!("{tag} visible = {visible}");
        Ok(())
    }

    pub fn set_locked(&mut self, document: &mut DomTree, tag: ElementTag, locked: bool) -> Result<(), BridgeError> {
        let handle = document.find_by_tag(tag.as_str()).ok_or(BridgeError::NotFound(tag))?;
        if locked {
            document.set_attribute(handle, LOCK_ATTR, "");
        } else {
            document.remove_attribute(handle, LOCK_ATTR);
        }
        log::debug!("{tag} locked = {locked}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use pw_core::render::mount;
    use pw_core::scanner::scan;

    const SRC: &str = r#"export default function App() {
  return (
    <div data-tag="root">
      <h1 data-tag="title" id="main-title" className="hero big">Welcome</h1>
      <p data-tag="intro" style={{ display: 'flex' }}>Hello</p>
      <p data-tag="legal" data-locked>Terms</p>
    </div>
  );
}
"#;

    fn doc() -> DomTree {
        mount(SRC).unwrap()
    }

    fn sel(doc: &mut DomTree, tag: &str) -> SelectedElement {
        let h = doc.find_by_tag(tag).unwrap();
        select_at(doc, h).unwrap()
    }

    #[test]
    fn snapshot_fields() {
        let mut doc = doc();
        let s = sel(&mut doc, "title");
        assert_eq!(s.element, "h1");
        assert_eq!(s.id.as_deref(), Some("main-title"));
        assert_eq!(s.class.as_deref(), Some("hero big"));
        assert_eq!(s.text, "Welcome");
        assert_eq!(s.styles.len(), OBSERVED_PROPERTIES.len());
        assert_eq!(s.style("color"), Some("rgb(0, 0, 0)"));
    }

    #[test]
    fn selection_is_exclusive() {
        let mut doc = doc();
        sel(&mut doc, "title");
        sel(&mut doc, "intro");
        let marked: Vec<_> = doc
            .tagged_elements()
            .into_iter()
            .filter(|&h| doc.attribute(h, SELECTED_ATTR).is_some())
            .filter_map(|h| doc.tag_of(h))
            .collect();
        assert_eq!(marked, vec![ElementTag::intern("intro")]);
    }

    #[test]
    fn untagged_node_cannot_be_selected() {
        let mut doc = doc();
        let body = doc.find_by_tag("root").and_then(|h| doc.parent(h)).unwrap();
        assert_eq!(select_at(&mut doc, body).unwrap_err(), BridgeError::NotTagged);
    }

    #[test]
    fn property_keys() {
        assert_eq!(
            PropertyKey::parse("style.backgroundColor").unwrap(),
            PropertyKey::Style("background-color".into())
        );
        assert_eq!(
            PropertyKey::parse("style.font-size").unwrap(),
            PropertyKey::Style("font-size".into())
        );
        assert_eq!(PropertyKey::parse("className").unwrap(), PropertyKey::Class);
        assert!(matches!(
            PropertyKey::parse("onClick"),
            Err(BridgeError::UnknownProperty(_))
        ));
        assert!(PropertyKey::parse("style.9x").is_err());
    }

    #[test]
    fn style_edit_touches_only_target() {
        let mut doc = doc();
        let s = sel(&mut doc, "title");
        let before = scan(&doc).into_layers().unwrap().snapshot();
        let after = apply_property(&mut doc, &s, "style.color", "#ff0000").unwrap();
        assert_eq!(after.style("color"), Some("rgb(255, 0, 0)"));

        let intro = doc.find_by_tag("intro").unwrap();
        assert_eq!(doc.computed_style(intro, "color"), "rgb(0, 0, 0)");
        assert_eq!(scan(&doc).into_layers().unwrap().snapshot(), before);
    }

    #[test]
    fn empty_style_value_removes_declaration() {
        let mut doc = doc();
        let s = sel(&mut doc, "intro");
        let after = apply_property(&mut doc, &s, "style.display", "").unwrap();
        assert_eq!(after.style("display"), Some("block"));
        let h = doc.find_by_tag("intro").unwrap();
        assert!(doc.element(h).unwrap().style.is_empty());
    }

    #[test]
    fn text_id_and_class_edits() {
        let mut doc = doc();
        let s = sel(&mut doc, "title");
        let s = apply_property(&mut doc, &s, "textContent", "Hi there").unwrap();
        assert_eq!(s.text, "Hi there");
        let s = apply_property(&mut doc, &s, "id", "").unwrap();
        assert_eq!(s.id, None);
        let s = apply_property(&mut doc, &s, "class", "hero").unwrap();
        assert_eq!(s.class.as_deref(), Some("hero"));
        assert!(matches!(
            apply_property(&mut doc, &s, "id", "two words"),
            Err(BridgeError::InvalidAttribute { .. })
        ));
    }

    #[test]
    fn invalid_values_leave_document_unchanged() {
        let mut doc = doc();
        let s = sel(&mut doc, "title");
        for (prop, value) in [
            ("style.color", "notacolor"),
            ("style.width", "wide"),
            ("style.color", "red; background: blue"),
            ("style.fontFamily", "'Inter"),
        ] {
            assert!(apply_property(&mut doc, &s, prop, value).is_err(), "{prop}={value}");
        }
        let h = doc.find_by_tag("title").unwrap();
        assert!(doc.element(h).unwrap().style.is_empty());
    }

    #[test]
    fn locked_element_rejects_edits() {
        let mut doc = doc();
        let s = sel(&mut doc, "legal");
        assert!(s.locked);
        assert_eq!(
            apply_property(&mut doc, &s, "textContent", "x").unwrap_err(),
            BridgeError::Locked(ElementTag::intern("legal"))
        );
    }

    #[test]
    fn visibility_restores_prior_display() {
        let mut doc = doc();
        let mut controls = LayerControls::new();
        let intro = ElementTag::intern("intro");
        controls.set_visible(&mut doc, intro, false).unwrap();
        let layers = scan(&doc).into_layers().unwrap();
        assert!(!layers.get(intro).unwrap().visible);

        controls.set_visible(&mut doc, intro, true).unwrap();
        let h = doc.find_by_tag("intro").unwrap();
        assert_eq!(doc.element(h).unwrap().style.get("display"), Some("flex"));

        let title = ElementTag::intern("title");
        controls.set_visible(&mut doc, title, false).unwrap();
        controls.set_visible(&mut doc, title, true).unwrap();
        let h = doc.find_by_tag("title").unwrap();
        assert!(doc.element(h).unwrap().style.is_empty());
    }

    #[test]
    fn lock_toggle() {
        let mut doc = doc();
        let mut controls = LayerControls::new();
        let title = ElementTag::intern("title");
        controls.set_locked(&mut doc, title, true).unwrap();
        assert!(scan(&doc).into_layers().unwrap().get(title).unwrap().locked);
        controls.set_locked(&mut doc, title, false).unwrap();
        assert!(!scan(&doc).into_layers().unwrap().get(title).unwrap().locked);
        assert_eq!(
            controls.set_locked(&mut doc, ElementTag::intern("nope"), true),
            Err(BridgeError::NotFound(ElementTag::intern("nope")))
        );
    }
}
