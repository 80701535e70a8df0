//! WASM bridge for Pagewright: exposes the sync engine to the browser editor.
//!
//! Compiled via `wasm-pack build --target web`. Every call returns JSON:
//! `{"ok":true,...}` or `{"ok":false,"error":"..."}`.
//!
//! In the browser there is no separate render runtime to wait on, and no
//! async timer to drive `SyncController` with, so `PwDocument` mounts its own
//! live DOM in-process after every change. Each call settles before it
//! returns, which is why it carries no generation counter or sync state.
//! The edit steps themselves are the controller's, from `pw_editor::ops`.

use pw_core::dom::DomTree;
use pw_core::generator::{GeneratorConfig, regenerate};
use pw_core::id::{ElementTag, TagAllocator};
use pw_core::lint::lint_source;
use pw_core::render::mount;
use pw_core::scanner::{ScanOutcome, scan};
use pw_core::splice::{self, Insertion, InsertionAnchor};
use pw_editor::bridge::{self, LayerControls, SelectedElement};
use pw_editor::history::History;
use pw_editor::ops;
use pw_editor::sync::EditOp;
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt::Display;
use wasm_bindgen::prelude::*;

/// One editable component document.
#[wasm_bindgen]
pub struct PwDocument {
    source: String,
    dom: Option<DomTree>,
    tags: TagAllocator,
    controls: LayerControls,
    history: History,
    selection: Option<SelectedElement>,
    last_error: Option<String>,
}

#[wasm_bindgen]
impl PwDocument {
    #[wasm_bindgen(constructor)]
    pub fn new(source: &str) -> Self {
        let mut doc = Self {
            source: source.to_string(),
            dom: None,
            tags: TagAllocator::new(),
            controls: LayerControls::new(),
            history: History::new(200),
            selection: None,
            last_error: None,
        };
        doc.remount();
        doc
    }

    pub fn get_source(&self) -> String {
        self.source.clone()
    }

    /// Error from the last mount, or empty.
    pub fn last_error(&self) -> String {
        self.last_error.clone().unwrap_or_default()
    }

    /// Replace the source from the code editor. Returns `false` if the new
    /// source does not mount.
    pub fn set_source(&mut self, text: &str) -> bool {
        self.commit(text.to_string(), "edit source");
        self.dom.is_some()
    }

    pub fn layers_json(&self) -> String {
        match &self.dom {
            Some(dom) => layers_result(scan(dom)),
            None => error_json(self.last_error.as_deref().unwrap_or("document is not loaded")),
        }
    }

    /// Allocate a fresh tag for a new element. Empty when nothing is mounted.
    pub fn assign_tag(&mut self, hint: &str) -> String {
        match pw_core::assign_tag(&mut self.tags, self.dom.as_ref(), hint) {
            Ok(tag) => tag.to_string(),
            Err(_) => String::new(),
        }
    }

    pub fn select(&mut self, tag: &str) -> String {
        let Some(dom) = self.dom.as_mut() else {
            return error_json("document is not loaded");
        };
        let Some(handle) = dom.find_by_tag(tag) else {
            return error_json(format!("tag not found: {tag}"));
        };
        match bridge::select_at(dom, handle) {
            Ok(selected) => {
                let out = json!({ "ok": true, "selection": selection_json(&selected) });
                self.selection = Some(selected);
                out.to_string()
            }
            Err(e) => error_json(e),
        }
    }

    /// Apply a property edit (`style.color`, `textContent`, `id`, `class`)
    /// to a tagged element and regenerate the source.
    pub fn apply_property(&mut self, tag: &str, property: &str, value: &str) -> String {
        self.dom_edit(EditOp::ApplyProperty {
            target: ElementTag::intern(tag),
            property: property.to_string(),
            value: value.to_string(),
        })
    }

    pub fn set_visible(&mut self, tag: &str, visible: bool) -> String {
        self.dom_edit(EditOp::SetVisible {
            target: ElementTag::intern(tag),
            visible,
        })
    }

    pub fn set_locked(&mut self, tag: &str, locked: bool) -> String {
        self.dom_edit(EditOp::SetLocked {
            target: ElementTag::intern(tag),
            locked,
        })
    }

    /// Splice a fragment into the source. Colliding fragment tags are
    /// rewritten before insertion.
    pub fn insert(&mut self, fragment: &str, anchor_hint: Option<String>) -> String {
        let hint = anchor_hint.as_deref().map(ElementTag::intern);
        match ops::insert_fragment(&self.source, fragment, hint, &mut self.tags) {
            Ok(inserted) => {
                let out = insertion_json(&inserted);
                self.commit(inserted.source, "insert element");
                out
            }
            Err(e) => error_json(e),
        }
    }

    pub fn remove(&mut self, tag: &str) -> String {
        match splice::remove(&self.source, ElementTag::intern(tag)) {
            Ok(removed) => {
                let out = json!({
                    "ok": true,
                    "firstLine": removed.first_line,
                    "lastLine": removed.last_line,
                });
                self.commit(removed.source, &format!("remove {tag}"));
                out.to_string()
            }
            Err(e) => error_json(e),
        }
    }

    pub fn undo(&mut self) -> bool {
        let Some(text) = self.history.undo().map(|s| s.text_before.clone()) else {
            return false;
        };
        self.source = text;
        self.remount();
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(text) = self.history.redo().map(|s| s.text_after.clone()) else {
            return false;
        };
        self.source = text;
        self.remount();
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

impl PwDocument {
    fn dom_edit(&mut self, op: EditOp) -> String {
        let Some(dom) = self.dom.as_mut() else {
            return error_json("document is not loaded");
        };
        let updated = match ops::apply_dom_edit(dom, &mut self.controls, &op) {
            Ok(updated) => updated,
            Err(e) => return error_json(e),
        };
        if let Err(e) = self.regenerate_and_commit(&op.describe()) {
            return error_json(e);
        }
        match updated {
            Some(selected) => json!({ "ok": true, "selection": selection_json(&selected) }).to_string(),
            None => ok_json(),
        }
    }

    fn commit(&mut self, text: String, description: &str) {
        self.history.record(&self.source, &text, description);
        self.source = text;
        self.remount();
    }

    fn regenerate_and_commit(&mut self, description: &str) -> Result<(), pw_core::GenerateError> {
        let Some(dom) = &self.dom else {
            return Ok(());
        };
        let text = regenerate(dom, &GeneratorConfig::from_source(&self.source))?;
        self.commit(text, description);
        Ok(())
    }

    fn remount(&mut self) {
        match mount(&self.source) {
            Ok(mut dom) => {
                for handle in dom.tagged_elements() {
                    if let Some(tag) = dom.tag_of(handle) {
                        self.tags.reserve(tag);
                    }
                }
                if let Some(tag) = self.selection.as_ref().map(|s| s.tag) {
                    self.selection = dom
                        .find_by_tag(tag.as_str())
                        .and_then(|h| bridge::select_at(&mut dom, h).ok());
                }
                self.dom = Some(dom);
                self.last_error = None;
            }
            Err(e) => {
                log::warn!("mount failed: {e}");
                self.dom = None;
                self.last_error = Some(e.to_string());
            }
        }
    }
}

// ─── Standalone functions (no document state) ────────────────────────────

/// Mount source and return its layer tree.
#[wasm_bindgen]
pub fn scan_source(source: &str) -> String {
    match mount(source) {
        Ok(dom) => layers_result(scan(&dom)),
        Err(e) => error_json(e),
    }
}

/// Mount source and regenerate it canonically.
#[wasm_bindgen]
pub fn regenerate_source(source: &str) -> String {
    let result = mount(source)
        .map_err(|e| e.to_string())
        .and_then(|dom| {
            regenerate(&dom, &GeneratorConfig::from_source(source)).map_err(|e| e.to_string())
        });
    match result {
        Ok(text) => json!({ "ok": true, "source": text }).to_string(),
        Err(e) => error_json(e),
    }
}

#[wasm_bindgen]
pub fn insert_fragment(source: &str, fragment: &str, anchor_hint: Option<String>) -> String {
    match splice::insert(source, fragment, anchor_hint.as_deref().map(ElementTag::intern)) {
        Ok(inserted) => insertion_json(&inserted),
        Err(e) => error_json(e),
    }
}

#[wasm_bindgen]
pub fn remove_element(source: &str, tag: &str) -> String {
    match splice::remove(source, ElementTag::intern(tag)) {
        Ok(removed) => json!({
            "ok": true,
            "source": removed.source,
            "firstLine": removed.first_line,
            "lastLine": removed.last_line,
        })
        .to_string(),
        Err(e) => error_json(e),
    }
}

/// Lint diagnostics as a JSON array.
#[wasm_bindgen]
pub fn lint(source: &str) -> String {
    serde_json::to_string(&lint_source(source)).unwrap_or_else(|_| "[]".to_string())
}

// ─── JSON helpers ────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertionResult<'a> {
    ok: bool,
    source: &'a str,
    tag: &'a str,
    anchor: &'static str,
    anchor_tag: Option<&'a str>,
}

fn insertion_json(inserted: &Insertion) -> String {
    let (anchor, anchor_tag) = match &inserted.anchor {
        InsertionAnchor::Container(t) => ("container", Some(t.as_str())),
        InsertionAnchor::Root(t) => ("root", Some(t.as_str())),
        InsertionAnchor::TopLevel(t) => ("top-level", t.as_ref().map(ElementTag::as_str)),
        InsertionAnchor::Hint(t) => ("hint", Some(t.as_str())),
        InsertionAnchor::Synthesized => ("synthesized", None),
    };
    let result = InsertionResult {
        ok: true,
        source: &inserted.source,
        tag: inserted.tag.as_str(),
        anchor,
        anchor_tag,
    };
    serde_json::to_string(&result).unwrap_or_else(error_json)
}

fn layers_result(outcome: ScanOutcome) -> String {
    let layers = outcome.into_layers().unwrap_or_default();
    match serde_json::to_value(&layers.layers) {
        Ok(value) => json!({ "ok": true, "layers": value }).to_string(),
        Err(e) => error_json(e),
    }
}

fn selection_json(selected: &SelectedElement) -> Value {
    let styles: serde_json::Map<String, Value> = selected
        .styles
        .iter()
        .map(|(p, v)| (p.clone(), Value::String(v.clone())))
        .collect();
    json!({
        "tag": selected.tag.as_str(),
        "element": selected.element,
        "id": selected.id,
        "class": selected.class,
        "text": selected.text,
        "locked": selected.locked,
        "styles": styles,
    })
}

fn ok_json() -> String {
    r#"{"ok":true}"#.to_string()
}

fn error_json(message: impl Display) -> String {
    json!({ "ok": false, "error": message.to_string() }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SRC: &str = r#"export default function App() {
  return (
    <div data-tag="root">
      <div data-tag="container">
        <p data-tag="para">Hello</p>
      </div>
    </div>
  );
}
"#;

    fn parse(json: &str) -> Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn scan_source_lists_layers() {
        let v = parse(&scan_source(SRC));
        assert_eq!(v["ok"], true);
        let tags: Vec<_> = v["layers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["tag"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(tags, vec!["root", "container", "para"]);
    }

    #[test]
    fn errors_are_json() {
        let v = parse(&scan_source("<div data-tag=\"root\"><p></div>"));
        assert_eq!(v["ok"], false);
        assert!(v["error"].as_str().unwrap().contains("line 1"));
        let v = parse(&remove_element(SRC, "ghost"));
        assert_eq!(v["error"], "tag not found: ghost");
    }

    #[test]
    fn insert_reports_anchor() {
        let v = parse(&insert_fragment(SRC, r#"<b data-tag="bold">B</b>"#, None));
        assert_eq!(v["anchor"], "container");
        assert_eq!(v["anchorTag"], "container");
        assert_eq!(v["tag"], "bold");
        let removed = parse(&remove_element(v["source"].as_str().unwrap(), "bold"));
        assert_eq!(removed["source"], SRC);
    }

    #[test]
    fn lint_is_an_array() {
        assert_eq!(lint(SRC), "[]");
        let v = parse(&lint("<div><p data-tag=\"a\">x</p></div>"));
        assert_eq!(v[0]["rule"], "missing-root");
        assert_eq!(v[0]["severity"], "warning");
    }

    #[test]
    fn document_edit_cycle() {
        let mut doc = PwDocument::new(SRC);
        let v = parse(&doc.select("para"));
        assert_eq!(v["selection"]["styles"]["color"], "rgb(0, 0, 0)");

        let v = parse(&doc.apply_property("para", "style.color", "blue"));
        assert_eq!(v["ok"], true);
        assert!(doc.get_source().contains("style={{ color: 'blue' }}"));

        let v = parse(&doc.apply_property("para", "style.width", "wide"));
        assert_eq!(v["ok"], false);

        let tag = doc.assign_tag("Call to action");
        assert_eq!(tag, "call-to-action");
        let v = parse(&doc.insert(&format!(r#"<button data-tag="{tag}">Go</button>"#), None));
        assert_eq!(v["ok"], true);
        assert!(parse(&doc.layers_json())["layers"].as_array().unwrap().len() == 4);

        assert!(doc.undo());
        assert!(doc.undo());
        assert_eq!(doc.get_source(), SRC);
        assert!(doc.redo());
        assert!(doc.get_source().contains("color: 'blue'"));
    }

    #[test]
    fn layer_toggles_regenerate_source() {
        let mut doc = PwDocument::new(SRC);
        let v = parse(&doc.set_visible("para", false));
        assert_eq!(v["ok"], true);
        assert!(doc.get_source().contains("style={{ display: 'none' }}"));
        assert_eq!(doc.history.undo_description(), Some("hide para"));

        assert_eq!(parse(&doc.set_locked("ghost", true))["ok"], false);
        assert!(doc.history.can_undo());
        assert_eq!(doc.history.undo_description(), Some("hide para"));
    }

    #[test]
    fn broken_source_reports_mount_error() {
        let mut doc = PwDocument::new(SRC);
        assert!(!doc.set_source("<div data-tag=\"root\">"));
        assert!(!doc.last_error().is_empty());
        assert_eq!(parse(&doc.layers_json())["ok"], false);
        assert!(doc.undo());
        assert!(doc.last_error().is_empty());
    }
}
