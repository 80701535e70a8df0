//! Edit steps shared by the sync controller and synchronous front ends.
//!
//! The controller runs these inside its write/reload cycle; the wasm bridge
//! runs them directly against a document it mounts itself.

use crate::bridge::{self, BridgeError, LayerControls, SelectedElement};
use crate::sync::EditOp;
use pw_core::dom::DomTree;
use pw_core::error::SpliceError;
use pw_core::id::{ElementTag, TagAllocator};
use pw_core::splice::{self, Insertion};

/// Splice `fragment` into `source`. Fragment tags that collide with the
/// source are rewritten first, and every tag of the result is reserved.
pub fn insert_fragment(
    source: &str,
    fragment: &str,
    anchor_hint: Option<ElementTag>,
    tags: &mut TagAllocator,
) -> Result<Insertion, SpliceError> {
    let inserted = match splice::insert(source, fragment, anchor_hint) {
        Err(SpliceError::TagCollision(tag)) => {
            log::warn!("fragment tag {tag} already in source; retagging");
            let existing = splice::source_tags(source)?;
            let (retagged, _) =
                tags.retag_fragment(fragment, |t| existing.iter().any(|e| e.as_str() == t))?;
            splice::insert(source, &retagged, anchor_hint)?
        }
        other => other?,
    };
    for tag in splice::source_tags(&inserted.source)? {
        tags.reserve(tag);
    }
    Ok(inserted)
}

/// Apply a DOM edit to the live document.
///
/// Returns the refreshed snapshot for property edits. Source edits
/// (`Insert`, `Remove`) do not touch the DOM and return `Ok(None)`.
pub fn apply_dom_edit(
    doc: &mut DomTree,
    controls: &mut LayerControls,
    op: &EditOp,
) -> Result<Option<SelectedElement>, BridgeError> {
    match op {
        EditOp::ApplyProperty {
            target,
            property,
            value,
        } => {
            let handle = doc
                .find_by_tag(target.as_str())
                .ok_or(BridgeError::NotFound(*target))?;
            let current = bridge::snapshot(doc, handle)?;
            bridge::apply_property(doc, &current, property, value).map(Some)
        }
        EditOp::SetVisible { target, visible } => {
            controls.set_visible(doc, *target, *visible)?;
            Ok(None)
        }
        EditOp::SetLocked { target, locked } => {
            controls.set_locked(doc, *target, *locked)?;
            Ok(None)
        }
        EditOp::Insert { .. } | EditOp::Remove { .. } => Ok(None),
    }
}
