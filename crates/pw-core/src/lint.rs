//! Lint diagnostics for component source documents.
//!
//! Reports structural issues that break or weaken the tag join between
//! source and DOM, without modifying the document.

use crate::id::{ElementTag, ROOT_TAG, TAG_ATTR, is_container_tag};
use crate::markup::{Dialect, MarkupElement, parse_element_at};
use crate::source;
use serde::Serialize;
use std::collections::HashMap;

// ─── Diagnostic types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintSeverity {
    /// The document cannot be synced reliably until fixed.
    Error,
    /// Likely a mistake.
    Warning,
    /// Informational.
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintDiagnostic {
    /// The element this diagnostic refers to, if any.
    pub tag: Option<ElementTag>,
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "duplicate-tag").
    pub rule: &'static str,
    /// 1-based line in the source.
    pub line: usize,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run all lint rules over a source document.
#[must_use]
pub fn lint_source(text: &str) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    let Some(offset) = source::locate_markup(text) else {
        diags.push(LintDiagnostic {
            tag: None,
            message: "No returned markup found; the document has no editable layers.".to_string(),
            severity: LintSeverity::Info,
            rule: "no-markup",
            line: 1,
        });
        return diags;
    };
    let tree = match parse_element_at(text, offset, Dialect::Jsx) {
        Ok(tree) => tree,
        Err(err) => {
            diags.push(LintDiagnostic {
                tag: None,
                message: err.message,
                severity: LintSeverity::Error,
                rule: "parse-error",
                line: err.line,
            });
            return diags;
        }
    };
    let elements = tree.walk();
    lint_missing_root(text, &tree, &mut diags);
    lint_empty_tags(text, &elements, &mut diags);
    lint_duplicate_tags(text, &elements, &mut diags);
    lint_multiple_containers(text, &elements, &mut diags);
    lint_untagged_elements(text, &tree, &mut diags);
    diags
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())].matches('\n').count() + 1
}

// ─── Rules ────────────────────────────────────────────────────────────────

/// Warn when no element carries the reserved root tag.
fn lint_missing_root(text: &str, tree: &MarkupElement, diags: &mut Vec<LintDiagnostic>) {
    if tree.find_tag(ROOT_TAG).is_none() {
        diags.push(LintDiagnostic {
            tag: None,
            message: format!(
                "No element is tagged `{ROOT_TAG}`; the first tagged element will be treated as the root."
            ),
            severity: LintSeverity::Warning,
            rule: "missing-root",
            line: line_of(text, tree.span.start),
        });
    }
}

fn lint_empty_tags(text: &str, elements: &[&MarkupElement], diags: &mut Vec<LintDiagnostic>) {
    for el in elements {
        if el.attr(TAG_ATTR).is_some() && el.tag().is_none_or(|t| t.trim().is_empty()) {
            diags.push(LintDiagnostic {
                tag: None,
                message: format!("<{}> has an empty or non-literal `{TAG_ATTR}`.", el.name),
                severity: LintSeverity::Error,
                rule: "empty-tag",
                line: line_of(text, el.span.start),
            });
        }
    }
}

/// Error on every repeat of a tag already used earlier in the document.
fn lint_duplicate_tags(text: &str, elements: &[&MarkupElement], diags: &mut Vec<LintDiagnostic>) {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for el in elements {
        let Some(tag) = el.tag().filter(|t| !t.trim().is_empty()) else {
            continue;
        };
        let line = line_of(text, el.span.start);
        if let Some(&first) = first_seen.get(tag) {
            diags.push(LintDiagnostic {
                tag: Some(ElementTag::intern(tag)),
                message: format!("Tag `{tag}` is already used on line {first}; tags must be unique."),
                severity: LintSeverity::Error,
                rule: "duplicate-tag",
                line,
            });
        } else {
            first_seen.insert(tag, line);
        }
    }
}

/// Info when more than one container exists: unhinted inserts go to the first.
fn lint_multiple_containers(text: &str, elements: &[&MarkupElement], diags: &mut Vec<LintDiagnostic>) {
    let containers: Vec<_> = elements
        .iter()
        .filter(|el| el.tag().is_some_and(is_container_tag))
        .collect();
    for el in containers.iter().skip(1) {
        let tag = el.tag().map(ElementTag::intern);
        diags.push(LintDiagnostic {
            tag,
            message: "Multiple insertion containers; inserts without an anchor hint go to the first one."
                .to_string(),
            severity: LintSeverity::Info,
            rule: "multiple-containers",
            line: line_of(text, el.span.start),
        });
    }
}

/// Untagged elements are invisible to the layer panel and to regeneration.
/// Only reported for elements that hide no tagged descendants, since
/// untagged wrappers are looked through.
fn lint_untagged_elements(text: &str, tree: &MarkupElement, diags: &mut Vec<LintDiagnostic>) {
    if tree.tag().is_none() && !tree.is_fragment() {
        diags.push(LintDiagnostic {
            tag: None,
            message: format!("Top-level <{}> has no `{TAG_ATTR}`.", tree.name),
            severity: LintSeverity::Warning,
            rule: "untagged-element",
            line: line_of(text, tree.span.start),
        });
    }
    for el in tree.walk().into_iter().skip(1) {
        if el.tag().is_some() || el.is_fragment() {
            continue;
        }
        let hides_tagged = el.walk().iter().skip(1).any(|d| d.tag().is_some());
        if !hides_tagged {
            diags.push(LintDiagnostic {
                tag: None,
                message: format!("<{}> has no `{TAG_ATTR}` and will be dropped on regeneration.", el.name),
                severity: LintSeverity::Info,
                rule: "untagged-element",
                line: line_of(text, el.span.start),
            });
        }
    }
}
