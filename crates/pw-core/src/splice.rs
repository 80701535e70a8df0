//! Source insertion and removal.
//!
//! Both operations parse the component source with `markup` and splice the
//! original text by byte span. Everything outside the edited range is left
//! byte-for-byte untouched, and on error the caller's source is never
//! modified (a new `String` is only produced on success).

use crate::error::SpliceError;
use crate::generator::GeneratorConfig;
use crate::id::{CONTAINER_TAG, ElementTag, ROOT_TAG, is_container_tag};
use crate::markup::{Dialect, MarkupElement, Span, parse_element_at, parse_single_element};
use crate::source;
use std::collections::VecDeque;

/// Which rule placed an inserted fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionAnchor {
    /// Appended inside an existing container.
    Container(ElementTag),
    /// Wrapped in a new container appended to the root.
    Root(ElementTag),
    /// The markup has neither a container nor a root; wrapped in a new
    /// container appended to the top-level element, carrying its tag if any.
    TopLevel(Option<ElementTag>),
    /// The source had no markup; a new component was produced.
    Synthesized,
    /// The hinted element had no container around or below it, so the
    /// fragment went directly inside it.
    Hint(ElementTag),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
    pub source: String,
    pub anchor: InsertionAnchor,
    /// Tag of the fragment's root element.
    pub tag: ElementTag,
    /// Byte range of the inserted text in the new source.
    pub inserted: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub source: String,
    /// Byte range removed from the old source.
    pub removed: Span,
    /// 1-based line range of the removed element in the old source.
    pub first_line: usize,
    pub last_line: usize,
}

/// Insert `fragment` into `source`.
///
/// Anchor priority: a container (scoped by `anchor_hint` when given), then
/// the root (fragment wrapped in a new container), then the top-level
/// element when there is no root, then a freshly synthesized component when
/// the source holds no markup.
pub fn insert(source: &str, fragment: &str, anchor_hint: Option<ElementTag>) -> Result<Insertion, SpliceError> {
    let frag = parse_fragment(fragment)?;
    let tag = fragment_root_tag(&frag)?;
    let body = fragment_body(fragment);

    let Some(offset) = source::locate_markup(source) else {
        return Ok(synthesize(source, &body, tag));
    };
    let tree = parse_element_at(source, offset, Dialect::Jsx)?;

    for el in frag.walk() {
        if let Some(t) = el.tag()
            && tree.find_tag(t).is_some()
        {
            return Err(SpliceError::TagCollision(ElementTag::intern(t)));
        }
    }

    let (target, anchor) = choose_anchor(&tree, anchor_hint)?;
    let block = match anchor {
        InsertionAnchor::Root(_) | InsertionAnchor::TopLevel(_) => {
            format!("<div data-tag=\"{CONTAINER_TAG}\">\n{}\n</div>", reindent(&body, "  "))
        }
        _ => body,
    };
    let target_tag = target
        .tag()
        .map_or_else(|| ElementTag::intern(&target.name), ElementTag::intern);
    let (source, inserted) = splice_children(source, target, target_tag, &block)?;
    log::debug!("inserted {tag} via {anchor:?}");
    Ok(Insertion {
        source,
        anchor,
        tag,
        inserted,
    })
}

/// Remove the element tagged `target` from `source`.
///
/// Whole lines are deleted when the element owns them; otherwise exactly its
/// byte span.
pub fn remove(source: &str, target: ElementTag) -> Result<Removal, SpliceError> {
    if target.is_root() {
        return Err(SpliceError::RootRemoval);
    }
    let offset = source::locate_markup(source).ok_or(SpliceError::TagNotFound(target))?;
    let tree = parse_element_at(source, offset, Dialect::Jsx)?;
    let el = tree
        .find_tag(target.as_str())
        .ok_or(SpliceError::TagNotFound(target))?;
    if std::ptr::eq(el, &tree) {
        return Err(SpliceError::RootRemoval);
    }

    let removed = owned_lines(source, el.span).unwrap_or(el.span);
    let mut out = String::with_capacity(source.len());
    out.push_str(&source[..removed.start]);
    out.push_str(&source[removed.end..]);
    log::debug!("removed {target} ({} bytes)", removed.end - removed.start);
    Ok(Removal {
        source: out,
        removed,
        first_line: line_number(source, el.span.start),
        last_line: line_number(source, el.span.end.saturating_sub(1)),
    })
}

/// All tags in a fragment, root first.
pub fn fragment_tags(fragment: &str) -> Result<Vec<ElementTag>, SpliceError> {
    let frag = parse_fragment(fragment)?;
    Ok(frag.walk().into_iter().filter_map(|el| el.tag()).map(ElementTag::intern).collect())
}

/// All tags in a source document's markup, in document order.
pub fn source_tags(source: &str) -> Result<Vec<ElementTag>, SpliceError> {
    let Some(offset) = source::locate_markup(source) else {
        return Ok(Vec::new());
    };
    let tree = parse_element_at(source, offset, Dialect::Jsx)?;
    Ok(tree.walk().into_iter().filter_map(|el| el.tag()).map(ElementTag::intern).collect())
}

// ─── Anchors ─────────────────────────────────────────────────────────────

fn is_container(el: &MarkupElement) -> bool {
    el.tag().is_some_and(is_container_tag)
}

fn choose_anchor(
    tree: &MarkupElement,
    hint: Option<ElementTag>,
) -> Result<(&MarkupElement, InsertionAnchor), SpliceError> {
    let container = |el: &MarkupElement| {
        let tag = ElementTag::intern(el.tag().unwrap_or(CONTAINER_TAG));
        InsertionAnchor::Container(tag)
    };

    if let Some(hint) = hint {
        let path = tree
            .path_to(hint.as_str())
            .ok_or(SpliceError::AnchorNotFound(hint))?;
        let Some(&hinted) = path.last() else {
            return Err(SpliceError::AnchorNotFound(hint));
        };
        if is_container(hinted) {
            return Ok((hinted, container(hinted)));
        }
        if let Some(inner) = nearest_container_below(hinted) {
            return Ok((inner, container(inner)));
        }
        if let Some(&outer) = path.iter().rev().skip(1).find(|el| is_container(el)) {
            return Ok((outer, container(outer)));
        }
        return Ok((hinted, InsertionAnchor::Hint(hint)));
    }

    if let Some(first) = tree.walk().into_iter().find(|el| is_container(el)) {
        return Ok((first, container(first)));
    }
    if let Some(root) = tree.find_tag(ROOT_TAG) {
        return Ok((root, InsertionAnchor::Root(ElementTag::root())));
    }
    // Existing markup is kept; the new container goes under the top element.
    let top = tree.tag().map(ElementTag::intern);
    Ok((tree, InsertionAnchor::TopLevel(top)))
}

/// Breadth-first, so the shallowest container wins.
fn nearest_container_below(el: &MarkupElement) -> Option<&MarkupElement> {
    let mut queue: VecDeque<&MarkupElement> = el.child_elements().collect();
    while let Some(next) = queue.pop_front() {
        if is_container(next) {
            return Some(next);
        }
        queue.extend(next.child_elements());
    }
    None
}

// ─── Text surgery ────────────────────────────────────────────────────────

/// Place `block` on its own lines just before `target`'s closing tag, one
/// indentation level deeper than `target`.
fn splice_children(
    source: &str,
    target: &MarkupElement,
    target_tag: ElementTag,
    block: &str,
) -> Result<(String, Span), SpliceError> {
    let close = target
        .close_start
        .ok_or(SpliceError::NotAContainer(target_tag))?;
    let outer_indent = line_indent(source, target.span.start);
    let block = reindent(block, &format!("{outer_indent}  "));

    let ls = line_start(source, close);
    let mut out = String::with_capacity(source.len() + block.len() + 2);
    let inserted = if source[ls..close].trim().is_empty() {
        out.push_str(&source[..ls]);
        out.push_str(&block);
        out.push('\n');
        out.push_str(&source[ls..]);
        Span { start: ls, end: ls + block.len() + 1 }
    } else {
        out.push_str(&source[..close]);
        out.push('\n');
        out.push_str(&block);
        out.push('\n');
        out.push_str(outer_indent);
        out.push_str(&source[close..]);
        Span { start: close + 1, end: close + 1 + block.len() + 1 }
    };
    Ok((out, inserted))
}

fn synthesize(source: &str, body: &str, tag: ElementTag) -> Insertion {
    let markup = format!(
        "<div data-tag=\"{ROOT_TAG}\">\n  <div data-tag=\"{CONTAINER_TAG}\">\n{}\n  </div>\n</div>\n",
        reindent(body, "    ")
    );
    let out = source::wrap_component(&markup, &GeneratorConfig::from_source(source));
    let first = body.lines().next().unwrap_or_default().trim();
    let start = out.find(first).unwrap_or(0);
    let start = line_start(&out, start);
    let len = reindent(body, "        ").len() + 1;
    log::debug!("no markup in source; synthesized a component around {tag}");
    Insertion {
        inserted: Span { start, end: (start + len).min(out.len()) },
        source: out,
        anchor: InsertionAnchor::Synthesized,
        tag,
    }
}

fn parse_fragment(fragment: &str) -> Result<MarkupElement, SpliceError> {
    let frag = parse_single_element(fragment, Dialect::Jsx)?;
    if frag.is_fragment() {
        return Err(SpliceError::InvalidFragment(
            "fragment root must be an element, not `<>`".to_string(),
        ));
    }
    Ok(frag)
}

fn fragment_root_tag(frag: &MarkupElement) -> Result<ElementTag, SpliceError> {
    frag.tag().map(ElementTag::intern).ok_or_else(|| {
        SpliceError::InvalidFragment(format!("<{}> has no data-tag", frag.name))
    })
}

/// Fragment text without leading blank lines or trailing whitespace.
fn fragment_body(fragment: &str) -> String {
    let trimmed = fragment.trim_end();
    let first = trimmed
        .lines()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(0);
    trimmed.lines().skip(first).collect::<Vec<_>>().join("\n")
}

/// Strip common leading indentation and prefix every non-blank line with
/// `indent`. Only spaces and tabs count as indentation.
fn reindent(text: &str, indent: &str) -> String {
    let common = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{}", &l[common..])
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn line_start(source: &str, offset: usize) -> usize {
    source[..offset].rfind('\n').map_or(0, |nl| nl + 1)
}

fn line_indent(source: &str, offset: usize) -> &str {
    let ls = line_start(source, offset);
    let line = &source[ls..offset];
    &line[..line.len() - line.trim_start().len()]
}

fn line_number(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())].matches('\n').count() + 1
}

/// The full-line range of `span`, when nothing but whitespace shares its
/// first and last lines.
fn owned_lines(source: &str, span: Span) -> Option<Span> {
    let ls = line_start(source, span.start);
    if !source[ls..span.start].trim().is_empty() {
        return None;
    }
    let (tail_end, le) = match source[span.end..].find('\n') {
        Some(nl) => (span.end + nl, span.end + nl + 1),
        None => (source.len(), source.len()),
    };
    if !source[span.end..tail_end].trim().is_empty() {
        return None;
    }
    Some(Span { start: ls, end: le })
}
