//! Element tags: the join key between the live DOM and the source text.
//!
//! Every editable node carries exactly one `data-tag` attribute. Tags are
//! interned so layer trees, selections and queued edits can hold them as
//! `Copy` values; the string form is what lands in markup.

use crate::dom::DomTree;
use crate::error::{SpliceError, TagError};
use crate::markup::{Dialect, Span, parse_single_element};
use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Attribute carrying the element tag.
pub const TAG_ATTR: &str = "data-tag";
/// Boolean attribute marking a layer as locked.
pub const LOCK_ATTR: &str = "data-locked";
/// Editor-only selection marker. Never emitted by the generator.
pub const SELECTED_ATTR: &str = "data-selected";
/// Reserved tag of the designated root element.
pub const ROOT_TAG: &str = "root";
/// Reserved tag of the insertion container.
pub const CONTAINER_TAG: &str = "container";

/// Global string interner for element tags.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// An interned element tag. 4 bytes, `Copy`, O(1) equality and hashing.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementTag(Spur);

impl ElementTag {
    /// Intern a tag string, or return the existing handle.
    pub fn intern(s: &str) -> Self {
        ElementTag(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    pub fn root() -> Self {
        Self::intern(ROOT_TAG)
    }

    pub fn container() -> Self {
        Self::intern(CONTAINER_TAG)
    }

    pub fn is_root(&self) -> bool {
        self.as_str() == ROOT_TAG
    }

    pub fn is_container(&self) -> bool {
        is_container_tag(self.as_str())
    }
}

/// `container`, or an allocator-suffixed `container-N`.
pub fn is_container_tag(tag: &str) -> bool {
    match tag.strip_prefix(CONTAINER_TAG) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('-')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit())),
        None => false,
    }
}

impl fmt::Debug for ElementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ElementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for ElementTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElementTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Serialize for ElementTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ElementTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ElementTag::intern(&s))
    }
}

/// Normalize a free-form hint into a kebab-case slug.
///
/// `"Primary Button"` → `primary-button`, `"heroTitle"` → `hero-title`.
/// Returns `element` when nothing usable remains.
pub fn slugify(hint: &str) -> String {
    let mut out = String::with_capacity(hint.len());
    let mut prev_lower = false;
    for c in hint.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && prev_lower && !out.ends_with('-') {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        } else {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            prev_lower = false;
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "element".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Issues tags that are unique for the life of one document session.
///
/// A tag is taken if it is present in the document or was issued earlier by
/// this allocator. Collisions get a `-N` counter suffix.
#[derive(Debug, Default)]
pub struct TagAllocator {
    issued: HashSet<ElementTag>,
    next_suffix: u64,
}

impl TagAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a tag against the live document.
    ///
    /// `None` means the runtime has not mounted the document yet; tagging is
    /// deferred and the caller retries after the next ready signal.
    pub fn assign(&mut self, document: Option<&DomTree>, hint: &str) -> Result<ElementTag, TagError> {
        let document = document.ok_or(TagError::DocumentNotLoaded)?;
        Ok(self.assign_with(hint, |candidate| document.find_by_tag(candidate).is_some()))
    }

    /// Assign a tag using a caller-supplied "already present" predicate
    /// (e.g. tags found in source text rather than a live DOM).
    pub fn assign_with(&mut self, hint: &str, is_taken: impl Fn(&str) -> bool) -> ElementTag {
        let base = slugify(hint);
        let mut candidate = base.clone();
        loop {
            let tag = ElementTag::intern(&candidate);
            if !self.issued.contains(&tag) && !is_taken(&candidate) {
                self.issued.insert(tag);
                log::trace!("assigned tag {candidate}");
                return tag;
            }
            self.next_suffix += 1;
            candidate = format!("{base}-{}", self.next_suffix);
        }
    }

    /// Record a tag that exists in the document so it is never handed out.
    pub fn reserve(&mut self, tag: ElementTag) {
        self.issued.insert(tag);
    }

    /// Whether this allocator already issued or reserved `tag`.
    pub fn is_issued(&self, tag: ElementTag) -> bool {
        self.issued.contains(&tag)
    }

    /// Rewrite every tag in `fragment` that is already taken, keeping the
    /// rest of the text intact. Returns the new text and the fragment's root
    /// tag after rewriting.
    pub fn retag_fragment(
        &mut self,
        fragment: &str,
        is_taken: impl Fn(&str) -> bool,
    ) -> Result<(String, ElementTag), SpliceError> {
        let frag = parse_single_element(fragment, Dialect::Jsx)?;
        let mut edits: Vec<(Span, ElementTag)> = Vec::new();
        let mut root_tag = None;
        for el in frag.walk() {
            let Some(attr) = el.attr(TAG_ATTR) else {
                continue;
            };
            let (Some(old), Some(span)) = (el.tag(), attr.value_span) else {
                continue;
            };
            let tag = if is_taken(old) {
                let fresh = self.assign_with(old, &is_taken);
                log::debug!("retagged fragment element {old} -> {fresh}");
                edits.push((span, fresh));
                fresh
            } else {
                ElementTag::intern(old)
            };
            if std::ptr::eq(el, &frag) {
                root_tag = Some(tag);
            }
        }
        let root_tag = root_tag.ok_or_else(|| {
            SpliceError::InvalidFragment(format!("<{}> has no data-tag", frag.name))
        })?;

        let mut out = fragment.to_string();
        edits.sort_by_key(|(span, _)| std::cmp::Reverse(span.start));
        for (span, tag) in edits {
            let value = if fragment[span.start..span.end].starts_with(['\'', '"']) {
                // `{'x'}` expression form keeps its quotes.
                let q = &fragment[span.start..span.start + 1];
                format!("{q}{tag}{q}")
            } else {
                tag.as_str().to_string()
            };
            out.replace_range(span.start..span.end, &value);
        }
        Ok((out, root_tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = ElementTag::intern("hero-title");
        let b = ElementTag::intern("hero-title");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "hero-title");
        assert!(ElementTag::root().is_root());
        assert!(ElementTag::container().is_container());
    }

    #[test]
    fn slugify_hints() {
        assert_eq!(slugify("Primary Button"), "primary-button");
        assert_eq!(slugify("heroTitle"), "hero-title");
        assert_eq!(slugify("  --nav__link-- "), "nav-link");
        assert_eq!(slugify("!!!"), "element");
        assert_eq!(slugify("h1"), "h1");
    }

    #[test]
    fn allocator_suffixes_collisions() {
        let mut tags = TagAllocator::new();
        let taken = |s: &str| s == "primary-button";
        let a = tags.assign_with("primary button", taken);
        let b = tags.assign_with("primary button", taken);
        assert_ne!(a, b);
        assert_ne!(a.as_str(), "primary-button");
        assert!(a.as_str().starts_with("primary-button-"));
    }

    #[test]
    fn allocator_never_repeats() {
        let mut tags = TagAllocator::new();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let tag = tags.assign_with("card", |_| false);
            assert!(seen.insert(tag), "duplicate tag {tag}");
        }
    }

    #[test]
    fn allocator_defers_without_document() {
        let mut tags = TagAllocator::new();
        assert_eq!(tags.assign(None, "x"), Err(TagError::DocumentNotLoaded));
    }

    #[test]
    fn container_tags() {
        assert!(is_container_tag("container"));
        assert!(is_container_tag("container-12"));
        assert!(!is_container_tag("container-"));
        assert!(!is_container_tag("containers"));
        assert!(!is_container_tag("container-box"));
    }

    #[test]
    fn retag_collided_fragment() {
        let mut tags = TagAllocator::new();
        let fragment = "<div data-tag=\"card\">\n  <p data-tag=\"body\">x</p>\n  <i data-tag={'icon'} />\n</div>";
        let taken = |s: &str| s == "card" || s == "icon";
        let (out, root) = tags.retag_fragment(fragment, taken).unwrap();
        assert_ne!(root.as_str(), "card");
        assert!(root.as_str().starts_with("card-"));
        assert!(out.contains(&format!("data-tag=\"{root}\"")));
        assert!(out.contains("data-tag=\"body\""));
        assert!(!out.contains("'icon'"));
        assert!(out.contains("data-tag={'icon-"));
    }

    #[test]
    fn retag_requires_tagged_root() {
        let mut tags = TagAllocator::new();
        assert!(matches!(
            tags.retag_fragment("<p>x</p>", |_| false),
            Err(SpliceError::InvalidFragment(_))
        ));
    }

    #[test]
    fn reserved_tags_are_skipped() {
        let mut tags = TagAllocator::new();
        tags.reserve(ElementTag::intern("logo"));
        let t = tags.assign_with("logo", |_| false);
        assert_ne!(t.as_str(), "logo");
        assert!(tags.is_issued(t));
    }
}
