//! Generator: live DOM → component source.
//!
//! Only tagged elements are emitted. Untagged wrappers are looked through, so
//! their tagged descendants still land in the output one level below the
//! nearest tagged ancestor. Output is deterministic: the same DOM state always
//! yields byte-identical text.

use crate::css::{InlineStyle, kebab_to_camel};
use crate::dom::{DomHandle, DomTree};
use crate::error::GenerateError;
use crate::id::{LOCK_ATTR, TAG_ATTR};
use crate::markup::is_void_element;
use crate::source;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Attributes copied verbatim after `data-tag`, `id` and `className`.
const PASSTHROUGH_ATTRS: &[&str] = &["src", "alt", "href", "type", "placeholder"];

/// Output settings for generated component files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Name of the default-exported component function.
    pub component_name: String,
    /// Extra import lines emitted after the React import.
    pub imports: Vec<String>,
    /// Spaces per nesting level.
    pub indent_width: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            component_name: "App".to_string(),
            imports: Vec::new(),
            indent_width: 2,
        }
    }
}

impl GeneratorConfig {
    /// Keep an existing file's component name and imports.
    pub fn from_source(text: &str) -> Self {
        let mut config = Self::default();
        if let Some(name) = source::component_name(text) {
            config.component_name = name;
        }
        config.imports = source::extra_imports(text);
        config
    }
}

/// Regenerate the full component file from the designated root.
pub fn regenerate(document: &DomTree, config: &GeneratorConfig) -> Result<String, GenerateError> {
    let root = document.designated_root().ok_or(GenerateError::NoRoot)?;
    let mut markup = String::with_capacity(1024);
    emit_element(&mut markup, document, root, 0, config.indent_width);
    log::debug!("regenerated {} bytes of markup", markup.len());
    Ok(source::wrap_component(&markup, config))
}

/// Markup only, for `root` and its tagged descendants, starting at
/// `base_depth` levels of indentation.
#[must_use]
pub fn generate_markup(document: &DomTree, root: DomHandle, base_depth: usize) -> String {
    let mut out = String::with_capacity(256);
    emit_element(&mut out, document, root, base_depth, GeneratorConfig::default().indent_width);
    out
}

fn indent(out: &mut String, depth: usize, width: usize) {
    for _ in 0..depth * width {
        out.push(' ');
    }
}

fn emit_element(out: &mut String, document: &DomTree, handle: DomHandle, depth: usize, width: usize) {
    let Some(el) = document.element(handle) else {
        return;
    };
    let name = el.name.to_ascii_lowercase();
    if !is_valid_element_name(&name) {
        let tag = el.attribute(TAG_ATTR).unwrap_or_default();
        log::warn!("skipping malformed element {tag:?} (name {:?})", el.name);
        indent(out, depth, width);
        let _ = writeln!(
            out,
            "{{/* pagewright: skipped malformed element \"{}\" */}}",
            tag.replace("*/", "* /")
        );
        return;
    }

    indent(out, depth, width);
    out.push('<');
    out.push_str(&name);
    emit_attributes(out, el);

    let children = document.tagged_children(handle);
    if !children.is_empty() {
        out.push_str(">\n");
        for child in children {
            emit_element(out, document, child, depth + 1, width);
        }
        indent(out, depth, width);
        let _ = writeln!(out, "</{name}>");
        return;
    }

    let text = collapse_whitespace(&document.direct_text(handle));
    if text.is_empty() && is_void_element(&name) {
        out.push_str(" />\n");
    } else {
        let _ = writeln!(out, ">{}</{name}>", escape_text(&text));
    }
}

fn emit_attributes(out: &mut String, el: &crate::dom::Element) {
    if let Some(tag) = el.attribute(TAG_ATTR) {
        let _ = write!(out, " {TAG_ATTR}=\"{}\"", escape_attr(tag));
    }
    if let Some(id) = el.attribute("id") {
        let _ = write!(out, " id=\"{}\"", escape_attr(id));
    }
    if let Some(class) = el.attribute("class") {
        let _ = write!(out, " className=\"{}\"", escape_attr(class));
    }
    for name in PASSTHROUGH_ATTRS {
        if let Some(value) = el.attribute(name) {
            let _ = write!(out, " {name}=\"{}\"", escape_attr(value));
        }
    }
    match el.attribute(LOCK_ATTR) {
        Some("") => {
            let _ = write!(out, " {LOCK_ATTR}");
        }
        Some(value) => {
            let _ = write!(out, " {LOCK_ATTR}=\"{}\"", escape_attr(value));
        }
        None => {}
    }
    if !el.style.is_empty() {
        out.push_str(" style=");
        out.push_str(&style_object(&el.style));
    }
}

/// `style={{ fontSize: '12px', color: 'red' }}`, declarations in order.
pub fn style_object(style: &InlineStyle) -> String {
    let entries: Vec<String> = style
        .declarations
        .iter()
        .map(|d| {
            let key = if d.property.starts_with("--") {
                format!("'{}'", d.property)
            } else {
                kebab_to_camel(&d.property)
            };
            format!("{key}: '{}'", escape_js_string(&d.value))
        })
        .collect();
    format!("{{{{ {} }}}}", entries.join(", "))
}

fn is_valid_element_name(name: &str) -> bool {
    name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Escape text so it survives as a JSX child.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

fn escape_js_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tagged(dom: &mut DomTree, parent: DomHandle, name: &str, tag: &str) -> DomHandle {
        let h = dom.create_element(name);
        dom.set_attribute(h, TAG_ATTR, tag);
        dom.append_child(parent, h);
        h
    }

    fn sample() -> DomTree {
        let mut dom = DomTree::new();
        let doc = dom.document;
        let root = tagged(&mut dom, doc, "div", "root");
        dom.set_attribute(root, "class", "app shell");
        dom.set_attribute(root, "onclick", "alert(1)");

        let wrapper = dom.create_element("div");
        dom.append_child(root, wrapper);
        let title = tagged(&mut dom, wrapper, "H1", "title");
        dom.set_attribute(title, "style", "font-size: 32px; color: red");
        let t = dom.create_text("  Hello   <world> {x} ");
        dom.append_child(title, t);

        let img = tagged(&mut dom, root, "img", "logo");
        dom.set_attribute(img, "alt", "Logo \"mark\"");
        dom.set_attribute(img, "src", "/logo.png");
        dom.set_attribute(img, LOCK_ATTR, "");
        dom.set_attribute(img, "data-selected", "");

        tagged(&mut dom, root, "section", "empty");
        dom
    }

    #[test]
    fn markup_shape() {
        let dom = sample();
        let root = dom.designated_root().unwrap();
        let expected = r#"<div data-tag="root" className="app shell">
  <h1 data-tag="title" style={{ fontSize: '32px', color: 'red' }}>Hello &lt;world&gt; &#123;x&#125;</h1>
  <img data-tag="logo" src="/logo.png" alt="Logo &quot;mark&quot;" data-locked />
  <section data-tag="empty"></section>
</div>
"#;
        assert_eq!(generate_markup(&dom, root, 0), expected);
    }

    #[test]
    fn full_file_is_deterministic() {
        let dom = sample();
        let config = GeneratorConfig::default();
        let a = regenerate(&dom, &config).unwrap();
        let b = regenerate(&dom, &config).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("import React from 'react';\n\nexport default function App() {\n  return (\n    <div data-tag=\"root\""));
        assert!(a.ends_with("    </div>\n  );\n}\n"));
    }

    #[test]
    fn base_depth_indents() {
        let dom = sample();
        let title = dom.find_by_tag("title").unwrap();
        assert!(generate_markup(&dom, title, 2).starts_with("    <h1 "));
    }

    #[test]
    fn malformed_element_becomes_placeholder() {
        let mut dom = sample();
        let root = dom.designated_root().unwrap();
        tagged(&mut dom, root, "", "broken");
        let out = generate_markup(&dom, root, 0);
        assert!(out.contains("  {/* pagewright: skipped malformed element \"broken\" */}\n"));
        assert!(out.ends_with("</div>\n"));
    }

    #[test]
    fn no_root_is_an_error() {
        let dom = DomTree::new();
        assert_eq!(regenerate(&dom, &GeneratorConfig::default()), Err(GenerateError::NoRoot));
    }

    #[test]
    fn style_object_quotes_values() {
        let style = InlineStyle::parse("font-family: 'Inter', sans-serif; --brand: #fff");
        assert_eq!(
            style_object(&style),
            r#"{{ fontFamily: '\'Inter\', sans-serif', '--brand': '#fff' }}"#
        );
    }
}
