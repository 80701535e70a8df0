//! Mounting: component source or rendered HTML → live DOM.
//!
//! This is what the rendering runtime does after a write: evaluate the
//! returned markup and attach it under the runtime's own untagged shell
//! (`html > body > div#root`).

use crate::css::{InlineStyle, camel_to_kebab, split_top_level};
use crate::dom::{DomHandle, DomTree};
use crate::error::ParseError;
use crate::markup::{self, AttrValue, Dialect, MarkupElement, MarkupNode, string_literal};
use crate::source;

/// Id of the runtime's mount point element.
pub const MOUNT_POINT_ID: &str = "root";

/// CSS properties React leaves unitless when given a number.
const UNITLESS_PROPERTIES: &[&str] = &[
    "line-height",
    "font-weight",
    "opacity",
    "z-index",
    "flex",
    "flex-grow",
    "flex-shrink",
    "order",
    "zoom",
];

/// Mount component source into a fresh document.
///
/// Source without markup mounts as an empty shell.
pub fn mount(source: &str) -> Result<DomTree, ParseError> {
    let (mut dom, mount_point) = shell();
    if let Some(offset) = source::locate_markup(source) {
        let root = markup::parse_element_at(source, offset, Dialect::Jsx)?;
        build_jsx_element(&mut dom, mount_point, &root);
    }
    log::trace!("mounted {} nodes", dom.graph.node_count());
    Ok(dom)
}

fn shell() -> (DomTree, DomHandle) {
    let mut dom = DomTree::new();
    let doc = dom.document;
    let html = dom.create_element("html");
    dom.append_child(doc, html);
    let body = dom.create_element("body");
    dom.append_child(html, body);
    let mount_point = dom.create_element("div");
    dom.set_attribute(mount_point, "id", MOUNT_POINT_ID);
    dom.append_child(body, mount_point);
    (dom, mount_point)
}

fn build_jsx_element(dom: &mut DomTree, parent: DomHandle, el: &MarkupElement) {
    if el.is_fragment() {
        build_jsx_children(dom, parent, &el.children);
        return;
    }
    let h = dom.create_element(&el.name.to_ascii_lowercase());
    for attr in &el.attrs {
        match (attr.name.as_str(), &attr.value) {
            ("style", AttrValue::Expr(code)) => {
                if let Some(target) = dom.element_mut(h) {
                    target.style = parse_style_object(code);
                }
            }
            (name, value) => {
                if let Some((name, value)) = jsx_attribute(name, value) {
                    dom.set_attribute(h, name, &value);
                }
            }
        }
    }
    dom.append_child(parent, h);
    build_jsx_children(dom, h, &el.children);
}

fn build_jsx_children(dom: &mut DomTree, parent: DomHandle, children: &[MarkupNode]) {
    for child in children {
        match child {
            MarkupNode::Element(el) => build_jsx_element(dom, parent, el),
            MarkupNode::Text { text, .. } => {
                let text = jsx_text(text);
                if !text.is_empty() {
                    let node = dom.create_text(&decode_entities(&text));
                    dom.append_child(parent, node);
                }
            }
            MarkupNode::Expr { code, .. } => {
                if let Some(text) = expr_text(code) {
                    let node = dom.create_text(&text);
                    dom.append_child(parent, node);
                }
            }
            MarkupNode::Comment { .. } => {}
        }
    }
}

/// DOM attribute for a JSX attribute. Event handlers, `key`, `ref`, spreads
/// and non-literal expressions produce nothing.
fn jsx_attribute<'a>(name: &'a str, value: &AttrValue) -> Option<(&'a str, String)> {
    if matches!(name, "..." | "key" | "ref")
        || (name.starts_with("on") && name[2..].starts_with(|c: char| c.is_ascii_uppercase()))
    {
        return None;
    }
    let dom_name = match name {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    };
    let value = match value {
        AttrValue::Bool => String::new(),
        AttrValue::Str(s) => decode_entities(s),
        AttrValue::Expr(code) => match string_literal(code) {
            Some(s) => s.to_string(),
            None if is_number(code.trim()) => code.trim().to_string(),
            None if code.trim() == "true" => String::new(),
            None => return None,
        },
    };
    Some((dom_name, value))
}

fn expr_text(code: &str) -> Option<String> {
    let code = code.trim();
    if let Some(s) = string_literal(code) {
        return Some(s.to_string());
    }
    is_number(code).then(|| code.to_string())
}

fn is_number(code: &str) -> bool {
    !code.is_empty() && code.parse::<f64>().is_ok()
}

/// Parse the body of a `style={…}` expression (`{ color: 'red', fontSize: 12 }`).
/// Non-literal values are skipped.
pub fn parse_style_object(code: &str) -> InlineStyle {
    let mut style = InlineStyle::default();
    let body = code.trim();
    let Some(body) = body.strip_prefix('{').and_then(|b| b.strip_suffix('}')) else {
        return style;
    };
    for entry in split_top_level(body, ',') {
        let Some((key, value)) = entry.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let key = string_literal(key).unwrap_or(key);
        if key.is_empty() {
            continue;
        }
        let property = camel_to_kebab(key);
        let value = value.trim();
        let value = if let Some(s) = string_literal(value) {
            s.replace("\\'", "'").replace("\\\\", "\\")
        } else if is_number(value) {
            if value.parse::<f64>().is_ok_and(|n| n == 0.0) || UNITLESS_PROPERTIES.contains(&property.as_str()) {
                value.to_string()
            } else {
                format!("{value}px")
            }
        } else {
            log::trace!("skipping dynamic style value for {property}");
            continue;
        };
        style.set(&property, &value);
    }
    style
}

/// Apply JSX whitespace rules to a raw text child: lines are trimmed where
/// they meet a line break, blank lines dropped, remaining lines joined with a
/// single space.
pub fn jsx_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last_non_empty = lines.iter().rposition(|l| !l.trim().is_empty());
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.replace('\t', " ").replace('\r', "");
        let mut trimmed = line.as_str();
        if i != 0 {
            trimmed = trimmed.trim_start();
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end();
        }
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        if Some(i) != last_non_empty {
            out.push(' ');
        }
    }
    out
}

/// Decode HTML character references (`&amp;`, `&#123;`, `&#x7D;`, …).
/// Unknown references are left as written.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &rest[1..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                e if e.starts_with("#x") || e.starts_with("#X") => {
                    u32::from_str_radix(&e[2..], 16).ok().and_then(char::from_u32)
                }
                e if e.starts_with('#') => e[1..].parse().ok().and_then(char::from_u32),
                _ => None,
            };
            c.map(|c| (c, semi))
        });
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Build a document from rendered HTML. Text is kept verbatim (entities
/// decoded); attributes are copied as written.
pub fn parse_html(html: &str) -> Result<DomTree, ParseError> {
    let nodes = markup::parse_markup(html, Dialect::Html)?;
    let mut dom = DomTree::new();
    let doc = dom.document;
    build_html_nodes(&mut dom, doc, &nodes);
    Ok(dom)
}

fn build_html_nodes(dom: &mut DomTree, parent: DomHandle, nodes: &[MarkupNode]) {
    for node in nodes {
        match node {
            MarkupNode::Element(el) => {
                let h = dom.create_element(&el.name.to_ascii_lowercase());
                for attr in &el.attrs {
                    let value = match &attr.value {
                        AttrValue::Bool => String::new(),
                        AttrValue::Str(s) | AttrValue::Expr(s) => decode_entities(s),
                    };
                    dom.set_attribute(h, &attr.name.to_ascii_lowercase(), &value);
                }
                dom.append_child(parent, h);
                build_html_nodes(dom, h, &el.children);
            }
            MarkupNode::Text { text, .. } => {
                let node = dom.create_text(&decode_entities(text));
                dom.append_child(parent, node);
            }
            MarkupNode::Comment { text, .. } => {
                let node = dom.create_comment(text);
                dom.append_child(parent, node);
            }
            MarkupNode::Expr { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::TAG_ATTR;
    use pretty_assertions::assert_eq;

    const APP: &str = r#"import React from 'react';

export default function App() {
  return (
    <div data-tag="root" className="app">
      <h1 data-tag="title" style={{ fontSize: 32, color: 'red', lineHeight: 1.5, margin: 0 }}>
        Hello
        world &amp; {'friends'}
      </h1>
      <button data-tag="cta" onClick={() => go()} type="button" data-locked>Go</button>
      <>
        <img data-tag="logo" src="/logo.png" />
      </>
    </div>
  );
}
"#;

    #[test]
    fn mount_component() {
        let dom = mount(APP).unwrap();
        let root = dom.designated_root().unwrap();
        assert_eq!(dom.attribute(root, TAG_ATTR), Some("root"));
        assert_eq!(dom.attribute(root, "class"), Some("app"));

        let mount_point = dom.parent(root).unwrap();
        assert_eq!(dom.attribute(mount_point, "id"), Some(MOUNT_POINT_ID));

        let title = dom.find_by_tag("title").unwrap();
        assert_eq!(dom.text_content(title), "Hello world & friends");
        let style = &dom.element(title).unwrap().style;
        assert_eq!(style.get("font-size"), Some("32px"));
        assert_eq!(style.get("line-height"), Some("1.5"));
        assert_eq!(style.get("margin"), Some("0"));

        let cta = dom.find_by_tag("cta").unwrap();
        let el = dom.element(cta).unwrap();
        assert!(el.attribute("onclick").is_none());
        assert!(el.attribute("onClick").is_none());
        assert!(el.is_locked());

        // Fragment children attach to the fragment's parent.
        let logo = dom.find_by_tag("logo").unwrap();
        assert_eq!(dom.parent(logo), Some(root));
    }

    #[test]
    fn mount_without_markup_is_empty_shell() {
        let dom = mount("export default function App() { return null; }").unwrap();
        assert!(dom.tagged_elements().is_empty());
        assert!(mount("<div data-tag=\"root\">").is_err());
    }

    #[test]
    fn jsx_whitespace() {
        assert_eq!(jsx_text("\n    Hello\n    world  \n  "), "Hello world");
        assert_eq!(jsx_text(" a b "), " a b ");
        assert_eq!(jsx_text("\n   \n"), "");
        assert_eq!(jsx_text("x\n  "), "x");
    }

    #[test]
    fn entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#123;&#x7D;"), "a & b <c> {}");
        assert_eq!(decode_entities("AT&T &bogus;"), "AT&T &bogus;");
    }

    #[test]
    fn html_document() {
        let dom = parse_html(
            r#"<!DOCTYPE html><html><body><div id="root"><div data-tag="root" style="display: none"><img data-tag="i" src=x.png></div></div></body></html>"#,
        )
        .unwrap();
        let root = dom.designated_root().unwrap();
        assert_eq!(dom.element(root).unwrap().style.get("display"), Some("none"));
        assert_eq!(dom.tagged_children(root).len(), 1);
    }
}
