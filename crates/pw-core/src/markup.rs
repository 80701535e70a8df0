//! Parser for the constrained tag dialect.
//!
//! Built on `winnow` 0.7. Produces a lightweight tree that keeps byte spans
//! into the original text, so the splicing engine can cut and insert without
//! re-emitting anything outside the edited range.
//!
//! Two flavours share one grammar:
//! - `Dialect::Jsx`: component source. `{…}` expressions, fragments `<>`,
//!   self-closing required for empty elements.
//! - `Dialect::Html`: rendered documents. Void elements without `/>`,
//!   unquoted attribute values, `<!DOCTYPE>`, raw-text `script`/`style`.

use crate::error::ParseError;
use crate::id::TAG_ATTR;
use winnow::ascii::multispace0;
use winnow::combinator::delimited;
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::{take_till, take_while};

/// Elements that never have children in HTML.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Jsx,
    Html,
}

/// Half-open byte range `[start, end)` into the parsed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Bare attribute: `disabled`, `data-locked`.
    Bool,
    /// Quoted string, raw (entities not decoded).
    Str(String),
    /// JSX expression body without the outer braces.
    Expr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupAttr {
    pub name: String,
    pub value: AttrValue,
    pub span: Span,
    /// Span of the value text inside the quotes or braces.
    pub value_span: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupElement {
    /// Element name as written. Empty for a JSX fragment.
    pub name: String,
    pub attrs: Vec<MarkupAttr>,
    pub children: Vec<MarkupNode>,
    pub self_closing: bool,
    /// From `<` of the opening tag to past the `>` of the closing tag.
    pub span: Span,
    /// Offset just past the opening tag's `>`.
    pub open_end: usize,
    /// Offset of the closing tag's `</`. `None` when self-closing or void.
    pub close_start: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Element(MarkupElement),
    Text { text: String, span: Span },
    Expr { code: String, span: Span },
    Comment { text: String, span: Span },
}

impl MarkupNode {
    pub fn as_element(&self) -> Option<&MarkupElement> {
        match self {
            MarkupNode::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            MarkupNode::Element(el) => el.span,
            MarkupNode::Text { span, .. }
            | MarkupNode::Expr { span, .. }
            | MarkupNode::Comment { span, .. } => *span,
        }
    }
}

impl MarkupElement {
    pub fn attr(&self, name: &str) -> Option<&MarkupAttr> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// String value of an attribute; string-literal expressions count.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        match &self.attr(name)?.value {
            AttrValue::Str(s) => Some(s),
            AttrValue::Expr(code) => string_literal(code),
            AttrValue::Bool => None,
        }
    }

    /// The element's `data-tag` value.
    pub fn tag(&self) -> Option<&str> {
        self.attr_str(TAG_ATTR)
    }

    pub fn is_fragment(&self) -> bool {
        self.name.is_empty()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &MarkupElement> {
        self.children.iter().filter_map(MarkupNode::as_element)
    }

    /// This element and all element descendants, pre-order.
    pub fn walk(&self) -> Vec<&MarkupElement> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(el) = stack.pop() {
            out.push(el);
            let children: Vec<_> = el.child_elements().collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// First element (self included) carrying `data-tag == tag`.
    pub fn find_tag(&self, tag: &str) -> Option<&MarkupElement> {
        self.walk().into_iter().find(|el| el.tag() == Some(tag))
    }

    /// Chain of elements from `self` down to the element tagged `tag`,
    /// both ends included.
    pub fn path_to(&self, tag: &str) -> Option<Vec<&MarkupElement>> {
        if self.tag() == Some(tag) {
            return Some(vec![self]);
        }
        for child in self.child_elements() {
            if let Some(mut path) = child.path_to(tag) {
                path.insert(0, self);
                return Some(path);
            }
        }
        None
    }
}

/// Unquote a JS string literal expression: `'a'`, `"a"` or `` `a` `` without
/// interpolation.
pub fn string_literal(code: &str) -> Option<&str> {
    let code = code.trim();
    let first = code.chars().next()?;
    if !matches!(first, '\'' | '"' | '`') || code.len() < 2 || !code.ends_with(first) {
        return None;
    }
    let inner = &code[1..code.len() - 1];
    if first == '`' && inner.contains("${") {
        return None;
    }
    // Escapes are kept as written; an unescaped quote ends the literal early.
    let mut escaped = false;
    for c in inner.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            c if c == first => return None,
            _ => {}
        }
    }
    (!escaped).then_some(inner)
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Parse a sequence of nodes covering the whole input.
#[must_use = "parsing result should be used"]
pub fn parse_markup(input: &str, dialect: Dialect) -> Result<Vec<MarkupNode>, ParseError> {
    let mut cur = Cursor::new(input, 0, dialect);
    let nodes = cur.parse_nodes()?;
    if !cur.rest.is_empty() {
        let offset = cur.offset();
        let found: String = cur.rest.chars().take(12).collect();
        return Err(ParseError::at(input, offset, format!("unexpected `{found}`")));
    }
    Ok(nodes)
}

/// Parse exactly one element starting at byte `offset` of `source`. Spans are
/// absolute offsets into `source`.
#[must_use = "parsing result should be used"]
pub fn parse_element_at(source: &str, offset: usize, dialect: Dialect) -> Result<MarkupElement, ParseError> {
    let mut cur = Cursor::new(source, offset, dialect);
    if !cur.rest.starts_with('<') {
        return Err(ParseError::at(source, offset, "expected `<`"));
    }
    cur.parse_element()
}

/// Parse a fragment that must consist of exactly one element, surrounded by
/// optional whitespace.
pub fn parse_single_element(input: &str, dialect: Dialect) -> Result<MarkupElement, ParseError> {
    let nodes = parse_markup(input, dialect)?;
    let mut elements = Vec::new();
    for node in nodes {
        match node {
            MarkupNode::Element(el) => elements.push(el),
            MarkupNode::Text { text, span } if !text.trim().is_empty() => {
                return Err(ParseError::at(input, span.start, "text outside of an element"));
            }
            _ => {}
        }
    }
    match elements.len() {
        1 => Ok(elements.remove(0)),
        0 => Err(ParseError::at(input, 0, "no element found")),
        _ => Err(ParseError::at(
            input,
            elements[1].span.start,
            "expected a single top-level element",
        )),
    }
}

// ─── Cursor ───────────────────────────────────────────────────────────────

struct Cursor<'a> {
    src: &'a str,
    rest: &'a str,
    dialect: Dialect,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str, offset: usize, dialect: Dialect) -> Self {
        let offset = offset.min(src.len());
        Self {
            src,
            rest: &src[offset..],
            dialect,
        }
    }

    fn offset(&self) -> usize {
        self.src.len() - self.rest.len()
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(self.src, self.offset(), message)
    }

    fn skip_ws(&mut self) {
        let _: Result<&str, winnow::error::ErrMode<ContextError>> =
            multispace0.parse_next(&mut self.rest);
    }

    fn advance(&mut self, n: usize) {
        self.rest = &self.rest[n..];
    }

    /// Parse child nodes until `</`, end of input, or an unmatched `}`.
    fn parse_nodes(&mut self) -> Result<Vec<MarkupNode>, ParseError> {
        let mut nodes = Vec::new();
        while !self.rest.is_empty() && !self.rest.starts_with("</") {
            let start = self.offset();
            if self.rest.starts_with("<!--") {
                let Some(end) = self.rest.find("-->") else {
                    return Err(self.error("unterminated comment"));
                };
                let text = self.rest[4..end].to_string();
                self.advance(end + 3);
                nodes.push(MarkupNode::Comment {
                    text,
                    span: Span { start, end: self.offset() },
                });
            } else if self.rest.starts_with("<!") || self.rest.starts_with("<?") {
                // Doctype or processing instruction.
                let Some(end) = self.rest.find('>') else {
                    return Err(self.error("unterminated declaration"));
                };
                self.advance(end + 1);
            } else if self.rest.starts_with('<') {
                nodes.push(MarkupNode::Element(self.parse_element()?));
            } else if self.dialect == Dialect::Jsx && self.rest.starts_with('{') {
                let code = self.parse_braced()?;
                nodes.push(MarkupNode::Expr {
                    code,
                    span: Span { start, end: self.offset() },
                });
            } else {
                let text = self.parse_text();
                if text.is_empty() {
                    return Err(self.error("unexpected `}`"));
                }
                nodes.push(MarkupNode::Text {
                    text: text.to_string(),
                    span: Span { start, end: self.offset() },
                });
            }
        }
        Ok(nodes)
    }

    fn parse_text(&mut self) -> &'a str {
        let stop: &[char] = match self.dialect {
            Dialect::Jsx => &['<', '{', '}'],
            Dialect::Html => &['<'],
        };
        let text: Result<&str, winnow::error::ErrMode<ContextError>> =
            take_till(0.., |c: char| stop.contains(&c)).parse_next(&mut self.rest);
        text.unwrap_or_default()
    }

    fn parse_name(&mut self) -> Option<&'a str> {
        let name: Result<&str, winnow::error::ErrMode<ContextError>> = take_while(1.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.')
        })
        .parse_next(&mut self.rest);
        name.ok()
    }

    fn parse_element(&mut self) -> Result<MarkupElement, ParseError> {
        let start = self.offset();
        self.advance(1); // '<'
        let name = if self.rest.starts_with('>') {
            // JSX fragment `<>`.
            if self.dialect != Dialect::Jsx {
                return Err(self.error("empty element name"));
            }
            ""
        } else {
            self.parse_name().ok_or_else(|| self.error("expected element name"))?
        };

        let attrs = self.parse_attrs()?;

        if self.rest.starts_with("/>") {
            self.advance(2);
            let end = self.offset();
            return Ok(MarkupElement {
                name: name.to_string(),
                attrs,
                children: Vec::new(),
                self_closing: true,
                span: Span { start, end },
                open_end: end,
                close_start: None,
            });
        }
        if !self.rest.starts_with('>') {
            return Err(self.error(format!("expected `>` to close <{name}>")));
        }
        self.advance(1);
        let open_end = self.offset();

        if self.dialect == Dialect::Html && is_void_element(name) {
            return Ok(MarkupElement {
                name: name.to_string(),
                attrs,
                children: Vec::new(),
                self_closing: true,
                span: Span { start, end: open_end },
                open_end,
                close_start: None,
            });
        }

        let children = if self.dialect == Dialect::Html
            && matches!(name.to_ascii_lowercase().as_str(), "script" | "style")
        {
            self.parse_raw_text(name)?
        } else {
            self.parse_nodes()?
        };

        let close_start = self.offset();
        if !self.rest.starts_with("</") {
            return Err(ParseError::at(
                self.src,
                start,
                format!("unclosed element <{name}>"),
            ));
        }
        self.advance(2);
        let close_name = if self.rest.starts_with('>') {
            ""
        } else {
            self.parse_name().unwrap_or_default()
        };
        let matches = match self.dialect {
            Dialect::Jsx => close_name == name,
            Dialect::Html => close_name.eq_ignore_ascii_case(name),
        };
        if !matches {
            return Err(ParseError::at(
                self.src,
                close_start,
                format!("mismatched closing tag </{close_name}>, expected </{name}>"),
            ));
        }
        self.skip_ws();
        if !self.rest.starts_with('>') {
            return Err(self.error(format!("expected `>` after </{close_name}")));
        }
        self.advance(1);

        Ok(MarkupElement {
            name: name.to_string(),
            attrs,
            children,
            self_closing: false,
            span: Span { start, end: self.offset() },
            open_end,
            close_start: Some(close_start),
        })
    }

    fn parse_raw_text(&mut self, name: &str) -> Result<Vec<MarkupNode>, ParseError> {
        let start = self.offset();
        let needle = format!("</{}", name.to_ascii_lowercase());
        let Some(end) = self.rest.to_ascii_lowercase().find(&needle) else {
            return Err(ParseError::at(self.src, start, format!("unclosed element <{name}>")));
        };
        let text = self.rest[..end].to_string();
        self.advance(end);
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![MarkupNode::Text {
            text,
            span: Span { start, end: self.offset() },
        }])
    }

    fn parse_attrs(&mut self) -> Result<Vec<MarkupAttr>, ParseError> {
        let mut attrs = Vec::new();
        loop {
            self.skip_ws();
            if self.rest.is_empty() {
                return Err(self.error("unexpected end of input inside a tag"));
            }
            if self.rest.starts_with('>') || self.rest.starts_with("/>") {
                return Ok(attrs);
            }
            let start = self.offset();

            if self.dialect == Dialect::Jsx && self.rest.starts_with('{') {
                // Spread attribute `{...props}`.
                let value_start = start + 1;
                let code = self.parse_braced()?;
                attrs.push(MarkupAttr {
                    name: "...".to_string(),
                    value: AttrValue::Expr(code),
                    span: Span { start, end: self.offset() },
                    value_span: Some(Span { start: value_start, end: self.offset() - 1 }),
                });
                continue;
            }

            let name = self
                .parse_name()
                .ok_or_else(|| self.error("expected attribute name"))?
                .to_string();
            let before_eq = self.rest;
            self.skip_ws();
            if !self.rest.starts_with('=') {
                self.rest = before_eq;
                attrs.push(MarkupAttr {
                    name,
                    value: AttrValue::Bool,
                    span: Span { start, end: self.offset() },
                    value_span: None,
                });
                continue;
            }
            self.advance(1);
            self.skip_ws();

            let value_start = self.offset();
            let (value, value_span) = if self.rest.starts_with('"') || self.rest.starts_with('\'') {
                let s = self.parse_quoted()?;
                let inner = Span { start: value_start + 1, end: self.offset() - 1 };
                (AttrValue::Str(s.to_string()), inner)
            } else if self.dialect == Dialect::Jsx && self.rest.starts_with('{') {
                let code = self.parse_braced()?;
                let inner = Span { start: value_start + 1, end: self.offset() - 1 };
                (AttrValue::Expr(code), inner)
            } else if self.dialect == Dialect::Html {
                let raw: Result<&str, winnow::error::ErrMode<ContextError>> =
                    take_till(1.., |c: char| c.is_whitespace() || c == '>').parse_next(&mut self.rest);
                let raw = raw.map_err(|_| self.error("expected attribute value"))?;
                let inner = Span { start: value_start, end: self.offset() };
                (AttrValue::Str(raw.to_string()), inner)
            } else {
                return Err(self.error(format!("expected a value for `{name}`")));
            };
            attrs.push(MarkupAttr {
                name,
                value,
                span: Span { start, end: self.offset() },
                value_span: Some(value_span),
            });
        }
    }

    fn parse_quoted(&mut self) -> Result<&'a str, ParseError> {
        let quote = if self.rest.starts_with('"') { '"' } else { '\'' };
        let start = self.offset();
        let value: Result<&str, winnow::error::ErrMode<ContextError>> =
            delimited(quote, take_till(0.., quote), quote).parse_next(&mut self.rest);
        value.map_err(|_| ParseError::at(self.src, start, "unterminated string"))
    }

    /// Consume a balanced `{…}` block and return the body without braces.
    /// String literals and comments are skipped so braces inside them do not
    /// count.
    fn parse_braced(&mut self) -> Result<String, ParseError> {
        let start = self.offset();
        let bytes = self.rest.as_bytes();
        let mut depth = 0usize;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = self.rest[1..i].to_string();
                        self.advance(i + 1);
                        return Ok(body);
                    }
                }
                q @ (b'\'' | b'"' | b'`') => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != q {
                        if bytes[i] == b'\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    let Some(end) = self.rest[i + 2..].find("*/") else {
                        break;
                    };
                    i += 2 + end + 1;
                }
                b'/' if bytes.get(i + 1) == Some(&b'/') => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        Err(ParseError::at(self.src, start, "unbalanced `{`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_nested_jsx_with_spans() {
        let src = r#"<div data-tag="root" className="app">
  <h1 data-tag="title">Hi {name}</h1>
  <img data-tag="logo" src="a.png" />
</div>"#;
        let el = parse_single_element(src, Dialect::Jsx).unwrap();
        assert_eq!(el.name, "div");
        assert_eq!(el.tag(), Some("root"));
        assert_eq!(el.attr_str("className"), Some("app"));
        assert_eq!(el.span, Span { start: 0, end: src.len() });
        assert_eq!(el.close_start, Some(src.rfind("</div>").unwrap()));

        let kids: Vec<_> = el.child_elements().collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0].span.slice(src), r#"<h1 data-tag="title">Hi {name}</h1>"#);
        assert!(matches!(&kids[0].children[1], MarkupNode::Expr { code, .. } if code == "name"));
        assert!(kids[1].self_closing);
        assert_eq!(kids[1].span.slice(src), r#"<img data-tag="logo" src="a.png" />"#);
    }

    #[test]
    fn attribute_forms() {
        let src = r#"<input data-locked disabled={true} style={{ color: 'red' }} {...rest} value='x' />"#;
        let el = parse_single_element(src, Dialect::Jsx).unwrap();
        let names: Vec<_> = el.attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["data-locked", "disabled", "style", "...", "value"]);
        assert_eq!(el.attrs[0].value, AttrValue::Bool);
        assert_eq!(el.attrs[2].value, AttrValue::Expr("{ color: 'red' }".into()));
        assert_eq!(el.attrs[4].value_span.unwrap().slice(src), "x");
    }

    #[test]
    fn braces_inside_strings_and_comments() {
        let src = "<p>{'}'}{/* } */}{`{`}</p>";
        let el = parse_single_element(src, Dialect::Jsx).unwrap();
        assert_eq!(el.children.len(), 3);
    }

    #[test]
    fn jsx_fragment() {
        let el = parse_single_element("<><b>x</b></>", Dialect::Jsx).unwrap();
        assert!(el.is_fragment());
        assert_eq!(el.child_elements().count(), 1);
    }

    #[test]
    fn html_voids_doctype_and_unquoted() {
        let src = "<!DOCTYPE html><html><body><img src=a.png><br><p class=x>t</p><!-- c --></body></html>";
        let nodes = parse_markup(src, Dialect::Html).unwrap();
        assert_eq!(nodes.len(), 1);
        let html = nodes[0].as_element().unwrap();
        let body = html.child_elements().next().unwrap();
        let names: Vec<_> = body.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["img", "br", "p"]);
        assert_eq!(body.children.len(), 4);
    }

    #[test]
    fn html_script_is_raw_text() {
        let src = "<div><script>if (a < b) {}</script></div>";
        let el = parse_single_element(src, Dialect::Html).unwrap();
        assert_eq!(el.child_elements().count(), 1);
    }

    #[test]
    fn errors_carry_positions() {
        let err = parse_single_element("<div>\n  <p>x</span>\n</div>", Dialect::Jsx).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("mismatched"));

        let err = parse_single_element("<div>", Dialect::Jsx).unwrap_err();
        assert!(err.message.contains("unclosed"));

        assert!(parse_single_element("<a/><b/>", Dialect::Jsx).is_err());
        assert!(parse_single_element("   ", Dialect::Jsx).is_err());
    }

    #[test]
    fn path_and_find() {
        let src = r#"<div data-tag="root"><section data-tag="s"><p data-tag="p">x</p></section></div>"#;
        let el = parse_single_element(src, Dialect::Jsx).unwrap();
        let path = el.path_to("p").unwrap();
        let tags: Vec<_> = path.iter().filter_map(|e| e.tag()).collect();
        assert_eq!(tags, vec!["root", "s", "p"]);
        assert!(el.find_tag("nope").is_none());
        assert_eq!(el.walk().len(), 3);
    }

    #[test]
    fn string_literals() {
        assert_eq!(string_literal("'a b'"), Some("a b"));
        assert_eq!(string_literal("\"x\""), Some("x"));
        assert_eq!(string_literal("`t${x}`"), None);
        assert_eq!(string_literal("foo"), None);
        assert_eq!(string_literal(r"'it\'s'"), Some(r"it\'s"));
        assert_eq!(string_literal("'a' + 'b'"), None);
    }
}
