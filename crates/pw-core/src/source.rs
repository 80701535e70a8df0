//! Component source documents: boilerplate around the returned markup.

use crate::generator::GeneratorConfig;

/// The import every generated component starts with.
pub const REACT_IMPORT: &str = "import React from 'react';";

/// Byte offset of the `<` that opens the component's returned markup.
///
/// Looks for `return (<…` / `return <…` first; a document that is nothing but
/// markup is accepted as-is. `None` when the source holds no markup.
pub fn locate_markup(source: &str) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut from = 0;
    while let Some(pos) = source[from..].find("return") {
        let start = from + pos;
        let end = start + "return".len();
        from = end;
        let ident_before = start > 0 && is_ident_byte(bytes[start - 1]);
        let ident_after = bytes.get(end).is_some_and(|&b| is_ident_byte(b));
        if ident_before || ident_after {
            continue;
        }
        let mut i = skip_ws(bytes, end);
        if bytes.get(i) == Some(&b'(') {
            i = skip_ws(bytes, i + 1);
        }
        if bytes.get(i) == Some(&b'<') {
            return Some(i);
        }
    }
    let first = skip_ws(bytes, 0);
    (bytes.get(first) == Some(&b'<')).then_some(first)
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

fn skip_ws(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
        i += 1;
    }
    i
}

/// Name of the default-exported function component, if declared.
pub fn component_name(source: &str) -> Option<String> {
    let rest = &source[source.find("export default function")? + "export default function".len()..];
    let name: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    (!name.is_empty()).then_some(name)
}

/// Import lines other than the React import, in source order.
pub fn extra_imports(source: &str) -> Vec<String> {
    source
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("import ") && *l != REACT_IMPORT)
        .map(str::to_string)
        .collect()
}

/// Wrap root markup (written at depth 0) in component boilerplate.
#[must_use]
pub fn wrap_component(markup: &str, config: &GeneratorConfig) -> String {
    let mut out = String::with_capacity(markup.len() + 128);
    out.push_str(REACT_IMPORT);
    out.push('\n');
    for import in &config.imports {
        out.push_str(import);
        out.push('\n');
    }
    out.push('\n');
    out.push_str("export default function ");
    out.push_str(&config.component_name);
    out.push_str("() {\n");
    out.push_str("  return (\n");
    for line in markup.trim_end().lines() {
        if !line.is_empty() {
            out.push_str("    ");
            out.push_str(line);
        }
        out.push('\n');
    }
    out.push_str("  );\n");
    out.push_str("}\n");
    out
}
