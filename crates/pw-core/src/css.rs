//! CSS helpers: property-name case conversion, inline style declarations,
//! color parsing, and value validation for property edits.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Property names ──────────────────────────────────────────────────────

/// `fontSize` → `font-size`, `WebkitTransition` → `-webkit-transition`.
/// Custom properties (`--x`) and already-kebab names pass through.
pub fn camel_to_kebab(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 || is_vendor_prefix(name) {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn is_vendor_prefix(name: &str) -> bool {
    ["Webkit", "Moz", "Ms", "O"]
        .iter()
        .any(|p| name.starts_with(p) && name[p.len()..].starts_with(|c: char| c.is_ascii_uppercase()))
}

/// `font-size` → `fontSize`, `-webkit-transition` → `WebkitTransition`.
pub fn kebab_to_camel(name: &str) -> String {
    if name.starts_with("--") {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        // A leading dash is a vendor prefix: `-webkit-x` → `WebkitX`.
        if c == '-' {
            upper = true;
            continue;
        }
        if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ─── Inline style declarations ───────────────────────────────────────────

/// One `property: value` pair. Property names are stored kebab-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

/// An element's inline style, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineStyle {
    pub declarations: Vec<Declaration>,
}

impl InlineStyle {
    /// Parse CSS declaration text (`color: red; font-size: 12px`).
    /// Malformed declarations (no colon, empty name) are skipped.
    pub fn parse(text: &str) -> Self {
        let mut style = Self::default();
        for part in split_top_level(text, ';') {
            let Some((prop, value)) = part.split_once(':') else {
                continue;
            };
            let prop = prop.trim();
            let value = value.trim();
            if prop.is_empty() || value.is_empty() {
                continue;
            }
            style.set(&camel_to_kebab(prop), value);
        }
        style
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .find(|d| d.property == property)
            .map(|d| d.value.as_str())
    }

    /// Set a declaration, keeping its position when it already exists.
    pub fn set(&mut self, property: &str, value: &str) {
        if let Some(d) = self.declarations.iter_mut().find(|d| d.property == property) {
            d.value = value.to_string();
        } else {
            self.declarations.push(Declaration {
                property: property.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn remove(&mut self, property: &str) -> Option<String> {
        let pos = self.declarations.iter().position(|d| d.property == property)?;
        Some(self.declarations.remove(pos).value)
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Serialize back to declaration text.
    pub fn to_css_text(&self) -> String {
        self.declarations
            .iter()
            .map(|d| format!("{}: {};", d.property, d.value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Split on `sep` outside quotes and parentheses.
pub(crate) fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                c if c == sep && depth == 0 => {
                    parts.push(&text[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    parts.push(&text[start..]);
    parts
}

// ─── Colors ──────────────────────────────────────────────────────────────

/// RGBA color. Stored as 4 × f32 [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// Helper to parse a single hex digit.
fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("orange", [255, 165, 0]),
    ("purple", [128, 0, 128]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("silver", [192, 192, 192]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
    ("maroon", [128, 0, 0]),
    ("olive", [128, 128, 0]),
    ("lime", [0, 255, 0]),
    ("aqua", [0, 255, 255]),
    ("cyan", [0, 255, 255]),
    ("fuchsia", [255, 0, 255]),
    ("magenta", [255, 0, 255]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
];

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    fn from_bytes(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self::rgba(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a)
    }

    /// Parse a hex color string: `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let bytes = hex.as_bytes();

        match bytes.len() {
            3 | 4 => {
                let r = hex_val(bytes[0])? * 17;
                let g = hex_val(bytes[1])? * 17;
                let b = hex_val(bytes[2])? * 17;
                let a = match bytes.get(3) {
                    Some(&c) => (hex_val(c)? * 17) as f32 / 255.0,
                    None => 1.0,
                };
                Some(Self::from_bytes(r, g, b, a))
            }
            6 | 8 => {
                let r = hex_val(bytes[0])? << 4 | hex_val(bytes[1])?;
                let g = hex_val(bytes[2])? << 4 | hex_val(bytes[3])?;
                let b = hex_val(bytes[4])? << 4 | hex_val(bytes[5])?;
                let a = if bytes.len() == 8 {
                    (hex_val(bytes[6])? << 4 | hex_val(bytes[7])?) as f32 / 255.0
                } else {
                    1.0
                };
                Some(Self::from_bytes(r, g, b, a))
            }
            _ => None,
        }
    }

    /// Parse any supported CSS color: hex, `rgb()`, `rgba()`, named colors,
    /// `transparent`.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim();
        if v.starts_with('#') {
            return Self::from_hex(v);
        }
        let lower = v.to_ascii_lowercase();
        if lower == "transparent" {
            return Some(Self::TRANSPARENT);
        }
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_rgb_args(args);
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, [r, g, b])| Self::from_bytes(*r, *g, *b, 1.0))
    }

    /// Serialize the way browsers report computed colors.
    pub fn to_css_rgb(&self) -> String {
        let r = (self.r * 255.0).round() as u8;
        let g = (self.g * 255.0).round() as u8;
        let b = (self.b * 255.0).round() as u8;
        if (self.a - 1.0).abs() < f32::EPSILON {
            format!("rgb({r}, {g}, {b})")
        } else {
            let a = (self.a * 100.0).round() / 100.0;
            format!("rgba({r}, {g}, {b}, {a})")
        }
    }
}

fn parse_rgb_args(args: &str) -> Option<Color> {
    let parts: Vec<&str> = args
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |s: &str| -> Option<u8> {
        if let Some(pct) = s.strip_suffix('%') {
            let p: f32 = pct.parse().ok()?;
            Some((p.clamp(0.0, 100.0) * 2.55).round() as u8)
        } else {
            let n: f32 = s.parse().ok()?;
            Some(n.clamp(0.0, 255.0).round() as u8)
        }
    };
    let alpha = match parts.get(3) {
        Some(s) => match s.strip_suffix('%') {
            Some(pct) => pct.parse::<f32>().ok()? / 100.0,
            None => s.parse::<f32>().ok()?,
        },
        None => 1.0,
    };
    Some(Color::from_bytes(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha.clamp(0.0, 1.0),
    ))
}

// ─── Value validation ────────────────────────────────────────────────────

/// Rejected property value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CssError {
    #[error("value for `{property}` contains forbidden character {found:?}")]
    ForbiddenChar { property: String, found: char },

    #[error("value for `{property}` has unbalanced quotes or parentheses")]
    Unbalanced { property: String },

    #[error("`{value}` is not a valid color for `{property}`")]
    InvalidColor { property: String, value: String },

    #[error("`{value}` is not a valid length for `{property}`")]
    InvalidLength { property: String, value: String },

    #[error("`{0}` is not a valid property name")]
    InvalidProperty(String),
}

const COLOR_PROPERTIES: &[&str] = &[
    "color",
    "background-color",
    "border-color",
    "outline-color",
    "fill",
    "stroke",
];

const LENGTH_PROPERTIES: &[&str] = &[
    "width",
    "height",
    "min-width",
    "min-height",
    "max-width",
    "max-height",
    "margin",
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "padding",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "top",
    "right",
    "bottom",
    "left",
    "gap",
    "font-size",
    "border-radius",
    "border-width",
    "letter-spacing",
];

const GLOBAL_KEYWORDS: &[&str] = &["inherit", "initial", "unset", "revert"];

/// Validate a property name (kebab-case).
pub fn validate_property(property: &str) -> Result<(), CssError> {
    let body = property.strip_prefix("--").unwrap_or(property);
    let ok = !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !body.starts_with(|c: char| c.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(CssError::InvalidProperty(property.to_string()))
    }
}

/// Validate a value before it is written to a live node's inline style.
///
/// An empty value is valid and means "remove the declaration".
pub fn validate_value(property: &str, value: &str) -> Result<(), CssError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    if let Some(found) = value.chars().find(|c| matches!(c, ';' | '{' | '}' | '<' | '>' | '\n')) {
        return Err(CssError::ForbiddenChar {
            property: property.to_string(),
            found,
        });
    }
    if !is_balanced(value) {
        return Err(CssError::Unbalanced {
            property: property.to_string(),
        });
    }
    let lower = value.to_ascii_lowercase();
    if GLOBAL_KEYWORDS.contains(&lower.as_str()) || lower.starts_with("var(") {
        return Ok(());
    }
    if COLOR_PROPERTIES.contains(&property) {
        if lower == "currentcolor" || Color::parse(value).is_some() {
            return Ok(());
        }
        return Err(CssError::InvalidColor {
            property: property.to_string(),
            value: value.to_string(),
        });
    }
    if LENGTH_PROPERTIES.contains(&property) {
        if split_top_level(&lower, ' ')
            .into_iter()
            .filter(|t| !t.is_empty())
            .all(is_length_token)
        {
            return Ok(());
        }
        return Err(CssError::InvalidLength {
            property: property.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

fn is_balanced(value: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for c in value.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            },
        }
    }
    depth == 0 && quote.is_none()
}

const LENGTH_UNITS: &[&str] = &[
    "px", "em", "rem", "%", "vh", "vw", "vmin", "vmax", "pt", "ch", "ex", "fr", "cm", "mm", "in",
];

const LENGTH_KEYWORDS: &[&str] = &[
    "auto",
    "none",
    "fit-content",
    "min-content",
    "max-content",
    "xx-small",
    "x-small",
    "small",
    "medium",
    "large",
    "x-large",
    "xx-large",
    "smaller",
    "larger",
    "normal",
    "thin",
    "thick",
];

fn is_length_token(token: &str) -> bool {
    if LENGTH_KEYWORDS.contains(&token) {
        return true;
    }
    if ["calc(", "min(", "max(", "clamp(", "var("]
        .iter()
        .any(|f| token.starts_with(f))
    {
        return token.ends_with(')');
    }
    let numeric_end = token
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(token.len());
    let (number, unit) = token.split_at(numeric_end);
    if number.parse::<f64>().is_err() {
        return false;
    }
    unit.is_empty() && number.parse::<f64>().is_ok_and(|n| n == 0.0) || LENGTH_UNITS.contains(&unit)
}
