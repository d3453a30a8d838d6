//! Inline style declarations and the kebab/camel property adapter
//!
//! Raw CSS text (style attributes, `:root` blocks) uses kebab-case
//! property names while live style maps handed to callers use camelCase.
//! Every conversion between the two goes through [`to_camel_case`] and
//! [`to_kebab_case`].

use std::collections::BTreeMap;

/// Property name -> value
pub type StyleMap = BTreeMap<String, String>;

/// Split a declaration block (`a: b; c: d`) into ordered `(property, value)`
/// pairs.
///
/// Semicolons inside parentheses or quotes do not terminate a declaration,
/// so values such as `url(data:image/png;base64,...)` survive intact.
/// Property names are trimmed; values are trimmed but otherwise kept as
/// written.
pub fn parse_declarations(block: &str) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    for chunk in split_top_level(block, ';') {
        let Some(colon) = find_top_level(chunk, ':') else {
            continue;
        };
        let property = chunk[..colon].trim();
        let value = chunk[colon + 1..].trim();
        if property.is_empty() || value.is_empty() {
            continue;
        }
        declarations.push((property.to_string(), value.to_string()));
    }
    declarations
}

/// Serialize declarations back to inline style text (`a: b; c: d`)
pub fn serialize_declarations<'a, I>(declarations: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    declarations
        .into_iter()
        .map(|(property, value)| format!("{}: {}", property, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse a `style` attribute into a camelCase keyed map
pub fn parse_inline_style(style: &str) -> StyleMap {
    parse_declarations(style)
        .into_iter()
        .map(|(property, value)| (to_camel_case(&property), value))
        .collect()
}

/// `background-color` -> `backgroundColor`, `-webkit-transform` ->
/// `WebkitTransform`, `-ms-transform` -> `msTransform`. Custom properties
/// (`--x`) are returned unchanged.
pub fn to_camel_case(property: &str) -> String {
    if property.starts_with("--") {
        return property.to_string();
    }
    // The ms prefix stays lowercase in style objects.
    let property = if property.starts_with("-ms-") {
        &property[1..]
    } else {
        property
    };

    let mut out = String::with_capacity(property.len());
    let mut upper_next = false;
    for ch in property.chars() {
        if ch == '-' {
            // A leading dash is a vendor prefix, which also capitalizes.
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// `backgroundColor` -> `background-color`, `WebkitTransform` ->
/// `-webkit-transform`, `msTransform` -> `-ms-transform`. Already-kebab
/// names and custom properties pass through unchanged.
pub fn to_kebab_case(property: &str) -> String {
    if property.starts_with("--") || property.contains('-') {
        return property.to_string();
    }

    let mut out = String::with_capacity(property.len() + 4);
    if property.starts_with("ms") && property[2..].starts_with(|c: char| c.is_ascii_uppercase()) {
        out.push('-');
    }
    for ch in property.chars() {
        if ch.is_ascii_uppercase() {
            // Also covers vendor prefixes: `Webkit...` -> `-webkit-...`.
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Keys of `current` whose value differs from `baseline`, or which the
/// baseline lacks entirely.
pub fn get_style_diff(baseline: &StyleMap, current: &StyleMap) -> StyleMap {
    current
        .iter()
        .filter(|(key, value)| baseline.get(*key) != Some(*value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Read a pixel length (`12px`, `12.5px`, `0`) as a number
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = value.strip_suffix("px").unwrap_or(value).trim();
    if number.is_empty() {
        return None;
    }
    number.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Format a number as a pixel length
pub fn px(value: f64) -> String {
    format!("{}px", value)
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in text.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                c if c == separator && depth == 0 => {
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

fn find_top_level(text: &str, needle: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, ch) in text.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                c if c == needle && depth == 0 => return Some(i),
                _ => {}
            },
        }
    }
    None
}
