//! Reading and rewriting the `:root { ... }` block of a theme stylesheet

use crate::html::style::{StyleMap, parse_declarations, to_kebab_case};
use regex::Regex;
use std::sync::LazyLock;

static ROOT_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":root\s*\{").expect("ROOT_BLOCK_RE: hardcoded regex is valid"));

/// Byte span of the first `:root` block: (start of `:root`, end past `}`)
/// plus the span of its body.
struct RootBlock {
    start: usize,
    end: usize,
    body_start: usize,
    body_end: usize,
}

fn find_root_block(css: &str) -> Option<RootBlock> {
    let found = ROOT_BLOCK_RE.find(css)?;
    let body_start = found.end();
    let mut quote: Option<char> = None;
    for (offset, ch) in css[body_start..].char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '}' => {
                    let body_end = body_start + offset;
                    return Some(RootBlock {
                        start: found.start(),
                        end: body_end + 1,
                        body_start,
                        body_end,
                    });
                }
                _ => {}
            },
        }
    }
    None
}

/// Declarations of the first `:root` block, in source order
pub fn root_properties(css: &str) -> Vec<(String, String)> {
    find_root_block(css)
        .map(|block| parse_declarations(&css[block.body_start..block.body_end]))
        .unwrap_or_default()
}

/// Merge `changes` into the `:root` block, creating the block at the top
/// of the sheet if there is none.
///
/// Returns the rewritten sheet and the previous values of the touched keys
/// (keys that did not exist before are absent). Change keys may be
/// camelCase; they are written kebab-case.
pub fn merge_root_properties(css: &str, changes: &StyleMap) -> (String, StyleMap) {
    let block = find_root_block(css);
    let mut declarations = block
        .as_ref()
        .map(|b| parse_declarations(&css[b.body_start..b.body_end]))
        .unwrap_or_default();

    let mut previous = StyleMap::new();
    for (key, value) in changes {
        let property = to_kebab_case(key);
        match declarations.iter_mut().find(|(name, _)| *name == property) {
            Some(slot) => {
                previous.insert(key.clone(), std::mem::replace(&mut slot.1, value.clone()));
            }
            None => declarations.push((property, value.clone())),
        }
    }

    let serialized = serialize_root_block(&declarations);
    let css = match block {
        Some(b) => format!("{}{}{}", &css[..b.start], serialized, &css[b.end..]),
        None if css.trim().is_empty() => serialized,
        None => format!("{}\n\n{}", serialized, css),
    };
    (css, previous)
}

fn serialize_root_block(declarations: &[(String, String)]) -> String {
    let mut out = String::from(":root {\n");
    for (property, value) in declarations {
        out.push_str("  ");
        out.push_str(property);
        out.push_str(": ");
        out.push_str(value);
        out.push_str(";\n");
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn changes(pairs: &[(&str, &str)]) -> StyleMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_merge_into_existing_block() {
        let css = ":root { --primary: #000; --radius: 4px; }\nbody { margin: 0; }";
        let (updated, previous) =
            merge_root_properties(css, &changes(&[("--primary", "#ff0000"), ("--gap", "8px")]));

        assert_eq!(
            updated,
            ":root {\n  --primary: #ff0000;\n  --radius: 4px;\n  --gap: 8px;\n}\nbody { margin: 0; }"
        );
        assert_eq!(previous, changes(&[("--primary", "#000")]));
    }

    #[test]
    fn test_creates_block_when_absent() {
        let (updated, previous) = merge_root_properties("h1 { color: red; }", &changes(&[("--a", "1")]));
        assert_eq!(updated, ":root {\n  --a: 1;\n}\n\nh1 { color: red; }");
        assert!(previous.is_empty());

        let (updated, _) = merge_root_properties("", &changes(&[("--a", "1")]));
        assert_eq!(updated, ":root {\n  --a: 1;\n}");
    }

    #[test]
    fn test_camel_case_keys_written_kebab() {
        let (updated, _) = merge_root_properties(":root{}", &changes(&[("fontFamily", "serif")]));
        assert_eq!(root_properties(&updated), vec![("font-family".to_string(), "serif".to_string())]);
    }
}
