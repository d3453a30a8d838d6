//! Factoring CSS rules common to every page into one shared sheet

use serde::Serialize;
use std::collections::HashSet;

/// Output of [`extract_shared_css`]
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedCss {
    /// Rules present in every page, once each, in first-appearance order
    pub shared_css: String,
    /// Per page, the rules that are not shared, in their original order
    pub page_css: Vec<String>,
}

/// Split a stylesheet into top-level rules.
///
/// Braces are balanced, so an `@media` block (with everything nested in
/// it) is one rule. Statement at-rules such as `@import` end at `;`.
/// Braces inside strings and comments are ignored. A comment directly
/// before a rule is part of that rule's text.
pub fn split_rules(css: &str) -> Vec<&str> {
    let bytes = css.as_bytes();
    let mut rules = Vec::new();
    let mut start: Option<usize> = None;
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if start.is_none() {
            if b.is_ascii_whitespace() {
                i += 1;
                continue;
            }
            start = Some(i);
        }

        match b {
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = css[i + 2..].find("*/").map(|e| i + 2 + e + 2).unwrap_or(bytes.len());
                continue;
            }
            b'"' | b'\'' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    if let Some(s) = start.take() {
                        rules.push(&css[s..=i]);
                    }
                }
            }
            b';' if depth == 0 => {
                if let Some(s) = start.take() {
                    rules.push(&css[s..=i]);
                }
            }
            _ => {}
        }
        i += 1;
    }

    if let Some(s) = start {
        let rest = css[s..].trim_end();
        if !rest.is_empty() {
            rules.push(rest);
        }
    }
    rules
}

/// Comparison key for a rule: comments removed, whitespace collapsed
pub fn normalize_rule(rule: &str) -> String {
    let mut stripped = String::with_capacity(rule.len());
    let mut rest = rule;
    while let Some(open) = rest.find("/*") {
        stripped.push_str(&rest[..open]);
        stripped.push(' ');
        rest = match rest[open + 2..].find("*/") {
            Some(close) => &rest[open + 2 + close + 2..],
            None => "",
        };
    }
    stripped.push_str(rest);
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find the rules every page has in common and factor them out.
///
/// With fewer than two pages, or nothing in common, `shared_css` is empty
/// and every page's CSS comes back unchanged.
pub fn extract_shared_css<S: AsRef<str>>(pages: &[S]) -> SharedCss {
    let unchanged = || SharedCss {
        shared_css: String::new(),
        page_css: pages.iter().map(|p| p.as_ref().to_string()).collect(),
    };
    if pages.len() < 2 {
        return unchanged();
    }

    let parsed: Vec<Vec<(&str, String)>> = pages
        .iter()
        .map(|css| {
            split_rules(css.as_ref())
                .into_iter()
                .map(|rule| (rule, normalize_rule(rule)))
                .collect()
        })
        .collect();
    let sets: Vec<HashSet<&str>> = parsed
        .iter()
        .map(|rules| rules.iter().map(|(_, key)| key.as_str()).collect())
        .collect();

    let mut shared_keys: HashSet<&str> = HashSet::new();
    let mut shared_rules = Vec::new();
    for (rule, key) in parsed.iter().flatten() {
        if key.is_empty() || shared_keys.contains(key.as_str()) {
            continue;
        }
        if sets.iter().all(|set| set.contains(key.as_str())) {
            shared_keys.insert(key.as_str());
            shared_rules.push(*rule);
        }
    }

    if shared_rules.is_empty() {
        return unchanged();
    }

    let page_css = parsed
        .iter()
        .map(|rules| {
            rules
                .iter()
                .filter(|(_, key)| !shared_keys.contains(key.as_str()))
                .map(|(rule, _)| *rule)
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect();

    SharedCss {
        shared_css: shared_rules.join("\n"),
        page_css,
    }
}
