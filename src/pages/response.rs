//! Turning raw multi-page completion text into structured pages
//!
//! Model output is frequently wrapped in prose, fenced, or slightly
//! invalid JSON. Parsing tries progressively looser strategies and always
//! reports failure as data in [`MultiPageResponse::error`].

use super::shared_css::extract_shared_css;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([A-Za-z0-9_+-]*)[^\n]*\n(.*?)```")
        .expect("FENCE_RE: hardcoded regex is valid")
});

static TRAILING_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r",(\s*[}\]])").expect("TRAILING_COMMA_RE: hardcoded regex is valid")
});

static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:!doctype|[a-zA-Z][a-zA-Z0-9-]*)[\s>/]")
        .expect("MARKUP_RE: hardcoded regex is valid")
});

/// One generated page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratedPage {
    pub name: String,
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
}

impl GeneratedPage {
    pub fn new(name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            html: html.into(),
            ..Default::default()
        }
    }
}

/// Header and footer fragments shared by every page
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SharedNavigation {
    #[serde(default)]
    pub header: String,
    #[serde(default)]
    pub footer: String,
}

/// Structured form of a multi-page response
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiPageResponse {
    pub pages: Vec<GeneratedPage>,
    pub shared_theme: String,
    pub shared_navigation: SharedNavigation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MultiPageResponse {
    fn failure(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!("multi-page response rejected: {}", message);
        Self {
            error: Some(message),
            ..Default::default()
        }
    }

    fn from_html_pages(pages: Vec<String>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(i, html)| GeneratedPage::new(format!("page-{}", i + 1), html))
                .collect(),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Move rules common to every page into `shared_theme`, leaving each
    /// page only its own rules.
    pub fn factor_shared_css(&mut self) {
        let css: Vec<&str> = self.pages.iter().map(|p| p.css.as_str()).collect();
        let extracted = extract_shared_css(&css);
        if extracted.shared_css.is_empty() {
            return;
        }

        for (page, css) in self.pages.iter_mut().zip(extracted.page_css) {
            page.css = css;
        }
        self.shared_theme = if self.shared_theme.trim().is_empty() {
            extracted.shared_css
        } else {
            format!("{}\n\n{}", self.shared_theme, extracted.shared_css)
        };
    }
}

/// Parse completion text into pages. Never fails; problems are reported
/// through the `error` field.
pub fn parse_multi_page_response(text: &str) -> MultiPageResponse {
    if text.trim().is_empty() {
        return MultiPageResponse::failure("Response is empty");
    }

    let fenced = FENCE_RE.captures(text).and_then(|c| c.get(2)).map(|m| m.as_str());

    let json = parse_object(text)
        .inspect(|_| debug!("response parsed as JSON"))
        .or_else(|| fenced.and_then(parse_object))
        .or_else(|| fenced.and_then(repair_json))
        .or_else(|| repair_json(text));
    if let Some(value) = json {
        return pages_from_json(&value).unwrap_or_else(MultiPageResponse::failure);
    }

    let html_blocks: Vec<String> = FENCE_RE
        .captures_iter(text)
        .filter(|c| c.get(1).is_some_and(|lang| lang.as_str().eq_ignore_ascii_case("html")))
        .filter_map(|c| c.get(2))
        .map(|m| m.as_str().trim().to_string())
        .filter(|html| !html.is_empty())
        .collect();
    if !html_blocks.is_empty() {
        debug!("response parsed as {} fenced HTML block(s)", html_blocks.len());
        return MultiPageResponse::from_html_pages(html_blocks);
    }

    if fenced.is_none() && MARKUP_RE.is_match(text) {
        debug!("response treated as a single raw HTML page");
        return MultiPageResponse::from_html_pages(vec![text.trim().to_string()]);
    }

    MultiPageResponse::failure("Response contains neither page JSON nor HTML")
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text.trim())
        .ok()
        .filter(Value::is_object)
}

/// Mechanical repairs: cut to the outermost braces, drop trailing commas,
/// then turn single-quoted strings into double-quoted ones. Only an object
/// with a `pages` key counts, so an object literal inside page markup
/// (a `<script>` config, an empty CSS rule) is not mistaken for the payload.
fn repair_json(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let sliced = &text[start..=end];
    let without_commas = TRAILING_COMMA_RE.replace_all(sliced, "$1");
    parse_object(&without_commas)
        .or_else(|| parse_object(&requote(&without_commas)))
        .filter(|value| value.get("pages").is_some())
}

fn requote(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(_), '\\') => {
                let next = chars.next();
                match (quote, next) {
                    // \' has no meaning inside a double-quoted string
                    (Some('\''), Some('\'')) => out.push('\''),
                    (_, Some(n)) => {
                        out.push('\\');
                        out.push(n);
                    }
                    (_, None) => out.push('\\'),
                }
            }
            (Some('\''), '\'') => {
                out.push('"');
                quote = None;
            }
            (Some('\''), '"') => out.push_str("\\\""),
            (Some(q), c) if c == q => {
                out.push(c);
                quote = None;
            }
            (Some(_), c) => out.push(c),
            (None, '\'') => {
                out.push('"');
                quote = Some('\'');
            }
            (None, '"') => {
                out.push('"');
                quote = Some('"');
            }
            (None, c) => out.push(c),
        }
    }
    out
}

fn text_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn pages_from_json(value: &Value) -> Result<MultiPageResponse, String> {
    let Some(raw_pages) = value.get("pages").and_then(Value::as_array) else {
        return Err("Response JSON has no \"pages\" array".to_string());
    };

    let pages: Vec<GeneratedPage> = raw_pages
        .iter()
        .enumerate()
        .filter_map(|(i, page)| {
            let html = text_field(page, "html");
            if html.trim().is_empty() {
                return None;
            }
            let name = text_field(page, "name");
            Some(GeneratedPage {
                name: if name.trim().is_empty() {
                    format!("page-{}", i + 1)
                } else {
                    name
                },
                html,
                css: text_field(page, "css"),
                js: text_field(page, "js"),
            })
        })
        .collect();

    if pages.is_empty() {
        return Err("Response JSON contains no pages with HTML".to_string());
    }

    let navigation = value.get("sharedNavigation").cloned().unwrap_or(Value::Null);
    Ok(MultiPageResponse {
        pages,
        shared_theme: text_field(value, "sharedTheme"),
        shared_navigation: SharedNavigation {
            header: text_field(&navigation, "header"),
            footer: text_field(&navigation, "footer"),
        },
        error: None,
    })
}

/// Prepend `theme` to every page's CSS, separated by a blank line.
/// A blank theme leaves the pages as they are.
pub fn inject_shared_theme(pages: &[GeneratedPage], theme: &str) -> Vec<GeneratedPage> {
    if theme.trim().is_empty() {
        return pages.to_vec();
    }
    pages
        .iter()
        .map(|page| GeneratedPage {
            css: if page.css.trim().is_empty() {
                theme.to_string()
            } else {
                format!("{}\n\n{}", theme, page.css)
            },
            ..page.clone()
        })
        .collect()
}
