//! Checking `data-page-target` links between generated pages

use super::response::GeneratedPage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

static PAGE_TARGET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-page-target\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("PAGE_TARGET_RE: hardcoded regex is valid")
});

/// A page the host app knows about
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppPage {
    pub name: String,
}

/// The host app's page registry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppContext {
    pub pages: Vec<AppPage>,
}

impl AppContext {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: names.into_iter().map(|name| AppPage { name: name.into() }).collect(),
        }
    }
}

/// Result of [`validate_inter_page_links`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkValidation {
    pub valid: bool,
    /// Distinct unknown targets, in first-seen order
    pub missing_targets: Vec<String>,
}

/// Every `data-page-target` value in `html`, in source order
pub fn page_targets(html: &str) -> impl Iterator<Item = &str> {
    PAGE_TARGET_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str())
}

/// Report link targets that name no page in `app_context`
pub fn validate_inter_page_links(pages: &[GeneratedPage], app_context: &AppContext) -> LinkValidation {
    let known: HashSet<&str> = app_context.pages.iter().map(|p| p.name.as_str()).collect();
    let mut seen = HashSet::new();
    let missing_targets: Vec<String> = pages
        .iter()
        .flat_map(|page| page_targets(&page.html))
        .filter(|target| !known.contains(target) && seen.insert(*target))
        .map(str::to_string)
        .collect();

    LinkValidation {
        valid: missing_targets.is_empty(),
        missing_targets,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_quote_styles_and_dedupe() {
        let pages = vec![
            GeneratedPage::new(
                "home",
                r#"<a data-page-target="about">About</a><button data-page-target='pricing'>$</button>"#,
            ),
            GeneratedPage::new("about", r#"<div data-page-target = "contact"></div><a data-page-target="pricing">"#),
        ];
        let result = validate_inter_page_links(&pages, &AppContext::from_names(["home", "about"]));
        assert!(!result.valid);
        assert_eq!(result.missing_targets, vec!["pricing", "contact"]);
    }

    #[test]
    fn test_all_targets_known() {
        let pages = vec![GeneratedPage::new("home", r#"<a data-page-target="home">x</a>"#)];
        let result = validate_inter_page_links(&pages, &AppContext::from_names(["home"]));
        assert!(result.valid);
        assert!(result.missing_targets.is_empty());
    }

    #[test]
    fn test_app_context_from_json() {
        let context: AppContext =
            serde_json::from_str(r#"{"pages": [{"name": "home", "route": "/"}], "title": "x"}"#).unwrap();
        assert_eq!(context, AppContext::from_names(["home"]));
    }
}
