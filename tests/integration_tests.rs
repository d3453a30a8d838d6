//! Integration tests for htmlsync
//!
//! These tests verify the parser, engine, theme manager and response
//! tooling work together correctly.

use htmlsync::html::{Document, HtmlParser, Selector};
use htmlsync::pages::shared_css::{normalize_rule, split_rules};
use htmlsync::pages::{extract_shared_css, parse_multi_page_response};
use htmlsync::sync::{DomRoot, ElementOverride, ShapeProps, SyncEngine};
use htmlsync::theme::SharedThemeManager;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

const TAGS: [&str; 4] = ["div", "section", "article", "span"];

/// Markup whose id/uuid values are unique but otherwise awkward for CSS
fn page_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(
        (0..TAGS.len(), "[a-z][a-z0-9:. _-]{0,5}", 0..3u8, any::<bool>()),
        1..12,
    )
    .prop_map(|items| {
        let mut html = String::from("<!DOCTYPE html><html><head></head><body>");
        let mut open = Vec::new();
        for (i, (tag, prefix, kind, nest)) in items.into_iter().enumerate() {
            let tag = TAGS[tag];
            let value = format!("{}-{}", prefix, i);
            let attribute = match kind {
                0 => format!(r#" id="{}""#, value),
                1 => format!(r#" data-uuid="{}""#, value),
                _ => format!(r#" class="c{}""#, i % 3),
            };
            html.push_str(&format!("<{}{}>t{}", tag, attribute, i));
            if nest {
                open.push(tag);
            } else {
                html.push_str(&format!("</{}>", tag));
            }
        }
        while let Some(tag) = open.pop() {
            html.push_str(&format!("</{}>", tag));
        }
        html.push_str("</body></html>");
        html
    })
}

const RULE_POOL: [&str; 5] = [
    "body { margin: 0; }",
    "h1 { color: red; }",
    ".card { padding: 4px 8px; }",
    "@media (max-width: 600px) { .card { padding: 0; } }",
    "a:hover { text-decoration: underline; }",
];

fn stylesheet_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec((0..RULE_POOL.len(), any::<bool>()), 0..6).prop_map(|rules| {
        rules
            .into_iter()
            .map(|(i, spread)| {
                if spread {
                    RULE_POOL[i].replace("; ", ";\n  ").replace("{ ", "{\n  ")
                } else {
                    RULE_POOL[i].to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn rule_set(css: &str) -> BTreeSet<String> {
    split_rules(css).into_iter().map(normalize_rule).collect()
}

const LIVE_PAGE: &str = r#"<!DOCTYPE html><html><head></head><body><h1 id="title">Title</h1><ul><li class="item">a</li><li class="item">b</li></ul></body></html>"#;

fn override_strategy() -> impl Strategy<Value = ElementOverride> {
    let selector = prop::sample::select(vec!["#title", ".item", "ul > li", "#missing"]);
    (selector, 0..20u64, 0..4u8, 0..5u8).prop_map(|(selector, timestamp, payload, n)| {
        let entry = ElementOverride::new(selector).at(timestamp);
        match payload {
            0 => entry.with_text(format!("text {}", n)),
            1 => entry.with_style("color", format!("#00000{}", n)),
            2 => entry.with_html(format!("<b>{}</b>", n)),
            _ => entry.with_attribute("data-n", n.to_string()),
        }
    })
}

fn bound_engine() -> (SyncEngine, Rc<RefCell<Document>>) {
    let mut parser = HtmlParser::new();
    let mut engine = SyncEngine::new();
    engine.init_sync("shape", parser.parse(LIVE_PAGE, None, None).unwrap());
    let document = Rc::new(RefCell::new(Document::parse(LIVE_PAGE)));
    (engine, document)
}

proptest! {
    /// Every id- or uuid-bearing element is retargeted by its own selector
    #[test]
    fn test_selector_round_trip(html in page_strategy()) {
        let mut parser = HtmlParser::new();
        let result = parser.parse(&html, None, None).unwrap();
        let fresh = Document::parse(&html);

        for element in result.elements() {
            let Some(value) = element.attribute("id").or_else(|| element.attribute("data-uuid")) else {
                continue;
            };
            prop_assert_eq!(value, element.identifier.as_str());

            let selector = Selector::parse(&element.selector).unwrap();
            let found = selector.query_all(&fresh, fresh.root());
            prop_assert_eq!(found.len(), 1, "selector {} matched {:?}", element.selector, found);
            let node = fresh.element(found[0]).unwrap();
            let identifier = node.get_attribute("id").or_else(|| node.get_attribute("data-uuid"));
            prop_assert_eq!(identifier, Some(element.identifier.as_str()));
        }
    }

    /// Shared rules plus each page's remainder give back the page's rules
    #[test]
    fn test_shared_css_round_trip(pages in prop::collection::vec(stylesheet_strategy(), 0..5)) {
        let extracted = extract_shared_css(&pages);
        prop_assert_eq!(extracted.page_css.len(), pages.len());

        let shared = rule_set(&extracted.shared_css);
        for (original, remainder) in pages.iter().zip(&extracted.page_css) {
            let mut combined = shared.clone();
            combined.extend(rule_set(remainder));
            prop_assert_eq!(combined, rule_set(original));
        }
    }

    /// Restoring to T and recovering equals replaying only overrides <= T
    #[test]
    fn test_restore_then_recover_matches_replay(
        overrides in prop::collection::vec(override_strategy(), 0..10),
        target in 0..20u64,
    ) {
        let (mut edited, edited_doc) = bound_engine();
        edited.set_dom_root("shape", DomRoot::document(edited_doc.clone())).unwrap();
        for entry in &overrides {
            edited.apply_override("shape", entry.clone()).unwrap();
        }
        edited.restore_to_version("shape", target).unwrap();
        edited.recover_sync("shape");

        let (mut replayed, replayed_doc) = bound_engine();
        for entry in overrides.iter().filter(|o| o.timestamp <= target) {
            replayed.apply_override("shape", entry.clone()).unwrap();
        }
        replayed.set_dom_root("shape", DomRoot::document(replayed_doc.clone())).unwrap();

        let edited_html = edited_doc.borrow().outer_html(edited_doc.borrow().root());
        let replayed_html = replayed_doc.borrow().outer_html(replayed_doc.borrow().root());
        prop_assert_eq!(edited_html, replayed_html);
    }

    /// Arbitrary text never panics the response parser
    #[test]
    fn test_response_parsing_doesnt_crash(s in "\\PC*") {
        let response = parse_multi_page_response(&s);
        prop_assert!(response.error.is_some() || !response.pages.is_empty());
    }
}

#[test]
fn test_body_margin_is_shared_once() {
    let result = extract_shared_css(&[
        "body { margin: 0; }\n.home-hero { height: 80vh; }",
        "body { margin: 0; }\n.contact-form { display: grid; }",
    ]);
    assert_eq!(result.shared_css, "body { margin: 0; }");
    assert_eq!(
        result.page_css,
        vec![
            ".home-hero { height: 80vh; }".to_string(),
            ".contact-form { display: grid; }".to_string()
        ]
    );
}

#[test]
fn test_text_override_leaves_geometry_valid() {
    let html = r#"<div id="x">old</div>"#;
    let mut parser = HtmlParser::new();
    let mut engine = SyncEngine::new();
    engine.init_sync("s", parser.parse(html, None, None).unwrap());

    let document = Rc::new(RefCell::new(Document::parse(html)));
    engine.set_dom_root("s", DomRoot::document(document.clone())).unwrap();
    engine
        .sync_shape_to_dom("s", ShapeProps { x: 0.0, y: 0.0, width: 640.0, height: 480.0 })
        .unwrap();

    engine
        .apply_override("s", ElementOverride::new("#x").with_text("hi"))
        .unwrap();

    let doc = document.borrow();
    let x = Selector::parse("#x").unwrap().query_first(&doc, doc.root()).unwrap();
    assert_eq!(doc.text_content(x), "hi");
    drop(doc);
    assert!(engine.validate_sync("s"));
}

#[test]
fn test_theme_update_across_three_shapes() {
    let mut manager = SharedThemeManager::new();
    let shapes: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    manager.register_page_group("g", &shapes, ":root { --primary: #333; }", Default::default());

    let mut changes = BTreeMap::new();
    changes.insert("--primary".to_string(), "#ff0000".to_string());
    let batch = manager.update_shared_theme("g", &changes);

    assert_eq!(batch.len(), 3);
    for shape in &shapes {
        let entries = &batch[shape];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].selector, ":root");
        assert_eq!(entries[0].styles.as_ref(), Some(&changes));
    }
}

#[test]
fn test_response_without_json_or_html() {
    let response = parse_multi_page_response("Sorry, I could not generate that website.");
    assert!(response.pages.is_empty());
    assert!(!response.error.unwrap_or_default().is_empty());
}

#[test]
fn test_multi_page_pipeline() {
    let text = r#"Here is the site:
```json
{
  "pages": [
    {"name": "home", "html": "<nav data-shared=\"header\"><a data-page-target=\"about\">About</a></nav><h1 id=\"hero\">Home</h1>", "css": "body { margin: 0; }\nh1 { font-size: 3rem; }"},
    {"name": "about", "html": "<nav data-shared=\"header\"><a data-page-target=\"home\">Home</a></nav><p>About us</p>", "css": "body { margin: 0; }\np { line-height: 1.6; }"}
  ],
  "sharedTheme": ":root { --primary: #222; }"
}
```"#;

    let mut response = parse_multi_page_response(text);
    assert!(response.is_ok());
    response.factor_shared_css();
    assert_eq!(response.shared_theme, ":root { --primary: #222; }\n\nbody { margin: 0; }");
    assert_eq!(response.pages[1].css, "p { line-height: 1.6; }");

    let mut parser = HtmlParser::new();
    let mut engine = SyncEngine::new();
    let mut manager = SharedThemeManager::new();
    let mut documents = Vec::new();
    let mut shapes = Vec::new();

    for page in &response.pages {
        let shape_id = format!("shape-{}", page.name);
        engine.init_sync(&shape_id, parser.parse(&page.html, Some(page.css.as_str()), None).unwrap());
        let document = Rc::new(RefCell::new(Document::parse(&page.html)));
        engine.set_dom_root(&shape_id, DomRoot::document(document.clone())).unwrap();
        documents.push(document);
        shapes.push(shape_id);
    }
    manager.register_page_group("site", &shapes, &response.shared_theme, response.shared_navigation.clone());
    for (page, shape) in response.pages.iter().zip(&shapes) {
        manager.map_page_to_shape("site", &page.name, shape);
    }

    let mut changes = BTreeMap::new();
    changes.insert("--primary".to_string(), "#ff0000".to_string());
    let results = engine.apply_batch(manager.update_shared_theme("site", &changes));
    assert_eq!(results.len(), 2);
    for (_, result) in &results {
        let reports = result.as_ref().unwrap();
        assert_eq!(reports[0].matched, 1);
    }

    for document in &documents {
        let doc = document.borrow();
        let html = doc.document_element().unwrap();
        assert_eq!(doc.get_attribute(html, "style"), Some("--primary: #ff0000"));
    }

    let nav = manager.update_shared_navigation(
        "site",
        &htmlsync::theme::NavigationUpdate {
            header: Some(r#"<a data-page-target="contact">Contact</a>"#.to_string()),
            footer: None,
        },
    );
    assert!(manager.is_shared_component("site", &nav["shape-home"][0].selector));
    let results = engine.apply_batch(nav);
    assert!(results.iter().all(|(_, r)| r.as_ref().map(|v| v[0].matched == 1).unwrap_or(false)));

    let doc = documents[0].borrow();
    let nav = Selector::parse("nav").unwrap().query_first(&doc, doc.root()).unwrap();
    assert_eq!(doc.inner_html(nav), r#"<a data-page-target="contact">Contact</a>"#);
}
