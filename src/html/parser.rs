//! HTML parser producing addressable element trees
//!
//! Turns raw markup into a tree of [`ParsedElement`]s, each with a stable
//! identifier and a selector that retargets it, and extracts the styles,
//! scripts and external resources the markup carries alongside.

use super::dom::{Document, NodeId, VOID_ELEMENTS};
use super::scan::scan_tags;
use super::style::{self, StyleMap};
use crate::utils::{Result, SyncError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

/// Characters used for the random identifier suffix
const BASE36: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Elements that always receive an identifier from `inject_identifiers`
const INTERACTIVE_ELEMENTS: &[&str] = &["button", "a", "input"];

/// Elements whose end tag may be omitted
const OPTIONAL_END_TAGS: &[&str] = &[
    "html", "head", "body", "p", "li", "dt", "dd", "option", "optgroup", "tr", "td", "th", "thead",
    "tbody", "tfoot", "colgroup", "caption", "rt", "rp",
];

/// Parser configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// When set, external resource URLs are resolved against this base
    pub base_url: Option<Url>,
}

/// Generates element identifiers of the form `{tag}-{counter}-{random}`.
///
/// Each parser owns one generator; the counter never resets during its
/// lifetime, so repeated parses never reuse an identifier.
#[derive(Debug, Default)]
pub struct IdGenerator {
    counter: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier for an element with this tag name
    pub fn next_id(&mut self, tag_name: &str) -> String {
        self.counter += 1;
        let suffix = nanoid::nanoid!(8, &BASE36);
        format!("{}-{}-{}", tag_name.to_lowercase(), self.counter, suffix)
    }
}

/// Index of an element inside an [`HtmlParseResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementIndex(pub usize);

/// One element of the parsed tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedElement {
    pub identifier: String,
    pub tag_name: String,
    /// Attributes in source order, verbatim
    pub attributes: Vec<(String, String)>,
    /// camelCase property -> value
    pub inline_styles: StyleMap,
    /// Direct text children only, trimmed
    pub text_content: String,
    pub selector: String,
    pub children: Vec<ElementIndex>,
    /// Lookup handle only; `None` for the root
    pub parent: Option<ElementIndex>,
}

impl ParsedElement {
    /// Get an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// URLs referenced but not inlined
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalResources {
    pub stylesheets: Vec<String>,
    pub scripts: Vec<String>,
    pub images: Vec<String>,
}

/// Output of [`HtmlParser::parse`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlParseResult {
    root: ElementIndex,
    elements: Vec<ParsedElement>,
    element_map: HashMap<String, ElementIndex>,
    pub styles: String,
    pub scripts: String,
    pub external_resources: ExternalResources,
}

impl HtmlParseResult {
    /// The root (body) element
    pub fn root(&self) -> &ParsedElement {
        &self.elements[self.root.0]
    }

    /// Look up an element by identifier
    pub fn get(&self, identifier: &str) -> Option<&ParsedElement> {
        self.element_map.get(identifier).map(|i| &self.elements[i.0])
    }

    /// Element at an index
    pub fn element(&self, index: ElementIndex) -> &ParsedElement {
        &self.elements[index.0]
    }

    /// Children of an element, in order
    pub fn children<'a>(&'a self, element: &'a ParsedElement) -> impl Iterator<Item = &'a ParsedElement> + 'a {
        element.children.iter().map(move |i| &self.elements[i.0])
    }

    /// Parent of an element
    pub fn parent(&self, element: &ParsedElement) -> Option<&ParsedElement> {
        element.parent.map(|i| &self.elements[i.0])
    }

    /// Every element in document order, root first
    pub fn elements(&self) -> &[ParsedElement] {
        &self.elements
    }

    /// Number of elements in the element map
    pub fn len(&self) -> usize {
        self.element_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.element_map.is_empty()
    }

    /// First element (document order) whose selector text is `selector`
    pub fn find_by_selector(&self, selector: &str) -> Option<&ParsedElement> {
        self.elements.iter().find(|e| e.selector == selector)
    }
}

/// Result of [`HtmlParser::validate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// HTML parser using html5ever
pub struct HtmlParser {
    ids: IdGenerator,
    options: ParserOptions,
}

impl HtmlParser {
    /// Create a new HTML parser
    pub fn new() -> Self {
        Self::with_options(ParserOptions::default())
    }

    /// Create a parser with explicit options
    pub fn with_options(options: ParserOptions) -> Self {
        Self {
            ids: IdGenerator::new(),
            options,
        }
    }

    /// Parse markup into an addressable element tree.
    ///
    /// When `css` or `js` is `None`, inline `<style>` / `<script>` content
    /// is collected from the document instead.
    pub fn parse(&mut self, html: &str, css: Option<&str>, js: Option<&str>) -> Result<HtmlParseResult> {
        if html.trim().is_empty() {
            return Err(SyncError::InvalidInput("HTML content is empty".to_string()));
        }

        let document = Document::parse(html);
        let body = document
            .body()
            .or_else(|| document.document_element())
            .ok_or_else(|| SyncError::InvalidInput("document has no root element".to_string()))?;

        let styles = match css {
            Some(css) => css.to_string(),
            None => collect_inline(&document, "style"),
        };
        let scripts = match js {
            Some(js) => js.to_string(),
            None => collect_inline(&document, "script"),
        };
        let external_resources = self.extract_external_resources(&document);

        let mut elements = Vec::new();
        let mut element_map = HashMap::new();
        let root = self.walk(&document, body, &mut elements, &mut element_map);

        debug!(
            "parsed {} elements ({} bytes css, {} bytes js)",
            elements.len(),
            styles.len(),
            scripts.len()
        );

        Ok(HtmlParseResult {
            root,
            elements,
            element_map,
            styles,
            scripts,
            external_resources,
        })
    }

    /// Build the element records in document order, root first
    fn walk(
        &mut self,
        document: &Document,
        root: NodeId,
        elements: &mut Vec<ParsedElement>,
        element_map: &mut HashMap<String, ElementIndex>,
    ) -> ElementIndex {
        let mut stack: Vec<(NodeId, Option<ElementIndex>)> = vec![(root, None)];
        while let Some((node, parent)) = stack.pop() {
            let data = document
                .element(node)
                .cloned()
                .unwrap_or_else(|| super::dom::ElementData::new("body"));

            let mut identifier = self.extract_identifier(&data.tag_name, &data.attributes);
            if element_map.contains_key(&identifier) {
                // Duplicate ids in the source still get distinct identifiers.
                identifier = self.ids.next_id(&data.tag_name);
            }

            let index = ElementIndex(elements.len());
            elements.push(ParsedElement {
                selector: generate_selector(&data.tag_name, &data.attributes),
                inline_styles: data.inline_style(),
                text_content: document.direct_text(node),
                identifier: identifier.clone(),
                tag_name: data.tag_name,
                attributes: data.attributes,
                children: Vec::new(),
                parent,
            });
            element_map.insert(identifier, index);
            if let Some(parent) = parent {
                elements[parent.0].children.push(index);
            }

            stack.extend(
                document
                    .element_children(node)
                    .into_iter()
                    .rev()
                    .map(|child| (child, Some(index))),
            );
        }

        ElementIndex(0)
    }

    /// Identifier resolution: `id`, then `data-uuid`, then generated
    pub fn extract_identifier(&mut self, tag_name: &str, attributes: &[(String, String)]) -> String {
        let lookup = |name: &str| {
            attributes
                .iter()
                .find(|(key, value)| key == name && !value.is_empty())
                .map(|(_, value)| value.clone())
        };
        lookup("id")
            .or_else(|| lookup("data-uuid"))
            .unwrap_or_else(|| self.ids.next_id(tag_name))
    }

    /// Check markup for emptiness and mismatched tags.
    ///
    /// The check runs on the raw text rather than the repaired parse tree,
    /// so mismatches html5ever would silently fix are still reported.
    pub fn validate(&self, html: &str) -> ValidationResult {
        if html.trim().is_empty() {
            return ValidationResult {
                valid: false,
                errors: vec!["HTML content is empty".to_string()],
            };
        }

        let mut errors = Vec::new();
        let mut stack: Vec<(String, usize)> = Vec::new();

        for tag in scan_tags(html) {
            let is_void = VOID_ELEMENTS.contains(&tag.name.as_str());
            if !tag.closing {
                if !is_void && !tag.self_closing {
                    stack.push((tag.name, tag.start));
                }
                continue;
            }
            if is_void {
                continue;
            }

            loop {
                match stack.last() {
                    Some((open, _)) if *open == tag.name => {
                        stack.pop();
                        break;
                    }
                    Some((open, _)) if OPTIONAL_END_TAGS.contains(&open.as_str()) => {
                        stack.pop();
                    }
                    Some((open, _)) => {
                        if stack.iter().any(|(name, _)| *name == tag.name) {
                            errors.push(format!(
                                "Mismatched closing tag </{}> at offset {}: expected </{}>",
                                tag.name, tag.start, open
                            ));
                            while let Some((name, _)) = stack.pop() {
                                if name == tag.name {
                                    break;
                                }
                            }
                        } else {
                            errors.push(format!(
                                "Unexpected closing tag </{}> at offset {}",
                                tag.name, tag.start
                            ));
                        }
                        break;
                    }
                    None => {
                        errors.push(format!(
                            "Unexpected closing tag </{}> at offset {}",
                            tag.name, tag.start
                        ));
                        break;
                    }
                }
            }
        }

        for (name, offset) in stack {
            if !OPTIONAL_END_TAGS.contains(&name.as_str()) {
                errors.push(format!("Unclosed tag <{}> opened at offset {}", name, offset));
            }
        }

        ValidationResult {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Collect stylesheet links, external scripts and image sources.
    /// Inline `<style>`/`<script>` content is not included.
    pub fn extract_external_resources(&self, document: &Document) -> ExternalResources {
        let mut resources = ExternalResources::default();

        for node in document.descendants(document.root()) {
            let Some(element) = document.element(node) else {
                continue;
            };
            match element.tag_name.as_str() {
                "link" => {
                    let is_stylesheet = element.get_attribute("rel").is_some_and(|rel| {
                        rel.split_whitespace()
                            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                    });
                    if let (true, Some(href)) = (is_stylesheet, element.get_attribute("href")) {
                        resources.stylesheets.push(self.resolve(href));
                    }
                }
                "script" => {
                    if let Some(src) = element.get_attribute("src") {
                        resources.scripts.push(self.resolve(src));
                    }
                }
                "img" => {
                    if let Some(src) = element.get_attribute("src") {
                        resources.images.push(self.resolve(src));
                    }
                }
                _ => {}
            }
        }

        resources
    }

    /// Give every interactive element lacking both `id` and `data-uuid` a
    /// generated `data-uuid`. The markup is edited in place; everything
    /// other than the inserted attributes is preserved byte for byte.
    pub fn inject_identifiers(&mut self, html: &str) -> String {
        let mut out = String::with_capacity(html.len() + 64);
        let mut copied = 0;
        let mut injected = 0usize;

        for tag in scan_tags(html) {
            if tag.closing || tag.has_attribute("id") || tag.has_attribute("data-uuid") {
                continue;
            }
            let interactive = INTERACTIVE_ELEMENTS.contains(&tag.name.as_str())
                || tag
                    .attributes
                    .iter()
                    .any(|name| name.len() > 2 && name.starts_with("on"));
            if !interactive {
                continue;
            }

            out.push_str(&html[copied..tag.name_end]);
            out.push_str(&format!(" data-uuid=\"{}\"", self.ids.next_id(&tag.name)));
            copied = tag.name_end;
            injected += 1;
        }
        out.push_str(&html[copied..]);

        debug!("injected {} identifiers", injected);
        out
    }

    fn resolve(&self, reference: &str) -> String {
        match &self.options.base_url {
            Some(base) => base
                .join(reference)
                .map(|url| url.to_string())
                .unwrap_or_else(|_| reference.to_string()),
            None => reference.to_string(),
        }
    }
}

impl Default for HtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `#id` > `[data-uuid="…"]` > `tag.class1.class2`.
///
/// Identifiers and values are escaped so the selector parses back to the
/// exact attribute value. Elements without id or uuid may share a
/// selector with their siblings.
pub fn generate_selector(tag_name: &str, attributes: &[(String, String)]) -> String {
    let lookup = |name: &str| {
        attributes
            .iter()
            .find(|(key, value)| key == name && !value.is_empty())
            .map(|(_, value)| value.as_str())
    };

    if let Some(id) = lookup("id") {
        let mut selector = String::from("#");
        // Writing into a String cannot fail.
        let _ = cssparser::serialize_identifier(id, &mut selector);
        return selector;
    }

    if let Some(uuid) = lookup("data-uuid") {
        let mut selector = String::from("[data-uuid=");
        let _ = cssparser::serialize_string(uuid, &mut selector);
        selector.push(']');
        return selector;
    }

    let mut selector = tag_name.to_lowercase();
    if let Some(classes) = lookup("class") {
        for class in classes.split_whitespace() {
            selector.push('.');
            let _ = cssparser::serialize_identifier(class, &mut selector);
        }
    }
    selector
}

fn collect_inline(document: &Document, tag: &str) -> String {
    document
        .elements_by_tag(tag)
        .into_iter()
        .filter(|node| document.get_attribute(*node, "src").is_none())
        .map(|node| document.text_content(node))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a `style` attribute value into camelCase properties
pub fn extract_inline_styles(style_attribute: &str) -> StyleMap {
    style::parse_inline_style(style_attribute)
}
