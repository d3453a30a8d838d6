//! Applying overrides and geometry onto a live document

use super::overrides::ElementOverride;
use crate::html::style::{parse_px, px};
use crate::html::{Document, NodeId, NodeType, Selector};
use crate::utils::SyncError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Structured geometry pushed by the host, in px
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeProps {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A live subtree owned by the rendering host.
///
/// The engine only reads and mutates styles, content and attributes
/// under `node`; it never detaches or re-parents it.
#[derive(Debug, Clone)]
pub struct DomRoot {
    pub document: Rc<RefCell<Document>>,
    pub node: NodeId,
}

impl DomRoot {
    pub fn new(document: Rc<RefCell<Document>>, node: NodeId) -> Self {
        Self { document, node }
    }

    /// Bind a whole document
    pub fn document(document: Rc<RefCell<Document>>) -> Self {
        let node = document.borrow().root();
        Self { document, node }
    }
}

/// Outcome of applying one override to one root
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplyReport {
    pub selector: String,
    /// Number of elements the payload was written to
    pub matched: usize,
}

impl ApplyReport {
    /// The miss diagnostic, if nothing matched
    pub fn miss(&self) -> Option<SyncError> {
        (self.matched == 0).then(|| SyncError::SelectorMiss {
            selector: self.selector.clone(),
        })
    }
}

/// Write an override's payload onto every element under `scope` that its
/// selector matches. Misses and unparsable selectors are logged, never
/// returned as errors.
pub fn apply_override(document: &mut Document, scope: NodeId, entry: &ElementOverride) -> ApplyReport {
    let targets = match Selector::parse(&entry.selector) {
        Ok(selector) => selector.query_all(document, scope),
        Err(err) => {
            warn!("{}", err);
            Vec::new()
        }
    };

    let report = ApplyReport {
        selector: entry.selector.clone(),
        matched: targets.len(),
    };
    if let Some(miss) = report.miss() {
        warn!("{}", miss);
        return report;
    }

    for node in targets {
        apply_payload(document, node, entry);
    }
    debug!("applied override to {} element(s) for {}", report.matched, entry.selector);
    report
}

fn apply_payload(document: &mut Document, node: NodeId, entry: &ElementOverride) {
    if let Some(text) = &entry.text {
        document.set_text_content(node, text);
    }
    if let Some(html) = &entry.html {
        document.set_inner_html(node, html);
    }

    let Some(element) = document.element_mut(node) else {
        return;
    };
    if let Some(styles) = &entry.styles {
        for (property, value) in styles {
            element.set_style_property(property, value);
        }
    }
    if let Some(attributes) = &entry.attributes {
        for (name, value) in attributes {
            element.set_attribute(name.as_str(), value.as_str());
        }
    }
    if let Some(position) = entry.position {
        element.set_style_property("position", "absolute");
        element.set_style_property("left", &px(position.x));
        element.set_style_property("top", &px(position.y));
    }
    if let Some(size) = entry.size {
        element.set_style_property("width", &px(size.width));
        element.set_style_property("height", &px(size.height));
    }
}

/// The element that carries a shape's geometry: the bound node itself
/// when it is an element, otherwise the document body.
pub fn geometry_container(document: &Document, root: NodeId) -> Option<NodeId> {
    match document.node_type(root) {
        NodeType::Element(_) => Some(root),
        _ => document.body(),
    }
}

/// Push absolute px geometry onto the container
pub fn write_geometry(document: &mut Document, root: NodeId, props: &ShapeProps) {
    let Some(container) = geometry_container(document, root) else {
        return;
    };
    if let Some(element) = document.element_mut(container) {
        element.set_style_property("position", "absolute");
        element.set_style_property("left", &px(props.x));
        element.set_style_property("top", &px(props.y));
        element.set_style_property("width", &px(props.width));
        element.set_style_property("height", &px(props.height));
    }
}

/// Read the container's inline geometry. Any axis that is missing or not
/// a px length yields `None`.
pub fn read_geometry(document: &Document, root: NodeId) -> Option<ShapeProps> {
    let container = geometry_container(document, root)?;
    let element = document.element(container)?;
    let axis = |property: &str| element.style_property(property).as_deref().and_then(parse_px);
    Some(ShapeProps {
        x: axis("left")?,
        y: axis("top")?,
        width: axis("width")?,
        height: axis("height")?,
    })
}
