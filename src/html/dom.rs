//! Arena-backed DOM (Document Object Model)
//!
//! Nodes live in a flat arena and refer to each other through [`NodeId`]
//! handles. Children own nothing; `parent` is a plain lookup handle, so
//! the tree never forms reference cycles. Removed subtrees return their
//! slots to a free list, and each slot carries a generation so a handle
//! to a removed node stays dead after the slot is reused. The same type serves as the
//! parser's working document and as the live tree a host renders and the
//! sync engine mutates.

use super::style::{self, StyleMap};
use html5ever::tendril::TendrilSink;
use html5ever::{ParseOpts, parse_document};
use markup5ever::Attribute;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Elements that never have content or an end tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are emitted without escaping
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext",
];

/// Handle to a node in a [`Document`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    const ROOT: NodeId = NodeId {
        index: 0,
        generation: 0,
    };
}

/// What a removed handle reads as
static DETACHED: NodeType = NodeType::Comment(String::new());

/// Node types in the DOM
#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    /// Document root
    Document,
    /// Element node (e.g., <div>)
    Element(ElementData),
    /// Text node
    Text(String),
    /// Comment node
    Comment(String),
}

/// Data for element nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Tag name, lowercased by the parser (e.g., "div", "span")
    pub tag_name: String,
    /// Element attributes in source order
    pub attributes: Vec<(String, String)>,
}

impl ElementData {
    /// Create a new element
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: Vec::new(),
        }
    }

    /// Get an attribute value
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute value, keeping its position if it already exists
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Get the ID attribute
    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
    }

    /// Get class names
    pub fn classes(&self) -> Vec<&str> {
        self.get_attribute("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Inline style as a camelCase keyed map
    pub fn inline_style(&self) -> StyleMap {
        self.get_attribute("style")
            .map(style::parse_inline_style)
            .unwrap_or_default()
    }

    /// Set one inline style property. `property` is converted to kebab-case
    /// before it is written into the `style` attribute.
    pub fn set_style_property(&mut self, property: &str, value: &str) {
        let property = style::to_kebab_case(property);
        let mut declarations = self
            .get_attribute("style")
            .map(style::parse_declarations)
            .unwrap_or_default();
        match declarations.iter_mut().find(|(key, _)| *key == property) {
            Some(slot) => slot.1 = value.to_string(),
            None => declarations.push((property, value.to_string())),
        }
        let serialized = style::serialize_declarations(
            declarations.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );
        self.set_attribute("style", serialized);
    }

    /// Read one inline style property (kebab or camelCase name)
    pub fn style_property(&self, property: &str) -> Option<String> {
        let property = style::to_kebab_case(property);
        self.get_attribute("style").and_then(|s| {
            style::parse_declarations(s)
                .into_iter()
                .find(|(key, _)| *key == property)
                .map(|(_, value)| value)
        })
    }
}

#[derive(Debug, Clone)]
struct NodeEntry {
    generation: u32,
    node_type: NodeType,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Detached copy of a node's own data and its subtree
#[derive(Debug, Clone)]
pub struct Snapshot {
    node_type: NodeType,
    fragment: Document,
}

/// The DOM document
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeEntry>,
    free: Vec<usize>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeEntry {
                generation: 0,
                node_type: NodeType::Document,
                parent: None,
                children: Vec::new(),
            }],
            free: Vec::new(),
        }
    }

    /// Parse markup leniently (html5ever applies browser-grade error
    /// recovery, so this never fails).
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
        let mut document = Self::new();
        let root = document.root();
        document.import_rcdom(&dom.document, root);
        document
    }

    /// The document node
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    fn entry(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes
            .get(id.index)
            .filter(|entry| entry.generation == id.generation)
    }

    fn entry_mut(&mut self, id: NodeId) -> Option<&mut NodeEntry> {
        self.nodes
            .get_mut(id.index)
            .filter(|entry| entry.generation == id.generation)
    }

    /// Whether `id` still refers to a node of this document
    pub fn contains(&self, id: NodeId) -> bool {
        self.entry(id).is_some()
    }

    /// Number of live nodes, the document node included
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Number of arena slots, live or free
    pub fn allocated(&self) -> usize {
        self.nodes.len()
    }

    /// Node type and data. A removed node reads as an empty comment.
    pub fn node_type(&self, id: NodeId) -> &NodeType {
        self.entry(id).map_or(&DETACHED, |entry| &entry.node_type)
    }

    /// Element data if `id` is an element
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.entry(id)?.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable element data if `id` is an element
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.entry_mut(id)?.node_type {
            NodeType::Element(data) => Some(data),
            _ => None,
        }
    }

    /// Lowercased tag name if `id` is an element
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag_name.as_str())
    }

    /// Parent handle (None for the document node and detached nodes)
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.entry(id)?.parent
    }

    /// Parent, if it is an element
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        self.parent(id).filter(|p| self.element(*p).is_some())
    }

    /// Child handles in document order
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.entry(id)
            .map(|entry| entry.children.as_slice())
            .unwrap_or_default()
    }

    /// Element children in document order
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    /// Append a new node under `parent`. Under a removed parent the new
    /// node is created detached.
    pub fn append_child(&mut self, parent: NodeId, node_type: NodeType) -> NodeId {
        let attached = self.contains(parent);
        let id = self.allocate(node_type, attached.then_some(parent));
        if let Some(entry) = self.entry_mut(parent) {
            entry.children.push(id);
        }
        id
    }

    fn allocate(&mut self, node_type: NodeType, parent: Option<NodeId>) -> NodeId {
        match self.free.pop() {
            Some(index) => {
                let entry = &mut self.nodes[index];
                entry.node_type = node_type;
                entry.parent = parent;
                NodeId {
                    index,
                    generation: entry.generation,
                }
            }
            None => {
                self.nodes.push(NodeEntry {
                    generation: 0,
                    node_type,
                    parent,
                    children: Vec::new(),
                });
                NodeId {
                    index: self.nodes.len() - 1,
                    generation: 0,
                }
            }
        }
    }

    /// All descendants of `id` in document (pre-)order, excluding `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// First element child of the document node (normally `<html>`)
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).into_iter().next()
    }

    /// The `<body>` element
    pub fn body(&self) -> Option<NodeId> {
        self.first_element_by_tag("body")
    }

    /// First element with the given tag, in document order
    pub fn first_element_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.tag_name(*id) == Some(tag))
    }

    /// All elements with the given tag, in document order
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.tag_name(*id) == Some(tag))
            .collect()
    }

    /// Get an attribute value
    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.get_attribute(name)
    }

    /// Set an attribute on an element. Returns false for non-elements.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> bool {
        match self.element_mut(id) {
            Some(element) => {
                element.set_attribute(name, value);
                true
            }
            None => false,
        }
    }

    /// Concatenated text of every descendant text node
    pub fn text_content(&self, id: NodeId) -> String {
        if let NodeType::Text(text) = self.node_type(id) {
            return text.clone();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| match self.node_type(d) {
                NodeType::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Concatenated text of direct text children only, trimmed
    pub fn direct_text(&self, id: NodeId) -> String {
        let text: String = self
            .children(id)
            .iter()
            .filter_map(|c| match self.node_type(*c) {
                NodeType::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        text.trim().to_string()
    }

    /// Replace all children with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if !self.contains(id) {
            return;
        }
        self.clear_children(id);
        if !text.is_empty() {
            self.append_child(id, NodeType::Text(text.to_string()));
        }
    }

    /// Serialized markup of the children of `id`
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.serialize_into(*child, &mut out);
        }
        out
    }

    /// Serialized markup of `id` itself
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.serialize_into(id, &mut out);
        out
    }

    /// Replace the children of `id` with parsed markup.
    ///
    /// On the document node the markup is parsed as a whole document;
    /// elsewhere it is parsed as body content.
    pub fn set_inner_html(&mut self, id: NodeId, html: &str) {
        if !self.contains(id) {
            return;
        }
        self.clear_children(id);
        if matches!(self.node_type(id), NodeType::Document) {
            let parsed = Self::parse(html);
            for child in parsed.children(parsed.root()).to_vec() {
                self.copy_from(&parsed, child, id);
            }
            return;
        }

        let parsed = Self::parse(&format!("<!DOCTYPE html><html><head></head><body>{}</body></html>", html));
        if let Some(body) = parsed.body() {
            for child in parsed.children(body).to_vec() {
                self.copy_from(&parsed, child, id);
            }
        }
    }

    /// Capture `id` and its subtree so it can be restored later
    pub fn snapshot(&self, id: NodeId) -> Snapshot {
        let mut fragment = Document::new();
        let fragment_root = fragment.root();
        for child in self.children(id) {
            fragment.copy_from(self, *child, fragment_root);
        }
        Snapshot {
            node_type: self.node_type(id).clone(),
            fragment,
        }
    }

    /// Reset `id` (attributes and children) to a previous snapshot. The
    /// node keeps its handle and position in the tree.
    pub fn restore(&mut self, id: NodeId, snapshot: &Snapshot) {
        let Some(entry) = self.entry_mut(id) else {
            return;
        };
        entry.node_type = snapshot.node_type.clone();
        self.clear_children(id);
        let source = &snapshot.fragment;
        for child in source.children(source.root()) {
            self.copy_from(source, *child, id);
        }
    }

    /// Detach the children of `id` and free their subtrees
    fn clear_children(&mut self, id: NodeId) {
        let mut stack = match self.entry_mut(id) {
            Some(entry) => std::mem::take(&mut entry.children),
            None => return,
        };
        while let Some(node) = stack.pop() {
            let Some(entry) = self.entry_mut(node) else {
                continue;
            };
            stack.append(&mut entry.children);
            entry.generation = entry.generation.wrapping_add(1);
            entry.node_type = DETACHED.clone();
            entry.parent = None;
            self.free.push(node.index);
        }
    }

    /// Deep-copy `source_id` from another document under `parent`
    fn copy_from(&mut self, source: &Document, source_id: NodeId, parent: NodeId) {
        let mut stack = vec![(source_id, parent)];
        while let Some((from, to)) = stack.pop() {
            let id = self.append_child(to, source.node_type(from).clone());
            stack.extend(source.children(from).iter().rev().map(|child| (*child, id)));
        }
    }

    fn import_rcdom(&mut self, handle: &Handle, parent: NodeId) {
        let mut stack: Vec<(Handle, NodeId)> = handle
            .children
            .borrow()
            .iter()
            .rev()
            .map(|child| (child.clone(), parent))
            .collect();
        while let Some((node, parent)) = stack.pop() {
            let node_type = match &node.data {
                NodeData::Element { name, attrs, .. } => NodeType::Element(ElementData {
                    tag_name: name.local.to_string(),
                    attributes: convert_attributes(&attrs.borrow()),
                }),
                NodeData::Text { contents } => NodeType::Text(contents.borrow().to_string()),
                NodeData::Comment { contents } => NodeType::Comment(contents.to_string()),
                _ => continue,
            };
            let id = self.append_child(parent, node_type);
            stack.extend(node.children.borrow().iter().rev().map(|child| (child.clone(), id)));
        }
    }

    fn serialize_into(&self, id: NodeId, out: &mut String) {
        enum Step {
            Open(NodeId),
            Close(NodeId),
        }

        let mut stack = vec![Step::Open(id)];
        while let Some(step) = stack.pop() {
            let node = match step {
                Step::Open(node) => node,
                Step::Close(node) => {
                    if let Some(tag) = self.tag_name(node) {
                        out.push_str("</");
                        out.push_str(tag);
                        out.push('>');
                    }
                    continue;
                }
            };

            match self.node_type(node) {
                NodeType::Document => {}
                NodeType::Element(element) => {
                    out.push('<');
                    out.push_str(&element.tag_name);
                    for (name, value) in &element.attributes {
                        out.push(' ');
                        out.push_str(name);
                        out.push_str("=\"");
                        out.push_str(&escape(value, true));
                        out.push('"');
                    }
                    out.push('>');
                    if VOID_ELEMENTS.contains(&element.tag_name.as_str()) {
                        continue;
                    }
                    stack.push(Step::Close(node));
                }
                NodeType::Text(text) => {
                    let raw = self
                        .parent(node)
                        .and_then(|p| self.tag_name(p))
                        .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
                    if raw {
                        out.push_str(text);
                    } else {
                        out.push_str(&escape(text, false));
                    }
                    continue;
                }
                NodeType::Comment(text) => {
                    out.push_str("<!--");
                    out.push_str(text);
                    out.push_str("-->");
                    continue;
                }
            }
            stack.extend(self.children(node).iter().rev().map(|child| Step::Open(*child)));
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

fn convert_attributes(attrs: &[Attribute]) -> Vec<(String, String)> {
    attrs
        .iter()
        .map(|attr| {
            let name = match &attr.name.prefix {
                Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                None => attr.name.local.to_string(),
            };
            (name, attr.value.to_string())
        })
        .collect()
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}
