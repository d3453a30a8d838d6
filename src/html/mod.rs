//! HTML parsing, DOM and selector matching

pub mod dom;
pub mod parser;
pub mod scan;
pub mod selector;
pub mod style;

pub use dom::{Document, ElementData, NodeId, NodeType, Snapshot};
pub use parser::{
    ElementIndex, ExternalResources, HtmlParseResult, HtmlParser, IdGenerator, ParsedElement,
    ParserOptions, ValidationResult, generate_selector,
};
pub use selector::Selector;
pub use style::{StyleMap, get_style_diff, to_camel_case, to_kebab_case};
