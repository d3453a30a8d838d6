//! CSS selector parsing and matching against the arena DOM
//!
//! Supports the subset the editor produces and consumes: type, universal,
//! `#id`, `.class`, `[attr]`, `[attr="value"]`, `:root`, descendant and
//! child combinators, and comma-separated selector lists. Tokenizing is
//! done by `cssparser`, so escapes and quoting follow CSS syntax.

use super::dom::{Document, NodeId};
use crate::utils::{Result, SyncError};
use cssparser::{ParseError, ParseErrorKind, Parser, ParserInput, SourceLocation, Token};
use std::fmt;

/// Attribute condition (`[name]` or `[name="value"]`)
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSelector {
    pub name: String,
    pub value: Option<String>,
}

/// Sequence of simple selectors without combinators (e.g. `div.card#main`)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundSelector {
    pub tag_name: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeSelector>,
    pub root: bool,
    universal: bool,
}

impl CompoundSelector {
    fn is_empty(&self) -> bool {
        !self.universal
            && !self.root
            && self.tag_name.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
    }

    fn matches(&self, document: &Document, node: NodeId) -> bool {
        let Some(element) = document.element(node) else {
            return false;
        };

        if let Some(ref tag) = self.tag_name {
            if !tag.eq_ignore_ascii_case(&element.tag_name) {
                return false;
            }
        }

        if let Some(ref id) = self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }

        let element_classes = element.classes();
        if !self
            .classes
            .iter()
            .all(|class| element_classes.contains(&class.as_str()))
        {
            return false;
        }

        for attribute in &self.attributes {
            match (element.get_attribute(&attribute.name), &attribute.value) {
                (None, _) => return false,
                (Some(actual), Some(expected)) if actual != expected => return false,
                _ => {}
            }
        }

        if self.root && document.parent(node) != Some(document.root()) {
            return false;
        }

        true
    }
}

/// Relationship between two compounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Whitespace
    Descendant,
    /// `>`
    Child,
}

/// Compounds joined by combinators, e.g. `nav > ul li`
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSelector {
    compounds: Vec<CompoundSelector>,
    /// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

impl ComplexSelector {
    fn matches(&self, document: &Document, node: NodeId) -> bool {
        self.matches_from(document, self.compounds.len() - 1, node)
    }

    fn matches_from(&self, document: &Document, index: usize, node: NodeId) -> bool {
        if !self.compounds[index].matches(document, node) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => document
                .parent_element(node)
                .is_some_and(|parent| self.matches_from(document, index - 1, parent)),
            Combinator::Descendant => {
                let mut ancestor = document.parent_element(node);
                while let Some(candidate) = ancestor {
                    if self.matches_from(document, index - 1, candidate) {
                        return true;
                    }
                    ancestor = document.parent_element(candidate);
                }
                false
            }
        }
    }
}

/// A parsed selector list
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    text: String,
    alternatives: Vec<ComplexSelector>,
}

impl Selector {
    /// Parse selector text
    pub fn parse(text: &str) -> Result<Self> {
        let mut input = ParserInput::new(text);
        let mut parser = Parser::new(&mut input);
        let alternatives =
            parse_selector_list(&mut parser).map_err(|error| SyncError::InvalidSelector {
                selector: text.to_string(),
                reason: describe(&error.kind),
            })?;
        Ok(Self {
            text: text.to_string(),
            alternatives,
        })
    }

    /// The source text of this selector
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether `node` matches any alternative. Matching is evaluated in the
    /// context of the whole document.
    pub fn matches(&self, document: &Document, node: NodeId) -> bool {
        self.alternatives
            .iter()
            .any(|alternative| alternative.matches(document, node))
    }

    /// All matching descendants of `scope`, in document order
    /// (`querySelectorAll` semantics).
    pub fn query_all(&self, document: &Document, scope: NodeId) -> Vec<NodeId> {
        document
            .descendants(scope)
            .into_iter()
            .filter(|node| self.matches(document, *node))
            .collect()
    }

    /// First matching descendant of `scope`
    pub fn query_first(&self, document: &Document, scope: NodeId) -> Option<NodeId> {
        document
            .descendants(scope)
            .into_iter()
            .find(|node| self.matches(document, *node))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SelectorErrorKind {
    Empty,
    DanglingCombinator,
    UnsupportedPseudo(String),
}

impl fmt::Display for SelectorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty selector"),
            Self::DanglingCombinator => write!(f, "combinator without a selector"),
            Self::UnsupportedPseudo(name) => write!(f, "unsupported pseudo-class :{}", name),
        }
    }
}

type ParseResult<'i, T> = std::result::Result<T, ParseError<'i, SelectorErrorKind>>;

fn describe(kind: &ParseErrorKind<'_, SelectorErrorKind>) -> String {
    match kind {
        ParseErrorKind::Custom(custom) => custom.to_string(),
        ParseErrorKind::Basic(basic) => format!("{:?}", basic),
    }
}

fn custom_error<'i>(location: SourceLocation, kind: SelectorErrorKind) -> ParseError<'i, SelectorErrorKind> {
    ParseError {
        kind: ParseErrorKind::Custom(kind),
        location,
    }
}

/// Accumulates one complex selector while tokens stream in
#[derive(Default)]
struct ComplexBuilder {
    compounds: Vec<CompoundSelector>,
    combinators: Vec<Combinator>,
    current: CompoundSelector,
    pending: Option<Combinator>,
}

impl ComplexBuilder {
    fn whitespace(&mut self) {
        if !self.current.is_empty() {
            self.compounds.push(std::mem::take(&mut self.current));
            self.pending = Some(Combinator::Descendant);
        }
    }

    fn combinator(&mut self, combinator: Combinator) -> std::result::Result<(), SelectorErrorKind> {
        if !self.current.is_empty() {
            self.compounds.push(std::mem::take(&mut self.current));
        }
        if self.compounds.is_empty() || self.pending == Some(Combinator::Child) {
            return Err(SelectorErrorKind::DanglingCombinator);
        }
        self.pending = Some(combinator);
        Ok(())
    }

    fn simple(&mut self, apply: impl FnOnce(&mut CompoundSelector)) {
        if self.current.is_empty() && !self.compounds.is_empty() {
            let combinator = self.pending.take().unwrap_or(Combinator::Descendant);
            self.combinators.push(combinator);
        }
        apply(&mut self.current);
    }

    fn finish(&mut self) -> std::result::Result<ComplexSelector, SelectorErrorKind> {
        let mut builder = std::mem::take(self);
        if !builder.current.is_empty() {
            builder.compounds.push(builder.current);
        } else if builder.pending == Some(Combinator::Child) {
            return Err(SelectorErrorKind::DanglingCombinator);
        }
        if builder.compounds.is_empty() {
            return Err(SelectorErrorKind::Empty);
        }
        Ok(ComplexSelector {
            compounds: builder.compounds,
            combinators: builder.combinators,
        })
    }
}

fn parse_selector_list<'i>(parser: &mut Parser<'i, '_>) -> ParseResult<'i, Vec<ComplexSelector>> {
    let mut list = Vec::new();
    let mut builder = ComplexBuilder::default();

    loop {
        let location = parser.current_source_location();
        let token = match parser.next_including_whitespace() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        match token {
            Token::WhiteSpace(_) => builder.whitespace(),
            Token::Comma => {
                let complex = builder.finish().map_err(|kind| custom_error(location, kind))?;
                list.push(complex);
            }
            Token::Delim('>') => builder
                .combinator(Combinator::Child)
                .map_err(|kind| custom_error(location, kind))?,
            Token::Delim('*') => builder.simple(|c| c.universal = true),
            Token::Ident(name) => {
                let tag = name.to_ascii_lowercase();
                builder.simple(|c| c.tag_name = Some(tag));
            }
            Token::IDHash(id) | Token::Hash(id) => {
                let id = id.to_string();
                builder.simple(|c| c.id = Some(id));
            }
            Token::Delim('.') => {
                let location = parser.current_source_location();
                let class = match parser.next_including_whitespace()?.clone() {
                    Token::Ident(class) => class.to_string(),
                    other => return Err(location.new_unexpected_token_error(other)),
                };
                builder.simple(|c| c.classes.push(class));
            }
            Token::SquareBracketBlock => {
                let attribute = parser.parse_nested_block(|p| parse_attribute(p))?;
                builder.simple(|c| c.attributes.push(attribute));
            }
            Token::Colon => {
                let location = parser.current_source_location();
                match parser.next_including_whitespace()?.clone() {
                    Token::Ident(name) if name.eq_ignore_ascii_case("root") => {
                        builder.simple(|c| c.root = true)
                    }
                    Token::Ident(name) => {
                        return Err(custom_error(
                            location,
                            SelectorErrorKind::UnsupportedPseudo(name.to_string()),
                        ));
                    }
                    other => return Err(location.new_unexpected_token_error(other)),
                }
            }
            other => return Err(location.new_unexpected_token_error(other)),
        }
    }

    let location = parser.current_source_location();
    list.push(builder.finish().map_err(|kind| custom_error(location, kind))?);
    Ok(list)
}

fn parse_attribute<'i>(parser: &mut Parser<'i, '_>) -> ParseResult<'i, AttributeSelector> {
    let location = parser.current_source_location();
    let name = match parser.next()?.clone() {
        Token::Ident(name) => name.to_ascii_lowercase(),
        other => return Err(location.new_unexpected_token_error(other)),
    };

    if parser.is_exhausted() {
        return Ok(AttributeSelector { name, value: None });
    }

    let location = parser.current_source_location();
    match parser.next()?.clone() {
        Token::Delim('=') => {}
        other => return Err(location.new_unexpected_token_error(other)),
    }

    let location = parser.current_source_location();
    let value = match parser.next()?.clone() {
        Token::Ident(value) | Token::QuotedString(value) => value.to_string(),
        other => return Err(location.new_unexpected_token_error(other)),
    };
    parser.expect_exhausted()?;

    Ok(AttributeSelector {
        name,
        value: Some(value),
    })
}
