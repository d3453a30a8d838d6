//! # htmlsync - override-based visual editing of generated HTML
//!
//! Edits made in a visual editor are recorded as selector-targeted
//! overrides instead of rewriting the original markup. The crate keeps a
//! live document and the override log consistent with each other.
//!
//! ## Architecture
//!
//! - **html**: lenient parsing into an addressable element tree, the arena
//!   DOM, selector matching and inline style handling
//! - **sync**: the override model and the engine that applies, validates
//!   and replays overrides against live documents
//! - **theme**: shared `:root` theme and navigation across page groups
//! - **pages**: multi-page response parsing and shared CSS extraction
//! - **config**: parser and engine configuration
//! - **utils**: shared utilities and error types

pub mod config;
pub mod html;
pub mod pages;
pub mod sync;
pub mod theme;
pub mod utils;

// Re-export main types for convenience
pub use config::EditorConfig;
pub use html::{HtmlParseResult, HtmlParser, ParsedElement};
pub use pages::{MultiPageResponse, extract_shared_css, parse_multi_page_response};
pub use sync::{ElementOverride, SyncEngine};
pub use theme::SharedThemeManager;
pub use utils::error::{Result, SyncError};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "htmlsync";
