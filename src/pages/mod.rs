//! Multi-page responses: parsing, shared CSS and link checks

pub mod links;
pub mod response;
pub mod shared_css;

pub use links::{AppContext, AppPage, LinkValidation, validate_inter_page_links};
pub use response::{
    GeneratedPage, MultiPageResponse, SharedNavigation, inject_shared_theme,
    parse_multi_page_response,
};
pub use shared_css::{SharedCss, extract_shared_css};
