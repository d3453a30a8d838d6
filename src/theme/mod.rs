//! Shared theme and navigation across a group of rendered pages
//!
//! Pages generated together share one `:root` theme block and one
//! header/footer fragment. An edit to either fans out as one override per
//! shape in the group, ready to hand to [`SyncEngine::apply_batch`].
//!
//! [`SyncEngine::apply_batch`]: crate::sync::SyncEngine::apply_batch

pub mod root_block;

use crate::html::StyleMap;
use crate::pages::SharedNavigation;
use crate::sync::{ElementOverride, OverrideOriginal};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Targets the shared header, whichever element carries it
pub const HEADER_SELECTOR: &str = r#"nav[data-shared="header"], header[data-shared="header"]"#;
pub const FOOTER_SELECTOR: &str = r#"footer[data-shared="footer"]"#;
pub const ROOT_SELECTOR: &str = ":root";

const HEADER_PARTS: [&str; 2] = [r#"nav[data-shared="header"]"#, r#"header[data-shared="header"]"#];

/// Overrides to apply, per shape
pub type OverrideBatch = BTreeMap<String, Vec<ElementOverride>>;

/// Pages that share a theme and navigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageGroup {
    pub group_id: String,
    /// Ordered, without duplicates
    pub shape_ids: Vec<String>,
    pub shared_theme: String,
    pub shared_navigation: SharedNavigation,
    pub page_name_to_shape_id: BTreeMap<String, String>,
}

/// New navigation fragments; absent fields are left alone
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NavigationUpdate {
    pub header: Option<String>,
    pub footer: Option<String>,
}

/// Keeps page groups and turns theme/navigation edits into overrides
#[derive(Debug, Default)]
pub struct SharedThemeManager {
    groups: BTreeMap<String, PageGroup>,
}

impl SharedThemeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a group
    pub fn register_page_group(
        &mut self,
        group_id: &str,
        shape_ids: &[String],
        shared_theme: &str,
        shared_navigation: SharedNavigation,
    ) {
        let mut unique: Vec<String> = Vec::with_capacity(shape_ids.len());
        for id in shape_ids {
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }

        debug!("registered page group {} with {} shapes", group_id, unique.len());
        self.groups.insert(
            group_id.to_string(),
            PageGroup {
                group_id: group_id.to_string(),
                shape_ids: unique,
                shared_theme: shared_theme.to_string(),
                shared_navigation,
                page_name_to_shape_id: BTreeMap::new(),
            },
        );
    }

    /// Record which shape renders a page. Ignored for unknown groups.
    pub fn map_page_to_shape(&mut self, group_id: &str, page_name: &str, shape_id: &str) {
        if let Some(group) = self.groups.get_mut(group_id) {
            group
                .page_name_to_shape_id
                .insert(page_name.to_string(), shape_id.to_string());
        }
    }

    pub fn get_page_group(&self, group_id: &str) -> Option<&PageGroup> {
        self.groups.get(group_id)
    }

    pub fn remove_page_group(&mut self, group_id: &str) -> Option<PageGroup> {
        self.groups.remove(group_id)
    }

    /// Merge `changes` into the group's `:root` block and produce one
    /// `:root` override per shape.
    pub fn update_shared_theme(&mut self, group_id: &str, changes: &StyleMap) -> OverrideBatch {
        let Some(group) = self.groups.get_mut(group_id) else {
            return OverrideBatch::new();
        };
        if group.shape_ids.is_empty() {
            return OverrideBatch::new();
        }

        let (theme, previous) = root_block::merge_root_properties(&group.shared_theme, changes);
        group.shared_theme = theme;

        let entry = ElementOverride::new(ROOT_SELECTOR)
            .with_styles(changes.clone())
            .with_original(OverrideOriginal {
                styles: Some(previous),
                ..Default::default()
            });
        debug!("theme update for {} fans out to {} shapes", group_id, group.shape_ids.len());
        group
            .shape_ids
            .iter()
            .map(|shape_id| (shape_id.clone(), vec![entry.clone()]))
            .collect()
    }

    /// Replace the header and/or footer fragment and produce, per shape,
    /// the header override followed by the footer override.
    pub fn update_shared_navigation(&mut self, group_id: &str, update: &NavigationUpdate) -> OverrideBatch {
        let Some(group) = self.groups.get_mut(group_id) else {
            return OverrideBatch::new();
        };

        let mut entries = Vec::new();
        if let Some(header) = &update.header {
            let previous = std::mem::replace(&mut group.shared_navigation.header, header.clone());
            entries.push(navigation_override(HEADER_SELECTOR, header, previous));
        }
        if let Some(footer) = &update.footer {
            let previous = std::mem::replace(&mut group.shared_navigation.footer, footer.clone());
            entries.push(navigation_override(FOOTER_SELECTOR, footer, previous));
        }
        if entries.is_empty() {
            return OverrideBatch::new();
        }

        group
            .shape_ids
            .iter()
            .map(|shape_id| (shape_id.clone(), entries.clone()))
            .collect()
    }

    /// Whether an edit to `selector` should fan out across the group:
    /// the theme root, a navigation selector, or something inside the
    /// shared header or footer.
    pub fn is_shared_component(&self, group_id: &str, selector: &str) -> bool {
        if !self.groups.contains_key(group_id) {
            return false;
        }
        let selector = selector.trim();
        if selector == ROOT_SELECTOR {
            return true;
        }

        [HEADER_SELECTOR, HEADER_PARTS[0], HEADER_PARTS[1], FOOTER_SELECTOR]
            .into_iter()
            .any(|shared| match selector.strip_prefix(shared) {
                Some("") => true,
                Some(rest) => rest.starts_with(|c: char| c.is_whitespace() || c == '>'),
                None => false,
            })
    }
}

fn navigation_override(selector: &str, html: &str, previous: String) -> ElementOverride {
    ElementOverride::new(selector)
        .with_html(html)
        .with_original(OverrideOriginal {
            html: Some(previous),
            ..Default::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_shapes(count: usize) -> SharedThemeManager {
        let mut manager = SharedThemeManager::new();
        let shapes: Vec<String> = (1..=count).map(|i| format!("shape-{}", i)).collect();
        manager.register_page_group(
            "g",
            &shapes,
            ":root { --primary: #000000; }",
            SharedNavigation {
                header: "<nav data-shared=\"header\">old</nav>".into(),
                footer: "<footer data-shared=\"footer\">old</footer>".into(),
            },
        );
        manager
    }

    #[test]
    fn test_theme_update_fans_out_per_shape() {
        let mut manager = manager_with_shapes(3);
        let mut changes = StyleMap::new();
        changes.insert("--primary".into(), "#ff0000".into());

        let batch = manager.update_shared_theme("g", &changes);
        assert_eq!(batch.len(), 3);
        for entries in batch.values() {
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].selector, ":root");
            assert_eq!(entries[0].styles.as_ref(), Some(&changes));
            let original = entries[0].original.as_ref().unwrap().styles.as_ref().unwrap();
            assert_eq!(original.get("--primary").map(String::as_str), Some("#000000"));
        }
        assert!(
            manager
                .get_page_group("g")
                .unwrap()
                .shared_theme
                .contains("--primary: #ff0000;")
        );
    }

    #[test]
    fn test_theme_update_unknown_or_empty_group() {
        let mut manager = SharedThemeManager::new();
        let changes = StyleMap::new();
        assert!(manager.update_shared_theme("missing", &changes).is_empty());

        manager.register_page_group("empty", &[], "", SharedNavigation::default());
        assert!(manager.update_shared_theme("empty", &changes).is_empty());
    }

    #[test]
    fn test_navigation_update_orders_header_then_footer() {
        let mut manager = manager_with_shapes(2);
        let batch = manager.update_shared_navigation(
            "g",
            &NavigationUpdate {
                header: Some("<nav data-shared=\"header\">new</nav>".into()),
                footer: Some("<footer data-shared=\"footer\">new</footer>".into()),
            },
        );
        assert_eq!(batch.len(), 2);
        let entries = &batch["shape-1"];
        assert_eq!(entries[0].selector, HEADER_SELECTOR);
        assert_eq!(entries[1].selector, FOOTER_SELECTOR);
        assert_eq!(
            entries[0].original.as_ref().unwrap().html.as_deref(),
            Some("<nav data-shared=\"header\">old</nav>")
        );

        let footer_only = manager.update_shared_navigation(
            "g",
            &NavigationUpdate {
                footer: Some("<footer>x</footer>".into()),
                ..Default::default()
            },
        );
        assert_eq!(footer_only["shape-2"].len(), 1);
        assert_eq!(
            footer_only["shape-2"][0].original.as_ref().unwrap().html.as_deref(),
            Some("<footer data-shared=\"footer\">new</footer>")
        );
    }

    #[test]
    fn test_map_page_to_shape() {
        let mut manager = manager_with_shapes(1);
        manager.map_page_to_shape("g", "home", "shape-1");
        manager.map_page_to_shape("missing", "home", "shape-1");
        assert_eq!(
            manager.get_page_group("g").unwrap().page_name_to_shape_id.get("home").map(String::as_str),
            Some("shape-1")
        );
    }

    #[test]
    fn test_is_shared_component() {
        let manager = manager_with_shapes(1);
        assert!(manager.is_shared_component("g", ":root"));
        assert!(manager.is_shared_component("g", HEADER_SELECTOR));
        assert!(manager.is_shared_component("g", r#"nav[data-shared="header"]"#));
        assert!(manager.is_shared_component("g", r#"header[data-shared="header"] a.logo"#));
        assert!(manager.is_shared_component("g", r#"footer[data-shared="footer"] > p"#));

        assert!(!manager.is_shared_component("g", "#hero"));
        assert!(!manager.is_shared_component("g", ":root .hero"));
        assert!(!manager.is_shared_component("g", r#"footer[data-shared="footer"].dark"#));
        assert!(!manager.is_shared_component("other", ":root"));
    }
}
