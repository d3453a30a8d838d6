//! The override record: one atomic visual edit against a selector

use crate::html::StyleMap;
use crate::utils::now_millis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Absolute position in px
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Box size in px
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Pre-edit state of the payload kinds an override touches
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideOriginal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<StyleMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

/// One recorded edit.
///
/// Overrides are values: every builder consumes `self` and returns a new
/// override, and nothing in the crate mutates one after it has been
/// handed to the engine. An override without any payload is legal and
/// applies as a no-op.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementOverride {
    pub selector: String,
    /// Milliseconds; the replay ordering key
    pub timestamp: u64,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub styles: Option<StyleMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<OverrideOriginal>,
}

impl ElementOverride {
    /// Create an empty override stamped with the current time
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            timestamp: now_millis(),
            ..Default::default()
        }
    }

    /// Replace the timestamp
    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Mark the override as produced by the AI pipeline
    pub fn ai_generated(mut self, ai_generated: bool) -> Self {
        self.ai_generated = ai_generated;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_styles(mut self, styles: StyleMap) -> Self {
        self.styles = Some(styles);
        self
    }

    /// Add a single style property (kebab or camelCase)
    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.styles
            .get_or_insert_with(StyleMap::new)
            .insert(property.into(), value.into());
        self
    }

    /// Add a single attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Some(Size { width, height });
        self
    }

    pub fn with_original(mut self, original: OverrideOriginal) -> Self {
        self.original = Some(original);
        self
    }

    /// Whether the override carries no payload at all
    pub fn is_noop(&self) -> bool {
        self.text.is_none()
            && self.html.is_none()
            && self.styles.as_ref().is_none_or(|s| s.is_empty())
            && self.attributes.as_ref().is_none_or(|a| a.is_empty())
            && self.position.is_none()
            && self.size.is_none()
    }

    /// An override that puts back the recorded `original` state, for
    /// cancelling an edit. `None` when nothing was recorded.
    pub fn restoring(&self) -> Option<ElementOverride> {
        let original = self.original.as_ref()?;
        let restore = ElementOverride {
            selector: self.selector.clone(),
            timestamp: now_millis().max(self.timestamp.saturating_add(1)),
            ai_generated: false,
            html: original.html.clone(),
            styles: original.styles.clone(),
            position: original.position,
            size: original.size,
            ..Default::default()
        };
        (!restore.is_noop()).then_some(restore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_return_new_values() {
        let base = ElementOverride::new("#x").at(10);
        let edited = base.clone().with_text("hi").with_style("color", "red");
        assert!(base.is_noop());
        assert!(!edited.is_noop());
        assert_eq!(edited.timestamp, 10);
        assert_eq!(edited.styles.unwrap().get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn test_wire_shape_is_camel_case_and_sparse() {
        let value = serde_json::to_value(
            ElementOverride::new("#x")
                .at(5)
                .ai_generated(true)
                .with_position(1.0, 2.0),
        )
        .unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "selector": "#x",
                "timestamp": 5,
                "aiGenerated": true,
                "position": {"x": 1.0, "y": 2.0}
            })
        );
    }

    #[test]
    fn test_deserialize_minimal() {
        let parsed: ElementOverride =
            serde_json::from_str(r#"{"selector": ".a", "timestamp": 1}"#).unwrap();
        assert!(!parsed.ai_generated);
        assert!(parsed.is_noop());
    }

    #[test]
    fn test_restoring_uses_original() {
        let mut styles = StyleMap::new();
        styles.insert("color".into(), "blue".into());
        let edit = ElementOverride::new(".a")
            .at(100)
            .with_style("color", "red")
            .with_original(OverrideOriginal {
                styles: Some(styles.clone()),
                ..Default::default()
            });
        let restore = edit.restoring().unwrap();
        assert_eq!(restore.styles, Some(styles));
        assert!(restore.timestamp > edit.timestamp);

        assert!(ElementOverride::new(".a").with_text("x").restoring().is_none());
    }

    #[test]
    fn test_restoring_at_max_timestamp() {
        let edit = ElementOverride::new(".a").at(u64::MAX).with_original(OverrideOriginal {
            html: Some("<b>x</b>".into()),
            ..Default::default()
        });
        assert_eq!(edit.restoring().unwrap().timestamp, u64::MAX);
    }
}
