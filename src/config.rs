//! Editor configuration

use crate::html::ParserOptions;
use crate::sync::SyncConfig;
use crate::utils::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration; every field has a default, so `{}` is a
/// valid config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub parser: ParserOptions,
    pub sync: SyncConfig,
}

impl EditorConfig {
    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::from_json("{}").unwrap();
        assert!(config.parser.base_url.is_none());
        assert_eq!(config.sync.geometry_tolerance, 1.0);
    }

    #[test]
    fn test_partial_override() {
        let config = EditorConfig::from_json(
            r#"{"parser": {"base_url": "https://example.com/"}, "sync": {"geometry_tolerance": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.parser.base_url.unwrap().as_str(), "https://example.com/");
        assert_eq!(config.sync.geometry_tolerance, 0.5);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(EditorConfig::from_json("{").is_err());
        assert!(EditorConfig::from_json_file("/nonexistent/htmlsync.json").is_err());
    }
}
