//! Preview configuration (_config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::store::DEFAULT_QUOTA_BYTES;

/// Main preview configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    // Site
    pub title: String,
    /// Base URL posts are shared under; the slug is appended verbatim
    pub share_url: String,

    // Storage
    pub store_dir: String,
    pub quota_bytes: u64,

    // Loading
    pub load_delay_ms: u64,

    // Assets
    pub images_dir: String,
    #[serde(default)]
    pub highlight: HighlightConfig,

    // Store any additional fields
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            title: "Markdown Preview".to_string(),
            share_url: "https://example.com/blog/".to_string(),

            store_dir: ".mdpreview".to_string(),
            quota_bytes: DEFAULT_QUOTA_BYTES,

            load_delay_ms: 100,

            images_dir: "images".to_string(),
            highlight: HighlightConfig::default(),

            extra: HashMap::new(),
        }
    }
}

impl PreviewConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: PreviewConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", path))?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Delay between entering the loading state and reading the store
    pub fn load_delay(&self) -> Duration {
        Duration::from_millis(self.load_delay_ms)
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            theme: "base16-ocean.dark".to_string(),
            line_number: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreviewConfig::default();
        assert_eq!(config.store_dir, ".mdpreview");
        assert_eq!(config.quota_bytes, 5 * 1024 * 1024);
        assert_eq!(config.load_delay(), Duration::from_millis(100));
        assert!(config.highlight.line_number);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
title: My Blog
share_url: https://blog.example.org/posts/
load_delay_ms: 0
highlight:
  line_number: false
analytics: off
"#;
        let config: PreviewConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.title, "My Blog");
        assert_eq!(config.share_url, "https://blog.example.org/posts/");
        assert_eq!(config.load_delay(), Duration::ZERO);
        assert!(!config.highlight.line_number);
        assert_eq!(config.highlight.theme, "base16-ocean.dark");
        assert_eq!(config.images_dir, "images");
        assert!(config.extra.contains_key("analytics"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("_config.yml");
        fs::write(&path, "store_dir: posts-store\nquota_bytes: 1024\n").unwrap();

        let config = PreviewConfig::load(&path).unwrap();
        assert_eq!(config.store_dir, "posts-store");
        assert_eq!(config.quota_bytes, 1024);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("_config.yml");
        fs::write(&path, "quota_bytes: [not a number]\n").unwrap();

        let err = PreviewConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
