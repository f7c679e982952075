//! mdpreview: preview Markdown posts with YAML front-matter
//!
//! Uploaded `.md` files are kept in a local store keyed by slug. A preview
//! session loads a slug from the store, splits off its front-matter and
//! renders the body.

pub mod commands;
pub mod config;
pub mod content;
pub mod helpers;
pub mod server;
pub mod store;
pub mod upload;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use content::{MarkdownRenderer, PostLoader};
use store::{FileStorage, PostStore};
use upload::Uploader;

/// Name of the configuration file in the base directory
pub const CONFIG_FILE: &str = "_config.yml";

/// The main preview application
#[derive(Debug, Clone)]
pub struct Previewer {
    /// Preview configuration
    pub config: config::PreviewConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Directory holding stored posts
    pub store_dir: PathBuf,
    /// Directory author icons are served from
    pub images_dir: PathBuf,
}

impl Previewer {
    /// Create a previewer for a directory, reading `_config.yml` if present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join(CONFIG_FILE);

        let config = if config_path.exists() {
            config::PreviewConfig::load(&config_path)?
        } else {
            config::PreviewConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// Create a previewer with an explicit configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::PreviewConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let store_dir = base_dir.join(&config.store_dir);
        let images_dir = base_dir.join(&config.images_dir);

        Self {
            config,
            base_dir,
            store_dir,
            images_dir,
        }
    }

    /// Open the on-disk post store
    pub fn open_store(&self) -> Result<PostStore> {
        let storage = FileStorage::open(&self.store_dir, self.config.quota_bytes)?;
        Ok(PostStore::new(Arc::new(storage)))
    }

    /// Create a loader over `store` using the configured delay
    pub fn loader(&self, store: &PostStore) -> PostLoader {
        PostLoader::new(store.clone(), self.config.load_delay())
    }

    /// Create an uploader over `store`
    pub fn uploader(&self, store: &PostStore) -> Uploader {
        Uploader::new(store.clone())
    }

    /// Create the body renderer
    pub fn renderer(&self) -> MarkdownRenderer {
        MarkdownRenderer::from_config(&self.config.highlight)
    }
}
