//! Upload a Markdown file into the local store

use anyhow::{bail, Result};
use std::path::Path;

use crate::helpers::preview_path;
use crate::upload::UploadFile;
use crate::Previewer;

/// Upload `path` and return its slug
pub async fn run(previewer: &Previewer, path: &Path) -> Result<String> {
    let store = previewer.open_store()?;
    let uploader = previewer.uploader(&store);

    match uploader.upload(UploadFile::from_path(path)).await {
        Ok(slug) => {
            if let Some(message) = uploader.status().message() {
                println!("{}", message);
            }
            println!("Preview it at {}", preview_path(&slug));
            Ok(slug)
        }
        Err(e) => bail!("{}", e.user_message()),
    }
}
