//! Uploader - validates a Markdown file and saves it to the post store

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::content::ParsedDocument;
use crate::store::{PostStore, StoreError};

/// The only extension accepted for uploads
pub const ACCEPTED_EXTENSION: &str = ".md";

/// Errors that abort an upload
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("'{name}' is not a Markdown (.md) file")]
    InvalidFileType { name: String },

    #[error("'{name}' has no name before the .md extension")]
    EmptySlug { name: String },

    #[error("failed to read '{name}': {source}")]
    FileRead {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to save '{slug}': {source}")]
    Store {
        slug: String,
        #[source]
        source: StoreError,
    },
}

impl UploadError {
    /// Message shown to the user for this error
    pub fn user_message(&self) -> String {
        match self {
            UploadError::InvalidFileType { .. } => {
                "Error: please choose a file in .md format.".to_string()
            }
            UploadError::EmptySlug { .. } => {
                "Error: the file name needs some text before .md.".to_string()
            }
            UploadError::FileRead { source, .. } => {
                format!("Failed to read the file: {}", source)
            }
            UploadError::Store {
                source: source @ StoreError::CapacityExceeded { .. },
                ..
            } => format!("Failed to save: {}. The local store is probably full.", source),
            UploadError::Store { source, .. } => format!("Failed to save: {}", source),
        }
    }
}

/// Where an uploaded file's content comes from
#[derive(Debug)]
enum FileSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// A user-supplied file
#[derive(Debug)]
pub struct UploadFile {
    name: String,
    source: FileSource,
}

impl UploadFile {
    /// A file on disk, named by its final path component
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self {
            name,
            source: FileSource::Path(path.to_path_buf()),
        }
    }

    /// File content received in memory, e.g. from a form upload
    pub fn from_bytes(name: &str, data: impl Into<Vec<u8>>) -> Self {
        // Some clients send the full client-side path
        let name = name.rsplit(['/', '\\']).next().unwrap_or_default();
        Self {
            name: name.to_string(),
            source: FileSource::Bytes(data.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn read_text(self) -> io::Result<String> {
        match self.source {
            FileSource::Path(path) => tokio::fs::read_to_string(path).await,
            FileSource::Bytes(bytes) => {
                String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            }
        }
    }
}

/// Status of the most recent upload, shown next to the upload form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading {
        name: String,
    },
    Succeeded {
        slug: String,
        message: String,
    },
    Failed {
        message: String,
    },
}

impl UploadStatus {
    pub fn message(&self) -> Option<&str> {
        match self {
            UploadStatus::Idle => None,
            UploadStatus::Uploading { .. } => Some("Uploading..."),
            UploadStatus::Succeeded { message, .. } | UploadStatus::Failed { message } => {
                Some(message.as_str())
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, UploadStatus::Failed { .. })
    }
}

/// Derive a post slug from an uploaded file name
pub fn slug_from_file_name(name: &str) -> Result<String, UploadError> {
    let Some(slug) = name.strip_suffix(ACCEPTED_EXTENSION) else {
        return Err(UploadError::InvalidFileType {
            name: name.to_string(),
        });
    };
    if slug.is_empty() {
        return Err(UploadError::EmptySlug {
            name: name.to_string(),
        });
    }
    Ok(slug.to_string())
}

/// Title for the confirmation message, falling back to the slug
fn confirmation_title(content: &str, slug: &str) -> String {
    ParsedDocument::parse(content)
        .frontmatter
        .title()
        .map(str::to_string)
        .unwrap_or_else(|| slug.to_string())
}

struct Saved {
    slug: String,
    title: String,
}

/// Saves uploaded files into the post store
pub struct Uploader {
    store: PostStore,
    status: Mutex<UploadStatus>,
}

impl Uploader {
    pub fn new(store: PostStore) -> Self {
        Self {
            store,
            status: Mutex::new(UploadStatus::Idle),
        }
    }

    /// Current status message
    pub fn status(&self) -> UploadStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clear the status, e.g. once the caller has navigated to the new post
    pub fn reset(&self) {
        self.set_status(UploadStatus::Idle);
    }

    /// Take the status if it reports a success, leaving `Idle` behind
    pub fn take_success(&self) -> Option<UploadStatus> {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        match &*status {
            UploadStatus::Succeeded { .. } => Some(std::mem::take(&mut *status)),
            _ => None,
        }
    }

    fn set_status(&self, status: UploadStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Validate, read and store `file`, returning its slug.
    ///
    /// Every outcome is also reflected in [`Uploader::status`]. Nothing is
    /// written to the store unless validation and reading succeed.
    pub async fn upload(&self, file: UploadFile) -> Result<String, UploadError> {
        let name = file.name().to_string();

        match self.save(file).await {
            Ok(Saved { slug, title }) => {
                tracing::info!("Saved '{}' as post '{}'", name, slug);
                let message = format!(
                    "Saved post '{}' (slug: {}) to local storage.",
                    title, slug
                );
                self.set_status(UploadStatus::Succeeded {
                    slug: slug.clone(),
                    message,
                });
                Ok(slug)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Record `error` as the outcome of the current upload and hand it back.
    ///
    /// Used for failures detected before a file could be handed to
    /// [`Uploader::upload`], such as a broken form submission.
    pub fn fail(&self, error: UploadError) -> UploadError {
        tracing::warn!("Upload failed: {}", error);
        self.set_status(UploadStatus::Failed {
            message: error.user_message(),
        });
        error
    }

    async fn save(&self, file: UploadFile) -> Result<Saved, UploadError> {
        let name = file.name().to_string();
        let slug = slug_from_file_name(&name)?;

        self.set_status(UploadStatus::Uploading { name: name.clone() });

        let content = file
            .read_text()
            .await
            .map_err(|source| UploadError::FileRead { name, source })?;

        let title = confirmation_title(&content, &slug);

        self.store
            .set(&slug, &content)
            .map_err(|source| UploadError::Store {
                slug: slug.clone(),
                source,
            })?;

        Ok(Saved { slug, title })
    }
}
