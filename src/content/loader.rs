//! Post loader - turns a requested slug into an observable load state
//!
//! Every request bumps a generation counter and moves the state to
//! `Loading` (or `Idle` for an empty slug) straight away. The store read
//! happens on a spawned task after a short delay; its result is applied only
//! if no newer request has been made in the meantime.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::Post;
use crate::store::PostStore;

/// Message shown when a load fails for a reason other than a missing post
pub const LOAD_ERROR_MESSAGE: &str =
    "An unexpected error occurred while loading the post. Check the logs for details.";

/// State of the preview for the currently requested slug
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    /// No slug requested
    Idle,
    /// Waiting for the store read
    Loading { slug: String },
    /// Post parsed and ready to render
    Loaded {
        post: Post,
        /// The author's icon could not be shown; display-only
        author_image_failed: bool,
    },
    /// Nothing stored under the slug
    NotFound { slug: String, message: String },
    /// The read failed unexpectedly
    LoadError { slug: String, message: String },
}

impl LoadState {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading { .. })
    }

    /// Slug this state belongs to, `None` when idle
    pub fn slug(&self) -> Option<&str> {
        match self {
            LoadState::Idle => None,
            LoadState::Loaded { post, .. } => Some(post.slug.as_str()),
            LoadState::Loading { slug }
            | LoadState::NotFound { slug, .. }
            | LoadState::LoadError { slug, .. } => Some(slug.as_str()),
        }
    }

    pub fn post(&self) -> Option<&Post> {
        match self {
            LoadState::Loaded { post, .. } => Some(post),
            _ => None,
        }
    }
}

/// A load state tagged with the request that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSnapshot {
    pub generation: u64,
    #[serde(flatten)]
    pub state: LoadState,
}

/// Message for a slug with no stored document
pub fn not_found_message(slug: &str) -> String {
    format!(
        "Post '{}' was not found in local storage. Check that the file was uploaded and the slug is correct.",
        slug
    )
}

/// Run one load cycle for `slug` against the store, without any delay
pub fn load_now(store: &PostStore, slug: &str) -> LoadState {
    match store.get(slug) {
        Ok(Some(raw)) => {
            let post = Post::from_raw(slug, &raw);
            if post.frontmatter.title().is_none() {
                tracing::warn!("Post '{}' has no title", slug);
            }
            LoadState::Loaded {
                post,
                author_image_failed: false,
            }
        }
        Ok(None) => {
            tracing::debug!("Post '{}' not found", slug);
            LoadState::NotFound {
                slug: slug.to_string(),
                message: not_found_message(slug),
            }
        }
        Err(e) => {
            tracing::error!("Failed to load post '{}': {}", slug, e);
            LoadState::LoadError {
                slug: slug.to_string(),
                message: LOAD_ERROR_MESSAGE.to_string(),
            }
        }
    }
}

/// Drives the load state machine for one preview session
pub struct PostLoader {
    store: PostStore,
    delay: Duration,
    state: Arc<watch::Sender<LoadSnapshot>>,
}

impl PostLoader {
    /// Create an idle loader reading from `store` after `delay`
    pub fn new(store: PostStore, delay: Duration) -> Self {
        let (state, _) = watch::channel(LoadSnapshot {
            generation: 0,
            state: LoadState::Idle,
        });
        Self {
            store,
            delay,
            state: Arc::new(state),
        }
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<LoadSnapshot> {
        self.state.subscribe()
    }

    /// Current state
    pub fn snapshot(&self) -> LoadSnapshot {
        self.state.borrow().clone()
    }

    /// Navigate to `slug`, or to nothing for `None` or an empty slug.
    ///
    /// Returns the generation of this request. Must be called from within a
    /// tokio runtime.
    pub fn request(&self, slug: Option<&str>) -> u64 {
        let slug = slug.filter(|s| !s.is_empty()).map(str::to_string);

        let mut generation = 0;
        self.state.send_modify(|snapshot| {
            snapshot.generation += 1;
            generation = snapshot.generation;
            snapshot.state = match &slug {
                Some(slug) => LoadState::Loading { slug: slug.clone() },
                None => LoadState::Idle,
            };
        });

        let Some(slug) = slug else {
            tracing::debug!("Preview cleared (request {})", generation);
            return generation;
        };
        tracing::debug!("Loading post '{}' (request {})", slug, generation);

        let store = self.store.clone();
        let state = Arc::clone(&self.state);
        let delay = self.delay;

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let read_slug = slug.clone();
            let outcome = tokio::task::spawn_blocking(move || load_now(&store, &read_slug))
                .await
                .unwrap_or_else(|e| {
                    tracing::error!("Loading post '{}' failed: {}", slug, e);
                    LoadState::LoadError {
                        slug,
                        message: LOAD_ERROR_MESSAGE.to_string(),
                    }
                });

            apply(&state, generation, outcome);
        });

        generation
    }

    /// Wait until request `generation` has finished or been superseded
    pub async fn settled(&self, generation: u64) -> LoadSnapshot {
        let mut rx = self.state.subscribe();
        let result = rx
            .wait_for(|s| s.generation != generation || !s.state.is_loading())
            .await
            .map(|snapshot| snapshot.clone());

        match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    /// Record that the author's icon for request `generation` failed to load.
    ///
    /// Returns false when that request is no longer current or has no post.
    pub fn mark_author_image_failed(&self, generation: u64) -> bool {
        self.state.send_if_modified(|snapshot| {
            let current = snapshot.generation == generation;
            match &mut snapshot.state {
                LoadState::Loaded {
                    post,
                    author_image_failed,
                } if current && !*author_image_failed => {
                    tracing::warn!("Author image for post '{}' is missing", post.slug);
                    *author_image_failed = true;
                    true
                }
                _ => false,
            }
        })
    }
}

/// Store `outcome` unless a newer request has started since `generation`
fn apply(state: &watch::Sender<LoadSnapshot>, generation: u64, outcome: LoadState) -> bool {
    state.send_if_modified(|snapshot| {
        if snapshot.generation != generation {
            tracing::debug!(
                "Discarding stale result of request {} (current is {})",
                generation,
                snapshot.generation
            );
            return false;
        }
        snapshot.state = outcome;
        true
    })
}
