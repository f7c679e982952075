//! Preview server
//!
//! Serves one preview session: a single loader and uploader shared by every
//! request, the way a single browser tab would hold them.

mod view;

pub use view::{render_page, PageContext, IMAGE_PREFIX};

use anyhow::Result;
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::content::{loader, LoadState, MarkdownRenderer, Post, PostLoader};
use crate::helpers::preview_path;
use crate::store::{PostStore, StoreError};
use crate::upload::{UploadError, UploadFile, Uploader};
use crate::Previewer;

/// Room for multipart boundaries and headers on top of the file itself
const FORM_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Shared server state
pub struct AppState {
    pub loader: PostLoader,
    pub uploader: Uploader,
    pub store: PostStore,
    pub renderer: MarkdownRenderer,
    pub page: PageContext,
    pub images_dir: PathBuf,
    /// Largest accepted request body
    pub body_limit: usize,
}

impl AppState {
    /// Build the session state for a previewer
    pub fn new(previewer: &Previewer) -> Result<Self> {
        let store = previewer.open_store()?;
        Ok(Self {
            loader: previewer.loader(&store),
            uploader: previewer.uploader(&store),
            store,
            renderer: previewer.renderer(),
            page: PageContext::from_config(&previewer.config),
            images_dir: previewer.images_dir.clone(),
            body_limit: upload_body_limit(previewer.config.quota_bytes),
        })
    }

    /// Render the page for `state`, showing a pending success message once
    fn page(&self, state: &LoadState) -> Html<String> {
        let upload = self
            .uploader
            .take_success()
            .unwrap_or_else(|| self.uploader.status());
        Html(render_page(&self.page, &self.renderer, state, &upload))
    }

    /// Re-render the current page with a failed upload's status code
    fn upload_failed(&self, error: &UploadError) -> Response {
        let snapshot = self.loader.snapshot();
        (upload_error_status(error), self.page(&snapshot.state)).into_response()
    }
}

/// Request body limit for a store quota: any document the store could hold
/// must fit through the upload form
pub fn upload_body_limit(quota_bytes: u64) -> usize {
    usize::try_from(quota_bytes.saturating_add(FORM_OVERHEAD_BYTES)).unwrap_or(usize::MAX)
}

/// Build the router
pub fn router(state: Arc<AppState>) -> Router {
    let images = ServeDir::new(&state.images_dir);
    let body_limit = state.body_limit;

    Router::new()
        .route("/", get(index_handler))
        .route("/preview", get(index_handler))
        .route("/preview/", get(index_handler))
        .route("/preview/:slug", get(preview_handler))
        .route("/upload", post(upload_handler))
        .route("/api/posts/:slug", get(api_post_handler))
        .nest_service(IMAGE_PREFIX, images)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the preview server
pub async fn start(previewer: &Previewer, ip: &str, port: u16, open: bool) -> Result<()> {
    let state = Arc::new(AppState::new(previewer)?);
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Preview server running at {}", url);
    println!("Posts are stored in {:?}", previewer.store_dir);
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Start page: no slug requested
async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let generation = state.loader.request(None);
    let snapshot = state.loader.settled(generation).await;
    state.page(&snapshot.state).into_response()
}

/// Navigate to a slug and render once its load has settled
async fn preview_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    let generation = state.loader.request(Some(&slug));
    let snapshot = state.loader.settled(generation).await;

    // A newer navigation owns the session now; answer for this slug anyway
    let mut load_state = if snapshot.generation == generation {
        snapshot.state
    } else {
        tracing::debug!("Request {} for '{}' was superseded", generation, slug);
        load_blocking(&state.store, slug).await
    };

    if let LoadState::Loaded {
        post,
        author_image_failed,
    } = &mut load_state
    {
        if !*author_image_failed && author_image_missing(&state.images_dir, post).await {
            *author_image_failed = true;
            state.loader.mark_author_image_failed(generation);
        }
    }

    let status = match load_state {
        LoadState::NotFound { .. } => StatusCode::NOT_FOUND,
        LoadState::LoadError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    };
    (status, state.page(&load_state)).into_response()
}

/// Accept a multipart upload in the `file` field
async fn upload_handler(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let file = match receive_file(&mut multipart).await {
        Ok(Some(file)) => file,
        // Nothing selected: stay where we are
        Ok(None) => return Redirect::to("/preview").into_response(),
        Err(e) => {
            let e = state.uploader.fail(e);
            return state.upload_failed(&e);
        }
    };

    match state.uploader.upload(file).await {
        Ok(slug) => Redirect::to(&preview_path(&slug)).into_response(),
        Err(e) => state.upload_failed(&e),
    }
}

/// Read the `file` field of an upload form, `None` when no file was chosen
async fn receive_file(multipart: &mut Multipart) -> Result<Option<UploadFile>, UploadError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err(form_read_error(String::new(), e)),
        };
        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_string();
        if name.is_empty() {
            return Ok(None);
        }
        return match field.bytes().await {
            Ok(data) => Ok(Some(UploadFile::from_bytes(&name, data.to_vec()))),
            Err(e) => Err(form_read_error(name, e)),
        };
    }
}

fn form_read_error(name: String, e: MultipartError) -> UploadError {
    UploadError::FileRead {
        name,
        source: io::Error::new(io::ErrorKind::InvalidData, e.body_text()),
    }
}

/// Status code for a failed upload
fn upload_error_status(error: &UploadError) -> StatusCode {
    match error {
        UploadError::InvalidFileType { .. } | UploadError::EmptySlug { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        UploadError::FileRead { .. } => StatusCode::BAD_REQUEST,
        UploadError::Store {
            source: StoreError::CapacityExceeded { .. },
            ..
        } => StatusCode::INSUFFICIENT_STORAGE,
        UploadError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// One load cycle off the async runtime
async fn load_blocking(store: &PostStore, slug: String) -> LoadState {
    let store = store.clone();
    let read_slug = slug.clone();
    tokio::task::spawn_blocking(move || loader::load_now(&store, &read_slug))
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Loading post '{}' failed: {}", slug, e);
            LoadState::LoadError {
                slug,
                message: loader::LOAD_ERROR_MESSAGE.to_string(),
            }
        })
}

/// One load cycle as JSON, independent of the preview session
async fn api_post_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    let load_state = load_blocking(&state.store, slug).await;

    let status = match load_state {
        LoadState::Loaded { .. } => StatusCode::OK,
        LoadState::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(load_state)).into_response()
}

/// True when the post names an author icon that is not in the images directory
async fn author_image_missing(images_dir: &std::path::Path, post: &Post) -> bool {
    let Some(path) = post.author_image_path("") else {
        return false;
    };
    let file = images_dir.join(path.trim_start_matches('/'));
    !tokio::fs::metadata(&file)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PreviewConfig;
    use crate::store::{Storage, DEFAULT_QUOTA_BYTES};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "mdpreview-form-boundary";

    fn test_state(config: PreviewConfig) -> (TempDir, Previewer, Arc<AppState>) {
        let dir = TempDir::new().unwrap();
        let previewer = Previewer::with_config(dir.path(), config);
        let state = Arc::new(AppState::new(&previewer).unwrap());
        (dir, previewer, state)
    }

    fn instant_config() -> PreviewConfig {
        PreviewConfig {
            load_delay_ms: 0,
            ..PreviewConfig::default()
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn upload_request(file_name: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: text/markdown\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Option<String>, String) {
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, location, String::from_utf8(body.to_vec()).unwrap())
    }

    struct BrokenStorage;

    impl Storage for BrokenStorage {
        fn get_item(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
        }
    }

    #[tokio::test]
    async fn test_author_image_missing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("user1.jpg"), b"jpg").unwrap();

        let present = Post::from_raw("a", "---\nauthorID: 1\n---\n");
        let absent = Post::from_raw("b", "---\nauthorID: 2\n---\n");
        let no_author = Post::from_raw("c", "body");

        assert!(!author_image_missing(dir.path(), &present).await);
        assert!(author_image_missing(dir.path(), &absent).await);
        assert!(!author_image_missing(dir.path(), &no_author).await);
    }

    #[tokio::test]
    async fn test_app_state_shares_one_store() {
        let (_dir, previewer, state) = test_state(instant_config());

        let slug = state
            .uploader
            .upload(UploadFile::from_bytes("shared.md", "---\ntitle: Shared\n---\nBody"))
            .await
            .unwrap();

        let generation = state.loader.request(Some(&slug));
        let snapshot = state.loader.settled(generation).await;
        assert_eq!(snapshot.state.post().unwrap().display_title(), "Shared");

        let reopened = previewer.open_store().unwrap();
        assert!(reopened.get("shared").unwrap().is_some());
    }

    #[test]
    fn test_body_limit_covers_quota() {
        assert!(upload_body_limit(DEFAULT_QUOTA_BYTES) > DEFAULT_QUOTA_BYTES as usize);
        assert_eq!(upload_body_limit(u64::MAX), usize::MAX);
    }

    #[tokio::test]
    async fn test_upload_redirects_and_flashes_once() {
        let (_dir, _previewer, state) = test_state(instant_config());

        let (status, location, _) = send(
            &state,
            upload_request("hello.md", b"---\ntitle: Hello There\n---\nBody"),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/preview/hello"));

        let (status, _, page) = send(&state, get("/preview/hello")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("<h1>Hello There</h1>"));
        assert!(page.contains("Saved post &#39;Hello There&#39; (slug: hello)"));

        let (_, _, page) = send(&state, get("/preview/hello")).await;
        assert!(page.contains("<h1>Hello There</h1>"));
        assert!(!page.contains("Saved post"));
        assert_eq!(state.uploader.status(), crate::upload::UploadStatus::Idle);
    }

    #[tokio::test]
    async fn test_upload_larger_than_default_body_limit() {
        let (_dir, _previewer, state) = test_state(instant_config());
        let content = "a".repeat(3 * 1024 * 1024);

        let (status, location, _) = send(&state, upload_request("big.md", content.as_bytes())).await;
        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(location.as_deref(), Some("/preview/big"));
        assert_eq!(state.store.get("big").unwrap().map(|raw| raw.len()), Some(content.len()));
    }

    #[tokio::test]
    async fn test_upload_rejections() {
        let (_dir, _previewer, state) = test_state(PreviewConfig {
            quota_bytes: 200,
            ..instant_config()
        });

        let (status, _, page) = send(&state, upload_request("notes.txt", b"text")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(page.contains("Error: please choose a file in .md format."));

        let (status, _, _) = send(&state, upload_request(".md", b"text")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _, page) = send(&state, upload_request("full.md", &[b'x'; 500])).await;
        assert_eq!(status, StatusCode::INSUFFICIENT_STORAGE);
        assert!(page.contains("Failed to save"));
        assert!(state.store.get("full").unwrap().is_none());

        let (status, _, page) = send(&state, upload_request("binary.md", &[0xff, 0xfe])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(page.contains("Failed to read the file"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_reported() {
        let (_dir, _previewer, state) = test_state(PreviewConfig {
            quota_bytes: 200,
            ..instant_config()
        });
        let content = vec![b'x'; 256 * 1024];

        let (status, location, page) = send(&state, upload_request("huge.md", &content)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(location.is_none());
        assert!(page.contains("Failed to read the file"));
        assert!(state.uploader.status().is_error());
        assert!(state.store.get("huge").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_store_failure() {
        let dir = TempDir::new().unwrap();
        let store = PostStore::new(Arc::new(BrokenStorage));
        let state = Arc::new(AppState {
            loader: PostLoader::new(store.clone(), Duration::ZERO),
            uploader: Uploader::new(store.clone()),
            store,
            renderer: MarkdownRenderer::new(),
            page: PageContext::from_config(&PreviewConfig::default()),
            images_dir: dir.path().to_path_buf(),
            body_limit: upload_body_limit(DEFAULT_QUOTA_BYTES),
        });

        let (status, _, page) = send(&state, upload_request("post.md", b"Body")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(page.contains("Failed to save"));

        let (status, _, page) = send(&state, get("/preview/post")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(page.contains(loader::LOAD_ERROR_MESSAGE));

        let (status, _, body) = send(&state, get("/api/posts/post")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains(r#""state":"load_error""#));
    }

    #[tokio::test]
    async fn test_missing_post_is_not_found() {
        let (_dir, _previewer, state) = test_state(instant_config());

        let (status, _, page) = send(&state, get("/preview/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(page.contains("Post &#39;ghost&#39; was not found"));

        let (status, _, body) = send(&state, get("/api/posts/ghost")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains(r#""state":"not_found""#));
    }

    #[tokio::test]
    async fn test_api_post_loaded() {
        let (_dir, _previewer, state) = test_state(instant_config());
        state.store.set("hello", "---\ntitle: Hi\n---\nBody").unwrap();

        let (status, _, body) = send(&state, get("/api/posts/hello")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["state"], "loaded");
        assert_eq!(json["post"]["slug"], "hello");
        assert_eq!(json["post"]["frontmatter"]["title"], "Hi");
    }

    #[tokio::test]
    async fn test_index_is_idle() {
        let (_dir, _previewer, state) = test_state(instant_config());

        let (status, _, page) = send(&state, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("/preview/your-post-slug"));
        assert!(state.loader.snapshot().state == LoadState::Idle);
    }

    #[tokio::test]
    async fn test_superseded_preview_answers_for_its_own_slug() {
        let (_dir, _previewer, state) = test_state(PreviewConfig {
            load_delay_ms: 200,
            ..PreviewConfig::default()
        });
        state.store.set("a", "---\ntitle: Alpha\n---\n").unwrap();
        state.store.set("b", "---\ntitle: Beta\n---\n").unwrap();

        let first = tokio::spawn({
            let state = state.clone();
            async move { send(&state, get("/preview/a")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, _, page_b) = send(&state, get("/preview/b")).await;
        let (status_a, _, page_a) = first.await.unwrap();

        assert_eq!(status_a, StatusCode::OK);
        assert!(page_a.contains("<h1>Alpha</h1>"));
        assert!(!page_a.contains("Loading post"));
        assert!(page_b.contains("<h1>Beta</h1>"));
        assert_eq!(state.loader.snapshot().state.slug(), Some("b"));
    }
}
