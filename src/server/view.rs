//! HTML views for the preview page

use crate::config::PreviewConfig;
use crate::content::{LoadState, MarkdownRenderer, Post};
use crate::helpers::{html_escape, image_tag, link_to, time_tag, twitter_share_url};
use crate::upload::UploadStatus;

/// URL prefix author icons are served under
pub const IMAGE_PREFIX: &str = "/images";

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; color: #222; }
.header { background: #222; padding: 1rem; }
.header a { color: #fff; text-decoration: none; font-weight: bold; }
.container { max-width: 760px; margin: 0 auto; padding: 1rem; }
.upload-message.error, .error-message { color: #b00020; }
.upload-message.success { color: #1b5e20; }
.post-meta { color: #666; }
.author-icon { width: 32px; height: 32px; border-radius: 50%; vertical-align: middle; margin-right: .5rem; }
.default-author-icon { display: inline-block; background: #ccc; }
.tag { margin-right: .5rem; color: #555; }
.navigation-links { margin-top: 2rem; }
"#;

/// Site-wide values every page needs
#[derive(Debug, Clone)]
pub struct PageContext {
    pub site_title: String,
    pub share_url: String,
}

impl PageContext {
    pub fn from_config(config: &PreviewConfig) -> Self {
        Self {
            site_title: config.title.clone(),
            share_url: config.share_url.clone(),
        }
    }
}

/// Render the whole preview page for a load state
pub fn render_page(
    ctx: &PageContext,
    renderer: &MarkdownRenderer,
    state: &LoadState,
    upload: &UploadStatus,
) -> String {
    let title = match state.post() {
        Some(post) => format!("{} | {}", post.display_title(), ctx.site_title),
        None => ctx.site_title.clone(),
    };

    let main = match state {
        LoadState::Idle => instructions(),
        LoadState::Loading { slug } => format!(
            r#"<div class="loading-container-inline"><p>Loading post "{}"...</p></div>"#,
            html_escape(slug)
        ),
        LoadState::NotFound { message, .. } | LoadState::LoadError { message, .. } => format!(
            r#"<div class="error-container-inline"><p class="error-message">{}</p>{}</div>"#,
            html_escape(message),
            link_to("/", "Back to the start page", false)
        ),
        LoadState::Loaded {
            post,
            author_image_failed,
        } => article(ctx, renderer, post, *author_image_failed),
    };

    let navigation = if state.slug().is_some() {
        format!(
            r#"<div class="navigation-links">{}</div>"#,
            link_to("/", "← See other posts", false)
        )
    } else {
        String::new()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
<header class="header"><div class="container">{home}</div></header>
<div class="container">
{uploader}
<main class="main-content">
{main}
{navigation}
</main>
</div>
</body>
</html>
"#,
        title = html_escape(&title),
        style = STYLE,
        home = link_to("/", &ctx.site_title, false),
        uploader = uploader_section(upload),
    )
}

fn instructions() -> String {
    r#"<div class="instructions-container"><p>To preview a post, put its slug in the URL (for example <code>/preview/your-post-slug</code>) or upload a new file with the form above.</p></div>"#
        .to_string()
}

fn uploader_section(upload: &UploadStatus) -> String {
    let message = match upload.message() {
        Some(message) => format!(
            r#"<p class="upload-message {}">{}</p>"#,
            if upload.is_error() { "error" } else { "success" },
            html_escape(message)
        ),
        None => String::new(),
    };

    format!(
        r#"<section class="uploader-main-section">
<h2>Markdown post uploader</h2>
<p>Upload a .md file from your computer to preview it.</p>
<form method="post" action="/upload" enctype="multipart/form-data">
<input type="file" name="file" accept=".md">
<button type="submit">Upload</button>
</form>
{}
</section>"#,
        message
    )
}

fn article(
    ctx: &PageContext,
    renderer: &MarkdownRenderer,
    post: &Post,
    author_image_failed: bool,
) -> String {
    let fm = &post.frontmatter;
    let mut header = format!("<h1>{}</h1>", html_escape(post.display_title()));

    if let Some(date) = fm.date.as_deref() {
        let shown = match post.published_on() {
            Some(parsed) => time_tag(&parsed),
            None => html_escape(date),
        };
        header.push_str(&format!(r#"<p class="post-meta">Published: {}</p>"#, shown));
    }

    if let Some(author) = fm.author.as_deref() {
        let icon = match post.author_image_path(IMAGE_PREFIX) {
            Some(path) if !author_image_failed => image_tag(
                &path,
                &format!("{}'s icon", author),
                Some("author-icon"),
            ),
            _ => r#"<span class="author-icon default-author-icon"></span>"#.to_string(),
        };
        header.push_str(&format!(
            r#"<p class="post-meta author-info">{}{}</p>"#,
            icon,
            html_escape(author)
        ));
    }

    if !fm.tags.is_empty() {
        let tags: String = fm
            .tags
            .iter()
            .map(|tag| format!(r#"<span class="tag">#{}</span>"#, html_escape(tag)))
            .collect();
        header.push_str(&format!(r#"<div class="post-tags">{}</div>"#, tags));
    }

    let share = twitter_share_url(
        &post.share_url(&ctx.share_url),
        &post.share_text(&ctx.site_title),
    );

    format!(
        r#"<article class="blog-post-content-wrapper">
<header class="blog-post-main-header">{}</header>
<div class="blog-post-body">
{}
</div>
<div class="x-share-links">{}</div>
</article>"#,
        header,
        renderer.render(&post.body),
        link_to(&share, "Share on X", true)
    )
}
