//! Load a stored post and print it

use anyhow::{bail, Result};

use crate::content::loader::load_now;
use crate::content::{LoadState, Post};
use crate::helpers::full_date;
use crate::Previewer;

/// Output format for `show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowFormat {
    /// Metadata summary followed by the raw body
    #[default]
    Summary,
    /// The load state as JSON
    Json,
    /// The rendered body HTML
    Html,
}

/// Load `slug` from the store and print it in `format`
pub fn run(previewer: &Previewer, slug: &str, format: ShowFormat) -> Result<()> {
    let store = previewer.open_store()?;
    let state = load_now(&store, slug);

    if format == ShowFormat::Json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }

    match &state {
        LoadState::Loaded { post, .. } => match format {
            ShowFormat::Summary => print!("{}", summary(post)),
            ShowFormat::Html => print!("{}", previewer.renderer().render(&post.body)),
            ShowFormat::Json => {}
        },
        LoadState::NotFound { message, .. } | LoadState::LoadError { message, .. } => {
            bail!("{}", message)
        }
        LoadState::Idle | LoadState::Loading { .. } => bail!("Post '{}' did not load", slug),
    }

    Ok(())
}

/// Human-readable summary of a post
pub fn summary(post: &Post) -> String {
    let fm = &post.frontmatter;
    let mut out = String::new();

    out.push_str(&format!("{}\n", post.display_title()));
    out.push_str(&format!("  slug:    {}\n", post.slug));
    if let Some(date) = fm.date.as_deref() {
        let shown = match post.published_on() {
            Some(parsed) => full_date(&parsed),
            None => date.to_string(),
        };
        out.push_str(&format!("  date:    {}\n", shown));
    }
    if let Some(author) = fm.author.as_deref() {
        match fm.author_id {
            Some(id) => out.push_str(&format!("  author:  {} (#{})\n", author, id)),
            None => out.push_str(&format!("  author:  {}\n", author)),
        }
    }
    if !fm.tags.is_empty() {
        out.push_str(&format!("  tags:    {}\n", fm.tags.join(", ")));
    }
    if let Some(summary) = fm.summary.as_deref() {
        out.push_str(&format!("  summary: {}\n", summary));
    }
    if !fm.extra.is_empty() {
        let keys: Vec<_> = fm.extra.keys().map(String::as_str).collect();
        out.push_str(&format!("  other:   {}\n", keys.join(", ")));
    }

    out.push('\n');
    out.push_str(&post.body);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let post = Post::from_raw(
            "hello",
            "---\ntitle: Hello\ndate: 2024-01-15\nauthor: Hanako\nauthorID: 3\ntags: [a, b]\nmood: sunny\n---\nBody text.",
        );
        let out = summary(&post);
        assert!(out.starts_with("Hello\n"));
        assert!(out.contains("  slug:    hello\n"));
        assert!(out.contains("  date:    January 15, 2024\n"));
        assert!(out.contains("  author:  Hanako (#3)\n"));
        assert!(out.contains("  tags:    a, b\n"));
        assert!(out.contains("  other:   mood\n"));
        assert!(out.ends_with("\nBody text.\n"));
    }

    #[test]
    fn test_summary_untitled() {
        let post = Post::from_raw("bare", "Just text");
        let out = summary(&post);
        assert!(out.starts_with("Untitled post\n"));
        assert!(!out.contains("tags:"));
    }

    #[test]
    fn test_run_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let previewer = Previewer::new(dir.path()).unwrap();
        let err = run(&previewer, "ghost", ShowFormat::Summary).unwrap_err();
        assert!(err.to_string().contains("'ghost'"));
    }

    #[test]
    fn test_run_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let previewer = Previewer::new(dir.path()).unwrap();
        previewer
            .open_store()
            .unwrap()
            .set("hi", "---\ntitle: Hi\n---\nBody")
            .unwrap();

        assert!(run(&previewer, "hi", ShowFormat::Summary).is_ok());
        assert!(run(&previewer, "hi", ShowFormat::Html).is_ok());
        assert!(run(&previewer, "hi", ShowFormat::Json).is_ok());
    }
}
