//! Post model

use chrono::{DateTime, Local};
use serde::Serialize;

use super::{Frontmatter, ParsedDocument};
use crate::helpers;

/// Title shown when a post has none
pub const UNTITLED: &str = "Untitled post";

/// A post loaded from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Post {
    /// Slug the post was fetched with
    pub slug: String,

    /// Parsed front-matter
    pub frontmatter: Frontmatter,

    /// Markdown body with the front-matter removed
    pub body: String,
}

impl Post {
    /// Build a post from a raw stored document
    pub fn from_raw(slug: &str, raw: &str) -> Self {
        let ParsedDocument { frontmatter, body } = ParsedDocument::parse(raw);
        Self {
            slug: slug.to_string(),
            frontmatter,
            body,
        }
    }

    /// Title for display, falling back to a placeholder
    pub fn display_title(&self) -> &str {
        self.frontmatter.title().unwrap_or(UNTITLED)
    }

    /// Publication date, when the `date` field is parseable
    pub fn published_on(&self) -> Option<DateTime<Local>> {
        self.frontmatter.parse_date()
    }

    /// Path of the author's icon under `prefix`, e.g. `/images/user3.jpg`
    pub fn author_image_path(&self, prefix: &str) -> Option<String> {
        match self.frontmatter.author_id {
            Some(id) if id != 0 => Some(format!(
                "{}/user{}.jpg",
                prefix.trim_end_matches('/'),
                id
            )),
            _ => None,
        }
    }

    /// Public URL of this post
    pub fn share_url(&self, base: &str) -> String {
        helpers::share_url(base, &self.slug)
    }

    /// Text used when sharing this post
    pub fn share_text(&self, site_title: &str) -> String {
        match self.frontmatter.title() {
            Some(title) => format!("{}｜{}", title, site_title),
            None => format!("I read this post｜{}", site_title),
        }
    }
}
