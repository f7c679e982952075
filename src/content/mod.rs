//! Content module - front-matter parsing, post loading and rendering

mod frontmatter;
pub mod loader;
mod markdown;
mod post;

pub use frontmatter::{Frontmatter, ParsedDocument};
pub use loader::{LoadSnapshot, LoadState, PostLoader};
pub use markdown::MarkdownRenderer;
pub use post::{Post, UNTITLED};
