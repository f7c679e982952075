//! URL helper functions

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left alone in a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Encode a value for use in a query string
pub fn encode_url(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

/// Path of the preview page for a slug
///
/// # Examples
/// ```ignore
/// preview_path("my post") // -> "/preview/my%20post"
/// ```
pub fn preview_path(slug: &str) -> String {
    format!("/preview/{}", utf8_percent_encode(slug, PATH_SEGMENT))
}

/// Public URL a post will be shared under
///
/// # Examples
/// ```ignore
/// share_url("https://example.com/blog/", "hello") // -> "https://example.com/blog/hello"
/// ```
pub fn share_url(base: &str, slug: &str) -> String {
    format!("{}{}", base, slug)
}

/// X (Twitter) intent URL sharing `url` with `text`
pub fn twitter_share_url(url: &str, text: &str) -> String {
    format!(
        "https://twitter.com/intent/tweet?url={}&text={}",
        encode_url(url),
        encode_url(text)
    )
}
