//! Helper functions for rendering preview pages
//!
//! URL building, date display and HTML escaping used by the view layer.

mod date;
mod html;
mod url;

pub use date::*;
pub use html::*;
pub use url::*;
