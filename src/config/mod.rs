//! Configuration module

mod preview;

pub use preview::HighlightConfig;
pub use preview::PreviewConfig;
