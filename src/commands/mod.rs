//! CLI commands

pub mod show;
pub mod upload;
