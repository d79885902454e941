//! Domain types for content, engagement records and configuration.

pub mod config;
pub mod content;
