//! URL handling module for Sumi-Harvest
//!
//! This module normalizes the target's base URL, derives the per-page URLs
//! jobs are built from, and derives the target slug used as a storage key.

mod normalize;
mod page;

// Re-export main functions
pub use normalize::normalize_base_url;
pub use page::{prepare_page_url, target_slug, UNKNOWN_TARGET};
