//! Merges fetched entries into per-feed sections and a cross-feed headline list.
//!
//! - [`sanitize`] - ordered description clean-up steps
//! - [`section`] - one feed's rendered fragment plus its headline candidate
//! - [`compose`] - headline block, navigation head and final body

mod compose;
mod html;
mod sanitize;
mod section;

pub use compose::{Aggregator, Composed};
pub use html::escape_html;
pub use sanitize::{Sanitizer, Transform};
pub use section::{FeedSection, Headline};
