use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named, URL-addressed feed registered with the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// A single item from a feed, recomputed on every fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub title: String,
    pub description: String,
    pub link: String,
    /// `None` when the feed carried no parseable publish or update time
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
}
