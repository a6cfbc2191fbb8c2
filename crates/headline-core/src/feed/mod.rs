mod fetcher;
mod models;
mod opml;
mod parser;

pub use fetcher::{FeedFetch, FeedFetcher};
pub use models::{Entry, FeedSource};
pub use opml::{parse_opml, parse_opml_file, OpmlFeed};
pub use parser::parse_feed;
