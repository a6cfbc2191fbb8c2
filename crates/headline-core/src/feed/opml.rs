use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::models::FeedSource;
use crate::{Error, Result};

/// A subscription outline read from an OPML export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpmlFeed {
    pub name: String,
    pub url: String,
}

impl From<OpmlFeed> for FeedSource {
    fn from(feed: OpmlFeed) -> Self {
        FeedSource::new(feed.name, feed.url)
    }
}

/// Parse an OPML file from disk
pub fn parse_opml_file(path: &Path) -> Result<Vec<OpmlFeed>> {
    let content = std::fs::read_to_string(path)?;
    parse_opml(&content)
}

/// Extract every outline carrying an `xmlUrl`, in document order
pub fn parse_opml(content: &str) -> Result<Vec<OpmlFeed>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                if let Some(feed) = outline_feed(&e)? {
                    feeds.push(feed);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::FeedParse(format!("Failed to parse OPML: {}", e)));
            }
            _ => {}
        }
    }

    Ok(feeds)
}

fn outline_feed(outline: &BytesStart<'_>) -> Result<Option<OpmlFeed>> {
    let mut url = None;
    let mut title = None;
    let mut text = None;

    for attr in outline.attributes().flatten() {
        let value = attr
            .unescape_value()
            .map_err(|e| Error::FeedParse(format!("Bad OPML attribute: {}", e)))?
            .trim()
            .to_string();
        match attr.key.as_ref() {
            b"xmlUrl" => url = Some(value),
            b"title" => title = Some(value),
            b"text" => text = Some(value),
            _ => {}
        }
    }

    // Categories carry no xmlUrl
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return Ok(None);
    };

    let name = title
        .filter(|t| !t.is_empty())
        .or(text.filter(|t| !t.is_empty()))
        .unwrap_or_else(|| url.clone());

    Ok(Some(OpmlFeed { name, url }))
}
