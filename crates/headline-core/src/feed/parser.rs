use chrono::{DateTime, Utc};
use feed_rs::parser;

use super::models::Entry;
use crate::{Error, Result};

/// Parse RSS/Atom feed content into entries, keeping the feed's item order
pub fn parse_feed(content: &[u8], source_name: &str) -> Result<Vec<Entry>> {
    let feed = parser::parse(content)
        .map_err(|e| Error::FeedParse(e.to_string()))?;

    let entries = feed.entries.into_iter().map(|entry| {
        let link = entry.links.first()
            .map(|l| l.href.clone())
            .unwrap_or_default();

        let title = entry.title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());

        let description = entry.summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();

        let published_at = entry.published
            .or(entry.updated)
            .map(|dt| DateTime::<Utc>::from(dt));

        Entry {
            title,
            description,
            link,
            published_at,
            source_name: source_name.to_string(),
        }
    }).collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Example</title>
    <item>
        <title>Second story</title>
        <link>https://example.com/2</link>
        <description>Body two</description>
        <pubDate>Wed, 03 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
        <title>First story</title>
        <link>https://example.com/1</link>
    </item>
</channel></rss>"#;

    #[test]
    fn test_parse_keeps_order_and_fields() {
        let entries = parse_feed(RSS.as_bytes(), "Example").unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "Second story");
        assert_eq!(entries[0].link, "https://example.com/2");
        assert_eq!(entries[0].description, "Body two");
        assert_eq!(
            entries[0].published_at.map(|d| d.to_rfc3339()),
            Some("2024-01-03T10:00:00+00:00".to_string())
        );
        assert_eq!(entries[0].source_name, "Example");

        assert_eq!(entries[1].title, "First story");
        assert!(entries[1].published_at.is_none());
        assert!(entries[1].description.is_empty());
    }

    #[test]
    fn test_parse_atom() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:example</id>
  <updated>2024-01-02T00:00:00Z</updated>
  <entry>
    <title>Atom entry</title>
    <id>urn:example:1</id>
    <link href="https://example.org/a"/>
    <updated>2024-01-02T00:00:00Z</updated>
    <summary>Short</summary>
  </entry>
</feed>"#;

        let entries = parse_feed(atom.as_bytes(), "Atom").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://example.org/a");
        assert_eq!(entries[0].description, "Short");
        assert!(entries[0].published_at.is_some());
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            parse_feed(b"<not valid xml", "Broken"),
            Err(Error::FeedParse(_))
        ));
    }
}
