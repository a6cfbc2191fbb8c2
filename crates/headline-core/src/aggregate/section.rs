use chrono::{DateTime, Utc};

use super::html::escape_html;
use super::sanitize::Sanitizer;
use crate::feed::Entry;

/// A feed's first entry promoted into the cross-feed headline list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    /// Name of the feed section the headline links back to
    pub category: String,
}

impl Headline {
    pub fn to_html(&self) -> String {
        let category = escape_html(&self.category);
        format!(
            r##"<div class="headline"><a href="#{category}" class="category">{category}</a><h3><a href="{}" rel="noopener noreferrer" target="_blank">{}</a></h3><span class="description">{}</span></div>"##,
            escape_html(&self.link),
            escape_html(&self.title),
            self.description,
        )
    }
}

/// Rendered fragment for one feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSection {
    pub name: String,
    pub html: String,
    /// Number of entries rendered (at most the per-feed cap)
    pub entry_count: usize,
    /// `None` when the feed is empty or its first entry has no publish time
    pub headline: Option<Headline>,
}

impl FeedSection {
    /// Render up to `cap` entries in feed order; the rest are dropped
    pub fn build(name: &str, entries: Vec<Entry>, cap: usize, sanitizer: &Sanitizer) -> Self {
        let anchor = escape_html(name);
        let mut html = format!(
            r#"<div class=section><hr id="{anchor}" class="anchor"><h1>{anchor}</h1>"#
        );
        let mut headline = None;
        let mut entry_count = 0;

        for (i, entry) in entries.into_iter().take(cap).enumerate() {
            let description = sanitizer.apply(&entry.description);

            html.push_str(&format!(
                r#"<h3><a href="{}" rel="noopener noreferrer" target="_blank">{}</a></h3><span class="description">{}</span>"#,
                escape_html(&entry.link),
                escape_html(&entry.title),
                description,
            ));
            entry_count += 1;

            if i == 0 {
                headline = entry.published_at.map(|published_at| Headline {
                    title: entry.title,
                    description,
                    link: entry.link,
                    published_at,
                    category: name.to_string(),
                });
            }
        }

        html.push_str("</div>");

        Self {
            name: name.to_string(),
            html,
            entry_count,
            headline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: usize, published_at: Option<DateTime<Utc>>) -> Entry {
        Entry {
            title: format!("Story {}", i),
            description: format!("Body {} <img src=\"x.png\">", i),
            link: format!("https://example.com/{}", i),
            published_at,
            source_name: "Example".to_string(),
        }
    }

    #[test]
    fn test_caps_entries_in_order() {
        let entries: Vec<_> = (0..15).map(|i| entry(i, None)).collect();
        let section = FeedSection::build("Example", entries, 10, &Sanitizer::default());

        assert_eq!(section.entry_count, 10);
        assert_eq!(section.html.matches("<h3>").count(), 10);

        let positions: Vec<_> = (0..10)
            .map(|i| section.html.find(&format!(">Story {}<", i)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(!section.html.contains("Story 10"));
        assert!(!section.html.contains("<img"));
    }

    #[test]
    fn test_headline_from_first_entry_only() {
        let t = "2024-01-02T00:00:00Z".parse().unwrap();
        let entries = vec![entry(0, Some(t)), entry(1, Some(t))];
        let section = FeedSection::build("Example", entries, 10, &Sanitizer::default());

        let headline = section.headline.unwrap();
        assert_eq!(headline.title, "Story 0");
        assert_eq!(headline.category, "Example");
        assert_eq!(headline.description, "Body 0 ");
    }

    #[test]
    fn test_no_headline_without_timestamp() {
        let t = "2024-01-02T00:00:00Z".parse().unwrap();
        let entries = vec![entry(0, None), entry(1, Some(t))];
        let section = FeedSection::build("Example", entries, 10, &Sanitizer::default());

        assert!(section.headline.is_none());
        assert!(section.html.contains("Story 0"));
        assert!(section.html.contains("Story 1"));
    }

    #[test]
    fn test_empty_feed() {
        let section = FeedSection::build("Quiet", Vec::new(), 10, &Sanitizer::default());
        assert_eq!(section.entry_count, 0);
        assert!(section.headline.is_none());
        assert!(section.html.contains(r#"<hr id="Quiet" class="anchor"><h1>Quiet</h1>"#));
    }

    #[test]
    fn test_titles_escaped() {
        let mut e = entry(0, None);
        e.title = "<script>alert(1)</script>".to_string();
        let section = FeedSection::build("A&B", vec![e], 10, &Sanitizer::default());
        assert!(!section.html.contains("<script>"));
        assert!(section.html.contains("<h1>A&amp;B</h1>"));
    }
}
