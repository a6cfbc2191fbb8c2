use super::html::escape_html;
use super::sanitize::Sanitizer;
use super::section::{FeedSection, Headline};
use crate::config::RenderConfig;
use crate::feed::Entry;

/// Navigation head and page body produced by one aggregation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composed {
    pub head: String,
    pub body: String,
}

/// Builds feed sections and composes them with enrichment snippets
#[derive(Clone)]
pub struct Aggregator {
    sanitizer: Sanitizer,
    max_entries: usize,
}

impl Aggregator {
    pub fn new(sanitizer: Sanitizer, max_entries: usize) -> Self {
        Self {
            sanitizer,
            max_entries,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(
            Sanitizer::standard(&config.boilerplate),
            config.max_entries_per_feed,
        )
    }

    pub fn section(&self, name: &str, entries: Vec<Entry>) -> FeedSection {
        FeedSection::build(name, entries, self.max_entries, &self.sanitizer)
    }

    /// Headline block (enrichments, then headlines newest first) followed by
    /// every section in the given order
    pub fn compose(&self, sections: &[FeedSection], enrichments: &[String]) -> Composed {
        let mut head = String::new();
        for section in sections {
            let anchor = escape_html(&section.name);
            head.push_str(&format!(r##"<a href="#{anchor}" class="head">{anchor}</a>"##));
        }

        let mut body = String::from(r#"<div class=section><hr id="headlines" class="anchor">"#);
        for snippet in enrichments {
            body.push_str(snippet);
        }
        body.push_str("<h1>Headlines</h1>");
        for headline in sort_headlines(sections) {
            body.push_str(&headline.to_html());
        }
        body.push_str("</div>");

        for section in sections {
            body.push_str(&section.html);
        }

        Composed { head, body }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// Headline candidates ordered most recent first; ties keep section order
pub fn sort_headlines(sections: &[FeedSection]) -> Vec<&Headline> {
    let mut headlines: Vec<&Headline> = sections
        .iter()
        .filter_map(|s| s.headline.as_ref())
        .collect();
    headlines.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    headlines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn entry(feed: &str, title: &str, published: Option<&str>) -> Entry {
        Entry {
            title: title.to_string(),
            description: String::new(),
            link: format!("https://{}.example/{}", feed, title),
            published_at: published.map(|p| p.parse::<DateTime<Utc>>().unwrap()),
            source_name: feed.to_string(),
        }
    }

    #[test]
    fn test_headlines_newest_first() {
        let aggregator = Aggregator::default();
        let sections = vec![
            aggregator.section("a", vec![entry("a", "jan3", Some("2024-01-03T00:00:00Z"))]),
            aggregator.section("b", vec![entry("b", "jan1", Some("2024-01-01T00:00:00Z"))]),
            aggregator.section("c", vec![entry("c", "jan2", Some("2024-01-02T00:00:00Z"))]),
        ];

        let titles: Vec<_> = sort_headlines(&sections).iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["jan3", "jan2", "jan1"]);
    }

    #[test]
    fn test_untimed_feed_only_in_its_section() {
        let aggregator = Aggregator::default();
        let sections = vec![
            aggregator.section("a", vec![entry("a", "timed", Some("2024-01-03T00:00:00Z"))]),
            aggregator.section("b", vec![entry("b", "untimed", None)]),
        ];

        let composed = aggregator.compose(&sections, &[]);
        let headlines_end = composed.body.find("</div>").unwrap();
        let headline_block = &composed.body[..headlines_end];

        assert!(headline_block.contains("timed"));
        assert!(!headline_block.contains("untimed"));
        assert!(composed.body[headlines_end..].contains("untimed"));
    }

    #[test]
    fn test_layout_order() {
        let aggregator = Aggregator::default();
        let sections = vec![
            aggregator.section("alpha", vec![entry("alpha", "one", Some("2024-01-01T00:00:00Z"))]),
            aggregator.section("beta", vec![entry("beta", "two", None)]),
        ];
        let enrichments = vec![r#"<div id="info"><h1>Markets</h1></div>"#.to_string()];

        let composed = aggregator.compose(&sections, &enrichments);

        assert_eq!(
            composed.head,
            r##"<a href="#alpha" class="head">alpha</a><a href="#beta" class="head">beta</a>"##
        );
        let markets = composed.body.find("Markets").unwrap();
        let headlines = composed.body.find("<h1>Headlines</h1>").unwrap();
        let alpha = composed.body.find("<h1>alpha</h1>").unwrap();
        let beta = composed.body.find("<h1>beta</h1>").unwrap();
        assert!(composed.body.starts_with(r#"<div class=section><hr id="headlines" class="anchor">"#));
        assert!(markets < headlines && headlines < alpha && alpha < beta);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let aggregator = Aggregator::default();
        let same = Some("2024-01-01T00:00:00Z");
        let sections = vec![
            aggregator.section("a", vec![entry("a", "first", same)]),
            aggregator.section("b", vec![entry("b", "second", same)]),
        ];

        let titles: Vec<_> = sort_headlines(&sections).iter().map(|h| h.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
    }
}
