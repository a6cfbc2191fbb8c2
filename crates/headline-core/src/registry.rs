//! Feed registry: name → URL, bundled defaults plus persisted additions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::RwLock;
use url::Url;

use crate::feed::{parse_opml_file, FeedSource};
use crate::fs::persist;
use crate::{Error, Result};

/// Curated feed set compiled into the binary
const BUNDLED_FEEDS: &str = include_str!("../feeds.json");

const REGISTRY_FILE: &str = "feeds.json";

/// Outcome of registering one feed from an OPML import
#[derive(Debug)]
pub struct ImportOutcome {
    pub source: FeedSource,
    pub result: Result<()>,
}

/// Concurrency-safe mapping of feed name to URL
pub struct FeedRegistry {
    feeds: RwLock<BTreeMap<String, String>>,
    path: PathBuf,
    /// Set when the last write failed; cleared by the next successful write
    dirty: AtomicBool,
}

impl FeedRegistry {
    /// Parse the bundled default feed set
    pub fn bundled() -> Result<BTreeMap<String, String>> {
        serde_json::from_str(BUNDLED_FEEDS)
            .map_err(|e| Error::Config(format!("Bundled feeds.json is invalid: {}", e)))
    }

    /// Load the bundled defaults merged with feeds persisted in `cache_dir`
    pub fn load(cache_dir: &Path) -> Result<Self> {
        Self::load_with_defaults(cache_dir, Self::bundled()?)
    }

    /// Merge `defaults` with persisted entries. A persisted entry whose name
    /// collides with a default is skipped: the default always wins.
    pub fn load_with_defaults(cache_dir: &Path, defaults: BTreeMap<String, String>) -> Result<Self> {
        let path = cache_dir.join(REGISTRY_FILE);
        let mut feeds = defaults;

        for (name, url) in read_persisted(&path) {
            if feeds.contains_key(&name) {
                tracing::debug!(feed = %name, "Persisted feed shadowed by bundled default, skipping");
                continue;
            }
            tracing::info!(feed = %name, url = %url, "Loading persisted feed");
            feeds.insert(name, url);
        }

        tracing::info!("Feed registry loaded with {} feeds", feeds.len());

        Ok(Self {
            feeds: RwLock::new(feeds),
            path,
            dirty: AtomicBool::new(false),
        })
    }

    /// Register a new feed and persist the whole registry before returning.
    ///
    /// A persistence failure is returned to the caller but the feed stays
    /// registered in memory; [`FeedRegistry::persist_pending`] retries the write.
    pub async fn register(&self, name: &str, url: &str) -> Result<FeedSource> {
        let name = name.trim();
        let url = url.trim();
        if name.is_empty() || url.is_empty() {
            return Err(Error::InvalidFeed("missing name or feed url".to_string()));
        }
        Url::parse(url)?;

        let mut feeds = self.feeds.write().await;
        if feeds.contains_key(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        feeds.insert(name.to_string(), url.to_string());
        tracing::info!(feed = %name, url = %url, "Registered feed");
        self.write_locked(&feeds).await?;

        Ok(FeedSource::new(name, url))
    }

    /// Retry a registry write that failed earlier. Returns whether a write happened.
    pub async fn persist_pending(&self) -> Result<bool> {
        if !self.dirty.load(Ordering::Acquire) {
            return Ok(false);
        }
        let feeds = self.feeds.write().await;
        self.write_locked(&feeds).await?;
        Ok(true)
    }

    /// Whole-file write; caller holds the registry lock
    async fn write_locked(&self, feeds: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_vec_pretty(feeds)?;
        match persist(self.path.clone(), Bytes::from(contents)).await {
            Ok(()) => {
                self.dirty.store(false, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist feed registry");
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Register every feed from an OPML file; duplicates are reported per feed
    pub async fn import_opml(&self, opml_path: &Path) -> Result<Vec<ImportOutcome>> {
        let mut outcomes = Vec::new();
        for feed in parse_opml_file(opml_path)? {
            let source = FeedSource::from(feed);
            let result = self.register(&source.name, &source.url).await.map(|_| ());
            outcomes.push(ImportOutcome { source, result });
        }
        Ok(outcomes)
    }

    /// Snapshot copy of the registry
    pub async fn list(&self) -> BTreeMap<String, String> {
        self.feeds.read().await.clone()
    }

    /// Snapshot ordered by feed name
    pub async fn sorted(&self) -> Vec<FeedSource> {
        self.feeds
            .read()
            .await
            .iter()
            .map(|(name, url)| FeedSource::new(name.clone(), url.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.feeds.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.feeds.read().await.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read persisted additions; a missing or unreadable file yields nothing
fn read_persisted(path: &Path) -> BTreeMap<String, String> {
    let content = match std::fs::read(path) {
        Ok(content) if !content.is_empty() => content,
        Ok(_) => return BTreeMap::new(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read persisted feeds");
            return BTreeMap::new();
        }
    };

    match serde_json::from_slice(&content) {
        Ok(feeds) => feeds,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed persisted feeds");
            BTreeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_bundled_feeds_parse() {
        let bundled = FeedRegistry::bundled().unwrap();
        assert!(!bundled.is_empty());
        assert!(bundled.values().all(|url| Url::parse(url).is_ok()));
    }

    #[tokio::test]
    async fn test_bundled_wins_on_collision() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(REGISTRY_FILE),
            r#"{"A": "https://u2.example", "B": "https://u3.example"}"#,
        )
        .unwrap();

        let registry =
            FeedRegistry::load_with_defaults(dir.path(), map(&[("A", "https://u1.example")])).unwrap();

        assert_eq!(
            registry.list().await,
            map(&[("A", "https://u1.example"), ("B", "https://u3.example")])
        );
    }

    #[tokio::test]
    async fn test_malformed_persisted_file_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(REGISTRY_FILE), "{not json").unwrap();

        let registry =
            FeedRegistry::load_with_defaults(dir.path(), map(&[("A", "https://u1.example")])).unwrap();
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FeedRegistry::load_with_defaults(dir.path(), BTreeMap::new()).unwrap();

        let source = registry.register(" Rust ", "https://blog.rust-lang.org/feed.xml").await.unwrap();
        assert_eq!(source.name, "Rust");

        let reloaded = FeedRegistry::load_with_defaults(dir.path(), BTreeMap::new()).unwrap();
        assert_eq!(
            reloaded.list().await,
            map(&[("Rust", "https://blog.rust-lang.org/feed.xml")])
        );
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            FeedRegistry::load_with_defaults(dir.path(), map(&[("A", "https://u1.example")])).unwrap();

        let err = registry.register("A", "https://other.example").await.unwrap_err();
        assert!(matches!(err, Error::DuplicateName(ref name) if name == "A"));
        assert_eq!(registry.list().await, map(&[("A", "https://u1.example")]));
        // Nothing was written for the rejected mutation
        assert!(!registry.path().exists());
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FeedRegistry::load_with_defaults(dir.path(), BTreeMap::new()).unwrap();

        assert!(matches!(
            registry.register("", "https://a.example").await,
            Err(Error::InvalidFeed(_))
        ));
        assert!(matches!(
            registry.register("A", "   ").await,
            Err(Error::InvalidFeed(_))
        ));
        assert!(matches!(
            registry.register("A", "not a url").await,
            Err(Error::UrlParse(_))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_feed_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the cache directory should be makes writes fail
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();

        let registry = FeedRegistry::load_with_defaults(&blocked, BTreeMap::new()).unwrap();
        let err = registry.register("A", "https://a.example").await.unwrap_err();
        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(registry.len().await, 1);
        assert!(registry.persist_pending().await.is_err());

        std::fs::remove_file(&blocked).unwrap();
        assert!(registry.persist_pending().await.unwrap());
        assert!(!registry.persist_pending().await.unwrap());
        assert!(registry.path().exists());
    }

    #[tokio::test]
    async fn test_sorted_orders_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FeedRegistry::load_with_defaults(
            dir.path(),
            map(&[("b", "https://b.example"), ("A", "https://a.example"), ("a", "https://a2.example")]),
        )
        .unwrap();

        let names: Vec<_> = registry.sorted().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["A", "a", "b"]);
    }

    #[tokio::test]
    async fn test_import_opml_reports_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let opml_path = dir.path().join("subs.opml");
        std::fs::write(
            &opml_path,
            r#"<opml version="2.0"><body>
                <outline text="A" xmlUrl="https://dup.example/rss"/>
                <outline text="C" xmlUrl="https://c.example/rss"/>
            </body></opml>"#,
        )
        .unwrap();

        let registry =
            FeedRegistry::load_with_defaults(dir.path(), map(&[("A", "https://u1.example")])).unwrap();
        let outcomes = registry.import_opml(&opml_path).await.unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].result, Err(Error::DuplicateName(_))));
        assert!(outcomes[1].result.is_ok());
        assert_eq!(registry.len().await, 2);
    }
}
