//! Render cache: the last fully composed page, served from memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::aggregate::{escape_html, Composed};
use crate::config::RenderConfig;
use crate::fs::persist;
use crate::Result;

const PAGE_FILE: &str = "news.html";

/// The composed output page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Navigation head; empty for a page restored from disk
    pub head: String,
    /// Page body; empty for a page restored from disk
    pub body: String,
    /// Complete HTML document served to readers
    pub html: Bytes,
    pub rendered_at: DateTime<Utc>,
}

/// Holds the single live page behind its own lock
pub struct RenderCache {
    page: RwLock<Option<Arc<RenderedPage>>>,
    path: PathBuf,
    title: String,
    description: String,
}

impl RenderCache {
    pub fn new(cache_dir: &Path, config: &RenderConfig) -> Self {
        Self {
            page: RwLock::new(None),
            path: cache_dir.join(PAGE_FILE),
            title: config.title.clone(),
            description: config.description.clone(),
        }
    }

    /// Replace the live page and persist it.
    ///
    /// The in-memory page is replaced even when the disk write fails; the
    /// error is returned for logging and the next publish rewrites the file.
    pub async fn publish(&self, composed: Composed) -> Result<Arc<RenderedPage>> {
        let html = page_shell(&self.title, &self.description, &composed.head, &composed.body);
        let page = Arc::new(RenderedPage {
            head: composed.head,
            body: composed.body,
            html: Bytes::from(html),
            rendered_at: Utc::now(),
        });

        let mut slot = self.page.write().await;
        *slot = Some(page.clone());
        persist(self.path.clone(), page.html.clone()).await?;
        tracing::debug!(bytes = page.html.len(), "Published rendered page");

        Ok(page)
    }

    /// Current page, if any. Memory only.
    pub async fn current(&self) -> Option<Arc<RenderedPage>> {
        self.page.read().await.clone()
    }

    /// Current page HTML, if any. Memory only.
    pub async fn html(&self) -> Option<Bytes> {
        self.page.read().await.as_ref().map(|p| p.html.clone())
    }

    /// Load the persisted page for cold-start serving. Returns its age, or
    /// `None` when nothing usable is on disk. Never replaces a live page.
    pub async fn restore(&self) -> Option<Duration> {
        let (html, modified) = match read_page(&self.path) {
            Ok(found) => found,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to read cached page");
                }
                return None;
            }
        };
        if html.is_empty() {
            return None;
        }

        let age = SystemTime::now().duration_since(modified).unwrap_or(Duration::ZERO);

        let mut slot = self.page.write().await;
        if slot.is_some() {
            return None;
        }
        *slot = Some(Arc::new(RenderedPage {
            head: String::new(),
            body: String::new(),
            html: Bytes::from(html),
            rendered_at: DateTime::<Utc>::from(modified),
        }));

        tracing::info!(age_secs = age.as_secs(), "Serving cached page from disk");
        Some(age)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_page(path: &Path) -> std::io::Result<(Vec<u8>, SystemTime)> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok((std::fs::read(path)?, modified))
}

/// Minimal HTML document around the composed head and body
pub fn page_shell(title: &str, description: &str, head: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<meta name="description" content="{description}">
</head>
<body>
<div id="head">{head}</div>
<div id="content">{body}</div>
</body>
</html>
"#,
        title = escape_html(title),
        description = escape_html(description),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composed(marker: &str) -> Composed {
        Composed {
            head: format!("<a>{}</a>", marker),
            body: format!("<p>{}</p>", marker),
        }
    }

    #[tokio::test]
    async fn test_publish_serves_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RenderCache::new(dir.path(), &RenderConfig::default());
        assert!(cache.html().await.is_none());

        cache.publish(composed("first")).await.unwrap();
        cache.publish(composed("second")).await.unwrap();

        let html = cache.html().await.unwrap();
        let text = std::str::from_utf8(&html).unwrap();
        assert!(text.contains("<p>second</p>"));
        assert!(text.contains("<title>News</title>"));
        assert_eq!(std::fs::read(cache.path()).unwrap(), html.to_vec());
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_new_page() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();

        let cache = RenderCache::new(&blocked, &RenderConfig::default());
        assert!(cache.publish(composed("fresh")).await.is_err());

        let current = cache.current().await.unwrap();
        assert_eq!(current.body, "<p>fresh</p>");
    }

    #[tokio::test]
    async fn test_restore_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let first = RenderCache::new(dir.path(), &RenderConfig::default());
        first.publish(composed("persisted")).await.unwrap();

        let second = RenderCache::new(dir.path(), &RenderConfig::default());
        let age = second.restore().await.unwrap();
        assert!(age < Duration::from_secs(60));
        assert_eq!(second.html().await, first.html().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_publish_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(RenderCache::new(dir.path(), &RenderConfig::default()));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            tasks.push(tokio::spawn(async move {
                cache.publish(composed(&format!("page {}", i))).await.unwrap();
                cache.html().await.unwrap()
            }));
        }
        for task in tasks {
            assert!(!task.await.unwrap().is_empty());
        }

        // The file on disk is the page that won the last swap
        let live = cache.html().await.unwrap();
        assert_eq!(std::fs::read(cache.path()).unwrap(), live.to_vec());
    }

    #[tokio::test]
    async fn test_restore_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RenderCache::new(dir.path(), &RenderConfig::default());
        assert!(cache.restore().await.is_none());
        assert!(cache.current().await.is_none());
    }

    #[test]
    fn test_page_shell_escapes_title() {
        let html = page_shell("A & B", "desc", "<a>h</a>", "<p>b</p>");
        assert!(html.contains("<title>A &amp; B</title>"));
        assert!(html.contains(r#"<div id="content"><p>b</p></div>"#));
    }
}
