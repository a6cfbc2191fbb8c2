//! Per-feed retry state, written by the scheduler and read by observers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::backoff::BackoffPolicy;
use crate::feed::FeedSource;

/// Retry state of one feed.
///
/// `attempts == 0` means healthy: no error and no backoff. Otherwise
/// `backoff_until` is the instant before which the feed is not retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStatus {
    pub name: String,
    pub url: String,
    pub attempts: u32,
    #[serde(rename = "error")]
    pub last_error: Option<String>,
    pub backoff_until: Option<DateTime<Utc>>,
}

impl FeedStatus {
    pub fn new(source: &FeedSource) -> Self {
        Self {
            name: source.name.clone(),
            url: source.url.clone(),
            attempts: 0,
            last_error: None,
            backoff_until: None,
        }
    }

    /// Whether the feed may be fetched at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.backoff_until {
            Some(until) if self.attempts > 0 => now >= until,
            _ => true,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.attempts > 0
    }

    fn fail(&mut self, error: String, now: DateTime<Utc>, policy: &BackoffPolicy) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error);
        // Sub-second policies still move the deadline strictly past `now`
        let delay = chrono::Duration::from_std(policy.delay(self.attempts))
            .unwrap_or(chrono::Duration::MAX)
            .max(chrono::Duration::milliseconds(1));
        self.backoff_until = Some(now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC));
    }

    fn reset(&mut self) {
        self.attempts = 0;
        self.last_error = None;
        self.backoff_until = None;
    }
}

/// Feed name → retry state
#[derive(Default)]
pub struct StatusStore {
    statuses: RwLock<BTreeMap<String, FeedStatus>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status of `source`, created healthy if absent
    pub async fn get_or_insert(&self, source: &FeedSource) -> FeedStatus {
        if let Some(status) = self.statuses.read().await.get(&source.name) {
            return status.clone();
        }

        self.statuses
            .write()
            .await
            .entry(source.name.clone())
            .or_insert_with(|| FeedStatus::new(source))
            .clone()
    }

    pub async fn get(&self, name: &str) -> Option<FeedStatus> {
        self.statuses.read().await.get(name).cloned()
    }

    /// Count one more consecutive failure and push the retry deadline out
    pub async fn record_failure(
        &self,
        source: &FeedSource,
        error: impl Into<String>,
        now: DateTime<Utc>,
        policy: &BackoffPolicy,
    ) -> FeedStatus {
        let mut statuses = self.statuses.write().await;
        let status = statuses
            .entry(source.name.clone())
            .or_insert_with(|| FeedStatus::new(source));
        status.url = source.url.clone();
        status.fail(error.into(), now, policy);
        status.clone()
    }

    /// Clear the retry state after a successful fetch
    pub async fn record_success(&self, source: &FeedSource) -> FeedStatus {
        let mut statuses = self.statuses.write().await;
        let status = statuses
            .entry(source.name.clone())
            .or_insert_with(|| FeedStatus::new(source));
        status.url = source.url.clone();
        status.reset();
        status.clone()
    }

    /// Copy of every status keyed by feed name
    pub async fn snapshot(&self) -> BTreeMap<String, FeedStatus> {
        self.statuses.read().await.clone()
    }

    /// Feeds currently failing, ordered by name
    pub async fn degraded(&self) -> Vec<FeedStatus> {
        self.statuses
            .read()
            .await
            .values()
            .filter(|s| s.is_degraded())
            .cloned()
            .collect()
    }

    pub async fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot().await).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn source() -> FeedSource {
        FeedSource::new("Example", "https://example.com/rss")
    }

    fn policy() -> BackoffPolicy {
        BackoffPolicy::new(Duration::from_secs(60), Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_created_healthy() {
        let store = StatusStore::new();
        let status = store.get_or_insert(&source()).await;
        assert_eq!(status.attempts, 0);
        assert!(status.backoff_until.is_none());
        assert!(status.last_error.is_none());
        assert!(status.is_due(Utc::now()));
    }

    #[tokio::test]
    async fn test_failure_sets_future_backoff() {
        let store = StatusStore::new();
        let now = Utc::now();

        let first = store.record_failure(&source(), "timeout", now, &policy()).await;
        assert_eq!(first.attempts, 1);
        assert_eq!(first.last_error.as_deref(), Some("timeout"));
        assert_eq!(first.backoff_until, Some(now + chrono::Duration::seconds(60)));
        assert!(!first.is_due(now));
        assert!(!first.is_due(now + chrono::Duration::seconds(59)));
        assert!(first.is_due(now + chrono::Duration::seconds(60)));

        let second = store.record_failure(&source(), "timeout", now, &policy()).await;
        assert_eq!(second.attempts, 2);
        assert!(second.backoff_until > first.backoff_until);
    }

    #[tokio::test]
    async fn test_zero_policy_still_strictly_future() {
        let store = StatusStore::new();
        let now = Utc::now();
        let zero = BackoffPolicy::new(Duration::ZERO, Duration::ZERO);

        let status = store.record_failure(&source(), "boom", now, &zero).await;
        assert!(status.backoff_until.unwrap() > now);
    }

    #[tokio::test]
    async fn test_success_resets() {
        let store = StatusStore::new();
        store.record_failure(&source(), "boom", Utc::now(), &policy()).await;
        assert_eq!(store.degraded().await.len(), 1);

        let status = store.record_success(&source()).await;
        assert_eq!(status, FeedStatus::new(&source()));
        assert!(store.degraded().await.is_empty());
    }

    #[tokio::test]
    async fn test_json_shape() {
        let store = StatusStore::new();
        let now = "2024-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap();
        store.record_failure(&source(), "HTTP 500", now, &policy()).await;

        let json = store.to_json().await;
        let entry = &json["Example"];
        assert_eq!(entry["attempts"], 1);
        assert_eq!(entry["error"], "HTTP 500");
        assert_eq!(entry["url"], "https://example.com/rss");
        assert_eq!(entry["backoff_until"], "2024-01-01T00:01:00Z");
    }
}
