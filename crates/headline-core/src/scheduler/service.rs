use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::aggregate::{Aggregator, FeedSection};
use crate::backoff::BackoffPolicy;
use crate::config::AppConfig;
use crate::enrich::{self, EnrichmentProvider};
use crate::feed::FeedFetch;
use crate::registry::FeedRegistry;
use crate::render::RenderCache;
use crate::status::StatusStore;

/// Events emitted by the scheduler for observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A cycle finished; `published` is false when the previous page was kept
    CycleCompleted {
        fetched: u32,
        failed: u32,
        skipped: u32,
        published: bool,
    },
    /// One feed failed and was pushed into backoff
    FeedFailed {
        name: String,
        attempts: u32,
        message: String,
    },
    /// A background persistence task failed
    Error { task: String, message: String },
}

/// Outcome counts of one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: u32,
    pub failed: u32,
    /// Feeds still inside their backoff window
    pub skipped: u32,
}

/// Periodic fetch, compose and publish loop.
///
/// The scheduler is the only writer of the status store and the render
/// cache. It keeps the last good section of every feed so a failing or
/// backed-off feed still shows its previous content.
pub struct FetchScheduler {
    registry: Arc<FeedRegistry>,
    status: Arc<StatusStore>,
    render: Arc<RenderCache>,
    fetcher: Arc<dyn FeedFetch>,
    providers: Vec<Arc<dyn EnrichmentProvider>>,
    aggregator: Aggregator,
    policy: BackoffPolicy,
    interval: Duration,
    enrich_timeout: Duration,
    sections: HashMap<String, FeedSection>,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl FetchScheduler {
    pub fn new(
        registry: Arc<FeedRegistry>,
        status: Arc<StatusStore>,
        render: Arc<RenderCache>,
        fetcher: Arc<dyn FeedFetch>,
        aggregator: Aggregator,
    ) -> Self {
        Self {
            registry,
            status,
            render,
            fetcher,
            providers: Vec::new(),
            aggregator,
            policy: BackoffPolicy::default(),
            interval: Duration::from_secs(600),
            enrich_timeout: Duration::from_secs(10),
            sections: HashMap::new(),
            event_tx: None,
        }
    }

    /// Take interval, backoff and enrichment timeout from config
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.policy = config.backoff_policy();
        self.interval = config.refresh_interval();
        self.enrich_timeout = Duration::from_secs(config.enrich.timeout_secs);
        self
    }

    pub fn with_providers(mut self, providers: Vec<Arc<dyn EnrichmentProvider>>) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the event sender for observers
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                warn!("Failed to send scheduler event: receiver dropped");
            }
        }
    }

    /// Run one cycle now
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle as of `now`.
    ///
    /// Feeds are visited in name order. A feed's failure only affects its
    /// own status; nothing in here ends the cycle early.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        match self.registry.persist_pending().await {
            Ok(true) => info!("Wrote pending registry changes"),
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Registry still not persisted");
                self.send_event(SchedulerEvent::Error {
                    task: "registry".to_string(),
                    message: e.to_string(),
                });
            }
        }

        let feeds = self.registry.sorted().await;
        let mut sections = Vec::with_capacity(feeds.len());

        for source in &feeds {
            let status = self.status.get_or_insert(source).await;
            if !status.is_due(now) {
                debug!(feed = %source.name, attempts = status.attempts, "Feed in backoff, skipping");
                report.skipped += 1;
            } else {
                match self.fetcher.fetch(source).await {
                    Ok(entries) => {
                        self.status.record_success(source).await;
                        let section = self.aggregator.section(&source.name, entries);
                        debug!(feed = %source.name, entries = section.entry_count, "Fetched feed");
                        self.sections.insert(source.name.clone(), section);
                        report.fetched += 1;
                    }
                    Err(e) => {
                        let status = self
                            .status
                            .record_failure(source, e.to_string(), now, &self.policy)
                            .await;
                        warn!(
                            feed = %source.name,
                            url = %source.url,
                            attempts = status.attempts,
                            error = %e,
                            "Feed fetch failed"
                        );
                        self.send_event(SchedulerEvent::FeedFailed {
                            name: source.name.clone(),
                            attempts: status.attempts,
                            message: e.to_string(),
                        });
                        report.failed += 1;
                    }
                }
            }

            if let Some(section) = self.sections.get(&source.name) {
                sections.push(section.clone());
            }
        }

        let published = if sections.is_empty() {
            warn!(feeds = feeds.len(), "No feed content yet, keeping previous page");
            false
        } else {
            let snippets = enrich::collect(&self.providers, self.enrich_timeout).await;
            let composed = self.aggregator.compose(&sections, &snippets);
            if let Err(e) = self.render.publish(composed).await {
                error!(error = %e, "Failed to persist rendered page");
                self.send_event(SchedulerEvent::Error {
                    task: "render".to_string(),
                    message: e.to_string(),
                });
            }
            true
        };

        info!(
            fetched = report.fetched,
            failed = report.failed,
            skipped = report.skipped,
            sections = sections.len(),
            "Cycle complete"
        );
        self.send_event(SchedulerEvent::CycleCompleted {
            fetched: report.fetched,
            failed: report.failed,
            skipped: report.skipped,
            published,
        });

        report
    }

    /// Run cycles until the shutdown signal flips to `true`.
    ///
    /// On cold start a cached page younger than the interval is served as is
    /// and the first cycle waits out the remainder.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        if *shutdown.borrow() {
            return;
        }

        let mut wait = Duration::ZERO;
        if let Some(age) = self.render.restore().await {
            if age < self.interval {
                wait = self.interval - age;
                info!(wait_secs = wait.as_secs(), "Cached page is fresh, delaying first cycle");
            }
        }

        info!(interval_secs = self.interval.as_secs(), "Scheduler started");

        'run: loop {
            let deadline = tokio::time::Instant::now() + wait;
            loop {
                tokio::select! {
                    result = shutdown.changed() => {
                        if result.is_err() || *shutdown.borrow() {
                            info!("Scheduler received shutdown signal");
                            break 'run;
                        }
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }

            {
                let cycle = self.run_cycle();
                tokio::pin!(cycle);
                loop {
                    tokio::select! {
                        result = shutdown.changed() => {
                            if result.is_err() || *shutdown.borrow() {
                                info!("Scheduler received shutdown signal mid-cycle");
                                break 'run;
                            }
                        }
                        _ = &mut cycle => break,
                    }
                }
            }

            wait = self.interval;
        }

        info!("Scheduler stopped");
    }
}
