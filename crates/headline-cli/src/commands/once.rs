use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use headline_core::{
    aggregate::Aggregator, enrich::providers_from_env, feed::FeedFetcher,
    registry::FeedRegistry, render::RenderCache, scheduler::FetchScheduler,
    status::StatusStore, AppConfig,
};

/// Fetch every feed once and write the resulting page
pub async fn run(config: &AppConfig, output: Option<&Path>) -> Result<()> {
    let cache_dir = config.cache_dir();
    let registry = Arc::new(FeedRegistry::load(&cache_dir)?);
    let render = Arc::new(RenderCache::new(&cache_dir, &config.render));

    let mut scheduler = FetchScheduler::new(
        registry,
        Arc::new(StatusStore::new()),
        render.clone(),
        Arc::new(FeedFetcher::new(config)?),
        Aggregator::from_config(&config.render),
    )
    .with_config(config)
    .with_providers(providers_from_env(config));

    let report = scheduler.run_cycle().await;
    eprintln!(
        "Fetched {} feeds, {} failed",
        report.fetched, report.failed
    );

    let Some(html) = render.html().await else {
        bail!("No feed could be fetched; nothing to render");
    };

    match output {
        Some(path) => {
            std::fs::write(path, &html)?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&html)?;
            stdout.flush()?;
        }
    }

    Ok(())
}
