use std::path::Path;

use anyhow::{bail, Result};

use headline_core::{
    feed::{parse_opml_file, FeedSource},
    registry::FeedRegistry,
    AppConfig, Error,
};

use super::daemon_client;

pub async fn run(config: &AppConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }

    let outcomes: Vec<(FeedSource, headline_core::Result<()>)> = match daemon_client(config).await {
        Some(client) => {
            let mut outcomes = Vec::new();
            for feed in parse_opml_file(path)?.into_iter().map(FeedSource::from) {
                let result = client.add_feed(&feed.name, &feed.url).await.map(|_| ());
                outcomes.push((feed, result));
            }
            outcomes
        }
        None => FeedRegistry::load(&config.cache_dir())?
            .import_opml(path)
            .await?
            .into_iter()
            .map(|o| (o.source, o.result))
            .collect(),
    };

    println!("Found {} feeds in OPML file\n", outcomes.len());

    let mut imported = 0u32;
    let mut skipped = 0u32;
    let mut failed = 0u32;

    for (feed, result) in &outcomes {
        match result {
            Ok(()) => {
                println!("  + {}", feed.name);
                imported += 1;
            }
            Err(Error::DuplicateName(_)) => {
                println!("  = {} (already registered)", feed.name);
                skipped += 1;
            }
            Err(e) => {
                println!("  ! {}: {}", feed.name, e);
                failed += 1;
            }
        }
    }

    println!(
        "\nImported {}, skipped {}, failed {}",
        imported, skipped, failed
    );

    Ok(())
}
