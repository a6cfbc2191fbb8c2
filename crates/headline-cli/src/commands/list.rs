use anyhow::Result;

use headline_core::{registry::FeedRegistry, AppConfig};

use super::daemon_client;

pub async fn run(config: &AppConfig) -> Result<()> {
    let feeds = match daemon_client(config).await {
        Some(client) => client.list_feeds().await?,
        None => FeedRegistry::load(&config.cache_dir())?.sorted().await,
    };

    if feeds.is_empty() {
        println!("No feeds registered.");
        println!("\nTo add a feed, run:");
        println!("  headline add -n <name> -u <url>");
        return Ok(());
    }

    println!("Feeds ({}):\n", feeds.len());
    let width = feeds.iter().map(|f| f.name.chars().count()).max().unwrap_or(0);
    for feed in &feeds {
        println!("  {:width$}  {}", feed.name, feed.url, width = width);
    }

    Ok(())
}
