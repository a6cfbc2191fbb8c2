use anyhow::{bail, Result};

use headline_core::{registry::FeedRegistry, AppConfig, Error};

use super::daemon_client;

pub async fn run(config: &AppConfig, name: &str, url: &str) -> Result<()> {
    let result = match daemon_client(config).await {
        Some(client) => client.add_feed(name, url).await,
        None => {
            let registry = FeedRegistry::load(&config.cache_dir())?;
            registry.register(name, url).await
        }
    };

    match result {
        Ok(feed) => {
            println!("Added feed: {} ({})", feed.name, feed.url);
            Ok(())
        }
        Err(Error::DuplicateName(name)) => bail!("A feed named '{}' already exists", name),
        Err(e) => Err(e.into()),
    }
}
