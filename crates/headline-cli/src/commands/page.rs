use std::io::Write;

use anyhow::{bail, Result};

use headline_core::{render::RenderCache, AppConfig};

use super::daemon_client;

/// Print the live page from the daemon, or the last page written to disk
pub async fn run(config: &AppConfig) -> Result<()> {
    let html = match daemon_client(config).await {
        Some(client) => match client.page().await? {
            Some(page) => page.html.into_bytes(),
            None => bail!("The daemon has not rendered a page yet"),
        },
        None => {
            let cache = RenderCache::new(&config.cache_dir(), &config.render);
            let path = cache.path();
            match std::fs::read(path) {
                Ok(html) => html,
                Err(e) => bail!("No page at {}: {}", path.display(), e),
            }
        }
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&html)?;
    stdout.flush()?;
    Ok(())
}
