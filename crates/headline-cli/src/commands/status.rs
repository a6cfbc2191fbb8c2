use anyhow::Result;
use chrono::Utc;

use headline_core::AppConfig;

use super::daemon_client;

pub async fn run(config: &AppConfig) -> Result<()> {
    let Some(client) = daemon_client(config).await else {
        println!("Daemon is not running.");
        return Ok(());
    };

    let status = client.status().await?;
    println!("Daemon is running (uptime {}s)", status.uptime_secs);
    println!("  Feeds: {}", status.feeds);
    match status.rendered_at {
        Some(at) => println!("  Last render: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Last render: never"),
    }

    let degraded: Vec<_> = client
        .feed_status()
        .await?
        .into_iter()
        .filter(|s| s.is_degraded())
        .collect();

    if degraded.is_empty() {
        println!("\nAll feeds healthy.");
        return Ok(());
    }

    println!("\nFailing feeds ({}):\n", degraded.len());
    let now = Utc::now();
    for feed in &degraded {
        println!("  {} - {} attempt(s)", feed.name, feed.attempts);
        if let Some(error) = &feed.last_error {
            println!("    Error: {}", error);
        }
        if let Some(until) = feed.backoff_until {
            let wait = (until - now).num_seconds().max(0);
            println!("    Next retry: {} (in {}s)", until.format("%H:%M:%S"), wait);
        }
    }

    Ok(())
}
