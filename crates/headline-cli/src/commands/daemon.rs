use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info};

use headline_core::{
    aggregate::Aggregator,
    enrich::providers_from_env,
    feed::FeedFetcher,
    ipc::DaemonState,
    registry::FeedRegistry,
    render::RenderCache,
    scheduler::FetchScheduler,
    status::StatusStore,
    AppConfig, DaemonServer,
};

fn pid_file_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("headline")
        .join("daemon.pid")
}

/// PID of a live daemon; a stale PID file is removed
fn running_pid() -> Option<u32> {
    let pid_path = pid_file_path();
    let mut contents = String::new();
    fs::File::open(&pid_path).ok()?.read_to_string(&mut contents).ok()?;
    let pid: u32 = contents.trim().parse().ok()?;

    let alive = std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    if alive {
        return Some(pid);
    }

    let _ = fs::remove_file(&pid_path);
    None
}

fn write_pid_file() -> Result<()> {
    let pid_path = pid_file_path();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(&pid_path)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(signal) => signal,
        Err(e) => {
            error!(error = %e, "Failed to install SIGTERM handler");
            tokio::signal::ctrl_c().await.ok();
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

/// Run scheduler and IPC server in the foreground
pub async fn start(config: AppConfig) -> Result<()> {
    if let Some(pid) = running_pid() {
        println!("Daemon is already running (PID: {})", pid);
        return Ok(());
    }

    let cache_dir = config.cache_dir();
    let registry = Arc::new(FeedRegistry::load(&cache_dir)?);
    let status = Arc::new(StatusStore::new());
    let render = Arc::new(RenderCache::new(&cache_dir, &config.render));
    let fetcher = Arc::new(FeedFetcher::new(&config)?);
    let providers = providers_from_env(&config);

    let scheduler = FetchScheduler::new(
        registry.clone(),
        status.clone(),
        render.clone(),
        fetcher,
        Aggregator::from_config(&config.render),
    )
    .with_config(&config)
    .with_providers(providers);

    let server = DaemonServer::new(
        DaemonState::new(registry.clone(), status, render.clone()),
        config.socket_path(),
    );

    write_pid_file()?;

    let (shutdown_tx, _) = watch::channel(false);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal");
        let _ = signal_tx.send(true);
    });

    println!(
        "Daemon started (PID: {}). Press Ctrl+C or run 'headline stop' to stop.",
        std::process::id()
    );
    println!("  Feeds: {}", registry.len().await);
    println!("  Refresh interval: {} seconds", config.sync.refresh_interval_secs);
    println!("  Page: {}", render.path().display());

    let result = run_services(scheduler, server, shutdown_tx).await;

    remove_pid_file();
    result?;
    println!("Daemon stopped.");

    Ok(())
}

/// Run the scheduler beside the IPC server. Either the shutdown signal or a
/// server failure stops both.
async fn run_services(
    scheduler: FetchScheduler,
    server: DaemonServer,
    shutdown_tx: watch::Sender<bool>,
) -> headline_core::Result<()> {
    let scheduler_task = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    let server_result = server.run(shutdown_tx.subscribe()).await;
    if let Err(ref e) = server_result {
        error!(error = %e, "IPC server failed, stopping scheduler");
        let _ = shutdown_tx.send(true);
    }

    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Scheduler task panicked");
    }

    server_result
}

pub async fn stop() -> Result<()> {
    let Some(pid) = running_pid() else {
        println!("Daemon is not running.");
        return Ok(());
    };

    println!("Stopping daemon (PID: {})...", pid);
    let output = std::process::Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .output()?;

    if !output.status.success() {
        println!("Failed to stop daemon. You may need to kill it manually: kill {}", pid);
        return Ok(());
    }

    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    if running_pid().is_none() {
        println!("Daemon stopped successfully.");
    } else {
        let _ = std::process::Command::new("kill")
            .arg("-9")
            .arg(pid.to_string())
            .output();
        remove_pid_file();
        println!("Daemon forcefully terminated.");
    }

    Ok(())
}
