pub mod add;
pub mod daemon;
pub mod import;
pub mod list;
pub mod once;
pub mod page;
pub mod status;

use headline_core::{ipc::is_daemon_running, AppConfig, DaemonClient};

/// Client for the running daemon, if one answers on the configured socket
pub async fn daemon_client(config: &AppConfig) -> Option<DaemonClient> {
    let socket = config.socket_path();
    if is_daemon_running(&socket).await {
        Some(DaemonClient::new(socket))
    } else {
        None
    }
}
