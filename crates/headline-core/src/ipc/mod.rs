//! Unix socket IPC between the `headline` CLI and a running daemon.

mod client;
mod protocol;
mod server;

pub use client::{is_daemon_running, DaemonClient};
pub use protocol::*;
pub use server::{DaemonServer, DaemonState};
