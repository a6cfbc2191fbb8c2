pub mod aggregate;
pub mod backoff;
pub mod config;
pub mod enrich;
pub mod error;
pub mod feed;
pub mod ipc;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod status;
mod fs;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use ipc::{DaemonClient, DaemonServer};
