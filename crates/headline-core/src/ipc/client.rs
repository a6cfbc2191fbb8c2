//! IPC client used by the CLI to reach a running daemon.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use super::protocol::*;
use crate::feed::FeedSource;
use crate::status::FeedStatus;
use crate::{Error, Result};

/// Client for communicating with the daemon
#[derive(Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Check if daemon is running by sending a ping
    pub async fn ping(&self) -> Result<bool> {
        match self.call(methods::PING, serde_json::Value::Null).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    pub async fn status(&self) -> Result<StatusResponse> {
        let result = self.call(methods::STATUS, serde_json::Value::Null).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn list_feeds(&self) -> Result<Vec<FeedSource>> {
        let result = self.call(methods::FEED_LIST, serde_json::Value::Null).await?;
        let response: FeedListResponse = serde_json::from_value(result)?;
        Ok(response.feeds)
    }

    /// Register a feed with the daemon. A taken name comes back as
    /// [`Error::DuplicateName`].
    pub async fn add_feed(&self, name: &str, url: &str) -> Result<FeedSource> {
        let params = serde_json::json!({
            "name": name,
            "url": url
        });
        let response = self.send(methods::FEED_ADD, params).await?;
        match response.error {
            Some(error) if error.code == ERR_DUPLICATE => Err(Error::DuplicateName(error.message)),
            Some(error) => Err(rpc_error(error)),
            None => {
                let added: FeedAddResponse = serde_json::from_value(response.result.unwrap_or_default())?;
                if !added.persisted {
                    tracing::warn!(feed = %added.feed.name, "Daemon could not persist the registry yet");
                }
                Ok(added.feed)
            }
        }
    }

    pub async fn feed_status(&self) -> Result<Vec<FeedStatus>> {
        let result = self.call(methods::FEED_STATUS, serde_json::Value::Null).await?;
        let response: FeedStatusResponse = serde_json::from_value(result)?;
        Ok(response.statuses.into_values().collect())
    }

    /// Current rendered page, `None` before the first publish
    pub async fn page(&self) -> Result<Option<PageResponse>> {
        let response = self.send(methods::PAGE_GET, serde_json::Value::Null).await?;
        match response.error {
            Some(error) if error.code == ERR_NO_PAGE => Ok(None),
            Some(error) => Err(rpc_error(error)),
            None => Ok(Some(serde_json::from_value(response.result.unwrap_or_default())?)),
        }
    }

    /// Send a request and return its result, turning RPC errors into [`Error::Other`]
    pub async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let response = self.send(method, params).await?;
        if let Some(error) = response.error {
            return Err(rpc_error(error));
        }
        response.result.ok_or_else(|| Error::Other("Empty response".to_string()))
    }

    async fn send(&self, method: &str, params: serde_json::Value) -> Result<Response> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Other(format!(
                "Failed to connect to daemon at {}: {}. Is the daemon running?",
                self.socket_path.display(),
                e
            ))
        })?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        let request = Request::new(method).with_params(params);
        let request_json = serde_json::to_string(&request)?;

        writer.write_all(request_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        let mut response_line = String::new();
        reader.read_line(&mut response_line).await?;

        Ok(serde_json::from_str(&response_line)?)
    }
}

fn rpc_error(error: RpcError) -> Error {
    Error::Other(format!("RPC error {}: {}", error.code, error.message))
}

/// Check if daemon is reachable
pub async fn is_daemon_running(socket_path: &Path) -> bool {
    let client = DaemonClient::new(socket_path.to_path_buf());
    client.ping().await.unwrap_or(false)
}
