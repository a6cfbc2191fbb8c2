//! IPC server: answers CLI requests from in-memory state.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::*;
use crate::feed::FeedSource;
use crate::registry::FeedRegistry;
use crate::render::RenderCache;
use crate::status::StatusStore;
use crate::{Error, Result};

/// Maximum number of requests handled at once across all connections
const MAX_CONCURRENT_REQUESTS: usize = 10;

/// Shared stores the handlers read from
pub struct DaemonState {
    pub registry: Arc<FeedRegistry>,
    pub status: Arc<StatusStore>,
    pub render: Arc<RenderCache>,
    pub start_time: Instant,
}

impl DaemonState {
    pub fn new(registry: Arc<FeedRegistry>, status: Arc<StatusStore>, render: Arc<RenderCache>) -> Self {
        Self {
            registry,
            status,
            render,
            start_time: Instant::now(),
        }
    }
}

/// IPC server that handles client connections
pub struct DaemonServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
    request_semaphore: Arc<Semaphore>,
}

impl DaemonServer {
    pub fn new(state: DaemonState, socket_path: PathBuf) -> Self {
        Self {
            state: Arc::new(state),
            socket_path,
            request_semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        }
    }

    /// Listen until the shutdown signal flips, then remove the socket file
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(socket = %self.socket_path.display(), "IPC server listening");

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let state = self.state.clone();
                            let semaphore = self.request_semaphore.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, state, semaphore).await {
                                    warn!(error = %e, "Error handling connection");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("IPC server shutting down");
                        break;
                    }
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn handle_connection(
    stream: UnixStream,
    state: Arc<DaemonState>,
    semaphore: Arc<Semaphore>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }

        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| Error::Other(format!("Failed to acquire semaphore: {}", e)))?;

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                debug!(method = %request.method, id = %request.id, "Received request");
                handle_request(request, &state).await
            }
            Err(e) => {
                warn!(error = %e, "Failed to parse request");
                Response::error(Uuid::nil(), ERR_PARSE, format!("Parse error: {}", e))
            }
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

async fn handle_request(request: Request, state: &DaemonState) -> Response {
    let id = request.id;

    match request.method.as_str() {
        methods::PING => Response::success(id, serde_json::json!({"ok": true})),

        methods::STATUS => {
            let rendered_at = state.render.current().await.map(|p| p.rendered_at);
            Response::from_result(
                id,
                &StatusResponse {
                    running: true,
                    uptime_secs: state.start_time.elapsed().as_secs(),
                    feeds: state.registry.len().await,
                    degraded: state.status.degraded().await.len(),
                    rendered_at,
                },
            )
        }

        methods::FEED_LIST => Response::from_result(
            id,
            &FeedListResponse {
                feeds: state.registry.sorted().await,
            },
        ),

        methods::FEED_ADD => match serde_json::from_value::<FeedAddParams>(request.params) {
            Ok(params) => match state.registry.register(&params.name, &params.url).await {
                Ok(feed) => Response::from_result(id, &FeedAddResponse { feed, persisted: true }),
                Err(Error::DuplicateName(name)) => Response::error(id, ERR_DUPLICATE, name),
                Err(e @ Error::Persistence { .. }) => {
                    warn!(error = %e, "Feed registered but not yet persisted");
                    let feed = FeedSource::new(params.name.trim(), params.url.trim());
                    Response::from_result(id, &FeedAddResponse { feed, persisted: false })
                }
                Err(e @ (Error::InvalidFeed(_) | Error::UrlParse(_))) => {
                    Response::error(id, ERR_INVALID_PARAMS, e.to_string())
                }
                Err(e) => Response::error(id, ERR_INTERNAL, e.to_string()),
            },
            Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
        },

        methods::FEED_STATUS => {
            Response::success(id, serde_json::json!({ "statuses": state.status.to_json().await }))
        }

        methods::PAGE_GET => match state.render.current().await {
            Some(page) => Response::from_result(
                id,
                &PageResponse {
                    html: String::from_utf8_lossy(&page.html).into_owned(),
                    rendered_at: page.rendered_at,
                },
            ),
            None => Response::error(id, ERR_NO_PAGE, "No page rendered yet"),
        },

        _ => Response::error(id, ERR_METHOD_NOT_FOUND, "Method not found"),
    }
}
