//! JSON-RPC style request/response format, one JSON object per line.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::feed::FeedSource;
use crate::status::FeedStatus;

/// JSON-RPC style request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// JSON-RPC style response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Uuid, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Serialize `result` into a success response
    pub fn from_result<T: Serialize>(id: Uuid, result: &T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self::success(id, value),
            Err(e) => Self::error(id, ERR_INTERNAL, e.to_string()),
        }
    }

    pub fn error(id: Uuid, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

// Error codes
pub const ERR_PARSE: i32 = -32700;
pub const ERR_METHOD_NOT_FOUND: i32 = -32601;
pub const ERR_INVALID_PARAMS: i32 = -32602;
pub const ERR_INTERNAL: i32 = -32603;
pub const ERR_DUPLICATE: i32 = -32001;
pub const ERR_NO_PAGE: i32 = -32002;

pub mod methods {
    pub const PING: &str = "ping";
    pub const STATUS: &str = "status";

    pub const FEED_LIST: &str = "feed.list";
    pub const FEED_ADD: &str = "feed.add";
    pub const FEED_STATUS: &str = "feed.status";

    pub const PAGE_GET: &str = "page.get";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedAddParams {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub uptime_secs: u64,
    pub feeds: usize,
    pub degraded: usize,
    pub rendered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedListResponse {
    pub feeds: Vec<FeedSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedAddResponse {
    pub feed: FeedSource,
    /// False when the feed is live but the registry file write failed
    pub persisted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedStatusResponse {
    /// Keyed by feed name
    pub statuses: BTreeMap<String, FeedStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse {
    pub html: String,
    pub rendered_at: DateTime<Utc>,
}
