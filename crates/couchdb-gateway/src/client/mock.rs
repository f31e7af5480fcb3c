//! Mock CouchDB Client
//!
//! Canned responses keyed by rendered path, with every request recorded.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::DbClient;
use crate::error::{GatewayError, Result};
use crate::refs::{DbPath, FindPath, QueryParams};

#[derive(Clone, Debug, PartialEq)]
pub enum RecordedRequest {
    Get { path: String, query: QueryParams },
    Post { path: String, body: Value },
}

#[derive(Clone, Debug)]
enum Canned {
    Json(Value),
    Status(u16, String),
    Unreachable,
}

#[derive(Default)]
pub struct MockDbClient {
    responses: Mutex<HashMap<String, Canned>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockDbClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `path` with a JSON body
    #[must_use]
    pub fn with_json(self, path: &str, body: Value) -> Self {
        self.insert(path, Canned::Json(body));
        self
    }

    /// Answer requests for `path` with a non-2xx status
    #[must_use]
    pub fn with_status(self, path: &str, status: u16, body: &str) -> Self {
        self.insert(path, Canned::Status(status, body.to_string()));
        self
    }

    /// Fail requests for `path` as if the server could not be reached
    #[must_use]
    pub fn with_unreachable(self, path: &str) -> Self {
        self.insert(path, Canned::Unreachable);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn insert(&self, path: &str, canned: Canned) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(path.to_string(), canned);
        }
    }

    fn record(&self, request: RecordedRequest) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }

    fn respond(&self, path: &str) -> Result<Value> {
        let canned = self
            .responses
            .lock()
            .ok()
            .and_then(|r| r.get(path).cloned());

        match canned {
            Some(Canned::Json(body)) => Ok(body),
            Some(Canned::Status(status, body)) => Err(GatewayError::Upstream {
                status,
                reason: reason_phrase(status).to_string(),
                body,
            }),
            Some(Canned::Unreachable) => Err(GatewayError::Transport {
                cause: "connection refused".into(),
            }),
            None => Err(GatewayError::Upstream {
                status: 404,
                reason: "Not Found".into(),
                body: r#"{"error":"not_found","reason":"missing"}"#.into(),
            }),
        }
    }
}

const fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

#[async_trait]
impl DbClient for MockDbClient {
    async fn get(&self, path: &DbPath, query: &QueryParams) -> Result<Value> {
        let path = path.render();
        self.record(RecordedRequest::Get {
            path: path.clone(),
            query: query.clone(),
        });
        self.respond(&path)
    }

    async fn post_read(&self, path: &FindPath, body: &Value) -> Result<Value> {
        let path = path.render();
        self.record(RecordedRequest::Post {
            path: path.clone(),
            body: body.clone(),
        });
        self.respond(&path)
    }
}
