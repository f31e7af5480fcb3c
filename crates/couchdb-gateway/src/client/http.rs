//! reqwest-backed CouchDB client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;

use super::DbClient;
use crate::config::{CouchConfig, Credentials};
use crate::error::{GatewayError, Result};
use crate::refs::{DbPath, FindPath, QueryParams};

/// Upstream error bodies are cut to this many characters
const MAX_ERROR_BODY: usize = 2_000;

pub struct HttpDbClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    get_timeout: Duration,
    find_timeout: Duration,
}

impl HttpDbClient {
    pub fn new(config: &CouchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("couchdb-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            credentials: config.credentials.clone(),
            get_timeout: config.get_timeout,
            find_timeout: config.find_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let request = match &self.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(creds.password())),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Error").to_string(),
                body: truncate(body.trim(), MAX_ERROR_BODY).to_string(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl DbClient for HttpDbClient {
    async fn get(&self, path: &DbPath, query: &QueryParams) -> Result<Value> {
        let path = path.render();
        tracing::debug!(path = %path, params = query.len(), "GET");

        let mut request = self.http.get(self.url(&path)).timeout(self.get_timeout);
        if !query.is_empty() {
            request = request.query(query.as_slice());
        }
        self.send(request).await
    }

    async fn post_read(&self, path: &FindPath, body: &Value) -> Result<Value> {
        let path = path.render();
        tracing::debug!(path = %path, "POST _find");

        let request = self
            .http
            .post(self.url(&path))
            .timeout(self.find_timeout)
            .json(body);
        self.send(request).await
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
