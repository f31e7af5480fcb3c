//! Gateway configuration, resolved once at startup.

use std::fmt;
use std::time::Duration;

use crate::error::{GatewayError, Result};

pub const DEFAULT_MAX_LIMIT: u64 = 1000;
pub const GET_TIMEOUT: Duration = Duration::from_secs(20);
pub const FIND_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic-auth credentials. Only ever built when both halves are present.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    /// Both parts or nothing; a lone username or password means anonymous access.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(Self { username, password })
            }
            _ => None,
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct CouchConfig {
    /// Server root without trailing slash, e.g. `https://couch.example.com`
    pub base_url: String,
    pub credentials: Option<Credentials>,
    /// Largest `limit` a caller may ask for
    pub max_limit: u64,
    pub get_timeout: Duration,
    pub find_timeout: Duration,
}

impl CouchConfig {
    pub fn new(base_url: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            max_limit: DEFAULT_MAX_LIMIT,
            get_timeout: GET_TIMEOUT,
            find_timeout: FIND_TIMEOUT,
        }
    }

    /// Read `COUCHDB_URL`, `COUCHDB_USER`, `COUCHDB_PASS` and `COUCHDB_MAX_LIMIT`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup("COUCHDB_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GatewayError::Config("COUCHDB_URL is required".into()))?;

        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(GatewayError::Config(format!(
                "COUCHDB_URL must be an http(s) URL, got '{base_url}'"
            )));
        }
        if base_url.starts_with("http://") {
            tracing::warn!(url = %base_url, "COUCHDB_URL is not using TLS");
        }

        let credentials = Credentials::from_parts(lookup("COUCHDB_USER"), lookup("COUCHDB_PASS"));

        let max_limit = match lookup("COUCHDB_MAX_LIMIT") {
            None => DEFAULT_MAX_LIMIT,
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    GatewayError::Config(format!(
                        "COUCHDB_MAX_LIMIT must be a positive integer, got '{raw}'"
                    ))
                })?,
        };

        Ok(Self {
            max_limit,
            ..Self::new(base_url, credentials)
        })
    }
}
