//! Validated, percent-escaped path segments and the only paths the client can reach.

use std::fmt;

use crate::error::{GatewayError, Result};

fn escape_segment(what: &str, raw: &str) -> Result<String> {
    if raw.is_empty() {
        return Err(GatewayError::invalid(format!("{what} must be a non-empty string")));
    }
    Ok(urlencoding::encode(raw).into_owned())
}

/// Database name, escaped so it is always exactly one path segment
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseRef {
    raw: String,
    escaped: String,
}

impl DatabaseRef {
    pub fn new(raw: &str) -> Result<Self> {
        Ok(Self {
            escaped: escape_segment("db", raw)?,
            raw: raw.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.raw
    }

    pub fn escaped(&self) -> &str {
        &self.escaped
    }
}

impl fmt::Debug for DatabaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatabaseRef({:?})", self.raw)
    }
}

/// Document id inside a database, escaped the same way
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentRef {
    raw: String,
    escaped: String,
}

impl DocumentRef {
    pub fn new(raw: &str) -> Result<Self> {
        Ok(Self {
            escaped: escape_segment("doc_id", raw)?,
            raw: raw.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.raw
    }

    pub fn escaped(&self) -> &str {
        &self.escaped
    }
}

impl fmt::Debug for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentRef({:?})", self.raw)
    }
}

/// Every path a GET may target
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DbPath {
    AllDbs,
    Database(DatabaseRef),
    Document(DatabaseRef, DocumentRef),
    AllDocs(DatabaseRef),
}

impl DbPath {
    pub fn render(&self) -> String {
        match self {
            Self::AllDbs => "/_all_dbs".to_string(),
            Self::Database(db) => format!("/{}", db.escaped()),
            Self::Document(db, doc) => format!("/{}/{}", db.escaped(), doc.escaped()),
            Self::AllDocs(db) => format!("/{}/_all_docs", db.escaped()),
        }
    }
}

/// The single path a POST may target: the read-only Mango `_find` endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FindPath(pub DatabaseRef);

impl FindPath {
    pub fn render(&self) -> String {
        format!("/{}/_find", self.0.escaped())
    }
}

/// Ordered query string parameters; values are sent as given
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
