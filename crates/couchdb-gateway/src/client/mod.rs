//! CouchDB client abstraction
//!
//! The trait only offers GET on a [`DbPath`] and POST on a [`FindPath`], so
//! nothing above it can express a write.

mod http;
mod mock;

pub use http::HttpDbClient;
pub use mock::{MockDbClient, RecordedRequest};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::refs::{DbPath, FindPath, QueryParams};

#[async_trait]
pub trait DbClient: Send + Sync {
    /// GET a read path, returning the decoded JSON body
    async fn get(&self, path: &DbPath, query: &QueryParams) -> Result<Value>;

    /// POST a Mango query to `_find`
    async fn post_read(&self, path: &FindPath, body: &Value) -> Result<Value>;
}
