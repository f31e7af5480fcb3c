//! # couchdb-gateway
//!
//! Read-only CouchDB access for agents.
//!
//! ```text
//!   ToolCall ──▶ GatewayOp::parse ──▶ ToolGateway::execute ──▶ DbClient
//!                (closed tool set,      (GET paths + the one    (reqwest,
//!                 strict arguments)      _find POST)             basic auth)
//! ```
//!
//! The client trait can only GET a [`DbPath`] or POST a Mango query to a
//! [`FindPath`]; there is no verb or path a caller could smuggle a write
//! through. Every database name and document id is percent-escaped into a
//! single path segment before it reaches a URL.

pub mod client;
pub mod config;
pub mod error;
pub mod mcp_server;
pub mod refs;
pub mod svckit;

pub use client::{DbClient, HttpDbClient, MockDbClient};
pub use config::{CouchConfig, Credentials};
pub use error::{GatewayError, Result};
pub use mcp_server::{CouchDbMcpServer, WireToolError};
pub use refs::{DatabaseRef, DbPath, DocumentRef, FindPath, QueryParams};
pub use svckit::{GatewayLimits, GatewayOp, GatewayTool, ToolGateway, couch_tools};
