//! Service Kit - the read-only CouchDB tool set

mod gateway;
mod ops;
mod tool;

pub use gateway::ToolGateway;
pub use ops::{DEFAULT_PAGE_LIMIT, FindQuery, GatewayLimits, GatewayOp, GatewayTool};
pub use tool::{CouchTool, couch_tools};
