//! Command-line arguments

use clap::Parser;
use clap::builder::TypedValueParser as _;

use session_orchestrator::orchestrator::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_TURNS};

#[derive(Parser, Debug)]
#[command(name = "supportops")]
#[command(version, about = "Investigate customer account issues using CouchDB, Stripe and Zendesk")]
#[command(long_about = r#"
SupportOps opens read-only connections to CouchDB, Stripe and Zendesk, lets an
agent investigate the described problem, and prints a structured report.

Providers are launched as MCP servers over stdio:
  couchdb   COUCHDB_MCP_COMMAND (default: couchdb-mcp next to this binary)
  stripe    STRIPE_MCP_COMMAND  (default: stripe-mcp), needs STRIPE_API_KEY
  zendesk   ZENDESK_MCP_COMMAND (default: zendesk-mcp), needs ZENDESK_SUBDOMAIN,
            ZENDESK_EMAIL and ZENDESK_API_TOKEN

Example:
  supportops "Check why customer 1234 cannot access premium features"
  supportops --json --only couchdb --couchdb-in-process "user alice@example.com cannot log in"
"#)]
pub struct Cli {
    /// Describe the customer and the problem to investigate
    #[arg(required = true, value_name = "GOAL")]
    pub goal: Vec<String>,

    /// Print the verdict, unavailable sources and report as one JSON object
    #[arg(long)]
    pub json: bool,

    /// Maximum agent turns before the investigation is cut off
    #[arg(long, default_value_t = DEFAULT_MAX_TURNS, value_parser = clap::value_parser!(u16).range(1..).map(usize::from))]
    pub max_turns: usize,

    /// Seconds allowed for each provider to connect
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs(), value_name = "SECS")]
    pub connect_timeout_secs: u64,

    /// Only use the named providers (can be specified multiple times)
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Serve CouchDB tools from this process instead of a couchdb-mcp child
    #[arg(long)]
    pub couchdb_in_process: bool,
}

impl Cli {
    /// Goal words joined with spaces
    pub fn goal_text(&self) -> String {
        self.goal.join(" ")
    }
}
