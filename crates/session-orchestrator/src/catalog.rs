//! The standard SupportOps providers: couchdb, stripe, zendesk

use std::path::PathBuf;
use std::sync::Arc;

use crate::credentials::CredentialRequirement;
use crate::error::ConfigError;
use crate::local::GatewayConnector;
use crate::provider::{ProviderConnector, ProviderSpec};
use crate::stdio::StdioConnector;

pub const COUCHDB: &str = "couchdb";
pub const STRIPE: &str = "stripe";
pub const ZENDESK: &str = "zendesk";

pub const COUCHDB_REQUIREMENTS: &[CredentialRequirement] = &[
    CredentialRequirement::required("COUCHDB_URL", "reaching the CouchDB server"),
    CredentialRequirement::optional("COUCHDB_USER", "CouchDB basic auth"),
    CredentialRequirement::optional("COUCHDB_PASS", "CouchDB basic auth"),
    CredentialRequirement::optional("COUCHDB_MAX_LIMIT", "the CouchDB page size cap"),
];

pub const STRIPE_REQUIREMENTS: &[CredentialRequirement] = &[CredentialRequirement::required(
    "STRIPE_API_KEY",
    "authenticating with Stripe",
)];

pub const ZENDESK_REQUIREMENTS: &[CredentialRequirement] = &[
    CredentialRequirement::required("ZENDESK_SUBDOMAIN", "locating the Zendesk account"),
    CredentialRequirement::required("ZENDESK_EMAIL", "authenticating with Zendesk"),
    CredentialRequirement::required("ZENDESK_API_TOKEN", "authenticating with Zendesk"),
];

/// How to launch each standard provider
#[derive(Clone, Debug)]
pub struct CatalogOptions {
    pub couchdb_in_process: bool,
    pub couchdb_command: String,
    pub stripe_command: String,
    pub zendesk_command: String,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            couchdb_in_process: false,
            couchdb_command: default_couchdb_command(),
            stripe_command: "stripe-mcp".into(),
            zendesk_command: "zendesk-mcp".into(),
        }
    }
}

impl CatalogOptions {
    /// Read `COUCHDB_MCP_COMMAND`, `STRIPE_MCP_COMMAND` and `ZENDESK_MCP_COMMAND`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let pick = |key: &str, fallback: String| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(fallback)
        };
        Self {
            couchdb_in_process: false,
            couchdb_command: pick("COUCHDB_MCP_COMMAND", defaults.couchdb_command),
            stripe_command: pick("STRIPE_MCP_COMMAND", defaults.stripe_command),
            zendesk_command: pick("ZENDESK_MCP_COMMAND", defaults.zendesk_command),
        }
    }

    #[must_use]
    pub const fn in_process_couchdb(mut self, enabled: bool) -> Self {
        self.couchdb_in_process = enabled;
        self
    }
}

/// `couchdb-mcp` next to the running executable, else whatever is on `PATH`
fn default_couchdb_command() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("couchdb-mcp")))
        .filter(|candidate: &PathBuf| candidate.is_file())
        .map_or_else(|| "couchdb-mcp".into(), |p| p.display().to_string())
}

/// The three standard providers in acquisition order
pub fn standard_specs(options: &CatalogOptions) -> Result<Vec<ProviderSpec>, ConfigError> {
    let couchdb: Arc<dyn ProviderConnector> = if options.couchdb_in_process {
        Arc::new(GatewayConnector::new())
    } else {
        Arc::new(StdioConnector::from_command_line(&options.couchdb_command)?)
    };

    Ok(vec![
        spec(COUCHDB, couchdb, COUCHDB_REQUIREMENTS),
        spec(
            STRIPE,
            Arc::new(StdioConnector::from_command_line(&options.stripe_command)?),
            STRIPE_REQUIREMENTS,
        ),
        spec(
            ZENDESK,
            Arc::new(StdioConnector::from_command_line(&options.zendesk_command)?),
            ZENDESK_REQUIREMENTS,
        ),
    ])
}

fn spec(
    name: &str,
    connector: Arc<dyn ProviderConnector>,
    requirements: &[CredentialRequirement],
) -> ProviderSpec {
    requirements
        .iter()
        .fold(ProviderSpec::new(name, connector), |spec, req| spec.requires(*req))
}

/// Keep only the named providers, preserving catalog order
pub fn select(specs: Vec<ProviderSpec>, only: &[String]) -> Result<Vec<ProviderSpec>, ConfigError> {
    if only.is_empty() {
        return Ok(specs);
    }
    if let Some(unknown) = only.iter().find(|name| !specs.iter().any(|s| &s.name == *name)) {
        let known: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        return Err(ConfigError::Invalid(format!(
            "unknown provider '{unknown}' (known: {})",
            known.join(", ")
        )));
    }
    Ok(specs
        .into_iter()
        .filter(|s| only.contains(&s.name))
        .collect())
}
