//! Credential resolution
//!
//! The environment is read once into a [`CredentialStore`]; providers only
//! ever see the values they declared a [`CredentialRequirement`] for.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::ConfigError;
use crate::provider::ProviderSpec;

/// One environment variable a provider needs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CredentialRequirement {
    pub variable: &'static str,
    pub purpose: &'static str,
    pub optional: bool,
}

impl CredentialRequirement {
    pub const fn required(variable: &'static str, purpose: &'static str) -> Self {
        Self {
            variable,
            purpose,
            optional: false,
        }
    }

    pub const fn optional(variable: &'static str, purpose: &'static str) -> Self {
        Self {
            variable,
            purpose,
            optional: true,
        }
    }
}

/// Read-only snapshot of credential variables
#[derive(Clone, Default)]
pub struct CredentialStore {
    values: BTreeMap<String, String>,
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore")
            .field("present", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CredentialStore {
    /// Snapshot the given variables from the process environment
    pub fn from_env<'a>(variables: impl IntoIterator<Item = &'a str>) -> Self {
        Self::from_pairs(
            variables
                .into_iter()
                .filter_map(|var| std::env::var(var).ok().map(|value| (var.to_string(), value))),
        )
    }

    /// Snapshot every variable the given specs declare
    pub fn from_env_for(specs: &[ProviderSpec]) -> Self {
        Self::from_env(
            specs
                .iter()
                .flat_map(|s| s.requirements.iter().map(|r| r.variable)),
        )
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .filter(|(_, v)| !v.trim().is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.values.contains_key(variable)
    }

    /// Collect the values `provider` needs, failing on the first missing one
    pub fn resolve(
        &self,
        provider: &str,
        requirements: &[CredentialRequirement],
    ) -> Result<ResolvedCredentials, ConfigError> {
        let mut resolved = BTreeMap::new();

        for req in requirements {
            match self.values.get(req.variable) {
                Some(value) => {
                    resolved.insert(req.variable.to_string(), value.clone());
                }
                None if req.optional => {}
                None => {
                    return Err(ConfigError::MissingCredential {
                        provider: provider.to_string(),
                        variable: req.variable.to_string(),
                        purpose: req.purpose.to_string(),
                    });
                }
            }
        }

        Ok(ResolvedCredentials { values: resolved })
    }
}

/// The credential values handed to one provider
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedCredentials {
    values: BTreeMap<String, String>,
}

impl ResolvedCredentials {
    pub fn get(&self, variable: &str) -> Option<&str> {
        self.values.get(variable).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.values.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

/// Fail fast before acquisition: unique names and every required credential present
pub fn preflight(store: &CredentialStore, specs: &[ProviderSpec]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::DuplicateProvider(spec.name.clone()));
        }
        store.resolve(&spec.name, &spec.requirements)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRIPE: &[CredentialRequirement] = &[CredentialRequirement::required(
        "STRIPE_API_KEY",
        "connecting to the Stripe MCP server",
    )];

    #[test]
    fn test_missing_required_names_variable_and_provider() {
        let store = CredentialStore::from_pairs([("ZENDESK_EMAIL", "ops@example.com")]);
        let err = store.resolve("stripe", STRIPE).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCredential {
                provider: "stripe".into(),
                variable: "STRIPE_API_KEY".into(),
                purpose: "connecting to the Stripe MCP server".into(),
            }
        );
        assert!(err.to_string().contains("STRIPE_API_KEY"));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let store = CredentialStore::from_pairs([("STRIPE_API_KEY", "   ")]);
        assert!(store.resolve("stripe", STRIPE).is_err());
    }

    #[test]
    fn test_optional_values_skipped_and_resolved_only_declared() {
        let store = CredentialStore::from_pairs([
            ("COUCHDB_URL", "https://couch.local"),
            ("STRIPE_API_KEY", "sk_live_x"),
        ]);
        let resolved = store
            .resolve(
                "couchdb",
                &[
                    CredentialRequirement::required("COUCHDB_URL", "reaching CouchDB"),
                    CredentialRequirement::optional("COUCHDB_USER", "CouchDB basic auth"),
                ],
            )
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved.get("COUCHDB_URL"), Some("https://couch.local"));
        assert!(resolved.get("STRIPE_API_KEY").is_none());
    }

    #[test]
    fn test_debug_never_prints_values() {
        let store = CredentialStore::from_pairs([("STRIPE_API_KEY", "sk_live_secret")]);
        let resolved = store.resolve("stripe", STRIPE).unwrap();
        assert!(!format!("{store:?}").contains("sk_live_secret"));
        assert!(!format!("{resolved:?}").contains("sk_live_secret"));
    }
}
