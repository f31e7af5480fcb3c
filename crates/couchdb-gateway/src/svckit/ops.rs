//! The closed tool set and strict argument parsing into operations.

use std::collections::BTreeSet;

use agent_core::tool::{ParameterSchema, ToolSchema};
use serde_json::{Map, Value, json};

use crate::error::{GatewayError, Result};
use crate::refs::{DatabaseRef, DocumentRef};

pub const DEFAULT_PAGE_LIMIT: u64 = 100;

/// Every tool the gateway exposes. There is no other way in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayTool {
    ListDatabases,
    DbInfo,
    GetDocument,
    ListDocuments,
    MangoFind,
}

impl GatewayTool {
    pub const ALL: [Self; 5] = [
        Self::ListDatabases,
        Self::DbInfo,
        Self::GetDocument,
        Self::ListDocuments,
        Self::MangoFind,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::ListDatabases => "list_databases",
            Self::DbInfo => "db_info",
            Self::GetDocument => "get_document",
            Self::ListDocuments => "list_documents",
            Self::MangoFind => "mango_find",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::ListDatabases => "List all databases (GET /_all_dbs).",
            Self::DbInfo => "Database info (GET /{db}): document count, size, update sequence.",
            Self::GetDocument => {
                "Get a document by id (GET /{db}/{doc_id}). Set include_attachments/include_revs if needed."
            }
            Self::ListDocuments => {
                "List documents (GET /{db}/_all_docs). Optionally include_docs, limit/skip pagination and a startkey/endkey range."
            }
            Self::MangoFind => {
                "Run a Mango query (POST /{db}/_find). Provide a JSON selector; optional fields/limit/sort/skip/use_index."
            }
        }
    }

    pub fn schema(self) -> ToolSchema {
        let db = || ParameterSchema::required("db", "string", "Database name");
        let limit = || {
            ParameterSchema::optional("limit", "integer", "Maximum number of rows to return")
                .with_default(json!(DEFAULT_PAGE_LIMIT))
        };
        let skip = || {
            ParameterSchema::optional("skip", "integer", "Number of rows to skip").with_default(json!(0))
        };

        let parameters = match self {
            Self::ListDatabases => vec![],
            Self::DbInfo => vec![db()],
            Self::GetDocument => vec![
                db(),
                ParameterSchema::required("doc_id", "string", "Document id"),
                ParameterSchema::optional(
                    "include_attachments",
                    "boolean",
                    "Inline attachment bodies",
                )
                .with_default(json!(false)),
                ParameterSchema::optional("include_revs", "boolean", "Include revision history")
                    .with_default(json!(false)),
            ],
            Self::ListDocuments => vec![
                db(),
                ParameterSchema::optional("include_docs", "boolean", "Include full document bodies")
                    .with_default(json!(true)),
                limit(),
                skip(),
                ParameterSchema::optional("startkey", "any", "First key of the range (JSON value)"),
                ParameterSchema::optional("endkey", "any", "Last key of the range (JSON value)"),
            ],
            Self::MangoFind => vec![
                db(),
                ParameterSchema::required("selector", "object", "Mango selector"),
                ParameterSchema::optional("fields", "array", "Field names to return"),
                limit(),
                ParameterSchema::optional(
                    "sort",
                    "array",
                    "Sort specification, e.g. [{\"created_at\": \"desc\"}]",
                ),
                skip(),
                ParameterSchema::optional("use_index", "any", "Design document (and index) to use"),
            ],
        };

        ToolSchema {
            name: self.name().into(),
            description: self.description().into(),
            parameters,
            category: Some("couchdb".into()),
            has_side_effects: false,
        }
    }
}

/// Bounds applied while parsing arguments
#[derive(Clone, Copy, Debug)]
pub struct GatewayLimits {
    pub max_limit: u64,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self {
            max_limit: crate::config::DEFAULT_MAX_LIMIT,
        }
    }
}

/// A Mango query, already validated
#[derive(Clone, Debug, PartialEq)]
pub struct FindQuery {
    pub selector: Map<String, Value>,
    pub fields: Option<Vec<String>>,
    pub limit: u64,
    pub sort: Option<Vec<Value>>,
    pub skip: u64,
    pub use_index: Option<Value>,
}

impl FindQuery {
    /// `{selector, limit, skip}` plus the optional keys that were given
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("selector".into(), Value::Object(self.selector.clone()));
        body.insert("limit".into(), json!(self.limit));
        body.insert("skip".into(), json!(self.skip));
        if let Some(fields) = &self.fields {
            body.insert("fields".into(), json!(fields));
        }
        if let Some(sort) = &self.sort {
            body.insert("sort".into(), Value::Array(sort.clone()));
        }
        if let Some(use_index) = &self.use_index {
            body.insert("use_index".into(), use_index.clone());
        }
        Value::Object(body)
    }
}

/// One fully validated read operation
#[derive(Clone, Debug, PartialEq)]
pub enum GatewayOp {
    ListDatabases,
    DbInfo {
        db: DatabaseRef,
    },
    GetDocument {
        db: DatabaseRef,
        doc_id: DocumentRef,
        include_attachments: bool,
        include_revs: bool,
    },
    ListDocuments {
        db: DatabaseRef,
        include_docs: bool,
        limit: u64,
        skip: u64,
        startkey: Option<Value>,
        endkey: Option<Value>,
    },
    MangoFind {
        db: DatabaseRef,
        query: FindQuery,
    },
}

impl GatewayOp {
    pub const fn tool(&self) -> GatewayTool {
        match self {
            Self::ListDatabases => GatewayTool::ListDatabases,
            Self::DbInfo { .. } => GatewayTool::DbInfo,
            Self::GetDocument { .. } => GatewayTool::GetDocument,
            Self::ListDocuments { .. } => GatewayTool::ListDocuments,
            Self::MangoFind { .. } => GatewayTool::MangoFind,
        }
    }

    /// Validate untrusted arguments for `tool`. Unknown keys are rejected and
    /// `null` counts as absent.
    pub fn parse(tool: GatewayTool, args: &Map<String, Value>, limits: GatewayLimits) -> Result<Self> {
        let args = Args::new(tool, args)?;

        Ok(match tool {
            GatewayTool::ListDatabases => Self::ListDatabases,
            GatewayTool::DbInfo => Self::DbInfo { db: args.db()? },
            GatewayTool::GetDocument => Self::GetDocument {
                db: args.db()?,
                doc_id: DocumentRef::new(args.required_str("doc_id")?)?,
                include_attachments: args.bool_or("include_attachments", false)?,
                include_revs: args.bool_or("include_revs", false)?,
            },
            GatewayTool::ListDocuments => Self::ListDocuments {
                db: args.db()?,
                include_docs: args.bool_or("include_docs", true)?,
                limit: args.limit(limits)?,
                skip: args.u64_or("skip", 0)?,
                startkey: args.value("startkey"),
                endkey: args.value("endkey"),
            },
            GatewayTool::MangoFind => Self::MangoFind {
                db: args.db()?,
                query: FindQuery {
                    selector: args.selector()?,
                    fields: args.fields()?,
                    limit: args.limit(limits)?,
                    sort: args.sort()?,
                    skip: args.u64_or("skip", 0)?,
                    use_index: args.use_index()?,
                },
            },
        })
    }
}

struct Args<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    fn new(tool: GatewayTool, map: &'a Map<String, Value>) -> Result<Self> {
        let schema = tool.schema();
        let allowed: BTreeSet<&str> = schema.parameters.iter().map(|p| p.name.as_str()).collect();
        let unknown: Vec<&str> = map
            .keys()
            .map(String::as_str)
            .filter(|k| !allowed.contains(k))
            .collect();

        if !unknown.is_empty() {
            return Err(GatewayError::invalid(format!(
                "{} does not accept argument(s): {}",
                tool.name(),
                unknown.join(", ")
            )));
        }
        Ok(Self { map })
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn value(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }

    fn required_str(&self, key: &str) -> Result<&'a str> {
        match self.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(GatewayError::invalid(format!(
                "{key} must be a string, got {}",
                type_name(other)
            ))),
            None => Err(GatewayError::invalid(format!("missing required argument: {key}"))),
        }
    }

    fn db(&self) -> Result<DatabaseRef> {
        DatabaseRef::new(self.required_str("db")?)
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(GatewayError::invalid(format!(
                "{key} must be a boolean, got {}",
                type_name(other)
            ))),
        }
    }

    fn u64_or(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.as_u64().ok_or_else(|| {
                GatewayError::invalid(format!("{key} must be a non-negative integer, got {v}"))
            }),
        }
    }

    fn limit(&self, limits: GatewayLimits) -> Result<u64> {
        let limit = self.u64_or("limit", DEFAULT_PAGE_LIMIT)?;
        if limit > limits.max_limit {
            return Err(GatewayError::invalid(format!(
                "limit {limit} exceeds the maximum of {}",
                limits.max_limit
            )));
        }
        Ok(limit)
    }

    fn selector(&self) -> Result<Map<String, Value>> {
        match self.get("selector") {
            Some(Value::Object(selector)) => Ok(selector.clone()),
            Some(other) => Err(GatewayError::invalid(format!(
                "selector must be an object, got {}",
                type_name(other)
            ))),
            None => Err(GatewayError::invalid("missing required argument: selector")),
        }
    }

    fn fields(&self) -> Result<Option<Vec<String>>> {
        let Some(value) = self.get("fields") else {
            return Ok(None);
        };
        let invalid = || GatewayError::invalid("fields must be an array of strings");
        let items = value.as_array().ok_or_else(invalid)?;
        items
            .iter()
            .map(|f| f.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    fn sort(&self) -> Result<Option<Vec<Value>>> {
        let Some(value) = self.get("sort") else {
            return Ok(None);
        };
        let invalid =
            || GatewayError::invalid("sort must be an array of field names or {field: direction} objects");
        let items = value.as_array().ok_or_else(invalid)?;
        let well_formed = items.iter().all(|item| match item {
            Value::String(_) => true,
            Value::Object(entry) => {
                entry.len() == 1
                    && entry
                        .values()
                        .all(|dir| matches!(dir.as_str(), Some("asc" | "desc")))
            }
            _ => false,
        });
        if !well_formed {
            return Err(invalid());
        }
        Ok(Some(items.clone()))
    }

    fn use_index(&self) -> Result<Option<Value>> {
        match self.get("use_index") {
            None => Ok(None),
            Some(v @ Value::String(_)) => Ok(Some(v.clone())),
            Some(Value::Array(parts))
                if (1..=2).contains(&parts.len()) && parts.iter().all(Value::is_string) =>
            {
                Ok(Some(Value::Array(parts.clone())))
            }
            Some(_) => Err(GatewayError::invalid(
                "use_index must be a design document name or [design_doc, index_name]",
            )),
        }
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
