//! External data collaborators: schema introspection and read-only query execution.
//!
//! Both are traits so the report pipeline never knows whether it is talking to
//! the hosted store's RPC endpoints or to a local DuckDB file.

pub mod duckdb_store;
pub mod http;
pub mod pool;

use crate::config::GatewayConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// One result record, keys in the order the database returned the columns.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default)]
    pub data_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumInfo {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaContext {
    #[serde(default)]
    pub tables: Vec<TableInfo>,
    #[serde(default)]
    pub views: Vec<TableInfo>,
    #[serde(default)]
    pub enums: Vec<EnumInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub rows: Vec<Row>,
    pub row_count: usize,
    pub truncated: bool,
}

impl ExecutionResult {
    /// Applies the row cap to rows fetched with one row of lookahead.
    pub fn capped(mut rows: Vec<Row>, row_cap: usize) -> Self {
        let truncated = rows.len() > row_cap;
        rows.truncate(row_cap);
        Self {
            row_count: rows.len(),
            rows,
            truncated,
        }
    }
}

#[derive(Debug)]
pub enum GatewayError {
    /// The database rejected or failed the statement; carries the raw message.
    Query(String),
    ConnectionError(String),
    ConfigError(String),
    Timeout(Duration),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Query(msg) => write!(f, "{}", msg),
            GatewayError::ConnectionError(msg) => write!(f, "Gateway connection error: {}", msg),
            GatewayError::ConfigError(msg) => write!(f, "Gateway configuration error: {}", msg),
            GatewayError::Timeout(after) => {
                write!(f, "Query timed out after {}s", after.as_secs())
            }
        }
    }
}

impl Error for GatewayError {}

#[async_trait]
pub trait SchemaProvider: Send + Sync {
    async fn fetch_schema(&self) -> Result<SchemaContext, GatewayError>;

    fn has_credentials(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Runs one read-only statement, returning at most `row_cap` rows.
    async fn execute(&self, sql: &str, row_cap: usize) -> Result<ExecutionResult, GatewayError>;

    fn has_credentials(&self) -> bool {
        true
    }
}

pub struct Gateways {
    pub schema: Arc<dyn SchemaProvider>,
    pub query: Arc<dyn QueryGateway>,
    pub backend: String,
}

pub fn connect(config: &GatewayConfig) -> Result<Gateways, GatewayError> {
    match config.backend.as_str() {
        "http" => {
            let gateway = Arc::new(http::HttpGateway::new(config)?);
            Ok(Gateways {
                schema: gateway.clone(),
                query: gateway,
                backend: config.backend.clone(),
            })
        }
        "duckdb" => {
            let gateway = Arc::new(duckdb_store::DuckDbGateway::open(config)?);
            Ok(Gateways {
                schema: gateway.clone(),
                query: gateway,
                backend: config.backend.clone(),
            })
        }
        other => Err(GatewayError::ConfigError(format!(
            "Unsupported gateway backend: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(n: i64) -> Row {
        json!({ "n": n }).as_object().cloned().unwrap()
    }

    #[test]
    fn lookahead_row_marks_truncation() {
        let result = ExecutionResult::capped((0..4).map(row).collect(), 3);
        assert_eq!(result.row_count, 3);
        assert!(result.truncated);

        let exact = ExecutionResult::capped((0..3).map(row).collect(), 3);
        assert_eq!(exact.row_count, 3);
        assert!(!exact.truncated);
    }

    #[test]
    fn schema_context_tolerates_missing_sections() {
        let schema: SchemaContext =
            serde_json::from_value(json!({ "tables": [{ "name": "projects" }] })).unwrap();
        assert_eq!(schema.tables[0].name, "projects");
        assert!(schema.views.is_empty());
        assert!(schema.enums.is_empty());
    }
}
