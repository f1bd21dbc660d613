//! Query executor trait and result model

use pgdefine_core::StatementReport;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Column metadata for one result set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Column name
    pub name: String,

    /// PostgreSQL type OID, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type_id: Option<u32>,

    /// Type name (e.g. `int4`), when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl FieldInfo {
    /// Field with a name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type_id: None,
            format: None,
        }
    }
}

/// Result of one statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Rows returned or affected
    pub row_count: u64,

    /// Result columns (empty for statements without a result set)
    pub fields: Vec<FieldInfo>,

    /// Row values in column order; text or null
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    /// Column names in order
    pub fn column_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

impl From<&QueryResult> for StatementReport {
    fn from(result: &QueryResult) -> Self {
        StatementReport {
            row_count: result.row_count,
            columns: result.column_names(),
            rows: result.rows.clone(),
        }
    }
}

/// Everything produced by running one script
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutcome {
    /// One entry per executed statement, in order
    pub results: Vec<QueryResult>,

    /// Time from connecting until the last result arrived
    pub exec_time: Duration,

    /// `server_version_num` of the server, when known
    pub server_version: Option<u32>,
}

impl QueryOutcome {
    /// Execution time in seconds
    pub fn exec_time_secs(&self) -> f64 {
        self.exec_time.as_secs_f64()
    }
}

/// Errors that can occur when executing SQL
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecuteError {
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Trait for backends that can run resolved SQL
#[async_trait::async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Get the executor name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Run a script and collect every statement's result.
    ///
    /// The SQL is sent as given; callers resolve variables first.
    async fn execute(&self, sql: &str) -> Result<QueryOutcome, ExecuteError>;

    /// Test the connection without running user SQL
    async fn test_connection(&self) -> Result<(), ExecuteError>;
}
