//! Mock query executor for testing
//!
//! Returns canned results without connecting to any database and records
//! every script it was asked to run.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let executor = MockExecutor::new();
//! executor.add_result("SELECT 1;", QueryResult::default()).await;
//! let outcome = executor.execute("SELECT 1;").await?;
//! assert_eq!(executor.executed().await, vec!["SELECT 1;"]);
//! ```

use crate::adapter::{ExecuteError, QueryExecutor, QueryOutcome, QueryResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Mock executor for testing
pub struct MockExecutor {
    /// Canned results keyed by exact SQL text
    results: Arc<RwLock<HashMap<String, Vec<QueryResult>>>>,

    /// Errors to return for specific SQL text
    errors: Arc<RwLock<HashMap<String, ExecuteError>>>,

    /// Scripts received by `execute`, in order
    executed: Arc<RwLock<Vec<String>>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulate query latency (milliseconds)
    latency_ms: u64,
}

impl MockExecutor {
    /// Create a new mock executor with no canned results
    pub fn new() -> Self {
        Self {
            results: Arc::new(RwLock::new(HashMap::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            executed: Arc::new(RwLock::new(Vec::new())),
            fail_connection: false,
            latency_ms: 0,
        }
    }

    /// Return `result` when exactly `sql` is executed.
    ///
    /// Calling this again for the same SQL adds another statement result.
    pub async fn add_result(&self, sql: impl Into<String>, result: QueryResult) {
        self.results.write().await.entry(sql.into()).or_default().push(result);
    }

    /// Fail with `error` when exactly `sql` is executed
    pub async fn add_error(&self, sql: impl Into<String>, error: ExecuteError) {
        self.errors.write().await.insert(sql.into(), error);
    }

    /// Configure to fail every connection
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure simulated latency for all operations
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Scripts executed so far
    pub async fn executed(&self) -> Vec<String> {
        self.executed.read().await.clone()
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }
    }

    fn connection_failure() -> ExecuteError {
        ExecuteError::ConnectionError("Simulated connection failure".to_string())
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockExecutor {
    fn clone(&self) -> Self {
        Self {
            results: Arc::clone(&self.results),
            errors: Arc::clone(&self.errors),
            executed: Arc::clone(&self.executed),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
        }
    }
}

#[async_trait::async_trait]
impl QueryExecutor for MockExecutor {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn execute(&self, sql: &str) -> Result<QueryOutcome, ExecuteError> {
        let started = std::time::Instant::now();
        self.simulate_latency().await;

        if self.fail_connection {
            return Err(Self::connection_failure());
        }

        self.executed.write().await.push(sql.to_string());

        if let Some(error) = self.errors.read().await.get(sql) {
            return Err(error.clone());
        }

        let results = self.results.read().await.get(sql).cloned().unwrap_or_default();

        Ok(QueryOutcome {
            results,
            exec_time: started.elapsed(),
            server_version: None,
        })
    }

    async fn test_connection(&self) -> Result<(), ExecuteError> {
        self.simulate_latency().await;

        if self.fail_connection {
            Err(Self::connection_failure())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::FieldInfo;

    #[tokio::test]
    async fn returns_canned_results_in_order() {
        let executor = MockExecutor::new();
        let first = QueryResult {
            row_count: 1,
            fields: vec![FieldInfo::named("n")],
            rows: vec![vec![serde_json::json!("1")]],
        };
        let second = QueryResult { row_count: 3, ..Default::default() };

        executor.add_result("SELECT 1; UPDATE t SET x = 1;", first.clone()).await;
        executor.add_result("SELECT 1; UPDATE t SET x = 1;", second.clone()).await;

        let outcome = executor.execute("SELECT 1; UPDATE t SET x = 1;").await.unwrap();
        assert_eq!(outcome.results, vec![first, second]);
    }

    #[tokio::test]
    async fn unknown_sql_yields_no_results() {
        let executor = MockExecutor::new();
        let outcome = executor.execute("SELECT 2").await.unwrap();
        assert!(outcome.results.is_empty());
        assert_eq!(executor.executed().await, vec!["SELECT 2".to_string()]);
    }

    #[tokio::test]
    async fn connection_failure() {
        let executor = MockExecutor::new().with_connection_failure();
        assert!(executor.test_connection().await.is_err());
        assert!(matches!(
            executor.execute("SELECT 1").await,
            Err(ExecuteError::ConnectionError(_))
        ));
        assert!(executor.executed().await.is_empty());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let executor = MockExecutor::new();
        let clone = executor.clone();
        clone.execute("SELECT 1").await.unwrap();
        assert_eq!(executor.executed().await.len(), 1);
    }
}
