//! PostgreSQL query executor
//!
//! Opens one connection per script, runs the resolved SQL over the simple
//! query protocol (so several statements may be sent at once) and closes
//! the connection again. Values come back as text.
//!
//! ## TLS
//!
//! When `cert_path` points at an existing PEM file the connection is made
//! over TLS with that CA certificate; otherwise a plain connection is used.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let executor = PostgresExecutor::new(config.connection.clone());
//! let outcome = executor.execute("SELECT 1;").await?;
//! ```

use crate::adapter::{ExecuteError, FieldInfo, QueryExecutor, QueryOutcome, QueryResult};
use pgdefine_core::ConnectionConfig;

#[cfg(feature = "postgres")]
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::{Certificate, TlsConnector};

/// Quote an identifier the way PostgreSQL's `quote_ident` does,
/// always wrapping in double quotes and doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    for ch in name.chars() {
        if ch == '"' {
            quoted.push('"');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// The parts of a simple-query response that shape the results
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
#[derive(Debug)]
enum ResultMessage {
    /// Columns of the next result set
    Columns(Vec<FieldInfo>),
    /// One data row, text or null per column
    Row(Vec<serde_json::Value>),
    /// A statement finished with this many rows
    Complete(u64),
}

/// Group response messages into one result per statement.
///
/// A result set opens with its columns, so a query returning no rows still
/// reports them.
#[cfg_attr(not(feature = "postgres"), allow(dead_code))]
fn group_results(messages: impl IntoIterator<Item = ResultMessage>) -> Vec<QueryResult> {
    let mut results = Vec::new();
    let mut current: Option<QueryResult> = None;

    for message in messages {
        match message {
            ResultMessage::Columns(fields) => {
                current = Some(QueryResult {
                    fields,
                    ..Default::default()
                });
            }
            ResultMessage::Row(values) => {
                current.get_or_insert_with(QueryResult::default).rows.push(values);
            }
            ResultMessage::Complete(count) => {
                let mut result = current.take().unwrap_or_default();
                result.row_count = count;
                results.push(result);
            }
        }
    }

    results
}

/// PostgreSQL executor
pub struct PostgresExecutor {
    connection: ConnectionConfig,
}

impl PostgresExecutor {
    /// Create an executor for the given connection settings
    pub fn new(connection: ConnectionConfig) -> Self {
        Self { connection }
    }

    /// Connection settings in use
    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// Build a TLS connector from the configured CA certificate
    #[cfg(feature = "postgres")]
    fn tls_connector(&self) -> Result<Option<MakeTlsConnector>, ExecuteError> {
        let Some(cert_path) = self
            .connection
            .cert_path
            .as_deref()
            .filter(|_| self.connection.has_certificate())
        else {
            return Ok(None);
        };

        let pem = std::fs::read(cert_path).map_err(|e| ExecuteError::ConfigError(format!(
            "Failed to read certificate {}: {}", cert_path.display(), e
        )))?;

        let cert = Certificate::from_pem(&pem).map_err(|e| ExecuteError::ConfigError(format!(
            "Invalid certificate {}: {}", cert_path.display(), e
        )))?;

        let connector = TlsConnector::builder()
            .add_root_certificate(cert)
            .build()
            .map_err(|e| ExecuteError::ConfigError(format!(
                "Failed to create TLS connector: {}", e
            )))?;

        Ok(Some(MakeTlsConnector::new(connector)))
    }

    /// Open a client and spawn its connection driver
    #[cfg(feature = "postgres")]
    async fn connect(&self) -> Result<Client, ExecuteError> {
        let conn_str = self.connection.to_connection_string();
        let label = self.connection.display_name();

        let client = match self.tls_connector()? {
            Some(tls) => {
                let (client, connection) = tokio_postgres::connect(&conn_str, tls)
                    .await
                    .map_err(|e| ExecuteError::ConnectionError(format!(
                        "Failed to connect to {} with TLS: {}", label, e
                    )))?;
                Self::spawn_driver(connection, label.clone());
                client
            }
            None => {
                let (client, connection) = tokio_postgres::connect(&conn_str, NoTls)
                    .await
                    .map_err(|e| ExecuteError::ConnectionError(format!(
                        "Failed to connect to {}: {}", label, e
                    )))?;
                Self::spawn_driver(connection, label.clone());
                client
            }
        };

        tracing::info!(connection = %label, "connected to PostgreSQL");
        Ok(client)
    }

    #[cfg(feature = "postgres")]
    fn spawn_driver<F>(connection: F, label: String)
    where
        F: std::future::Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
    {
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(connection = %label, error = %e, "PostgreSQL connection error");
            }
        });
    }

    /// Read `server_version_num`
    #[cfg(feature = "postgres")]
    async fn server_version(client: &Client) -> Option<u32> {
        let row = client
            .query_one("SELECT current_setting('server_version_num') AS ver_num", &[])
            .await
            .ok()?;
        let version: String = row.try_get(0).ok()?;
        version.parse().ok()
    }

    /// Column types of a single statement, via the extended protocol.
    ///
    /// Preparing also rejects scripts with more than one statement.
    #[cfg(feature = "postgres")]
    async fn describe(client: &Client, sql: &str) -> Result<Vec<FieldInfo>, ExecuteError> {
        let statement = client
            .prepare(sql)
            .await
            .map_err(|e| ExecuteError::QueryError(e.to_string()))?;

        Ok(statement
            .columns()
            .iter()
            .map(|c| FieldInfo {
                name: c.name().to_string(),
                data_type_id: Some(c.type_().oid()),
                format: Some(c.type_().name().to_string()),
            })
            .collect())
    }

    #[cfg(feature = "postgres")]
    fn result_message(message: SimpleQueryMessage) -> Option<ResultMessage> {
        match message {
            SimpleQueryMessage::RowDescription(columns) => Some(ResultMessage::Columns(
                columns.iter().map(|c| FieldInfo::named(c.name())).collect(),
            )),
            SimpleQueryMessage::Row(row) => Some(ResultMessage::Row(
                (0..row.len())
                    .map(|i| match row.get(i) {
                        Some(text) => serde_json::Value::String(text.to_string()),
                        None => serde_json::Value::Null,
                    })
                    .collect(),
            )),
            SimpleQueryMessage::CommandComplete(count) => Some(ResultMessage::Complete(count)),
            _ => None,
        }
    }
}

#[async_trait::async_trait]
impl QueryExecutor for PostgresExecutor {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    #[cfg(feature = "postgres")]
    async fn execute(&self, sql: &str) -> Result<QueryOutcome, ExecuteError> {
        let started = std::time::Instant::now();
        let client = self.connect().await?;
        let server_version = Self::server_version(&client).await;

        let described = if self.connection.multiple_statements {
            None
        } else {
            Some(Self::describe(&client, sql).await?)
        };

        let messages = client
            .simple_query(sql)
            .await
            .map_err(|e| ExecuteError::QueryError(e.to_string()))?;

        let mut results = group_results(messages.into_iter().filter_map(Self::result_message));

        // Single-statement mode knows the column types
        if let (Some(fields), Some(first)) = (described, results.first_mut()) {
            if fields.len() == first.fields.len() || first.fields.is_empty() {
                first.fields = fields;
            }
        }

        let exec_time = started.elapsed();
        tracing::info!(
            statements = results.len(),
            elapsed_secs = exec_time.as_secs_f64(),
            "query finished"
        );

        // Dropping the client closes the connection
        drop(client);

        Ok(QueryOutcome {
            results,
            exec_time,
            server_version,
        })
    }

    #[cfg(not(feature = "postgres"))]
    async fn execute(&self, _sql: &str) -> Result<QueryOutcome, ExecuteError> {
        Err(ExecuteError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres".to_string()
        ))
    }

    #[cfg(feature = "postgres")]
    async fn test_connection(&self) -> Result<(), ExecuteError> {
        let client = self.connect().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| ExecuteError::QueryError(e.to_string()))?;
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    async fn test_connection(&self) -> Result<(), ExecuteError> {
        Err(ExecuteError::ConfigError(
            "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres".to_string()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_plain_identifier() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("Mixed Case"), "\"Mixed Case\"");
    }

    #[test]
    fn quote_doubles_embedded_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(quote_ident(""), "\"\"");
    }

    #[test]
    fn executor_keeps_connection() {
        let mut conn = ConnectionConfig::default();
        conn.database = Some("analytics".to_string());
        let executor = PostgresExecutor::new(conn.clone());

        assert_eq!(executor.name(), "PostgreSQL");
        assert_eq!(executor.connection(), &conn);
    }

    #[test]
    fn empty_result_set_keeps_columns() {
        let results = group_results(vec![
            ResultMessage::Columns(vec![FieldInfo::named("id")]),
            ResultMessage::Complete(0),
        ]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].column_names(), vec!["id".to_string()]);
        assert!(results[0].rows.is_empty());
        assert_eq!(results[0].row_count, 0);
    }

    #[test]
    fn messages_group_per_statement() {
        let results = group_results(vec![
            ResultMessage::Complete(3),
            ResultMessage::Columns(vec![FieldInfo::named("id"), FieldInfo::named("note")]),
            ResultMessage::Row(vec![serde_json::json!("1"), serde_json::Value::Null]),
            ResultMessage::Row(vec![serde_json::json!("2"), serde_json::json!("x")]),
            ResultMessage::Complete(2),
        ]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].row_count, 3);
        assert!(results[0].fields.is_empty());
        assert_eq!(results[1].column_names(), vec!["id".to_string(), "note".to_string()]);
        assert_eq!(results[1].rows.len(), 2);
        assert_eq!(results[1].rows[0][1], serde_json::Value::Null);
    }

    #[cfg(not(feature = "postgres"))]
    #[tokio::test]
    async fn execute_without_feature_is_config_error() {
        let executor = PostgresExecutor::new(ConnectionConfig::default());
        let err = executor.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, ExecuteError::ConfigError(_)));
    }
}
