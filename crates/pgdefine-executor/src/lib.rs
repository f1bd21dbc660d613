//! Query execution for resolved SQL scripts
//!
//! The preprocessor hands its output to a [`QueryExecutor`]; this crate
//! provides the trait, its result model and two implementations.
//!
//! ## Features
//!
//! - `postgres` - PostgreSQL support via tokio-postgres (plain or TLS)
//!
//! Without the feature, [`PostgresExecutor`] reports a configuration error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pgdefine_executor::{PostgresExecutor, QueryExecutor};
//!
//! let executor = PostgresExecutor::new(config.connection.clone());
//! let outcome = executor.execute(&resolved_sql).await?;
//! ```

pub mod adapter;
pub mod mock;
pub mod postgres;

pub use adapter::{QueryExecutor, QueryOutcome, QueryResult, FieldInfo, ExecuteError};
pub use mock::MockExecutor;
pub use postgres::{PostgresExecutor, quote_ident};
