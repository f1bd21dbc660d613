//! pgdefine Core
//!
//! Core domain model with stable, versioned types shared by the
//! preprocessor, the query executor and the CLI.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity, Location};
pub use report::{RunReport, ReportVersion, ReportSummary, StatementReport};
pub use config::{Config, ConfigError, ConnectionConfig, PASSWORD_ENV_VAR};
