//! Run report schema (stable v1)
//!
//! This schema is STABLE and VERSIONED.
//! Breaking changes require a new version.

use serde::{Deserialize, Serialize};
use crate::diagnostic::{Diagnostic, Severity};

/// Report schema version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportVersion {
    /// Major version (breaking changes)
    pub major: u32,

    /// Minor version (backward-compatible additions)
    pub minor: u32,
}

impl ReportVersion {
    /// Current report schema version
    pub const CURRENT: ReportVersion = ReportVersion { major: 1, minor: 0 };
}

impl std::fmt::Display for ReportVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Summary statistics for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Number of errors
    pub errors: usize,

    /// Number of warnings
    pub warnings: usize,

    /// Number of statements executed
    pub statements: usize,

    /// Total rows returned or affected
    pub rows: u64,
}

/// One executed statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementReport {
    /// Rows returned or affected
    pub row_count: u64,

    /// Column names in result order
    pub columns: Vec<String>,

    /// Row values, one array per row
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// Run report (run.json v1)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Schema version
    pub version: ReportVersion,

    /// Timestamp (ISO 8601)
    pub timestamp: String,

    /// Script the SQL was read from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// SQL after variable substitution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_sql: Option<String>,

    /// Wall-clock execution time in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_time_secs: Option<f64>,

    /// Summary statistics
    pub summary: ReportSummary,

    /// Executed statements
    pub statements: Vec<StatementReport>,

    /// All diagnostics
    pub diagnostics: Vec<Diagnostic>,
}

impl RunReport {
    /// Create a new empty report
    pub fn new(source: Option<String>) -> Self {
        Self {
            version: ReportVersion::CURRENT,
            timestamp: chrono::Utc::now().to_rfc3339(),
            source,
            resolved_sql: None,
            exec_time_secs: None,
            summary: ReportSummary::default(),
            statements: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Record the resolved SQL
    pub fn with_resolved_sql(mut self, sql: impl Into<String>) -> Self {
        self.resolved_sql = Some(sql.into());
        self
    }

    /// Add an executed statement
    pub fn add_statement(&mut self, statement: StatementReport) {
        self.summary.statements += 1;
        self.summary.rows += statement.row_count;
        self.statements.push(statement);
    }

    /// Add a diagnostic to the report
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.summary.errors += 1,
            Severity::Warn => self.summary.warnings += 1,
            Severity::Info => {}
        }

        self.diagnostics.push(diagnostic);
    }

    /// Check if the report has any errors
    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
