//! Diagnostic codes and error reporting
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Preprocessing
    /// A placeholder references a name with no `#define` declaration
    UndefinedVariable,

    /// A line starts with `#define` but is not a well-formed declaration
    MalformedDirective,

    /// The SQL script could not be read
    IoError,

    // Execution
    /// The database rejected the resolved SQL
    QueryError,

    /// Could not connect to the database
    ConnectionError,

    // General
    /// General informational message
    Info,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UndefinedVariable => "UNDEFINED_VARIABLE",
            Self::MalformedDirective => "MALFORMED_DIRECTIVE",
            Self::IoError => "IO_ERROR",
            Self::QueryError => "QUERY_ERROR",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::Info => "INFO",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed but not blocking
    Warn,

    /// Error - the script cannot be executed
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Source location in a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File path, or `<stdin>` for piped input
    pub file: String,

    /// Optional line number (1-indexed)
    pub line: Option<usize>,

    /// Optional column number (1-indexed)
    pub column: Option<usize>,
}

impl Location {
    /// Create a new location with just a file path
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// Create a location with file and line number
    pub fn with_line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: None,
        }
    }

    /// Create a location with file, line, and column
    pub fn with_position(file: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: Some(column),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, "{}:{}:{}", self.file, line, column),
            (Some(line), None) => write!(f, "{}:{}", self.file, line),
            _ => write!(f, "{}", self.file),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Source locations (one per offending reference)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// Names involved in this diagnostic (e.g. undefined variables)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            locations: Vec::new(),
            names: Vec::new(),
        }
    }

    /// Add a location
    pub fn with_location(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    /// Replace all locations
    pub fn with_locations(mut self, locations: Vec<Location>) -> Self {
        self.locations = locations;
        self
    }

    /// Set the names involved
    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        // Ensure codes are stable strings
        assert_eq!(DiagnosticCode::UndefinedVariable.as_str(), "UNDEFINED_VARIABLE");
        assert_eq!(DiagnosticCode::MalformedDirective.as_str(), "MALFORMED_DIRECTIVE");
        assert_eq!(DiagnosticCode::QueryError.to_string(), "QUERY_ERROR");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::UndefinedVariable,
            Severity::Error,
            "One or more variables have not been defined: user_id",
        )
        .with_location(Location::with_position("reports/daily.sql", 4, 17))
        .with_names(vec!["user_id".to_string()]);

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("UNDEFINED_VARIABLE"));
        assert!(json.contains("\"error\""));
        assert!(json.contains("\"user_id\""));
    }

    #[test]
    fn empty_locations_are_omitted() {
        let diag = Diagnostic::new(DiagnosticCode::Info, Severity::Info, "nothing to do");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(!json.contains("locations"));
    }

    #[test]
    fn location_display() {
        assert_eq!(Location::new("a.sql").to_string(), "a.sql");
        assert_eq!(Location::with_line("a.sql", 3).to_string(), "a.sql:3");
        assert_eq!(Location::with_position("a.sql", 3, 9).to_string(), "a.sql:3:9");
    }
}
