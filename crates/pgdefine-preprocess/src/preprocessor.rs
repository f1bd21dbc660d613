//! Variable preprocessing
//!
//! Resolves `:name` placeholders against `#define name = value` declarations
//! and strips the declarations from the output.

use pgdefine_core::{Diagnostic, DiagnosticCode, Location, Severity};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use crate::tokenizer::{self, Declaration, PlaceholderRef};

/// Label used in diagnostics when the SQL did not come from a file
const INPUT_LABEL: &str = "<input>";

/// Result of variable preprocessing
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Original SQL with directives
    pub original_sql: String,

    /// SQL with placeholders substituted and declarations removed
    pub resolved_sql: String,

    /// File path (if any)
    pub file_path: Option<PathBuf>,

    /// Whether any declaration was found
    pub had_declarations: bool,

    /// Declarations in document order (duplicates included)
    pub declarations: Vec<Declaration>,

    /// Placeholder references that were substituted
    pub placeholders: Vec<PlaceholderRef>,
}

/// Everything the tokenizer found, without validation
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Declarations in document order
    pub declarations: Vec<Declaration>,

    /// Placeholder references outside declaration lines
    pub placeholders: Vec<PlaceholderRef>,

    /// Lines that start with `#define` but are not declarations
    pub malformed_lines: Vec<usize>,
}

impl ScanResult {
    /// Referenced names with no declaration, sorted
    pub fn undefined_names(&self) -> Vec<String> {
        let declared: HashSet<&str> = self.declarations.iter().map(|d| d.name.as_str()).collect();

        self.placeholders
            .iter()
            .filter(|p| !declared.contains(p.name.as_str()))
            .map(|p| p.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Error during variable preprocessing
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("One or more variables have not been defined: {}", .names.join(", "))]
    UndefinedVariables {
        /// Missing names, sorted lexically
        names: Vec<String>,
        /// Every reference to a missing name
        references: Vec<PlaceholderRef>,
        file_path: Option<PathBuf>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PreprocessError {
    /// Names that have no declaration (empty for I/O errors)
    pub fn undefined_names(&self) -> &[String] {
        match self {
            PreprocessError::UndefinedVariables { names, .. } => names,
            PreprocessError::IoError(_) => &[],
        }
    }

    /// Convert to a pgdefine diagnostic
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            PreprocessError::UndefinedVariables { names, references, file_path } => {
                let file = file_label(file_path.as_deref());
                let locations = references
                    .iter()
                    .map(|r| Location::with_position(file.clone(), r.line, r.column))
                    .collect();

                Diagnostic::new(DiagnosticCode::UndefinedVariable, Severity::Error, self.to_string())
                    .with_names(names.clone())
                    .with_locations(locations)
            }
            PreprocessError::IoError(e) => {
                Diagnostic::new(
                    DiagnosticCode::IoError,
                    Severity::Error,
                    format!("IO error: {}", e),
                )
            }
        }
    }
}

fn file_label(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| INPUT_LABEL.to_string())
}

/// Resolve all placeholders in `sql`.
///
/// Returns the substituted text with every declaration line removed, or the
/// full list of undefined names. Text without declarations is returned as is.
pub fn resolve(sql: &str) -> Result<String, PreprocessError> {
    VariablePreprocessor::new()
        .preprocess(sql, None)
        .map(|result| result.resolved_sql)
}

/// `#define` variable preprocessor for SQL scripts
#[derive(Debug, Clone, Copy, Default)]
pub struct VariablePreprocessor;

impl VariablePreprocessor {
    /// Create a new preprocessor
    pub fn new() -> Self {
        Self
    }

    /// Run both tokenizer passes without validating or substituting
    pub fn scan(&self, sql: &str) -> ScanResult {
        let lines = tokenizer::split_lines(sql);
        let declarations = tokenizer::scan_declarations(&lines);
        let declaration_lines: HashSet<usize> = declarations.iter().map(|d| d.line).collect();

        let placeholders = lines
            .iter()
            .filter(|l| !declaration_lines.contains(&l.number))
            .flat_map(|l| tokenizer::scan_placeholders(l.content, l.number))
            .collect();

        ScanResult {
            declarations,
            placeholders,
            malformed_lines: tokenizer::scan_malformed_directives(&lines),
        }
    }

    /// Preprocess SQL with `#define` declarations
    pub fn preprocess(&self, sql: &str, file_path: Option<&Path>) -> Result<PreprocessResult, PreprocessError> {
        let lines = tokenizer::split_lines(sql);
        let declarations = tokenizer::scan_declarations(&lines);

        // Without declarations nothing is validated or substituted
        if declarations.is_empty() {
            tracing::debug!(file = %file_label(file_path), "no declarations, passing SQL through");
            return Ok(PreprocessResult {
                original_sql: sql.to_string(),
                resolved_sql: sql.to_string(),
                file_path: file_path.map(|p| p.to_path_buf()),
                had_declarations: false,
                declarations,
                placeholders: Vec::new(),
            });
        }

        let values = tokenizer::fold_declarations(&declarations);
        let declaration_lines: HashSet<usize> = declarations.iter().map(|d| d.line).collect();

        let body: Vec<_> = lines
            .iter()
            .filter(|l| !declaration_lines.contains(&l.number))
            .map(|l| (l, tokenizer::scan_placeholders(l.content, l.number)))
            .collect();

        Self::validate(&body, &values, file_path)?;

        let mut resolved = String::with_capacity(sql.len());
        let mut placeholders = Vec::new();
        for (line, refs) in body {
            resolved.push_str(&tokenizer::substitute_line(line.content, &refs, &values));
            resolved.push_str(line.terminator);
            placeholders.extend(refs);
        }

        tracing::debug!(
            file = %file_label(file_path),
            declarations = declarations.len(),
            placeholders = placeholders.len(),
            "resolved SQL variables"
        );

        Ok(PreprocessResult {
            original_sql: sql.to_string(),
            resolved_sql: resolved,
            file_path: file_path.map(|p| p.to_path_buf()),
            had_declarations: true,
            declarations,
            placeholders,
        })
    }

    /// Preprocess SQL from a file
    pub fn preprocess_file(&self, path: &Path) -> Result<PreprocessResult, PreprocessError> {
        let sql = std::fs::read_to_string(path)?;
        self.preprocess(&sql, Some(path))
    }

    /// Every referenced name must be declared
    fn validate(
        body: &[(&tokenizer::SourceLine<'_>, Vec<PlaceholderRef>)],
        values: &HashMap<String, String>,
        file_path: Option<&Path>,
    ) -> Result<(), PreprocessError> {
        let references: Vec<PlaceholderRef> = body
            .iter()
            .flat_map(|(_, refs)| refs.iter())
            .filter(|r| !values.contains_key(&r.name))
            .cloned()
            .collect();

        if references.is_empty() {
            return Ok(());
        }

        let names: Vec<String> = references
            .iter()
            .map(|r| r.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        tracing::debug!(missing = ?names, "undefined variables");

        Err(PreprocessError::UndefinedVariables {
            names,
            references,
            file_path: file_path.map(|p| p.to_path_buf()),
        })
    }
}
