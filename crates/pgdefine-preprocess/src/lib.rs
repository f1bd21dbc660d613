//! `#define` variable preprocessing for SQL scripts
//!
//! This crate handles:
//! - Recognising `#define name = value` declarations (optionally behind `--`)
//! - Finding `:name` placeholders while leaving `::type` casts alone
//! - Reporting every undefined variable at once
//! - Producing SQL with placeholders substituted and declarations removed
//!
//! ```
//! let sql = pgdefine_preprocess::resolve("#define x = 42\nSELECT :x;").unwrap();
//! assert_eq!(sql, "SELECT 42;");
//! ```

pub mod preprocessor;
pub mod tokenizer;

pub use preprocessor::{resolve, VariablePreprocessor, PreprocessResult, PreprocessError, ScanResult};
pub use tokenizer::{Declaration, PlaceholderRef, fold_declarations};
