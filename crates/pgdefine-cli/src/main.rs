use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pgdefine_core::{Config, Diagnostic, DiagnosticCode, Location, RunReport, Severity, StatementReport};
use pgdefine_executor::{PostgresExecutor, QueryExecutor};
use pgdefine_preprocess::{PreprocessResult, VariablePreprocessor};

mod sink;

use sink::{ConsoleSink, DiagnosticSink, Tee};

/// Default config file looked up in the working directory
const DEFAULT_CONFIG: &str = "pgdefine.toml";

/// pgdefine - resolve `#define` variables in SQL scripts and run them
#[derive(Parser)]
#[command(name = "pgdefine")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: pgdefine.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the script with variables substituted and declarations removed
    Resolve {
        /// SQL script, or `-` for stdin
        file: PathBuf,

        /// Write the resolved SQL here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List declarations and placeholders and report undefined variables
    Check {
        /// SQL script, or `-` for stdin
        file: PathBuf,
    },

    /// Resolve the script and execute it
    Run {
        /// SQL script, or `-` for stdin
        file: PathBuf,

        /// Connect to this database instead of the configured one
        #[arg(short, long)]
        database: Option<String>,

        /// Also write a JSON run report
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine
    let _ = dotenvy::dotenv();

    init_tracing(cli.verbose);

    let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
    config.apply_env();

    let ok = match cli.command {
        Commands::Resolve { file, output } => resolve_command(&file, output.as_deref())?,
        Commands::Check { file } => check_command(&file)?,
        Commands::Run { file, database, report } => {
            let executor = PostgresExecutor::new(config.connection.with_database(database.as_deref()));
            tracing::info!(connection = %executor.connection().display_name(), "executing script");
            run_command(&executor, &file, report.as_deref()).await?
        }
    };

    if !ok {
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    if let Some(config_path) = path {
        return Config::from_file(config_path)
            .with_context(|| format!("Failed to load config {}", config_path.display()));
    }

    let default_path = Path::new(DEFAULT_CONFIG);
    if default_path.exists() {
        return Ok(Config::from_file(default_path)?);
    }

    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(Config::default())
}

/// Read a script from a file, or stdin for `-`
fn read_script(file: &Path) -> Result<(String, Option<&Path>)> {
    if file == Path::new("-") {
        let mut sql = String::new();
        std::io::stdin().read_to_string(&mut sql).context("Failed to read stdin")?;
        return Ok((sql, None));
    }

    let sql = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    Ok((sql, Some(file)))
}

/// Resolve variables, reporting failures to `sink`
fn preprocess(sql: &str, path: Option<&Path>, sink: &mut impl DiagnosticSink) -> Option<PreprocessResult> {
    match VariablePreprocessor::new().preprocess(sql, path) {
        Ok(result) => Some(result),
        Err(e) => {
            sink.report(&e.to_diagnostic());
            None
        }
    }
}

/// Resolve command - print substituted SQL
fn resolve_command(file: &Path, output: Option<&Path>) -> Result<bool> {
    let (sql, path) = read_script(file)?;

    let Some(result) = preprocess(&sql, path, &mut ConsoleSink) else {
        return Ok(false);
    };

    match output {
        Some(out) => {
            std::fs::write(out, &result.resolved_sql)
                .with_context(|| format!("Failed to write {}", out.display()))?;
            tracing::info!(output = %out.display(), "resolved SQL written");
        }
        None => print!("{}", result.resolved_sql),
    }

    Ok(true)
}

/// Check command - show what the preprocessor sees without substituting
fn check_command(file: &Path) -> Result<bool> {
    let (sql, path) = read_script(file)?;
    let label = path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string());

    let scan = VariablePreprocessor::new().scan(&sql);
    let mut sink = ConsoleSink;

    println!("{} {}", "Checking".cyan(), label);
    println!();

    if scan.declarations.is_empty() {
        println!("{}", "No #define declarations; the script runs unchanged.".yellow());
    } else {
        println!("{}", "Declarations:".bold());
        for decl in &scan.declarations {
            println!("  {:>4}  {} = {}", decl.line, decl.name.green(), decl.value);
        }
        println!();
        println!("{} {}", "Placeholders:".bold(), scan.placeholders.len());
        for placeholder in &scan.placeholders {
            println!(
                "  {:>4}:{:<3} :{}",
                placeholder.line,
                placeholder.column,
                placeholder.name.green()
            );
        }
    }

    for line in &scan.malformed_lines {
        let diag = Diagnostic::new(
            DiagnosticCode::MalformedDirective,
            Severity::Warn,
            "#define line is not of the form `#define name = value` and will be kept as is",
        )
        .with_location(Location::with_line(label.clone(), *line));
        sink.report(&diag);
    }

    // Validation only applies once something is declared
    if scan.declarations.is_empty() {
        return Ok(true);
    }

    match preprocess(&sql, path, &mut sink) {
        Some(_) => {
            println!("{}", "✓ All variables defined".green());
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Run command - resolve, execute and print results as JSON
async fn run_command(
    executor: &dyn QueryExecutor,
    file: &Path,
    report_path: Option<&Path>,
) -> Result<bool> {
    let (sql, path) = read_script(file)?;
    let mut report = RunReport::new(path.map(|p| p.display().to_string()));
    let mut console = ConsoleSink;

    let preprocessed = preprocess(&sql, path, &mut Tee(&mut console, &mut report));
    let Some(result) = preprocessed else {
        save_report(&report, report_path)?;
        return Ok(false);
    };
    report = report.with_resolved_sql(result.resolved_sql.clone());

    match executor.execute(&result.resolved_sql).await {
        Ok(outcome) => {
            report.exec_time_secs = Some(outcome.exec_time_secs());
            for query_result in &outcome.results {
                report.add_statement(StatementReport::from(query_result));
            }

            println!("{}", serde_json::to_string_pretty(&outcome.results)?);
            let done = Diagnostic::new(
                DiagnosticCode::Info,
                Severity::Info,
                format!(
                    "{} statement(s) on {} in {:.3}s",
                    outcome.results.len(),
                    executor.name(),
                    outcome.exec_time_secs()
                ),
            );
            Tee(&mut console, &mut report).report(&done);
        }
        Err(e) => {
            let code = match e {
                pgdefine_executor::ExecuteError::ConnectionError(_) => DiagnosticCode::ConnectionError,
                _ => DiagnosticCode::QueryError,
            };
            let diag = Diagnostic::new(code, Severity::Error, e.to_string());
            Tee(&mut console, &mut report).report(&diag);
        }
    }

    save_report(&report, report_path)?;
    Ok(!report.has_errors())
}

fn save_report(report: &RunReport, path: Option<&Path>) -> Result<()> {
    if let Some(path) = path {
        report.save_to_file(path)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        eprintln!("{} {}", "Report saved to:".green(), path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pgdefine_executor::{ExecuteError, FieldInfo, MockExecutor, QueryResult};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "pgdefine", "--verbose", "run", "daily.sql", "--database", "archive", "--report", "out.json",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Run { file, database, report } => {
                assert_eq!(file, PathBuf::from("daily.sql"));
                assert_eq!(database.as_deref(), Some("archive"));
                assert_eq!(report, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn resolve_command_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("q.sql");
        let output = dir.path().join("resolved.sql");
        std::fs::write(&input, "#define lim = 10\nSELECT * FROM t LIMIT :lim;\n").unwrap();

        assert!(resolve_command(&input, Some(&output)).unwrap());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "SELECT * FROM t LIMIT 10;\n");
    }

    #[test]
    fn resolve_command_fails_on_undefined() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("q.sql");
        let output = dir.path().join("resolved.sql");
        std::fs::write(&input, "#define lim = 10\nSELECT :cols FROM t;\n").unwrap();

        assert!(!resolve_command(&input, Some(&output)).unwrap());
        assert!(!output.exists());
    }

    #[test]
    fn check_command_reports_undefined() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.sql");
        let bad = dir.path().join("bad.sql");
        std::fs::write(&good, "#define a = 1\n#define oops\nSELECT :a;").unwrap();
        std::fs::write(&bad, "#define a = 1\nSELECT :b;").unwrap();

        assert!(check_command(&good).unwrap());
        assert!(!check_command(&bad).unwrap());
    }

    const LIMITED: &str = "#define lim = 2\nSELECT id FROM t LIMIT :lim;\n";

    fn read_report(path: &Path) -> RunReport {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn run_command_records_statements() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("q.sql");
        let report_path = dir.path().join("run.json");
        std::fs::write(&input, LIMITED).unwrap();

        let executor = MockExecutor::new();
        executor
            .add_result(
                "SELECT id FROM t LIMIT 2;\n",
                QueryResult {
                    row_count: 2,
                    fields: vec![FieldInfo::named("id")],
                    rows: vec![vec![serde_json::json!("1")], vec![serde_json::json!("2")]],
                },
            )
            .await;

        assert!(run_command(&executor, &input, Some(&report_path)).await.unwrap());
        assert_eq!(executor.executed().await, vec!["SELECT id FROM t LIMIT 2;\n".to_string()]);

        let report = read_report(&report_path);
        assert_eq!(report.resolved_sql.as_deref(), Some("SELECT id FROM t LIMIT 2;\n"));
        assert_eq!(report.statements.len(), 1);
        assert_eq!(report.statements[0].columns, vec!["id".to_string()]);
        assert_eq!(report.summary.rows, 2);
        assert!(!report.has_errors());
        assert_eq!(report.diagnostics[0].code, DiagnosticCode::Info);
    }

    #[tokio::test]
    async fn run_command_reports_connection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("q.sql");
        let report_path = dir.path().join("run.json");
        std::fs::write(&input, LIMITED).unwrap();

        let executor = MockExecutor::new().with_connection_failure();

        assert!(!run_command(&executor, &input, Some(&report_path)).await.unwrap());

        let report = read_report(&report_path);
        assert!(report.statements.is_empty());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].code, DiagnosticCode::ConnectionError);
    }

    #[tokio::test]
    async fn run_command_reports_query_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("q.sql");
        let report_path = dir.path().join("run.json");
        std::fs::write(&input, LIMITED).unwrap();

        let executor = MockExecutor::new();
        executor
            .add_error(
                "SELECT id FROM t LIMIT 2;\n",
                ExecuteError::QueryError("relation \"t\" does not exist".to_string()),
            )
            .await;

        assert!(!run_command(&executor, &input, Some(&report_path)).await.unwrap());

        let report = read_report(&report_path);
        assert_eq!(report.diagnostics[0].code, DiagnosticCode::QueryError);
        assert_eq!(report.summary.errors, 1);
    }

    #[tokio::test]
    async fn run_command_stops_before_executing_undefined() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("q.sql");
        let report_path = dir.path().join("run.json");
        std::fs::write(&input, "#define lim = 2\nSELECT :cols FROM t;\n").unwrap();

        let executor = MockExecutor::new();

        assert!(!run_command(&executor, &input, Some(&report_path)).await.unwrap());
        assert!(executor.executed().await.is_empty());

        let report = read_report(&report_path);
        assert!(report.statements.is_empty());
        assert!(report.resolved_sql.is_none());
        assert_eq!(report.diagnostics[0].code, DiagnosticCode::UndefinedVariable);
        assert_eq!(report.diagnostics[0].names, vec!["cols".to_string()]);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(load_config(Some(Path::new("/no/such/pgdefine.toml")), false).is_err());
    }
}
