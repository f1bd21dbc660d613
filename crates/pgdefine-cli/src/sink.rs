//! Where diagnostics go once the library hands them back

use colored::Colorize;
use pgdefine_core::{Diagnostic, RunReport, Severity};

/// Receives diagnostics for presentation
pub trait DiagnosticSink {
    /// Report one diagnostic
    fn report(&mut self, diagnostic: &Diagnostic);
}

/// Logs through `tracing` and prints a coloured alert on stderr
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl DiagnosticSink for ConsoleSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Error => tracing::error!(code = %diagnostic.code, "{}", diagnostic.message),
            Severity::Warn => tracing::warn!(code = %diagnostic.code, "{}", diagnostic.message),
            Severity::Info => tracing::info!(code = %diagnostic.code, "{}", diagnostic.message),
        }

        let label = match diagnostic.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warn => "warning".yellow().bold(),
            Severity::Info => "info".cyan().bold(),
        };

        eprintln!("{}[{}]: {}", label, diagnostic.code, diagnostic.message);
        for location in &diagnostic.locations {
            eprintln!("  {} {}", "-->".bright_blue(), location);
        }
    }
}

impl DiagnosticSink for RunReport {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.add_diagnostic(diagnostic.clone());
    }
}

/// Sends every diagnostic to both sinks
pub struct Tee<'a, A: DiagnosticSink, B: DiagnosticSink>(pub &'a mut A, pub &'a mut B);

impl<A: DiagnosticSink, B: DiagnosticSink> DiagnosticSink for Tee<'_, A, B> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.0.report(diagnostic);
        self.1.report(diagnostic);
    }
}
