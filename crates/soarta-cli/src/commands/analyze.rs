// Command handler for: Analyze
//
// Translates without writing a model and prints the sizing report.

use std::path::PathBuf;

use miette::IntoDiagnostic;

use soarta_engine::pipeline::{translate_source, TranslateOptions};

use super::read_source;
use crate::cli::ReportFormat;

/// Run the `analyze` CLI command.
pub(crate) fn run_analyze_command(input: PathBuf, format: ReportFormat) -> miette::Result<()> {
    let source = read_source(&input)?;
    let options = TranslateOptions {
        emit_queries: false,
        ..TranslateOptions::default()
    };
    let translation = translate_source(&source, &input.display().to_string(), &options)?;
    match format {
        ReportFormat::Text => print!("{}", translation.report.render_text()),
        ReportFormat::Json => println!("{}", translation.report.to_json().into_diagnostic()?),
    }
    Ok(())
}
