// Command handler for: Translate
//
// Runs the full pipeline on one rule file and writes the UPPAAL model, and
// optionally a separate .q query file.

use std::fs;
use std::path::PathBuf;

use miette::{Context, IntoDiagnostic};

use soarta_engine::export_xml::export_xml;
use soarta_engine::pipeline::{translate_source, TranslateOptions};
use soarta_engine::queries::render_query_file;

use super::read_source;

/// Run the `translate` CLI command.
pub(crate) fn run_translate_command(
    input: PathBuf,
    output: Option<PathBuf>,
    max_firings: u32,
    queries: Option<PathBuf>,
    no_queries: bool,
) -> miette::Result<()> {
    if max_firings == 0 {
        miette::bail!("--max-firings must be at least 1");
    }

    let source = read_source(&input)?;
    let options = TranslateOptions {
        max_firings_per_cycle: max_firings,
        emit_queries: !no_queries,
    };
    let translation = translate_source(&source, &input.display().to_string(), &options)?;

    let output = output.unwrap_or_else(|| input.with_extension("xml"));
    fs::write(&output, export_xml(&translation.network, &translation.queries))
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to write {}", output.display()))?;
    tracing::debug!(output = %output.display(), "wrote model");

    if let Some(path) = &queries {
        fs::write(path, render_query_file(&translation.queries))
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    }

    let rules = translation.network.templates.len().saturating_sub(2);
    println!(
        "Wrote {} ({rules} rule templates, {} arrays, {} queries, {} rules skipped)",
        output.display(),
        translation.report.arrays.len(),
        translation.queries.len(),
        translation.warnings.len()
    );
    for warning in &translation.warnings {
        println!("  skipped: {warning}");
    }
    Ok(())
}
