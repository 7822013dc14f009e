//! The end-to-end translation pipeline.
//!
//! `source -> parse -> analyse -> cross-match -> assign identities ->
//! generate`. Any fatal error aborts the batch; no partial network is ever
//! returned. Rules with unsupported constructs are skipped with a warning and
//! listed in the report.

use serde::Deserialize;
use thiserror::Error;

use soarta_codegen::network::Network;
use soarta_codegen::{generate, GenerationError, GeneratorOptions};
use soarta_dsl::ast::RuleSet;
use soarta_dsl::errors::ParseError;
use soarta_ir::analysis::{
    analyze, analyze_with_source, Analysis, AnalysisError, AnalysisWarning, SpannedAnalysisError,
};
use soarta_ir::identity::IdentityTable;
use soarta_ir::matcher::cross_match;

use crate::queries::{generate_queries, Query};
use crate::report::TranslationReport;

#[derive(Debug, Error, miette::Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Analysis(#[from] SpannedAnalysisError),
    #[error("Analysis error: {0}")]
    #[diagnostic(code(soarta::analysis::unbound_variable))]
    UnspannedAnalysis(#[from] AnalysisError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Generation(#[from] GenerationError),
}

/// Knobs of one translation run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslateOptions {
    /// Firings allowed per scheduler wave before the rest are deferred.
    pub max_firings_per_cycle: u32,
    /// Derive verifier queries alongside the network.
    pub emit_queries: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            max_firings_per_cycle: 10,
            emit_queries: true,
        }
    }
}

impl TranslateOptions {
    fn generator(&self) -> GeneratorOptions {
        GeneratorOptions {
            max_firings_per_cycle: self.max_firings_per_cycle,
        }
    }
}

/// Result of a successful translation.
#[derive(Debug, Clone)]
pub struct Translation {
    pub network: Network,
    pub report: TranslationReport,
    /// Empty unless `emit_queries` was set.
    pub queries: Vec<Query>,
    pub warnings: Vec<AnalysisWarning>,
}

/// Translate an already parsed rule set.
pub fn translate(rules: &RuleSet, options: &TranslateOptions) -> Result<Translation, PipelineError> {
    let analysis = analyze(rules)?;
    finish(analysis, options)
}

/// Parse and translate `source`, keeping source spans for diagnostics.
pub fn translate_source(
    source: &str,
    filename: &str,
    options: &TranslateOptions,
) -> Result<Translation, PipelineError> {
    let rules = soarta_dsl::parse(source, filename)?;
    tracing::info!(file = filename, productions = rules.productions.len(), "parsed rule file");
    let analysis = analyze_with_source(&rules, source, filename)?;
    finish(analysis, options)
}

fn finish(analysis: Analysis, options: &TranslateOptions) -> Result<Translation, PipelineError> {
    tracing::info!(
        rules = analysis.rules.len(),
        skipped = analysis.warnings.len(),
        disjunctions = analysis.disjunctions.len(),
        "analysis complete"
    );

    let outcome = cross_match(&analysis.rules, &analysis.disjunctions);
    tracing::info!(
        rounds = outcome.rounds.len(),
        correspondences = outcome.correspondences.len(),
        "cross-rule matching converged"
    );

    let table = IdentityTable::assign(&analysis.rules, &analysis.disjunctions, &analysis.shape);
    let model = generate(
        &analysis.rules,
        &analysis.disjunctions,
        &outcome.forest,
        &table,
        &options.generator(),
    )?;
    tracing::info!(
        templates = model.network.templates.len(),
        arrays = model.sizing.arrays().len(),
        slots = model.sizing.total_slots(),
        "generated network"
    );

    let halts = analysis.rules.iter().any(|r| r.halts);
    let queries = if options.emit_queries {
        generate_queries(&model.rule_instances, &model.sizing, halts)
    } else {
        Vec::new()
    };
    let report = TranslationReport::build(&analysis, &outcome, &table, &model.sizing);

    Ok(Translation {
        network: model.network,
        report,
        queries,
        warnings: analysis.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_default_and_reject_unknown_fields() {
        let options: TranslateOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, TranslateOptions::default());
        assert!(serde_json::from_str::<TranslateOptions>(r#"{"max_firings": 3}"#).is_err());
        let options: TranslateOptions =
            serde_json::from_str(r#"{"max_firings_per_cycle": 3, "emit_queries": false}"#).unwrap();
        assert_eq!(options.max_firings_per_cycle, 3);
        assert!(!options.emit_queries);
    }

    #[test]
    fn queries_can_be_turned_off() {
        let options = TranslateOptions {
            emit_queries: false,
            ..TranslateOptions::default()
        };
        let translation = translate_source(
            "sp {a (state <s> ^superstate nil) --> (<s> ^b c)}",
            "a.soar",
            &options,
        )
        .expect("translation failed");
        assert!(translation.queries.is_empty());
    }

    #[test]
    fn parse_errors_abort() {
        let err = translate_source("sp {broken (state <s> -->", "bad.soar", &TranslateOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Parse(_)));
    }
}
