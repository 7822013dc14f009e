//! Verifier queries derived from the generated network.

use serde::Serialize;

use soarta_codegen::sizing::Sizing;
use soarta_codegen::{preference, scheduler};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    pub formula: String,
    pub comment: String,
}

impl Query {
    fn new(formula: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            formula: formula.into(),
            comment: comment.into(),
        }
    }
}

/// Halting reachability, decision sanity, per-rule reachability and one
/// capacity query per attribute array.
pub fn generate_queries(rule_instances: &[String], sizing: &Sizing, halts: bool) -> Vec<Query> {
    let mut queries = Vec::new();
    if halts {
        queries.push(Query::new(
            format!("E<> {}.Halted", scheduler::INSTANCE),
            "The agent can reach a halting state.",
        ));
    }
    queries.push(Query::new(
        format!("A[] not {}.ConstraintFailure", preference::INSTANCE),
        "No decision ever requires more than one operator, or a prohibited one.",
    ));
    queries.push(Query::new(
        format!("A[] not {}.Conflict", preference::INSTANCE),
        "Better/worse preferences never eliminate every candidate.",
    ));

    for instance in rule_instances {
        queries.push(Query::new(
            format!("E<> {instance}.Run_Assignment"),
            format!("{instance} can fire."),
        ));
    }

    for array in sizing.arrays() {
        let last = array.size.saturating_sub(1);
        let note = if array.cross_rule {
            " Written by more than one rule."
        } else {
            ""
        };
        queries.push(Query::new(
            format!("A[] ({}[{last}] == EMPTY)", array.uppaal_name),
            format!(
                "Fails when {}.{} can hold all {} of its values.{note}",
                array.identifier, array.attribute, array.size
            ),
        ));
    }
    tracing::debug!(queries = queries.len(), "generated verifier queries");
    queries
}

/// UPPAAL `.q` file: each query preceded by its comment.
pub fn render_query_file(queries: &[Query]) -> String {
    let mut out = String::new();
    for query in queries {
        out.push_str(&format!("/*\n{}\n*/\n{}\n\n", query.comment, query.formula));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{translate_source, TranslateOptions};

    #[test]
    fn halting_agents_get_a_reachability_query() {
        let translation = translate_source(
            r#"
sp {count (state <s> ^superstate nil) --> (<s> ^count 1)}
sp {stop (state <s> ^count 1) --> (halt)}
"#,
            "halt.soar",
            &TranslateOptions::default(),
        )
        .expect("translation failed");
        let formulas: Vec<&str> = translation.queries.iter().map(|q| q.formula.as_str()).collect();
        assert_eq!(formulas[0], "E<> schd.Halted");
        assert!(formulas.contains(&"A[] not preferenceResolution.Conflict"));
        assert!(formulas.contains(&"E<> stop_0.Run_Assignment"));
        assert!(formulas.contains(&"A[] (AV_state_1_count[0] == EMPTY)"));
    }

    #[test]
    fn query_file_keeps_comments() {
        let queries = vec![Query::new("E<> schd.Halted", "reach halt")];
        assert_eq!(render_query_file(&queries), "/*\nreach halt\n*/\nE<> schd.Halted\n\n");
    }
}
