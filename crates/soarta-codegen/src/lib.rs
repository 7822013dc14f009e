#![doc = include_str!("../README.md")]

//! UPPAAL timed-automata generation from analysed Soar rules.
//!
//! The generator takes the analysed rules, the matcher's value-count forest
//! and the identity table, and produces a [`network::Network`]: global
//! declarations with one fixed-size array per identifier/attribute pair, one
//! template per rule, a scheduler and a preference-resolution process.

mod conditions;
mod globals;
pub mod naming;
pub mod network;
pub mod preference;
mod rule_template;
pub mod scheduler;
pub mod sizing;

use indexmap::IndexSet;
use serde::Deserialize;
use soarta_ir::disjunction::DisjunctionRegistry;
use soarta_ir::identity::IdentityTable;
use soarta_ir::rule::RuleAnalysis;
use soarta_ir::value_count::{architecture_wmes, ValueCountForest};

use naming::SymbolNames;
use network::Network;
use sizing::Sizing;

/// Errors returned by [`generate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum GenerationError {
    /// A variable, attribute or literal has no entry in the identity table.
    #[error("rule '{rule}' refers to {symbol}, which has no identity")]
    #[diagnostic(code(soarta::codegen::unresolvable_identity))]
    UnresolvableIdentity { rule: String, symbol: String },
    /// Some condition never becomes evaluable.
    #[error("conditions of rule '{rule}' cannot be put in evaluation order")]
    #[diagnostic(code(soarta::codegen::unorderable_conditions))]
    UnorderableConditions { rule: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorOptions {
    /// Firings allowed per scheduler wave before the rest are deferred.
    pub max_firings_per_cycle: u32,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            max_firings_per_cycle: 10,
        }
    }
}

/// Everything [`generate`] produces.
#[derive(Debug, Clone)]
pub struct GeneratedModel {
    pub network: Network,
    pub sizing: Sizing,
    /// Process name of each rule, in rule order.
    pub rule_instances: Vec<String>,
}

/// Shared, read-mostly inputs of the individual emitters.
pub(crate) struct GenContext<'a> {
    pub(crate) rules: &'a [RuleAnalysis],
    pub(crate) registry: &'a DisjunctionRegistry,
    pub(crate) table: &'a IdentityTable,
    pub(crate) names: SymbolNames,
    pub(crate) sizing: Sizing,
    /// Declared names of every operator identity, in proposal order.
    pub(crate) operators: Vec<String>,
    pub(crate) architecture: Vec<(&'static str, &'static str)>,
    pub(crate) options: &'a GeneratorOptions,
}

impl GenContext<'_> {
    /// Declared name of `literal`.
    pub(crate) fn literal(&self, rule: &str, literal: &str) -> Result<String, GenerationError> {
        self.names
            .literal(literal)
            .map(str::to_string)
            .ok_or_else(|| GenerationError::UnresolvableIdentity {
                rule: rule.to_string(),
                symbol: literal.to_string(),
            })
    }

    /// Declared name of the identity `rule` gives to `var`.
    pub(crate) fn identity(&self, rule: &str, var: &str) -> Result<String, GenerationError> {
        self.table
            .identity_for(rule, var)
            .and_then(|i| self.names.identity(&i.name))
            .map(str::to_string)
            .ok_or_else(|| GenerationError::UnresolvableIdentity {
                rule: rule.to_string(),
                symbol: format!("<{var}>"),
            })
    }

    pub(crate) fn state_identity(&self) -> &str {
        self.names
            .identity(&self.table.state_identity().name)
            .unwrap_or("state_1")
    }

    /// Row of `array` in the `DISJUNCTIONS` table.
    pub(crate) fn disjunction_row(&self, array: &str) -> Option<usize> {
        self.registry.iter().position(|(name, _)| name == array)
    }
}

/// Generate the complete network.
///
/// Fails without producing any template when some symbol cannot be resolved.
pub fn generate(
    rules: &[RuleAnalysis],
    registry: &DisjunctionRegistry,
    forest: &ValueCountForest,
    table: &IdentityTable,
    options: &GeneratorOptions,
) -> Result<GeneratedModel, GenerationError> {
    let mut names = SymbolNames::new(table, rules);
    let sizing = Sizing::compute(forest, table, &mut names)?;

    let mut ctx = GenContext {
        rules,
        registry,
        table,
        names,
        sizing,
        operators: Vec::new(),
        architecture: architecture_wmes(rules),
        options,
    };
    ctx.operators = operator_constants(&ctx)?;

    let global_declaration = globals::declaration(&ctx)?;

    let mut templates = Vec::with_capacity(rules.len() + 2);
    let mut instances = Vec::with_capacity(rules.len() + 2);
    let mut system_block = String::new();
    for rule in rules {
        let template = rule_template::build(&ctx, rule)?;
        let instance = ctx
            .names
            .instance(&rule.name)
            .unwrap_or(template.name.as_str())
            .to_string();
        system_block.push_str(&format!("{instance} = {}();\n", template.name));
        instances.push(instance);
        templates.push(template);
    }
    let rule_instances = instances.clone();

    templates.push(scheduler::build());
    templates.push(preference::build());
    system_block.push_str(&format!("{} = {}();\n", scheduler::INSTANCE, scheduler::TEMPLATE));
    system_block.push_str(&format!(
        "{} = {}();\n",
        preference::INSTANCE,
        preference::TEMPLATE
    ));
    instances.push(scheduler::INSTANCE.to_string());
    instances.push(preference::INSTANCE.to_string());
    system_block.push_str(&format!("system {};\n", instances.join(", ")));

    tracing::debug!(
        templates = templates.len(),
        arrays = ctx.sizing.arrays().len(),
        operators = ctx.operators.len(),
        "generated network"
    );

    Ok(GeneratedModel {
        network: Network {
            global_declaration,
            templates,
            system_block,
        },
        sizing: ctx.sizing,
        rule_instances,
    })
}

fn operator_constants(ctx: &GenContext<'_>) -> Result<Vec<String>, GenerationError> {
    let mut operators: IndexSet<String> = IndexSet::new();
    for rule in ctx.rules {
        for var in rule.writes_operator_proposals() {
            operators.insert(ctx.identity(&rule.name, var)?);
        }
    }
    Ok(operators.into_iter().collect())
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use soarta_ir::analysis::analyze;
    use soarta_ir::matcher::cross_match;

    pub(crate) fn generate_source(src: &str) -> GeneratedModel {
        let rules = soarta_dsl::parse(src, "test.soar").expect("parse failed");
        let analysis = analyze(&rules).expect("analysis failed");
        let outcome = cross_match(&analysis.rules, &analysis.disjunctions);
        let table = IdentityTable::assign(&analysis.rules, &analysis.disjunctions, &analysis.shape);
        generate(
            &analysis.rules,
            &analysis.disjunctions,
            &outcome.forest,
            &table,
            &GeneratorOptions::default(),
        )
        .expect("generation failed")
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::generate_source;

    #[test]
    fn system_block_lists_every_process() {
        let generated = generate_source(
            r#"
sp {propose*go (state <s> ^superstate nil) --> (<s> ^operator <o> +) (<o> ^name go)}
sp {apply*go (state <s> ^operator <o>) (<o> ^name go) --> (<s> ^done yes)}
"#,
        );
        let system = &generated.network.system_block;
        assert!(system.contains("propose_go_0 = propose_go();"));
        assert!(system.contains("apply_go_0 = apply_go();"));
        assert!(system.contains("schd = scheduler();"));
        assert!(system.contains("preferenceResolution = preferenceResolutionTemplate();"));
        assert!(system.trim_end().ends_with(
            "system propose_go_0, apply_go_0, schd, preferenceResolution;"
        ));
        assert_eq!(generated.network.templates.len(), 4);
    }

    #[test]
    fn operator_proposals_are_collected() {
        let generated = generate_source(
            r#"
sp {propose*a (state <s> ^superstate nil) --> (<s> ^operator <o> +) (<o> ^name a)}
sp {propose*b (state <s> ^superstate nil) --> (<s> ^operator <o> + =) (<o> ^name b)}
"#,
        );
        let decl = &generated.network.global_declaration;
        assert!(decl.contains("const int N = 2;"));
        assert!(decl.contains("const int OPERATOR_IDS[N] = {state_operator_1, state_operator_2};"));
    }
}
