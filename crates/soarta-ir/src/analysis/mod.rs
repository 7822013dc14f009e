//! Rule analysis: from parsed productions to per-rule augmented trees,
//! variable dictionaries and the global working-memory shape.

mod actions;
mod conditions;
mod support;

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::Serialize;
use thiserror::Error;

use soarta_dsl::ast::{self, Span};

use crate::augmented_tree::AugmentedTree;
use crate::disjunction::{DisjunctionRegistry, DisjunctionTable};
use crate::production_vars::ProductionVariables;
use crate::rule::{ConditionTest, RuleAction, RuleAnalysis};
use crate::symbol_tree::{Fragment, NodeId, SymbolTree};

use actions::*;
use conditions::*;
use support::*;

pub const STATE_ROOT: &str = "state";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("Rule '{rule}' uses unbound variable <{variable}>")]
    UnboundVariable {
        rule: String,
        variable: String,
        span: Span,
    },
}

impl AnalysisError {
    pub fn span(&self) -> Span {
        match self {
            AnalysisError::UnboundVariable { span, .. } => *span,
        }
    }
}

/// An analysis error enriched with source span information for pretty-printed diagnostics.
#[derive(Debug, Error, Diagnostic)]
#[error("{inner}")]
#[diagnostic(
    code(soarta::analysis::unbound_variable),
    help("every variable on the action side must be bound by a condition or created as a new identifier")
)]
#[allow(unused_assignments)]
pub struct SpannedAnalysisError {
    #[source_code]
    pub src: NamedSource<String>,
    pub inner: AnalysisError,
    #[label("here")]
    pub span: Option<SourceSpan>,
}

impl SpannedAnalysisError {
    fn new(err: AnalysisError, source: &str, filename: &str) -> Self {
        let span = err.span();
        Self {
            src: NamedSource::new(filename, source.to_string()),
            span: (span.end > span.start)
                .then(|| SourceSpan::new(span.start.into(), span.end - span.start)),
            inner: err,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WarningKind {
    Unsupported,
    OutputLink,
}

/// A rule that was skipped; translation continues without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisWarning {
    pub rule: String,
    pub kind: WarningKind,
    pub reasons: Vec<String>,
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            WarningKind::OutputLink => {
                write!(f, "rule '{}' skipped: writes to or reads the output-link", self.rule)
            }
            WarningKind::Unsupported => {
                write!(f, "rule '{}' skipped: {}", self.rule, self.reasons.join("; "))
            }
        }
    }
}

/// Result of analysing a whole rule set.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub shape: SymbolTree,
    pub rules: Vec<RuleAnalysis>,
    pub disjunctions: DisjunctionRegistry,
    pub warnings: Vec<AnalysisWarning>,
}

impl Analysis {
    pub fn rule(&self, name: &str) -> Option<&RuleAnalysis> {
        self.rules.iter().find(|r| r.name == name)
    }
}

/// State threaded through the traversal of one production.
pub(crate) struct AnalysisContext<'a> {
    pub(crate) rule: &'a str,
    pub(crate) registry: DisjunctionRegistry,
    pub(crate) state_var: String,
    pub(crate) bound: IndexSet<String>,
    pub(crate) hierarchy: Vec<String>,
    pub(crate) check: IndexMap<String, AugmentedTree>,
    pub(crate) create: IndexMap<String, AugmentedTree>,
    pub(crate) update: IndexMap<String, AugmentedTree>,
    pub(crate) variables: ProductionVariables,
    pub(crate) disjunctions: DisjunctionTable,
    pub(crate) conditions: Vec<ConditionTest>,
    pub(crate) actions: Vec<RuleAction>,
    pub(crate) created: IndexSet<String>,
    pub(crate) fragments: Vec<(String, Fragment)>,
    pub(crate) unsupported: Vec<String>,
    pub(crate) mentions_operator: bool,
    pub(crate) halts: bool,
    hidden: usize,
}

impl<'a> AnalysisContext<'a> {
    fn new(rule: &'a str, registry: &DisjunctionRegistry) -> Self {
        Self {
            rule,
            registry: registry.clone(),
            state_var: String::new(),
            bound: IndexSet::new(),
            hierarchy: Vec::new(),
            check: IndexMap::new(),
            create: IndexMap::new(),
            update: IndexMap::new(),
            variables: ProductionVariables::new(),
            disjunctions: DisjunctionTable::new(),
            conditions: Vec::new(),
            actions: Vec::new(),
            created: IndexSet::new(),
            fragments: Vec::new(),
            unsupported: Vec::new(),
            mentions_operator: false,
            halts: false,
            hidden: 0,
        }
    }

    /// Fresh hidden variable for a dotted-chain step or an anonymous attribute.
    pub(crate) fn hidden_var(&mut self, base: &str) -> String {
        self.hidden += 1;
        format!("{base}#{}", self.hidden)
    }

    pub(crate) fn unsupported(&mut self, reason: impl Into<String>) {
        self.unsupported.push(reason.into());
    }

    pub(crate) fn unbound(&self, variable: &str, span: Span) -> AnalysisError {
        AnalysisError::UnboundVariable {
            rule: self.rule.to_string(),
            variable: variable.to_string(),
            span,
        }
    }

    pub(crate) fn is_state(&self, var: &str) -> bool {
        var == self.state_var
    }
}

/// Analyse every production of `rules`.
///
/// Unsupported rules are skipped with a warning; an unbound action variable
/// aborts the whole batch.
pub fn analyze(rules: &ast::RuleSet) -> Result<Analysis, AnalysisError> {
    let mut analysis = Analysis {
        shape: SymbolTree::new(STATE_ROOT),
        rules: Vec::new(),
        disjunctions: DisjunctionRegistry::new(),
        warnings: Vec::new(),
    };

    for production in &rules.productions {
        match analyze_production(production, &analysis.disjunctions)? {
            Outcome::Accepted(ctx_result) => {
                let AcceptedRule {
                    mut rule,
                    registry,
                    fragments,
                } = *ctx_result;
                analysis.disjunctions = registry;
                rule.paths = place_in_shape(&mut analysis.shape, &rule, &fragments);
                tracing::debug!(
                    rule = %rule.name,
                    conditions = rule.conditions.len(),
                    actions = rule.actions.len(),
                    o_supported = rule.o_supported,
                    "analysed rule"
                );
                analysis.rules.push(rule);
            }
            Outcome::Skipped(warning) => {
                tracing::warn!("{warning}");
                analysis.warnings.push(warning);
            }
        }
    }

    Ok(analysis)
}

/// Analyse with rich source-span diagnostics.
pub fn analyze_with_source(
    rules: &ast::RuleSet,
    source: &str,
    filename: &str,
) -> Result<Analysis, SpannedAnalysisError> {
    analyze(rules).map_err(|err| SpannedAnalysisError::new(err, source, filename))
}

struct AcceptedRule {
    rule: RuleAnalysis,
    registry: DisjunctionRegistry,
    fragments: Vec<(String, Fragment)>,
}

enum Outcome {
    Accepted(Box<AcceptedRule>),
    Skipped(AnalysisWarning),
}

fn skipped(ctx: &AnalysisContext<'_>, kind: WarningKind) -> Outcome {
    Outcome::Skipped(AnalysisWarning {
        rule: ctx.rule.to_string(),
        kind,
        reasons: ctx.unsupported.clone(),
    })
}

fn analyze_production(
    production: &ast::Spanned<ast::Production>,
    registry: &DisjunctionRegistry,
) -> Result<Outcome, AnalysisError> {
    let prod = &production.node;
    let mut ctx = AnalysisContext::new(&prod.name, registry);

    let groups = flatten_conditions(&mut ctx, &prod.conditions);
    let Some(state_var) = find_state_variable(&mut ctx, &groups) else {
        return Ok(skipped(&ctx, WarningKind::Unsupported));
    };
    ctx.state_var = state_var.clone();
    ctx.bound.insert(state_var.clone());
    ctx.hierarchy.push(state_var.clone());
    ctx.variables.reject(&state_var);

    let mut pending: Vec<&ConditionGroup<'_>> = groups.iter().collect();
    let mut output_link = false;
    loop {
        let Some(pos) = pending
            .iter()
            .position(|g| ctx.bound.contains(g.id_var.as_str()))
        else {
            break;
        };
        let group = pending.remove(pos);
        match visit_group(&mut ctx, group) {
            Visit::Fragment(fragment) => ctx.fragments.push((group.id_var.clone(), fragment)),
            Visit::OutputLinkSentinel => output_link = true,
            Visit::Nothing => {}
        }
    }
    for group in pending {
        ctx.unsupported(format!(
            "condition on <{}> is not connected to the state",
            group.id_var
        ));
    }

    if output_link {
        ctx.unsupported.clear();
        return Ok(skipped(&ctx, WarningKind::OutputLink));
    }

    process_actions(&mut ctx, &prod.actions)?;

    let o_supported = o_support(prod, ctx.mentions_operator);

    let rule = RuleAnalysis {
        name: prod.name.clone(),
        span: production.span,
        state_var,
        hierarchy: ctx.hierarchy.clone(),
        check: std::mem::take(&mut ctx.check),
        create: std::mem::take(&mut ctx.create),
        update: std::mem::take(&mut ctx.update),
        paths: IndexMap::new(),
        variables: {
            let mut vars = ctx.variables.clone();
            vars.clean();
            vars
        },
        disjunctions: ctx.disjunctions.clone(),
        o_supported,
        conditions: std::mem::take(&mut ctx.conditions),
        actions: std::mem::take(&mut ctx.actions),
        created: ctx.created.clone(),
        halts: ctx.halts,
    };

    if rule.evaluation_order().is_none() {
        ctx.unsupported("conditions cannot be ordered so that every variable is bound before use");
    }
    if !ctx.unsupported.is_empty() {
        return Ok(skipped(&ctx, WarningKind::Unsupported));
    }

    Ok(Outcome::Accepted(Box::new(AcceptedRule {
        rule,
        registry: ctx.registry,
        fragments: ctx.fragments,
    })))
}

/// Graft the rule's condition fragments and action writes onto the global
/// shape and return the memory path of every identifier variable.
fn place_in_shape(
    shape: &mut SymbolTree,
    rule: &RuleAnalysis,
    fragments: &[(String, Fragment)],
) -> IndexMap<String, NodeId> {
    let mut paths: IndexMap<String, NodeId> = IndexMap::new();
    paths.insert(rule.state_var.clone(), shape.root());

    for cond in &rule.conditions {
        place_value(shape, &mut paths, &cond.id, &cond.attribute, &cond.value);
    }
    for (id, fragment) in fragments {
        if let Some(&node) = paths.get(id) {
            for child in &fragment.children {
                shape.graft(node, child);
            }
        }
    }

    // Created identifiers may be written before the action that attaches them.
    for _ in 0..2 {
        for action in &rule.actions {
            if let RuleAction::Add {
                id,
                attribute,
                value,
            }
            | RuleAction::Prefer {
                id,
                attribute,
                value,
                ..
            } = action
            {
                place_value(shape, &mut paths, id, attribute, &value.as_memory_value());
            }
        }
    }

    for var in rule.variables.rejected.iter() {
        if !paths.contains_key(var) {
            let node = shape.add_child(shape.root(), var);
            paths.insert(var.clone(), node);
        }
    }
    paths.retain(|var, _| rule.variables.is_rejected(var));
    paths
}

fn place_value(
    shape: &mut SymbolTree,
    paths: &mut IndexMap<String, NodeId>,
    id: &str,
    attribute: &crate::memory::MemoryValue,
    value: &crate::memory::MemoryValue,
) {
    let (Some(&node), Some(attr)) = (paths.get(id), attribute.as_literal()) else {
        return;
    };
    let attr_node = shape.add_child(node, attr);
    match value {
        crate::memory::MemoryValue::RuleVariable(v) => {
            paths.entry(v.clone()).or_insert(attr_node);
        }
        crate::memory::MemoryValue::Literal(l) => {
            shape.add_child(attr_node, l);
        }
        crate::memory::MemoryValue::Wildcard => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryValue;

    fn analyse(src: &str) -> Analysis {
        let rules = soarta_dsl::parse(src, "test.soar").expect("parse failed");
        analyze(&rules).expect("analysis failed")
    }

    #[test]
    fn proposal_rule_is_split_into_check_and_create() {
        let analysis = analyse(
            r#"
sp {propose*move
   (state <s> ^task go)
-->
   (<s> ^operator <o> +)
   (<o> ^name move)}
"#,
        );
        let rule = analysis.rule("propose*move").unwrap();
        assert_eq!(rule.state_var, "s");
        assert!(rule.check.contains_key("s"));
        assert!(rule.create.contains_key("s"));
        assert!(rule.create.contains_key("o"));
        assert!(rule.update.is_empty());
        assert!(rule.created.contains("o"));
        assert!(rule.variables.is_rejected("o"));
        assert!(!rule.o_supported);
    }

    #[test]
    fn paths_follow_attributes() {
        let analysis = analyse(
            r#"
sp {apply*move
   (state <s> ^operator <o>)
   (<o> ^name move ^target <t>)
-->
   (<t> ^visited yes)}
"#,
        );
        let rule = analysis.rule("apply*move").unwrap();
        assert_eq!(analysis.shape.path_of(rule.paths["o"]), "state_operator");
        assert_eq!(analysis.shape.path_of(rule.paths["t"]), "state_operator_target");
        assert!(rule.update.contains_key("t"));
        assert_eq!(rule.hierarchy, vec!["s", "o", "t"]);
    }

    #[test]
    fn output_link_rules_are_skipped() {
        let analysis = analyse(
            r#"
sp {send
   (state <s> ^io.output-link <ol>)
-->
   (<ol> ^command go)}
"#,
        );
        assert!(analysis.rules.is_empty());
        assert_eq!(analysis.warnings.len(), 1);
        assert_eq!(analysis.warnings[0].kind, WarningKind::OutputLink);
    }

    #[test]
    fn negated_groups_bind_nothing() {
        let analysis = analyse(
            r#"
sp {init
   (state <s> ^superstate nil)
  -(<s> ^count)
-->
   (<s> ^count 0)}
"#,
        );
        let rule = analysis.rule("init").unwrap();
        let negated: Vec<_> = rule.conditions.iter().filter(|c| c.negated).collect();
        assert_eq!(negated.len(), 1);
        assert_eq!(negated[0].value, MemoryValue::Wildcard);
    }

    #[test]
    fn unbound_action_variable_is_fatal() {
        let rules = soarta_dsl::parse(
            "sp {bad (state <s> ^a 1) --> (<x> ^b 2)}",
            "bad.soar",
        )
        .expect("parse failed");
        let err = analyze(&rules).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::UnboundVariable {
                rule: "bad".into(),
                variable: "x".into(),
                span: err.span(),
            }
        );
    }

    #[test]
    fn skipped_rules_do_not_register_disjunctions() {
        let analysis = analyse(
            r#"
sp {skipped
   (state <s> ^dir << north south >>)
   (<z> ^x 1)
-->
   (<s> ^moved yes)}
"#,
        );
        assert!(analysis.rules.is_empty());
        assert!(analysis.disjunctions.is_empty());
    }
}
