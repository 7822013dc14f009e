use soarta_dsl::ast;

use crate::augmented_tree::AugmentedTree;
use crate::memory::{constant_symbol, literal_kind, LiteralKind, MemoryValue, RelOp, Restriction};
use crate::rule::ConditionTest;
use crate::symbol_tree::Fragment;

use super::AnalysisContext;

/// Result of visiting one condition group.
pub(super) enum Visit {
    Fragment(Fragment),
    OutputLinkSentinel,
    Nothing,
}

/// A condition group after conjunctions have been flattened.
pub(super) struct ConditionGroup<'p> {
    pub(super) id_var: String,
    pub(super) conditions: &'p ast::IdConditions,
    pub(super) negated: bool,
}

pub(super) fn flatten_conditions<'p>(
    ctx: &mut AnalysisContext<'_>,
    conditions: &'p [ast::Spanned<ast::Condition>],
) -> Vec<ConditionGroup<'p>> {
    let mut out = Vec::new();
    for condition in conditions {
        let (group, negated) = match &condition.node {
            ast::Condition::Positive(group) => (group, false),
            ast::Condition::Negated(group) => (group, true),
            ast::Condition::Conjunction {
                negated: true,
                conditions: _,
            } => {
                ctx.unsupported("negated conjunction of conditions");
                continue;
            }
            ast::Condition::Conjunction {
                negated: false,
                conditions,
            } => {
                out.extend(flatten_conditions(ctx, conditions));
                continue;
            }
        };
        let Some(id_var) = group.id.as_variable() else {
            ctx.unsupported(format!("condition identifier '{}' is not a variable", group.id));
            continue;
        };
        out.push(ConditionGroup {
            id_var: id_var.to_string(),
            conditions: group,
            negated,
        });
    }
    out
}

/// The single variable introduced by `(state <s> ...)`.
pub(super) fn find_state_variable(
    ctx: &mut AnalysisContext<'_>,
    groups: &[ConditionGroup<'_>],
) -> Option<String> {
    let mut state_vars: Vec<&str> = Vec::new();
    for group in groups {
        if group.conditions.keyword == Some(ast::GoalKeyword::State)
            && !group.negated
            && !state_vars.contains(&group.id_var.as_str())
        {
            state_vars.push(&group.id_var);
        }
    }
    match state_vars.as_slice() {
        [single] => Some(single.to_string()),
        [] => {
            ctx.unsupported("no `state` condition");
            None
        }
        _ => {
            ctx.unsupported("more than one `state` condition");
            None
        }
    }
}

pub(super) fn visit_group(ctx: &mut AnalysisContext<'_>, group: &ConditionGroup<'_>) -> Visit {
    let tests = &group.conditions.tests;
    if group.negated && tests.len() != 1 {
        ctx.unsupported(format!(
            "negated condition on <{}> must have exactly one attribute test",
            group.id_var
        ));
        return Visit::Nothing;
    }

    if !group.negated {
        ctx.variables.reject(&group.id_var);
        if !ctx.hierarchy.contains(&group.id_var) {
            ctx.hierarchy.push(group.id_var.clone());
        }
    }
    ctx.check
        .entry(group.id_var.clone())
        .or_insert_with(|| AugmentedTree::new(MemoryValue::variable(&group.id_var)));

    if tests.iter().any(|t| touches_output_link(&t.node)) {
        return Visit::OutputLinkSentinel;
    }

    let mut fragment = Fragment::new(&group.id_var);
    for test in tests {
        let negated = group.negated || test.node.negated;
        visit_attr_value_tests(ctx, &group.id_var, &test.node, negated, &mut fragment);
    }

    if group.negated {
        Visit::Nothing
    } else {
        Visit::Fragment(fragment)
    }
}

fn touches_output_link(test: &ast::AttrValueTests) -> bool {
    test.attributes
        .iter()
        .any(|a| a.as_symbol() == Some("output-link"))
}

fn visit_attr_value_tests(
    ctx: &mut AnalysisContext<'_>,
    id_var: &str,
    test: &ast::AttrValueTests,
    negated: bool,
    fragment: &mut Fragment,
) {
    if !negated
        && test
            .attributes
            .iter()
            .any(|a| a.as_symbol() == Some("operator"))
    {
        ctx.mentions_operator = true;
    }

    let Some((last, intermediates)) = test.attributes.split_last() else {
        return;
    };

    if !intermediates.is_empty() {
        let complex_values = test.values.iter().any(|v| !is_plain(&v.test));
        let complex_attrs = test.attributes.iter().any(|a| !is_plain(a));
        if complex_values || complex_attrs {
            ctx.unsupported("dotted attribute chain combined with a conjunctive or disjunctive test");
            return;
        }
        if negated {
            ctx.unsupported("negated dotted attribute chain");
            return;
        }
    }

    let mut current = id_var.to_string();
    let mut names: Vec<String> = Vec::new();
    for step in intermediates {
        let Some(label) = resolve_attribute(ctx, step) else {
            return;
        };
        let base = label.as_literal().unwrap_or("attr").to_string();
        let hidden = ctx.hidden_var(&base);
        ctx.variables.reject(&hidden);
        ctx.hierarchy.push(hidden.clone());
        record(
            ctx,
            &current,
            label.clone(),
            MemoryValue::variable(&hidden),
            Vec::new(),
            false,
            false,
        );
        ctx.bound.insert(hidden.clone());
        if let Some(attr) = label.as_literal() {
            names.push(attr.to_string());
        }
        current = hidden;
    }

    let Some(attribute) = resolve_attribute(ctx, last) else {
        return;
    };
    let attr_node = {
        let mut node = &mut *fragment;
        for name in &names {
            node = node.add_child(name);
        }
        attribute.as_literal().map(|attr| node.add_child(attr))
    };

    let values: Vec<(MemoryValue, Vec<Restriction>, bool)> = if test.values.is_empty() {
        vec![(MemoryValue::Wildcard, Vec::new(), false)]
    } else {
        let mut resolved = Vec::with_capacity(test.values.len());
        for value in &test.values {
            let Some((v, restrictions)) = resolve_value(ctx, &value.test) else {
                return;
            };
            resolved.push((v, restrictions, value.acceptable));
        }
        resolved
    };

    if negated
        && values
            .iter()
            .any(|(_, r, _)| r.iter().any(|r| matches!(r, Restriction::Relation(..))))
    {
        ctx.unsupported("negated test with a relational restriction");
        return;
    }

    if let Some(node) = attr_node {
        for (value, _, _) in &values {
            if let Some(literal) = value.as_literal() {
                node.add_child(literal);
            }
        }
    }

    if !negated {
        if let Some(attr_var) = attribute.as_variable() {
            ctx.bound.insert(attr_var.to_string());
        }
    }
    for (value, restrictions, acceptable) in values {
        if !negated {
            if let Some(var) = value.as_variable() {
                ctx.bound.insert(var.to_string());
            }
        }
        record(
            ctx,
            &current,
            attribute.clone(),
            value,
            restrictions,
            negated,
            acceptable,
        );
    }
}

fn record(
    ctx: &mut AnalysisContext<'_>,
    id: &str,
    attribute: MemoryValue,
    value: MemoryValue,
    restrictions: Vec<Restriction>,
    negated: bool,
    acceptable: bool,
) {
    let mut tree_restrictions = restrictions.clone();
    if negated {
        tree_restrictions.push(Restriction::Negated);
    }
    ctx.check
        .entry(id.to_string())
        .or_insert_with(|| AugmentedTree::new(MemoryValue::variable(id)))
        .add_value(
            attribute.clone(),
            AugmentedTree::with_restrictions(value.clone(), tree_restrictions),
        );
    ctx.conditions.push(ConditionTest {
        id: id.to_string(),
        attribute,
        value,
        restrictions,
        negated,
        acceptable,
    });
}

fn is_plain(test: &ast::Test) -> bool {
    matches!(
        test,
        ast::Test::Simple(ast::SimpleTest::Relational {
            relation: ast::Relation::Equal,
            ..
        })
    )
}

fn register_literals(ctx: &mut AnalysisContext<'_>, constants: &[ast::Constant]) -> String {
    let literals: Vec<String> = constants.iter().map(constant_symbol).collect();
    ctx.registry.register(&literals)
}

fn resolve_attribute(ctx: &mut AnalysisContext<'_>, test: &ast::Test) -> Option<MemoryValue> {
    match test {
        ast::Test::Simple(ast::SimpleTest::Relational {
            relation: ast::Relation::Equal,
            value,
        }) => Some(single_value(ctx, value)),
        ast::Test::Simple(ast::SimpleTest::Relational { .. }) => {
            ctx.unsupported(format!("relational test on attribute '{test}'"));
            None
        }
        ast::Test::Simple(ast::SimpleTest::Disjunction(constants)) => {
            let array = register_literals(ctx, constants);
            let hidden = ctx.hidden_var("attr");
            ctx.variables.see(&hidden);
            ctx.disjunctions.insert(hidden.clone(), array);
            Some(MemoryValue::RuleVariable(hidden))
        }
        ast::Test::Conjunctive(parts) => {
            let mut variable: Option<String> = None;
            let mut literals: Vec<ast::Constant> = Vec::new();
            for part in parts {
                match part {
                    ast::SimpleTest::Relational {
                        relation: ast::Relation::Equal,
                        value: ast::SingleTest::Variable(v),
                    } if variable.is_none() => variable = Some(v.clone()),
                    ast::SimpleTest::Relational {
                        relation: ast::Relation::Equal,
                        value: ast::SingleTest::Constant(c),
                    } => literals.push(c.clone()),
                    ast::SimpleTest::Disjunction(constants) if literals.is_empty() => {
                        literals.extend(constants.iter().cloned())
                    }
                    _ => {
                        ctx.unsupported(format!("conjunctive attribute test '{test}'"));
                        return None;
                    }
                }
            }
            let var = match variable {
                Some(v) => v,
                None => ctx.hidden_var("attr"),
            };
            ctx.variables.see(&var);
            if !literals.is_empty() {
                let array = register_literals(ctx, &literals);
                ctx.disjunctions.insert(var.clone(), array);
            }
            Some(MemoryValue::RuleVariable(var))
        }
    }
}

fn single_value(ctx: &mut AnalysisContext<'_>, value: &ast::SingleTest) -> MemoryValue {
    match value {
        ast::SingleTest::Variable(v) => {
            ctx.variables.see(v);
            MemoryValue::variable(v)
        }
        ast::SingleTest::Constant(c) => MemoryValue::Literal(constant_symbol(c)),
    }
}

fn relation(
    ctx: &mut AnalysisContext<'_>,
    relation: ast::Relation,
    operand: &ast::SingleTest,
) -> Option<Restriction> {
    let op = RelOp::from_relation(relation)?;
    let operand = single_value(ctx, operand);
    if op.is_numeric() {
        if let Some(literal) = operand.as_literal() {
            if literal_kind(literal) == LiteralKind::Float {
                ctx.unsupported(format!("relational test against float literal {literal}"));
                return None;
            }
        }
    }
    Some(Restriction::Relation(op, operand))
}

/// Resolve a value test into the tested value and its restrictions.
fn resolve_value(
    ctx: &mut AnalysisContext<'_>,
    test: &ast::Test,
) -> Option<(MemoryValue, Vec<Restriction>)> {
    match test {
        ast::Test::Simple(ast::SimpleTest::Relational {
            relation: ast::Relation::Equal,
            value,
        }) => Some((single_value(ctx, value), Vec::new())),
        ast::Test::Simple(ast::SimpleTest::Relational {
            relation: rel,
            value,
        }) => {
            let restriction = relation(ctx, *rel, value)?;
            Some((MemoryValue::Wildcard, vec![restriction]))
        }
        ast::Test::Simple(ast::SimpleTest::Disjunction(constants)) => {
            let array = register_literals(ctx, constants);
            Some((MemoryValue::Wildcard, vec![Restriction::LiteralSet(array)]))
        }
        ast::Test::Conjunctive(parts) => {
            let mut variable: Option<String> = None;
            let mut literals: Vec<ast::Constant> = Vec::new();
            let mut restrictions = Vec::new();
            for part in parts {
                match part {
                    ast::SimpleTest::Relational {
                        relation: ast::Relation::Equal,
                        value: ast::SingleTest::Variable(v),
                    } => {
                        if variable.is_some() {
                            ctx.unsupported(format!("more than one variable in '{test}'"));
                            return None;
                        }
                        ctx.variables.see(v);
                        variable = Some(v.clone());
                    }
                    // A bare literal inside braces is an equality test.
                    ast::SimpleTest::Relational {
                        relation: ast::Relation::Equal,
                        value: ast::SingleTest::Constant(c),
                    } => literals.push(c.clone()),
                    ast::SimpleTest::Relational { relation: rel, value } => {
                        restrictions.push(relation(ctx, *rel, value)?);
                    }
                    ast::SimpleTest::Disjunction(constants) => {
                        if !literals.is_empty() {
                            ctx.unsupported(format!("more than one literal set in '{test}'"));
                            return None;
                        }
                        literals.extend(constants.iter().cloned());
                    }
                }
            }
            if !literals.is_empty() {
                let array = register_literals(ctx, &literals);
                if let Some(var) = &variable {
                    ctx.disjunctions.insert(var.clone(), array.clone());
                }
                restrictions.push(Restriction::LiteralSet(array));
            }
            let value = variable.map(MemoryValue::RuleVariable).unwrap_or(MemoryValue::Wildcard);
            Some((value, restrictions))
        }
    }
}
