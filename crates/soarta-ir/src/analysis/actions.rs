use soarta_dsl::ast::{self, Span};

use crate::augmented_tree::AugmentedTree;
use crate::memory::{constant_symbol, MemoryValue};
use crate::rule::{ActionValue, ArithOp, PreferenceKind, RuleAction};

use super::{AnalysisContext, AnalysisError};

const OPERATOR: &str = "operator";

/// Walk the action side: classify every target as create or update, record
/// normalised actions, and fail on variables nothing binds.
pub(super) fn process_actions(
    ctx: &mut AnalysisContext<'_>,
    actions: &[ast::Spanned<ast::Action>],
) -> Result<(), AnalysisError> {
    collect_created(ctx, actions);

    for action in actions {
        match &action.node {
            ast::Action::Make { id, makes } => {
                if !is_known(ctx, id) {
                    return Err(ctx.unbound(id, action.span));
                }
                ctx.variables.reject(id);
                for make in makes {
                    process_make(ctx, id, make, action.span)?;
                }
            }
            ast::Action::Call(call) if call.name == "halt" => {
                ctx.halts = true;
                ctx.actions.push(RuleAction::Halt);
            }
            ast::Action::Call(call) => {
                for arg in &call.args {
                    action_value(ctx, arg, action.span)?;
                }
                ctx.actions.push(RuleAction::SideEffect(call.name.clone()));
            }
        }
    }

    // Bound identifiers written by this rule take part in matching.
    let update_roots: Vec<String> = ctx.update.keys().cloned().collect();
    for var in update_roots {
        if !ctx.hierarchy.contains(&var) {
            ctx.hierarchy.push(var);
        }
    }
    Ok(())
}

fn is_known(ctx: &AnalysisContext<'_>, var: &str) -> bool {
    ctx.bound.contains(var) || ctx.created.contains(var)
}

/// Action-side values that no condition binds are new identifiers.
fn collect_created(ctx: &mut AnalysisContext<'_>, actions: &[ast::Spanned<ast::Action>]) {
    for action in actions {
        let ast::Action::Make { makes, .. } = &action.node else {
            continue;
        };
        for make in makes {
            for value in &make.values {
                if let ast::RhsValue::Variable(v) = &value.value {
                    if !ctx.bound.contains(v.as_str()) && ctx.created.insert(v.clone()) {
                        ctx.variables.reject(v);
                    }
                }
            }
        }
    }
}

fn process_make(
    ctx: &mut AnalysisContext<'_>,
    id: &str,
    make: &ast::AttrValueMake,
    span: Span,
) -> Result<(), AnalysisError> {
    let Some((last, intermediates)) = make.attributes.split_last() else {
        return Ok(());
    };

    let mut current = id.to_string();
    for step in intermediates {
        let Some(attribute) = action_attribute(ctx, step, span)? else {
            return Ok(());
        };
        let base = attribute.as_literal().unwrap_or("attr").to_string();
        let hidden = ctx.hidden_var(&base);
        ctx.created.insert(hidden.clone());
        ctx.variables.reject(&hidden);
        let value = ActionValue::Variable(hidden.clone());
        write_tree(ctx, &current, &attribute, &value);
        ctx.actions.push(RuleAction::Add {
            id: current.clone(),
            attribute,
            value,
        });
        current = hidden;
    }

    let Some(attribute) = action_attribute(ctx, last, span)? else {
        return Ok(());
    };
    let is_operator = attribute.as_literal() == Some(OPERATOR);

    for value_make in &make.values {
        let value = action_value(ctx, &value_make.value, span)?;
        if is_operator {
            let mut preferences = Vec::with_capacity(value_make.preferences.len().max(1));
            for preference in &value_make.preferences {
                if let Some(kind) = preference_kind(ctx, preference, span)? {
                    preferences.push(kind);
                }
            }
            if value_make.preferences.is_empty() {
                preferences.push(PreferenceKind::Acceptable);
            }
            for preference in preferences {
                if preference == PreferenceKind::Acceptable {
                    write_tree(ctx, &current, &attribute, &value);
                }
                ctx.actions.push(RuleAction::Prefer {
                    id: current.clone(),
                    attribute: attribute.clone(),
                    value: value.clone(),
                    preference,
                });
            }
            continue;
        }

        let rejects = value_make
            .preferences
            .iter()
            .any(|p| *p == ast::Preference::Unary(ast::UnaryPreference::Reject));
        if rejects {
            ctx.actions.push(RuleAction::Remove {
                id: current.clone(),
                attribute: attribute.clone(),
                value,
            });
        } else {
            write_tree(ctx, &current, &attribute, &value);
            ctx.actions.push(RuleAction::Add {
                id: current.clone(),
                attribute: attribute.clone(),
                value,
            });
        }
    }
    Ok(())
}

/// Record a write in the create tree (state or new identifier) or the update
/// tree (identifier bound by the conditions).
fn write_tree(ctx: &mut AnalysisContext<'_>, id: &str, attribute: &MemoryValue, value: &ActionValue) {
    let creates = ctx.is_state(id) || ctx.created.contains(id);
    let trees = if creates {
        &mut ctx.create
    } else {
        &mut ctx.update
    };
    trees
        .entry(id.to_string())
        .or_insert_with(|| AugmentedTree::new(MemoryValue::variable(id)))
        .add_value(
            attribute.clone(),
            AugmentedTree::new(value.as_memory_value()),
        );
}

/// `Ok(None)` when the attribute makes the rule unsupported.
fn action_attribute(
    ctx: &mut AnalysisContext<'_>,
    attribute: &ast::RhsValue,
    span: Span,
) -> Result<Option<MemoryValue>, AnalysisError> {
    match attribute {
        ast::RhsValue::Constant(c) => Ok(Some(MemoryValue::Literal(constant_symbol(c)))),
        ast::RhsValue::Variable(v) => {
            if !is_known(ctx, v) {
                return Err(ctx.unbound(v, span));
            }
            if !ctx.disjunctions.contains_key(v.as_str()) {
                ctx.unsupported(format!(
                    "action attribute <{v}> is not restricted to a literal set"
                ));
                return Ok(None);
            }
            Ok(Some(MemoryValue::variable(v)))
        }
        ast::RhsValue::Call(call) => {
            ctx.unsupported(format!("computed action attribute {call}"));
            Ok(None)
        }
    }
}

fn action_value(
    ctx: &mut AnalysisContext<'_>,
    value: &ast::RhsValue,
    span: Span,
) -> Result<ActionValue, AnalysisError> {
    match value {
        ast::RhsValue::Constant(c) => Ok(ActionValue::Literal(constant_symbol(c))),
        ast::RhsValue::Variable(v) => {
            if !is_known(ctx, v) {
                return Err(ctx.unbound(v, span));
            }
            ctx.variables.see(v);
            Ok(ActionValue::Variable(v.clone()))
        }
        ast::RhsValue::Call(call) => {
            let mut args = Vec::with_capacity(call.args.len());
            for arg in &call.args {
                args.push(action_value(ctx, arg, span)?);
            }
            match ArithOp::from_function(&call.name, args.len()) {
                Some(op) if !args.is_empty() => Ok(ActionValue::Compute { op, args }),
                _ => Ok(ActionValue::Unsupported(call.name.clone())),
            }
        }
    }
}

fn preference_kind(
    ctx: &mut AnalysisContext<'_>,
    preference: &ast::Preference,
    span: Span,
) -> Result<Option<PreferenceKind>, AnalysisError> {
    use ast::{BinaryPreference, Preference, UnaryPreference};

    let kind = match preference {
        Preference::Unary(unary) => match unary {
            UnaryPreference::Acceptable => PreferenceKind::Acceptable,
            UnaryPreference::Reject => PreferenceKind::Reject,
            UnaryPreference::Require => PreferenceKind::Require,
            UnaryPreference::Prohibit => PreferenceKind::Prohibit,
            UnaryPreference::Best => PreferenceKind::Best,
            UnaryPreference::Worst => PreferenceKind::Worst,
            UnaryPreference::Indifferent => PreferenceKind::Indifferent,
        },
        Preference::Binary(binary, operand) => match (binary, operand) {
            (_, ast::RhsValue::Variable(v)) if !is_known(ctx, v) => {
                return Err(ctx.unbound(v, span));
            }
            (BinaryPreference::Better, ast::RhsValue::Variable(v)) => {
                PreferenceKind::Better(v.clone())
            }
            (BinaryPreference::Worse, ast::RhsValue::Variable(v)) => {
                PreferenceKind::Worse(v.clone())
            }
            (BinaryPreference::Indifferent, ast::RhsValue::Variable(v)) => {
                PreferenceKind::BinaryIndifferent(v.clone())
            }
            (BinaryPreference::Indifferent, ast::RhsValue::Constant(c)) => {
                PreferenceKind::NumericIndifferent(constant_symbol(c))
            }
            _ => {
                ctx.unsupported(format!("binary preference against {operand}"));
                return Ok(None);
            }
        },
    };
    Ok(Some(kind))
}
