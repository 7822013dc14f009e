//! Evaluation plan for the condition side of one rule.
//!
//! Each condition becomes one step of the match chain. Steps that bind a
//! variable (or need a value for a relation test) enumerate memory with a
//! running index; fully determined conditions are simple pass/fail tests.

use indexmap::{IndexMap, IndexSet};
use soarta_ir::memory::{MemoryValue, RelOp};
use soarta_ir::rule::{ConditionTest, RuleAnalysis};

use crate::naming::NameAllocator;
use crate::{GenContext, GenerationError};

/// Template-local names: rule variables, indices and temporaries.
pub(crate) struct Locals {
    allocator: NameAllocator,
    vars: IndexMap<String, String>,
    ints: Vec<String>,
}

impl Locals {
    pub(crate) fn new(allocator: NameAllocator) -> Self {
        Self {
            allocator,
            vars: IndexMap::new(),
            ints: Vec::new(),
        }
    }

    /// Local holding rule variable `var`, declared on first use.
    pub(crate) fn var(&mut self, var: &str) -> String {
        if let Some(name) = self.vars.get(var) {
            return name.clone();
        }
        let name = self.allocator.allocate(var);
        self.vars.insert(var.to_string(), name.clone());
        self.ints.push(name.clone());
        name
    }

    pub(crate) fn get(&self, var: &str) -> Option<&str> {
        self.vars.get(var).map(String::as_str)
    }

    pub(crate) fn fresh_int(&mut self, raw: &str) -> String {
        let name = self.allocator.allocate(raw);
        self.ints.push(name.clone());
        name
    }

    /// A fresh name the caller declares itself.
    pub(crate) fn fresh_name(&mut self, raw: &str) -> String {
        self.allocator.allocate(raw)
    }

    pub(crate) fn ints(&self) -> &[String] {
        &self.ints
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StepKind {
    /// Scans values with a running index.
    Enumerate,
    /// Scans a constant attribute list, and values under each attribute.
    EnumerateAttribute {
        list: String,
        len: String,
        attr_index: String,
    },
    Constrained,
    Negated,
}

#[derive(Debug, Clone)]
pub(crate) struct ConditionStep {
    pub(crate) kind: StepKind,
    pub(crate) id: String,
    /// Attribute expression; for attribute enumeration the local it binds.
    pub(crate) attribute: String,
    pub(crate) expected: String,
    pub(crate) index: Option<String>,
    pub(crate) binds_value: Option<String>,
    pub(crate) relations: Vec<String>,
}

impl ConditionStep {
    pub(crate) fn is_enumerator(&self) -> bool {
        matches!(
            self.kind,
            StepKind::Enumerate | StepKind::EnumerateAttribute { .. }
        )
    }

    pub(crate) fn next_call(&self, attribute: &str, start: &str) -> String {
        format!("wmNext({}, {attribute}, {}, {start})", self.id, self.expected)
    }

    pub(crate) fn relation_guard(&self) -> Option<String> {
        (!self.relations.is_empty()).then(|| self.relations.join(" && "))
    }

    /// Indices to zero when the chain restarts at or before this step.
    pub(crate) fn indices(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(index) = &self.index {
            out.push(index.as_str());
        }
        if let StepKind::EnumerateAttribute { attr_index, .. } = &self.kind {
            out.push(attr_index.as_str());
        }
        out
    }
}

/// Plan the match chain of `rule` in dependency order.
pub(crate) fn plan(
    ctx: &GenContext<'_>,
    rule: &RuleAnalysis,
    locals: &mut Locals,
) -> Result<Vec<ConditionStep>, GenerationError> {
    let order = rule
        .evaluation_order()
        .ok_or_else(|| GenerationError::UnorderableConditions {
            rule: rule.name.clone(),
        })?;

    let mut bound: IndexSet<String> = IndexSet::new();
    bound.insert(rule.state_var.clone());
    locals.var(&rule.state_var);

    let mut steps = Vec::with_capacity(order.len());
    for (position, &i) in order.iter().enumerate() {
        let cond = &rule.conditions[i];
        steps.push(plan_step(ctx, rule, cond, position, &bound, locals)?);
        let newly: Vec<String> = cond.binds(&bound).into_iter().map(str::to_string).collect();
        bound.extend(newly);
    }
    Ok(steps)
}

fn plan_step(
    ctx: &GenContext<'_>,
    rule: &RuleAnalysis,
    cond: &ConditionTest,
    position: usize,
    bound: &IndexSet<String>,
    locals: &mut Locals,
) -> Result<ConditionStep, GenerationError> {
    let unorderable = || GenerationError::UnorderableConditions {
        rule: rule.name.clone(),
    };
    if !bound.contains(&cond.id) {
        return Err(unorderable());
    }
    let id = locals.var(&cond.id);

    let mut attribute_list: Option<(String, String)> = None;
    let attribute = if cond.acceptable {
        "ACCEPTABLE_OPERATOR".to_string()
    } else {
        match &cond.attribute {
            MemoryValue::Literal(a) => ctx.literal(&rule.name, a)?,
            MemoryValue::RuleVariable(v) if bound.contains(v) => locals.var(v),
            MemoryValue::RuleVariable(v) => {
                attribute_list = Some(list_for(ctx, rule, v));
                locals.var(v)
            }
            MemoryValue::Wildcard => {
                attribute_list = Some(("ATTRIBUTES".to_string(), "NUM_ATTRIBUTES".to_string()));
                locals.fresh_int(&format!("attr_{position}"))
            }
        }
    };
    if cond.negated && attribute_list.is_some() {
        return Err(unorderable());
    }

    let literal_set = match cond.literal_set() {
        Some(array) => Some(
            ctx.names
                .disjunction(array)
                .map(str::to_string)
                .ok_or_else(|| GenerationError::UnresolvableIdentity {
                    rule: rule.name.clone(),
                    symbol: array.to_string(),
                })?,
        ),
        None => None,
    };
    let open = || literal_set.clone().unwrap_or_else(|| "ANY".to_string());

    let mut relations = Vec::new();
    let (expected, mut binds_value, mut subject) = match &cond.value {
        MemoryValue::Literal(l) => {
            let code = ctx.literal(&rule.name, l)?;
            (code.clone(), None, Some(code))
        }
        MemoryValue::RuleVariable(v) if bound.contains(v) => {
            let local = locals.var(v);
            (local.clone(), None, Some(local))
        }
        MemoryValue::RuleVariable(v) if !cond.negated => {
            let local = locals.var(v);
            (open(), Some(local.clone()), Some(local))
        }
        MemoryValue::RuleVariable(_) | MemoryValue::Wildcard => (open(), None, None),
    };

    if let (Some(set), Some(subject), None) = (&literal_set, &subject, &binds_value) {
        if *subject == expected {
            relations.push(format!("matches({subject}, {set})"));
        }
    }

    for (op, operand) in cond.relations() {
        if subject.is_none() {
            if cond.negated {
                return Err(unorderable());
            }
            let temp = locals.fresh_int(&format!("value_{position}"));
            binds_value = Some(temp.clone());
            subject = Some(temp);
        }
        let Some(subject) = &subject else {
            return Err(unorderable());
        };
        let operand = match operand {
            MemoryValue::Literal(l) => ctx.literal(&rule.name, l)?,
            MemoryValue::RuleVariable(v) => locals.get(v).map(str::to_string).ok_or_else(unorderable)?,
            MemoryValue::Wildcard => "ANY".to_string(),
        };
        relations.push(render_relation(*op, subject, &operand));
    }

    let kind = if cond.negated {
        StepKind::Negated
    } else if let Some((list, len)) = attribute_list {
        StepKind::EnumerateAttribute {
            list,
            len,
            attr_index: locals.fresh_int(&format!("attrIdx_{position}")),
        }
    } else if binds_value.is_some() {
        StepKind::Enumerate
    } else {
        StepKind::Constrained
    };
    let index = matches!(kind, StepKind::Enumerate | StepKind::EnumerateAttribute { .. })
        .then(|| locals.fresh_int(&format!("idx_{position}")));

    Ok(ConditionStep {
        kind,
        id,
        attribute,
        expected,
        index,
        binds_value,
        relations,
    })
}

/// Constant attribute list an unbound attribute variable ranges over.
fn list_for(ctx: &GenContext<'_>, rule: &RuleAnalysis, var: &str) -> (String, String) {
    match rule
        .disjunctions
        .get(var)
        .and_then(|array| ctx.disjunction_row(array))
    {
        Some(row) => (format!("DISJUNCTIONS[{row}]"), "DISJUNCTION_LENGTH".to_string()),
        None => ("ATTRIBUTES".to_string(), "NUM_ATTRIBUTES".to_string()),
    }
}

pub(crate) fn render_relation(op: RelOp, subject: &str, operand: &str) -> String {
    match op {
        RelOp::SameType => format!("sameType({subject}, {operand})"),
        RelOp::NotEqual => format!("{subject} != {operand}"),
        other => format!("{subject} {other} {operand}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relations_render_as_uppaal_expressions() {
        assert_eq!(render_relation(RelOp::NotEqual, "x", "y"), "x != y");
        assert_eq!(render_relation(RelOp::LessOrEqual, "x", "3"), "x <= 3");
        assert_eq!(render_relation(RelOp::SameType, "x", "y"), "sameType(x, y)");
    }

    #[test]
    fn locals_are_declared_once() {
        let mut locals = Locals::new(NameAllocator::new());
        assert_eq!(locals.var("s"), "s");
        assert_eq!(locals.var("s"), "s");
        assert_eq!(locals.fresh_int("idx_0"), "idx_0");
        assert_eq!(locals.var("io#1"), "io_1");
        assert_eq!(locals.ints(), ["s", "idx_0", "io_1"]);
    }
}
