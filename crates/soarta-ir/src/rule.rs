//! Per-rule analysis results.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use soarta_dsl::ast::Span;

use crate::augmented_tree::AugmentedTree;
use crate::disjunction::DisjunctionTable;
use crate::memory::{MemoryValue, Restriction};
use crate::production_vars::ProductionVariables;
use crate::symbol_tree::NodeId;

/// One normalised condition: `(id ^attribute value)` plus its restrictions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConditionTest {
    pub id: String,
    pub attribute: MemoryValue,
    pub value: MemoryValue,
    /// Relations and literal sets; negation is carried by `negated`.
    pub restrictions: Vec<Restriction>,
    pub negated: bool,
    /// Tests the acceptable-preference slot (`^operator <o> +`).
    pub acceptable: bool,
}

impl ConditionTest {
    pub fn relations(&self) -> impl Iterator<Item = (&crate::memory::RelOp, &MemoryValue)> {
        self.restrictions.iter().filter_map(|r| match r {
            Restriction::Relation(op, operand) => Some((op, operand)),
            _ => None,
        })
    }

    pub fn literal_set(&self) -> Option<&str> {
        self.restrictions.iter().find_map(|r| match r {
            Restriction::LiteralSet(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Variables this condition binds when it is evaluated with `bound` in scope.
    pub fn binds<'a>(&'a self, bound: &IndexSet<String>) -> Vec<&'a str> {
        if self.negated {
            return Vec::new();
        }
        [&self.attribute, &self.value]
            .into_iter()
            .filter_map(MemoryValue::as_variable)
            .filter(|v| !bound.contains(*v))
            .collect()
    }

    fn is_ready(&self, bound: &IndexSet<String>) -> bool {
        if !bound.contains(&self.id) {
            return false;
        }
        if self.negated {
            if let Some(attr) = self.attribute.as_variable() {
                if !bound.contains(attr) {
                    return false;
                }
            }
        }
        self.relations().all(|(_, operand)| match operand.as_variable() {
            Some(v) => bound.contains(v) && Some(v) != self.value.as_variable(),
            None => true,
        })
    }

    fn priority(&self, bound: &IndexSet<String>) -> u8 {
        if self.negated {
            2
        } else if !self.binds(bound).is_empty()
            && self.restrictions.is_empty()
            && self.attribute.as_literal().is_some()
        {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for ConditionTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "-")?;
        }
        write!(f, "(<{}> ^{} {}", self.id, self.attribute, self.value)?;
        for r in &self.restrictions {
            write!(f, " [{r}]")?;
        }
        if self.acceptable {
            write!(f, " +")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
}

impl ArithOp {
    pub fn from_function(name: &str, arity: usize) -> Option<Self> {
        match (name, arity) {
            ("-", 1) => Some(ArithOp::Neg),
            ("+", _) => Some(ArithOp::Add),
            ("-", _) => Some(ArithOp::Sub),
            ("*", _) => Some(ArithOp::Mul),
            ("/" | "div", _) => Some(ArithOp::Div),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub | ArithOp::Neg => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }
}

/// Right-hand-side value of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ActionValue {
    Literal(String),
    Variable(String),
    Compute { op: ArithOp, args: Vec<ActionValue> },
    /// A function with no integer model; evaluates to `NA`.
    Unsupported(String),
}

impl ActionValue {
    pub fn as_memory_value(&self) -> MemoryValue {
        match self {
            ActionValue::Literal(s) => MemoryValue::Literal(s.clone()),
            ActionValue::Variable(v) => MemoryValue::RuleVariable(v.clone()),
            ActionValue::Compute { .. } | ActionValue::Unsupported(_) => MemoryValue::Wildcard,
        }
    }

    pub fn variables(&self) -> Vec<&str> {
        match self {
            ActionValue::Variable(v) => vec![v.as_str()],
            ActionValue::Compute { args, .. } => args.iter().flat_map(|a| a.variables()).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for ActionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionValue::Literal(s) => write!(f, "{s}"),
            ActionValue::Variable(v) => write!(f, "<{v}>"),
            ActionValue::Compute { op, args } => {
                write!(f, "({}", op.symbol())?;
                for a in args {
                    write!(f, " {a}")?;
                }
                write!(f, ")")
            }
            ActionValue::Unsupported(name) => write!(f, "({name} ...)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PreferenceKind {
    Acceptable,
    Reject,
    Require,
    Prohibit,
    Best,
    Worst,
    Indifferent,
    Better(String),
    Worse(String),
    BinaryIndifferent(String),
    /// `= <number>`; the symbol is the weight as written.
    NumericIndifferent(String),
}

impl PreferenceKind {
    /// Name of the generated preference tag constant.
    pub fn tag(&self) -> &'static str {
        match self {
            PreferenceKind::Acceptable => "PREF_ACCEPTABLE",
            PreferenceKind::Reject => "PREF_REJECT",
            PreferenceKind::Require => "PREF_REQUIRE",
            PreferenceKind::Prohibit => "PREF_PROHIBIT",
            PreferenceKind::Best => "PREF_BEST",
            PreferenceKind::Worst => "PREF_WORST",
            PreferenceKind::Indifferent => "PREF_INDIFFERENT",
            PreferenceKind::Better(_) => "PREF_BETTER",
            PreferenceKind::Worse(_) => "PREF_WORSE",
            PreferenceKind::BinaryIndifferent(_) => "PREF_BINARY_INDIFFERENT",
            PreferenceKind::NumericIndifferent(_) => "PREF_NUMERIC_INDIFFERENT",
        }
    }

    /// Operator variable referenced by a binary preference.
    pub fn operand(&self) -> Option<&str> {
        match self {
            PreferenceKind::Better(v)
            | PreferenceKind::Worse(v)
            | PreferenceKind::BinaryIndifferent(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RuleAction {
    Add {
        id: String,
        attribute: MemoryValue,
        value: ActionValue,
    },
    Remove {
        id: String,
        attribute: MemoryValue,
        value: ActionValue,
    },
    Prefer {
        id: String,
        attribute: MemoryValue,
        value: ActionValue,
        preference: PreferenceKind,
    },
    Halt,
    /// `write`, `crlf`, `interrupt` and similar calls with no memory effect.
    SideEffect(String),
}

/// Everything the later stages need to know about one production.
#[derive(Debug, Clone, Serialize)]
pub struct RuleAnalysis {
    pub name: String,
    #[serde(skip)]
    pub span: Span,
    pub state_var: String,
    /// Identifier variables of the condition side, in binding order, state first.
    pub hierarchy: Vec<String>,
    pub check: IndexMap<String, AugmentedTree>,
    pub create: IndexMap<String, AugmentedTree>,
    pub update: IndexMap<String, AugmentedTree>,
    /// Position of each identifier variable in the global memory shape.
    pub paths: IndexMap<String, NodeId>,
    pub variables: ProductionVariables,
    pub disjunctions: DisjunctionTable,
    pub o_supported: bool,
    pub conditions: Vec<ConditionTest>,
    pub actions: Vec<RuleAction>,
    /// Identifiers introduced by the action side.
    pub created: IndexSet<String>,
    pub halts: bool,
}

impl RuleAnalysis {
    /// Variables bound by the condition side.
    pub fn bound_variables(&self) -> IndexSet<String> {
        let mut bound = IndexSet::new();
        bound.insert(self.state_var.clone());
        for cond in &self.conditions {
            bound.insert(cond.id.clone());
            for v in cond.binds(&IndexSet::new()) {
                bound.insert(v.to_string());
            }
        }
        bound
    }

    /// Dependency-aware evaluation order of `conditions`.
    ///
    /// Among ready conditions, plain enumerators come first, then constrained
    /// tests, then negated ones. `None` when some condition can never become
    /// ready (for example a relation against a variable nothing binds).
    pub fn evaluation_order(&self) -> Option<Vec<usize>> {
        let mut bound: IndexSet<String> = IndexSet::new();
        bound.insert(self.state_var.clone());
        let mut remaining: Vec<usize> = (0..self.conditions.len()).collect();
        let mut order = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let (pos, index) = remaining
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, i)| self.conditions[*i].is_ready(&bound))
                .min_by_key(|(pos, i)| (self.conditions[*i].priority(&bound), *pos))?;
            remaining.remove(pos);
            let newly: Vec<String> = self.conditions[index]
                .binds(&bound)
                .into_iter()
                .map(str::to_string)
                .collect();
            bound.extend(newly);
            order.push(index);
        }
        Some(order)
    }

    pub fn is_checker(&self) -> bool {
        !self.update.is_empty()
    }

    pub fn writes_operator_proposals(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|a| match a {
            RuleAction::Prefer {
                value: ActionValue::Variable(v),
                preference: PreferenceKind::Acceptable,
                ..
            } if self.created.contains(v) => Some(v.as_str()),
            _ => None,
        })
    }
}
