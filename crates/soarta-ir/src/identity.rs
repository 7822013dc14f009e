//! Integer codes for every symbol the generated model mentions.
//!
//! Literal codes start at 1 and skip integers the rules use as literals
//! (integers encode as themselves). Identity codes form one contiguous block
//! above every literal code, so a range check tells identifiers apart.
//! Sentinels and preference tags descend from -1, again skipping taken
//! values, and disjunction arrays take a contiguous block below all of them.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::augmented_tree::AugmentedTree;
use crate::disjunction::DisjunctionRegistry;
use crate::memory::{literal_kind, LiteralKind, MemoryValue, Restriction};
use crate::rule::{ActionValue, PreferenceKind, RuleAction, RuleAnalysis};
use crate::symbol_tree::SymbolTree;
use crate::value_count::architecture_wmes;

pub const STATE_IDENTITY: &str = "state_1";
pub const OPERATOR_ATTRIBUTE: &str = "operator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Sentinel {
    Any,
    Empty,
    Na,
    AcceptableOperator,
    PrefAcceptable,
    PrefReject,
    PrefRequire,
    PrefProhibit,
    PrefBest,
    PrefWorst,
    PrefIndifferent,
    PrefBetter,
    PrefWorse,
    PrefBinaryIndifferent,
    PrefNumericIndifferent,
}

impl Sentinel {
    pub const ALL: [Sentinel; 15] = [
        Sentinel::Any,
        Sentinel::Empty,
        Sentinel::Na,
        Sentinel::AcceptableOperator,
        Sentinel::PrefAcceptable,
        Sentinel::PrefReject,
        Sentinel::PrefRequire,
        Sentinel::PrefProhibit,
        Sentinel::PrefBest,
        Sentinel::PrefWorst,
        Sentinel::PrefIndifferent,
        Sentinel::PrefBetter,
        Sentinel::PrefWorse,
        Sentinel::PrefBinaryIndifferent,
        Sentinel::PrefNumericIndifferent,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Sentinel::Any => "ANY",
            Sentinel::Empty => "EMPTY",
            Sentinel::Na => "NA",
            Sentinel::AcceptableOperator => "ACCEPTABLE_OPERATOR",
            Sentinel::PrefAcceptable => "PREF_ACCEPTABLE",
            Sentinel::PrefReject => "PREF_REJECT",
            Sentinel::PrefRequire => "PREF_REQUIRE",
            Sentinel::PrefProhibit => "PREF_PROHIBIT",
            Sentinel::PrefBest => "PREF_BEST",
            Sentinel::PrefWorst => "PREF_WORST",
            Sentinel::PrefIndifferent => "PREF_INDIFFERENT",
            Sentinel::PrefBetter => "PREF_BETTER",
            Sentinel::PrefWorse => "PREF_WORSE",
            Sentinel::PrefBinaryIndifferent => "PREF_BINARY_INDIFFERENT",
            Sentinel::PrefNumericIndifferent => "PREF_NUMERIC_INDIFFERENT",
        }
    }

    pub fn for_preference(preference: &PreferenceKind) -> Self {
        match preference {
            PreferenceKind::Acceptable => Sentinel::PrefAcceptable,
            PreferenceKind::Reject => Sentinel::PrefReject,
            PreferenceKind::Require => Sentinel::PrefRequire,
            PreferenceKind::Prohibit => Sentinel::PrefProhibit,
            PreferenceKind::Best => Sentinel::PrefBest,
            PreferenceKind::Worst => Sentinel::PrefWorst,
            PreferenceKind::Indifferent => Sentinel::PrefIndifferent,
            PreferenceKind::Better(_) => Sentinel::PrefBetter,
            PreferenceKind::Worse(_) => Sentinel::PrefWorse,
            PreferenceKind::BinaryIndifferent(_) => Sentinel::PrefBinaryIndifferent,
            PreferenceKind::NumericIndifferent(_) => Sentinel::PrefNumericIndifferent,
        }
    }
}

/// One identifier instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Memory path of the instance, e.g. `state_operator`.
    pub path: String,
    /// `path_k`, unique per rule occurrence.
    pub name: String,
    pub code: i64,
    /// Rules and variables sharing this instance.
    pub owners: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTable {
    literals: IndexMap<String, i64>,
    identities: Vec<Identity>,
    by_variable: IndexMap<(String, String), usize>,
    sentinels: IndexMap<Sentinel, i64>,
    disjunctions: IndexMap<String, i64>,
    disjunction_base: i64,
    taken: IndexSet<i64>,
}

impl IdentityTable {
    /// Assign codes for `rules`. Deterministic in rule and insertion order.
    pub fn assign(rules: &[RuleAnalysis], registry: &DisjunctionRegistry, shape: &SymbolTree) -> Self {
        let vocabulary = collect_literals(rules, registry);
        let taken: IndexSet<i64> = vocabulary
            .iter()
            .filter_map(|l| match literal_kind(l) {
                LiteralKind::Integer(i) => Some(i),
                _ => None,
            })
            .collect();

        let mut next_positive = Allocator::new(1, 1, &taken);
        let mut literals = IndexMap::new();
        for literal in &vocabulary {
            let code = match literal_kind(literal) {
                LiteralKind::Integer(i) => i,
                _ => next_positive.next(),
            };
            literals.insert(literal.clone(), code);
        }

        let identity_start = literals
            .values()
            .chain(taken.iter())
            .copied()
            .max()
            .unwrap_or(0)
            .max(0)
            + 1;
        let mut next_identity = Allocator::new(identity_start, 1, &taken);
        let mut identities = vec![Identity {
            path: "state".to_string(),
            name: STATE_IDENTITY.to_string(),
            code: next_identity.next(),
            owners: Vec::new(),
        }];
        let mut by_variable = IndexMap::new();
        let mut per_path: IndexMap<String, usize> = IndexMap::new();
        per_path.insert("state".to_string(), 1);

        for rule in rules {
            for var in identity_order(rule) {
                let key = (rule.name.clone(), var.clone());
                if by_variable.contains_key(&key) {
                    continue;
                }
                if var == rule.state_var {
                    identities[0].owners.push(key.clone());
                    by_variable.insert(key, 0);
                    continue;
                }
                let path = rule
                    .paths
                    .get(&var)
                    .map(|&node| shape.path_of(node))
                    .unwrap_or_else(|| format!("state_{var}"));
                let k = per_path.entry(path.clone()).or_insert(0);
                *k += 1;
                let name = format!("{path}_{k}");
                identities.push(Identity {
                    path,
                    name,
                    code: next_identity.next(),
                    owners: vec![key.clone()],
                });
                by_variable.insert(key, identities.len() - 1);
            }
        }

        let mut next_negative = Allocator::new(-1, -1, &taken);
        let sentinels: IndexMap<Sentinel, i64> = Sentinel::ALL
            .iter()
            .map(|s| (*s, next_negative.next()))
            .collect();

        let lowest = sentinels
            .values()
            .chain(taken.iter())
            .copied()
            .min()
            .unwrap_or(0)
            .min(0);
        let disjunctions = registry
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.to_string(), lowest - 1 - i as i64))
            .collect();
        let disjunction_base = lowest - 1;

        Self {
            literals,
            identities,
            by_variable,
            sentinels,
            disjunctions,
            disjunction_base,
            taken,
        }
    }

    pub fn literal_code(&self, literal: &str) -> Option<i64> {
        self.literals.get(literal).copied()
    }

    pub fn identity_for(&self, rule: &str, var: &str) -> Option<&Identity> {
        self.by_variable
            .get(&(rule.to_string(), var.to_string()))
            .map(|&i| &self.identities[i])
    }

    pub fn state_identity(&self) -> &Identity {
        &self.identities[0]
    }

    pub fn sentinel(&self, sentinel: Sentinel) -> i64 {
        self.sentinels.get(&sentinel).copied().unwrap_or_default()
    }

    pub fn disjunction_code(&self, array: &str) -> Option<i64> {
        self.disjunctions.get(array).copied()
    }

    /// Code of `array_1`; every disjunction code is at or below it.
    pub fn disjunction_base(&self) -> i64 {
        self.disjunction_base
    }

    pub fn literals(&self) -> impl Iterator<Item = (&str, i64)> {
        self.literals.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    pub fn sentinels(&self) -> impl Iterator<Item = (Sentinel, i64)> + '_ {
        self.sentinels.iter().map(|(k, v)| (*k, *v))
    }

    pub fn disjunctions(&self) -> impl Iterator<Item = (&str, i64)> {
        self.disjunctions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_taken(&self, value: i64) -> bool {
        self.taken.contains(&value)
    }

    /// Smallest and largest identity code.
    pub fn identity_range(&self) -> (i64, i64) {
        let codes = self.identities.iter().map(|i| i.code);
        (
            codes.clone().min().unwrap_or(0),
            codes.max().unwrap_or(0),
        )
    }
}

/// Hands out codes from `start` in steps of `step`, skipping `taken`.
struct Allocator<'t> {
    next: i64,
    step: i64,
    taken: &'t IndexSet<i64>,
}

impl<'t> Allocator<'t> {
    fn new(start: i64, step: i64, taken: &'t IndexSet<i64>) -> Self {
        Self {
            next: start,
            step,
            taken,
        }
    }

    fn next(&mut self) -> i64 {
        while self.taken.contains(&self.next) {
            self.next += self.step;
        }
        let code = self.next;
        self.next += self.step;
        code
    }
}

/// Rejected variables of `rule`: check trees, then create, then update, in
/// insertion order, then anything the trees never mention.
fn identity_order(rule: &RuleAnalysis) -> Vec<String> {
    let mut order: IndexSet<String> = IndexSet::new();
    for tree in rule
        .check
        .values()
        .chain(rule.create.values())
        .chain(rule.update.values())
    {
        for var in tree.variables() {
            if rule.variables.is_rejected(&var) {
                order.insert(var);
            }
        }
    }
    for var in &rule.variables.rejected {
        order.insert(var.clone());
    }
    order.into_iter().collect()
}

/// Every literal the model needs a code for, in first-seen order.
fn collect_literals(rules: &[RuleAnalysis], registry: &DisjunctionRegistry) -> IndexSet<String> {
    let mut out: IndexSet<String> = IndexSet::new();
    out.insert(OPERATOR_ATTRIBUTE.to_string());
    for rule in rules {
        for tree in rule
            .check
            .values()
            .chain(rule.create.values())
            .chain(rule.update.values())
        {
            collect_tree_literals(tree, &mut out);
        }
        for action in &rule.actions {
            match action {
                RuleAction::Add { value, .. }
                | RuleAction::Remove { value, .. }
                | RuleAction::Prefer { value, .. } => collect_action_literals(value, &mut out),
                RuleAction::Halt | RuleAction::SideEffect(_) => {}
            }
            if let RuleAction::Remove {
                attribute: MemoryValue::Literal(a),
                ..
            } = action
            {
                out.insert(a.clone());
            }
        }
    }
    for (_, literals) in registry.iter() {
        out.extend(literals.iter().cloned());
    }
    for (attr, value) in architecture_wmes(rules) {
        out.insert(attr.to_string());
        out.insert(value.to_string());
    }
    out
}

fn collect_tree_literals(tree: &AugmentedTree, out: &mut IndexSet<String>) {
    if let MemoryValue::Literal(l) = &tree.name {
        out.insert(l.clone());
    }
    for restriction in &tree.restrictions {
        if let Restriction::Relation(_, MemoryValue::Literal(l)) = restriction {
            out.insert(l.clone());
        }
    }
    for edge in &tree.edges {
        if let MemoryValue::Literal(l) = &edge.label {
            out.insert(l.clone());
        }
        for value in &edge.values {
            collect_tree_literals(value, out);
        }
    }
}

fn collect_action_literals(value: &ActionValue, out: &mut IndexSet<String>) {
    match value {
        ActionValue::Literal(l) => {
            out.insert(l.clone());
        }
        ActionValue::Compute { args, .. } => {
            for arg in args {
                collect_action_literals(arg, out);
            }
        }
        ActionValue::Variable(_) | ActionValue::Unsupported(_) => {}
    }
}
