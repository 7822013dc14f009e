//! Value-count forest: for every identifier instance and attribute, the set
//! of distinct values that may ever be live there.
//!
//! Owners are the shared state plus one instance per identifier created on
//! the action side of a rule. Edge values are keyed so that the same value
//! written by several rules is counted once.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::disjunction::DisjunctionRegistry;
use crate::memory::MemoryValue;
use crate::rule::RuleAnalysis;

/// Elements the architecture places on the top state before any rule fires.
pub const ARCHITECTURE_WMES: [(&str, &str); 2] = [("superstate", "nil"), ("type", "state")];

/// The architecture elements some rule actually tests on its state.
pub fn architecture_wmes(rules: &[RuleAnalysis]) -> Vec<(&'static str, &'static str)> {
    ARCHITECTURE_WMES
        .iter()
        .copied()
        .filter(|(attr, _)| {
            rules.iter().any(|rule| {
                rule.conditions
                    .iter()
                    .any(|c| c.id == rule.state_var && c.attribute.as_literal() == Some(*attr))
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum OwnerKey {
    State,
    Created { rule: String, var: String },
}

impl OwnerKey {
    pub fn created(rule: &str, var: &str) -> Self {
        OwnerKey::Created {
            rule: rule.to_string(),
            var: var.to_string(),
        }
    }

    /// The value written when this instance is stored under another attribute.
    pub fn as_value(&self) -> ValueKey {
        match self {
            OwnerKey::State => ValueKey::State,
            OwnerKey::Created { rule, var } => ValueKey::Identifier {
                rule: rule.clone(),
                var: var.clone(),
            },
        }
    }

    pub fn rule(&self) -> Option<&str> {
        match self {
            OwnerKey::State => None,
            OwnerKey::Created { rule, .. } => Some(rule),
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKey::State => write!(f, "state"),
            OwnerKey::Created { rule, var } => write!(f, "{rule}:<{var}>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ValueKey {
    Literal(String),
    State,
    Identifier { rule: String, var: String },
    /// Value of a condition-bound variable, not yet traced to its producer.
    Bound { rule: String, var: String },
    /// Arithmetic or function result written by `rule` under `attribute`.
    Computed { rule: String, attribute: String },
}

impl ValueKey {
    pub fn as_owner(&self) -> Option<OwnerKey> {
        match self {
            ValueKey::State => Some(OwnerKey::State),
            ValueKey::Identifier { rule, var } => Some(OwnerKey::created(rule, var)),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, ValueKey::Literal(_))
    }
}

impl fmt::Display for ValueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKey::Literal(s) => write!(f, "{s}"),
            ValueKey::State => write!(f, "state"),
            ValueKey::Identifier { rule, var } => write!(f, "{rule}:<{var}>"),
            ValueKey::Bound { rule, var } => write!(f, "{rule}:<{var}>?"),
            ValueKey::Computed { rule, attribute } => write!(f, "{rule}:{attribute}()"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValueCountEdge {
    pub values: IndexSet<ValueKey>,
    /// Placeholders whose producers have been found; they no longer count.
    pub resolved: IndexSet<ValueKey>,
    /// Written by a rule other than the one that declared the owner.
    pub updated: bool,
}

impl ValueCountEdge {
    pub fn count(&self) -> usize {
        self.live().count()
    }

    pub fn live(&self) -> impl Iterator<Item = &ValueKey> {
        self.values.iter().filter(|k| !self.resolved.contains(*k))
    }

    pub fn literal_count(&self) -> usize {
        self.values.iter().filter(|k| k.is_literal()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValueCountTree {
    pub edges: IndexMap<String, ValueCountEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueCountForest {
    pub roots: IndexMap<OwnerKey, ValueCountTree>,
}

impl ValueCountForest {
    /// Seed the forest from every rule's create trees and the architecture
    /// elements of the top state.
    pub fn build(rules: &[RuleAnalysis], registry: &DisjunctionRegistry) -> Self {
        let mut forest = Self::default();
        for rule in rules {
            for (var, tree) in &rule.create {
                let owner = owner_of(rule, var);
                forest.roots.entry(owner.clone()).or_default();
                for edge in &tree.edges {
                    for attr in attribute_names(rule, &edge.label, registry) {
                        for value in &edge.values {
                            for key in seed_keys(rule, &value.name, &attr, registry) {
                                forest.insert(&owner, &attr, key);
                            }
                        }
                    }
                }
            }
        }
        for (attr, value) in architecture_wmes(rules) {
            forest.insert(&OwnerKey::State, attr, ValueKey::Literal(value.to_string()));
        }
        forest
    }

    pub fn tree(&self, owner: &OwnerKey) -> Option<&ValueCountTree> {
        self.roots.get(owner)
    }

    pub fn edge(&self, owner: &OwnerKey, attr: &str) -> Option<&ValueCountEdge> {
        self.roots.get(owner).and_then(|t| t.edges.get(attr))
    }

    /// Insert `key` under `(owner, attr)`; true when it was new.
    pub fn insert(&mut self, owner: &OwnerKey, attr: &str, key: ValueKey) -> bool {
        self.roots
            .entry(owner.clone())
            .or_default()
            .edges
            .entry(attr.to_string())
            .or_default()
            .values
            .insert(key)
    }

    pub fn mark_updated(&mut self, owner: &OwnerKey, attr: &str) {
        self.roots
            .entry(owner.clone())
            .or_default()
            .edges
            .entry(attr.to_string())
            .or_default()
            .updated = true;
    }

    /// Mark `placeholder` resolved everywhere it occurs and add `replacements`
    /// beside it. Returns the owners whose edges changed.
    pub fn resolve(&mut self, placeholder: &ValueKey, replacements: &[ValueKey]) -> IndexSet<OwnerKey> {
        let mut changed = IndexSet::new();
        for (owner, tree) in self.roots.iter_mut() {
            for edge in tree.edges.values_mut() {
                if !edge.values.contains(placeholder) {
                    continue;
                }
                let mut grew = edge.resolved.insert(placeholder.clone());
                for key in replacements {
                    if key != placeholder {
                        grew |= edge.values.insert(key.clone());
                    }
                }
                if grew {
                    changed.insert(owner.clone());
                }
            }
        }
        changed
    }

    /// Unresolved placeholder variables belonging to `rule`.
    pub fn unresolved_bound(&self, rule: &str) -> IndexSet<String> {
        let mut out = IndexSet::new();
        for tree in self.roots.values() {
            for edge in tree.edges.values() {
                for key in edge.live() {
                    if let ValueKey::Bound { rule: r, var } = key {
                        if r == rule {
                            out.insert(var.clone());
                        }
                    }
                }
            }
        }
        out
    }

    /// Every placeholder variable of `rule`, resolved or not.
    pub fn placeholders(&self, rule: &str) -> IndexSet<String> {
        let mut out = IndexSet::new();
        for tree in self.roots.values() {
            for edge in tree.edges.values() {
                for key in &edge.values {
                    if let ValueKey::Bound { rule: r, var } = key {
                        if r == rule {
                            out.insert(var.clone());
                        }
                    }
                }
            }
        }
        out
    }

    /// Number of literal values across all edges. Never decreases.
    pub fn literal_total(&self) -> usize {
        self.edges().map(|(_, _, e)| e.literal_count()).sum()
    }

    /// Sum of `count()` across all edges.
    pub fn key_total(&self) -> usize {
        self.edges().map(|(_, _, e)| e.count()).sum()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&OwnerKey, &str, &ValueCountEdge)> {
        self.roots.iter().flat_map(|(owner, tree)| {
            tree.edges
                .iter()
                .map(move |(attr, edge)| (owner, attr.as_str(), edge))
        })
    }

    /// Owners reachable from `from` by following identifier values.
    pub fn reachable_owners<I>(&self, from: I) -> IndexSet<OwnerKey>
    where
        I: IntoIterator<Item = OwnerKey>,
    {
        let mut seen: IndexSet<OwnerKey> = IndexSet::new();
        let mut stack: Vec<OwnerKey> = from.into_iter().collect();
        while let Some(owner) = stack.pop() {
            if !seen.insert(owner.clone()) {
                continue;
            }
            let Some(tree) = self.roots.get(&owner) else {
                continue;
            };
            for edge in tree.edges.values() {
                for key in edge.live() {
                    if let Some(next) = key.as_owner() {
                        if !seen.contains(&next) {
                            stack.push(next);
                        }
                    }
                }
            }
        }
        seen
    }
}

pub(crate) fn owner_of(rule: &RuleAnalysis, var: &str) -> OwnerKey {
    if var == rule.state_var {
        OwnerKey::State
    } else {
        OwnerKey::created(&rule.name, var)
    }
}

/// Attribute names an edge label can stand for.
pub(crate) fn attribute_names(
    rule: &RuleAnalysis,
    label: &MemoryValue,
    registry: &DisjunctionRegistry,
) -> Vec<String> {
    match label {
        MemoryValue::Literal(a) => vec![a.clone()],
        MemoryValue::RuleVariable(v) => rule
            .disjunctions
            .get(v)
            .and_then(|array| registry.literals(array))
            .map(<[String]>::to_vec)
            .unwrap_or_default(),
        MemoryValue::Wildcard => Vec::new(),
    }
}

fn seed_keys(
    rule: &RuleAnalysis,
    value: &MemoryValue,
    attr: &str,
    registry: &DisjunctionRegistry,
) -> Vec<ValueKey> {
    match value {
        MemoryValue::Literal(l) => vec![ValueKey::Literal(l.clone())],
        MemoryValue::Wildcard => vec![ValueKey::Computed {
            rule: rule.name.clone(),
            attribute: attr.to_string(),
        }],
        MemoryValue::RuleVariable(v) if v == &rule.state_var => vec![ValueKey::State],
        MemoryValue::RuleVariable(v) if rule.created.contains(v) => vec![ValueKey::Identifier {
            rule: rule.name.clone(),
            var: v.clone(),
        }],
        MemoryValue::RuleVariable(v) => match rule
            .disjunctions
            .get(v)
            .and_then(|array| registry.literals(array))
        {
            Some(literals) => literals.iter().cloned().map(ValueKey::Literal).collect(),
            None => vec![ValueKey::Bound {
                rule: rule.name.clone(),
                var: v.clone(),
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_placeholders_stop_counting() {
        let mut forest = ValueCountForest::default();
        let placeholder = ValueKey::Bound {
            rule: "r".into(),
            var: "x".into(),
        };
        forest.insert(&OwnerKey::State, "last", placeholder.clone());
        forest.insert(&OwnerKey::State, "last", ValueKey::Literal("a".into()));
        assert_eq!(forest.edge(&OwnerKey::State, "last").unwrap().count(), 2);
        assert_eq!(forest.unresolved_bound("r").len(), 1);

        let changed = forest.resolve(&placeholder, &[ValueKey::Literal("a".into())]);
        assert_eq!(changed.len(), 1);
        assert_eq!(forest.edge(&OwnerKey::State, "last").unwrap().count(), 1);
        assert!(forest.unresolved_bound("r").is_empty());
    }

    #[test]
    fn reachability_follows_identifiers() {
        let mut forest = ValueCountForest::default();
        let task = OwnerKey::created("p", "t");
        forest.insert(&OwnerKey::State, "task", task.as_value());
        forest.insert(&task, "status", ValueKey::Literal("ready".into()));
        forest.insert(&OwnerKey::created("q", "orphan"), "x", ValueKey::Literal("1".into()));
        let reach = forest.reachable_owners([OwnerKey::State]);
        assert!(reach.contains(&task));
        assert!(!reach.contains(&OwnerKey::created("q", "orphan")));
    }

    #[test]
    fn tested_architecture_elements_are_seeded() {
        let rules = soarta_dsl::parse(
            "sp {init (state <s> ^superstate nil) --> (<s> ^ready yes)}",
            "arch.soar",
        )
        .expect("parse failed");
        let analysis = crate::analysis::analyze(&rules).expect("analysis failed");
        let forest = ValueCountForest::build(&analysis.rules, &analysis.disjunctions);
        let edge = forest.edge(&OwnerKey::State, "superstate").unwrap();
        assert_eq!(edge.count(), 1);
        assert!(forest.edge(&OwnerKey::State, "type").is_none());
    }

    #[test]
    fn totals_track_literals_and_live_keys() {
        let mut forest = ValueCountForest::default();
        forest.insert(&OwnerKey::State, "color", ValueKey::Literal("red".into()));
        forest.insert(&OwnerKey::State, "color", ValueKey::Literal("red".into()));
        forest.insert(
            &OwnerKey::State,
            "count",
            ValueKey::Computed {
                rule: "inc".into(),
                attribute: "count".into(),
            },
        );
        assert_eq!(forest.literal_total(), 1);
        assert_eq!(forest.key_total(), 2);
    }
}
