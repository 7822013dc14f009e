//! Per-rule augmented symbol trees.
//!
//! An [`AugmentedTree`] is rooted at one rule variable. Each edge carries a
//! label and the values seen under it; a value that is another identifier
//! variable is stored as a leaf naming that variable, and its own edges live
//! in the tree rooted at that variable. Keeping the trees flat per root means
//! every identifier has exactly one place where its attributes are listed.

use std::fmt;

use indexmap::IndexSet;
use serde::Serialize;

use crate::memory::{MemoryValue, Restriction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AugmentedEdge {
    pub label: MemoryValue,
    pub values: Vec<AugmentedTree>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AugmentedTree {
    pub name: MemoryValue,
    pub edges: Vec<AugmentedEdge>,
    pub restrictions: Vec<Restriction>,
}

impl AugmentedTree {
    pub fn new(name: MemoryValue) -> Self {
        Self {
            name,
            edges: Vec::new(),
            restrictions: Vec::new(),
        }
    }

    pub fn with_restrictions(name: MemoryValue, restrictions: Vec<Restriction>) -> Self {
        Self {
            name,
            edges: Vec::new(),
            restrictions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn is_negated(&self) -> bool {
        self.restrictions.contains(&Restriction::Negated)
    }

    pub fn edge(&self, label: &MemoryValue) -> Option<&AugmentedEdge> {
        self.edges.iter().find(|e| &e.label == label)
    }

    pub fn contains_label(&self, label: &MemoryValue) -> bool {
        self.edge(label).is_some()
    }

    pub fn edge_mut_or_insert(&mut self, label: MemoryValue) -> &mut AugmentedEdge {
        let index = match self.edges.iter().position(|e| e.label == label) {
            Some(index) => index,
            None => {
                self.edges.push(AugmentedEdge {
                    label,
                    values: Vec::new(),
                });
                self.edges.len() - 1
            }
        };
        &mut self.edges[index]
    }

    /// Append `value` under `label`. Values equal in name and restrictions are
    /// merged, so repeated tests of the same thing do not inflate the tree.
    pub fn add_value(&mut self, label: MemoryValue, value: AugmentedTree) -> &mut AugmentedTree {
        let edge = self.edge_mut_or_insert(label);
        let index = match edge
            .values
            .iter()
            .position(|v| v.name == value.name && v.restrictions == value.restrictions)
        {
            Some(index) => index,
            None => {
                edge.values.push(value);
                edge.values.len() - 1
            }
        };
        &mut edge.values[index]
    }

    /// Every variable mentioned: the root, edge labels, values and relation operands.
    pub fn variables(&self) -> IndexSet<String> {
        let mut out = IndexSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut IndexSet<String>) {
        if let Some(v) = self.name.as_variable() {
            out.insert(v.to_string());
        }
        for restriction in &self.restrictions {
            if let Restriction::Relation(_, MemoryValue::RuleVariable(v)) = restriction {
                out.insert(v.clone());
            }
        }
        for edge in &self.edges {
            if let Some(v) = edge.label.as_variable() {
                out.insert(v.to_string());
            }
            for value in &edge.values {
                value.collect_variables(out);
            }
        }
    }

    /// Values under `label`, ignoring negated ones.
    pub fn positive_values<'a>(
        &'a self,
        label: &MemoryValue,
    ) -> impl Iterator<Item = &'a AugmentedTree> + 'a {
        self.edge(label)
            .into_iter()
            .flat_map(|e| e.values.iter())
            .filter(|v| !v.is_negated())
    }
}

impl fmt::Display for AugmentedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for r in &self.restrictions {
            write!(f, " [{r}]")?;
        }
        if self.edges.is_empty() {
            return Ok(());
        }
        write!(f, " (")?;
        for (i, edge) in self.edges.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "^{}", edge.label)?;
            for value in &edge.values {
                write!(f, " {value}")?;
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RelOp;

    #[test]
    fn add_value_merges_identical_values() {
        let mut tree = AugmentedTree::new(MemoryValue::variable("s"));
        tree.add_value(
            MemoryValue::literal("name"),
            AugmentedTree::new(MemoryValue::literal("move")),
        );
        tree.add_value(
            MemoryValue::literal("name"),
            AugmentedTree::new(MemoryValue::literal("move")),
        );
        tree.add_value(
            MemoryValue::literal("name"),
            AugmentedTree::new(MemoryValue::literal("jump")),
        );
        let edge = tree.edge(&MemoryValue::literal("name")).unwrap();
        assert_eq!(edge.values.len(), 2);
    }

    #[test]
    fn restrictions_distinguish_values() {
        let mut tree = AugmentedTree::new(MemoryValue::variable("s"));
        tree.add_value(
            MemoryValue::literal("count"),
            AugmentedTree::new(MemoryValue::variable("c")),
        );
        tree.add_value(
            MemoryValue::literal("count"),
            AugmentedTree::with_restrictions(MemoryValue::variable("c"), vec![Restriction::Negated]),
        );
        assert_eq!(tree.positive_values(&MemoryValue::literal("count")).count(), 1);
    }

    #[test]
    fn variables_include_labels_and_operands() {
        let mut tree = AugmentedTree::new(MemoryValue::variable("s"));
        tree.add_value(
            MemoryValue::variable("attr"),
            AugmentedTree::with_restrictions(
                MemoryValue::variable("v"),
                vec![Restriction::Relation(RelOp::Less, MemoryValue::variable("max"))],
            ),
        );
        let vars: Vec<String> = tree.variables().into_iter().collect();
        assert_eq!(vars, vec!["s", "attr", "v", "max"]);
    }

    #[test]
    fn display_is_compact() {
        let mut tree = AugmentedTree::new(MemoryValue::variable("s"));
        tree.add_value(
            MemoryValue::literal("operator"),
            AugmentedTree::new(MemoryValue::variable("o")),
        );
        assert_eq!(tree.to_string(), "<s> (^operator <o>)");
    }
}
