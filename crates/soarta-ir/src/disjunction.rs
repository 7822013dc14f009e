//! Registry of literal sets used by `<< ... >>` tests.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// Global, batch-wide registry. Each distinct literal set gets one
/// `array_N` name (N from 1); sets equal up to order share a name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisjunctionRegistry {
    arrays: IndexMap<String, Vec<String>>,
}

impl DisjunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `literals`, returning the array name for that set.
    pub fn register(&mut self, literals: &[String]) -> String {
        let wanted = canonical(literals);
        if let Some((name, _)) = self
            .arrays
            .iter()
            .find(|(_, existing)| canonical(existing) == wanted)
        {
            return name.clone();
        }
        let name = format!("array_{}", self.arrays.len() + 1);
        let mut ordered: Vec<String> = Vec::new();
        for literal in literals {
            if !ordered.contains(literal) {
                ordered.push(literal.clone());
            }
        }
        self.arrays.insert(name.clone(), ordered);
        name
    }

    pub fn literals(&self, name: &str) -> Option<&[String]> {
        self.arrays.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.arrays.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Length of the longest registered set.
    pub fn max_width(&self) -> usize {
        self.arrays.values().map(Vec::len).max().unwrap_or(0)
    }
}

fn canonical(literals: &[String]) -> Vec<&str> {
    let set: IndexSet<&str> = literals.iter().map(String::as_str).collect();
    let mut sorted: Vec<&str> = set.into_iter().collect();
    sorted.sort_unstable();
    sorted
}

/// Per-rule mapping from a variable to the disjunction array that constrains it.
pub type DisjunctionTable = IndexMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn dedups_order_insensitively() {
        let mut registry = DisjunctionRegistry::new();
        let a = registry.register(&strs(&["north", "south"]));
        let b = registry.register(&strs(&["south", "north"]));
        let c = registry.register(&strs(&["east"]));
        assert_eq!(a, "array_1");
        assert_eq!(b, "array_1");
        assert_eq!(c, "array_2");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn keeps_first_seen_order() {
        let mut registry = DisjunctionRegistry::new();
        let name = registry.register(&strs(&["b", "a", "b"]));
        assert_eq!(registry.literals(&name).unwrap(), &strs(&["b", "a"])[..]);
        assert_eq!(registry.max_width(), 2);
    }
}
