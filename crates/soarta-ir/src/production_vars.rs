use indexmap::IndexSet;
use serde::Serialize;

/// Variables seen in one rule, split into value variables and the ones that
/// name identifiers (`rejected`). Only rejected variables get identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductionVariables {
    pub variables: IndexSet<String>,
    pub rejected: IndexSet<String>,
}

impl ProductionVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn see(&mut self, name: &str) {
        self.variables.insert(name.to_string());
    }

    pub fn reject(&mut self, name: &str) {
        self.variables.insert(name.to_string());
        self.rejected.insert(name.to_string());
    }

    pub fn is_rejected(&self, name: &str) -> bool {
        self.rejected.contains(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains(name) || self.rejected.contains(name)
    }

    /// Drop every rejected name from `variables`.
    pub fn clean(&mut self) {
        let rejected = &self.rejected;
        self.variables.retain(|v| !rejected.contains(v));
    }
}
