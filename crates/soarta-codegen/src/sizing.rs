//! One fixed-size array per identifier instance and attribute.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use soarta_ir::identity::IdentityTable;
use soarta_ir::value_count::{OwnerKey, ValueCountForest};

use crate::naming::SymbolNames;
use crate::GenerationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeArray {
    /// Instance name from the identity table, e.g. `state_task_1`.
    pub identifier: String,
    pub attribute: String,
    pub size: usize,
    /// Some rule other than the declaring one writes here.
    pub cross_rule: bool,
    pub uppaal_name: String,
    /// Declared names of the owning identity and the attribute literal.
    #[serde(skip)]
    pub(crate) identity_const: String,
    #[serde(skip)]
    pub(crate) attribute_const: String,
}

#[derive(Debug, Clone, Default)]
pub struct Sizing {
    arrays: Vec<AttributeArray>,
    index: IndexMap<(String, String), usize>,
}

impl Sizing {
    /// Size every non-empty forest edge. Owners without an identity abort.
    pub fn compute(
        forest: &ValueCountForest,
        table: &IdentityTable,
        names: &mut SymbolNames,
    ) -> Result<Self, GenerationError> {
        let mut sizing = Sizing::default();
        for (owner, attribute, edge) in forest.edges() {
            let size = edge.count();
            if size == 0 {
                continue;
            }
            let identifier = match owner {
                OwnerKey::State => table.state_identity().name.clone(),
                OwnerKey::Created { rule, var } => table
                    .identity_for(rule, var)
                    .map(|i| i.name.clone())
                    .ok_or_else(|| GenerationError::UnresolvableIdentity {
                        rule: rule.clone(),
                        symbol: format!("<{var}>"),
                    })?,
            };
            let identity_const = names
                .identity(&identifier)
                .map(str::to_string)
                .ok_or_else(|| unresolvable(owner, &identifier))?;
            let attribute_const = names
                .literal(attribute)
                .map(str::to_string)
                .ok_or_else(|| unresolvable(owner, attribute))?;
            let uppaal_name = names.allocate(&format!("AV_{identity_const}_{attribute_const}"));
            sizing
                .index
                .insert((identifier.clone(), attribute.to_string()), sizing.arrays.len());
            sizing.arrays.push(AttributeArray {
                identifier,
                attribute: attribute.to_string(),
                size,
                cross_rule: edge.updated,
                uppaal_name,
                identity_const,
                attribute_const,
            });
        }
        tracing::debug!(arrays = sizing.arrays.len(), "sized attribute arrays");
        Ok(sizing)
    }

    pub fn arrays(&self) -> &[AttributeArray] {
        &self.arrays
    }

    pub fn get(&self, identifier: &str, attribute: &str) -> Option<&AttributeArray> {
        self.index
            .get(&(identifier.to_string(), attribute.to_string()))
            .map(|&i| &self.arrays[i])
    }

    /// Distinct array sizes in ascending order; one helper set per size.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self
            .arrays
            .iter()
            .map(|a| a.size)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect();
        sizes.sort_unstable();
        sizes
    }

    /// Declared names of every attribute that owns at least one array.
    pub fn attribute_constants(&self) -> Vec<&str> {
        self.arrays
            .iter()
            .map(|a| a.attribute_const.as_str())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn total_slots(&self) -> usize {
        self.arrays.iter().map(|a| a.size).sum()
    }
}

fn unresolvable(owner: &OwnerKey, symbol: &str) -> GenerationError {
    GenerationError::UnresolvableIdentity {
        rule: owner.rule().unwrap_or("state").to_string(),
        symbol: symbol.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soarta_ir::analysis::analyze;
    use soarta_ir::matcher::cross_match;

    #[test]
    fn arrays_follow_forest_counts() {
        let rules = soarta_dsl::parse(
            r#"
sp {a (state <s> ^phase one) --> (<s> ^color red) (<s> ^task <t>) (<t> ^status ready)}
sp {b (state <s> ^phase two) --> (<s> ^color blue)}
"#,
            "sizing.soar",
        )
        .expect("parse failed");
        let analysis = analyze(&rules).expect("analysis failed");
        let outcome = cross_match(&analysis.rules, &analysis.disjunctions);
        let table = IdentityTable::assign(&analysis.rules, &analysis.disjunctions, &analysis.shape);
        let mut names = SymbolNames::new(&table, &analysis.rules);
        let sizing = Sizing::compute(&outcome.forest, &table, &mut names).expect("sizing failed");

        let color = sizing.get("state_1", "color").unwrap();
        assert_eq!(color.size, 2);
        assert_eq!(color.uppaal_name, "AV_state_1_color");
        let status = sizing.get("state_task_1", "status").unwrap();
        assert_eq!(status.size, 1);
        assert!(!status.cross_rule);
        assert_eq!(sizing.sizes(), vec![1, 2]);
    }
}
