//! Cross-rule matching to a fixed point.
//!
//! A checker is a rule that writes to identifiers bound by its conditions,
//! or whose writes copy condition-bound values. For each (checker, producer)
//! pair the checker's condition trees are matched against the value-count
//! forest; every match pushes the checker's writes into the matched
//! instances. Copied values are traced separately: wherever a rule's
//! conditions match at all, its placeholders take on the values they read.
//! Pairs are retried from a work-list until nothing grows.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::augmented_tree::AugmentedTree;
use crate::disjunction::DisjunctionRegistry;
use crate::memory::{MemoryValue, Restriction};
use crate::rule::RuleAnalysis;
use crate::value_count::{attribute_names, OwnerKey, ValueCountForest, ValueKey};

/// What a checker variable resolved to during one match attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Binding {
    /// An identifier instance.
    Owner(OwnerKey),
    /// Whatever values live under `(owner, attribute)`.
    Values(OwnerKey, String),
    /// An attribute name.
    Literal(String),
}

pub type Substitution = IndexMap<String, Binding>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Correspondence {
    pub checker: String,
    pub producer: String,
    pub substitution: Substitution,
}

impl Correspondence {
    /// The producer-side variable a checker identifier variable matched.
    pub fn matched_variable(&self, checker_var: &str) -> Option<&str> {
        match self.substitution.get(checker_var)? {
            Binding::Owner(OwnerKey::Created { var, .. }) => Some(var),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRound {
    pub round: usize,
    pub pairs_checked: usize,
    pub literal_total: usize,
    pub key_total: usize,
    /// Owners whose edges changed this round.
    pub grown: usize,
}

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub forest: ValueCountForest,
    pub correspondences: Vec<Correspondence>,
    pub rounds: Vec<MatchRound>,
}

/// Run the work-list to quiescence.
pub fn cross_match(rules: &[RuleAnalysis], registry: &DisjunctionRegistry) -> MatchOutcome {
    let mut forest = ValueCountForest::build(rules, registry);

    let checkers: Vec<usize> = (0..rules.len())
        .filter(|&i| rules[i].is_checker() || !forest.unresolved_bound(&rules[i].name).is_empty())
        .collect();
    let all_pairs = pairs(&checkers, rules.len());

    let limit = round_limit(rules, registry);
    let mut queue: IndexSet<(usize, usize)> = all_pairs.iter().copied().collect();
    let mut correspondences: Vec<Correspondence> = Vec::new();
    let mut rounds: Vec<MatchRound> = Vec::new();

    let mut resolving = true;
    while !queue.is_empty() || resolving {
        let round = rounds.len() + 1;
        debug_assert!(round <= limit, "cross-rule matching did not converge");
        if round > limit {
            tracing::warn!(round, "cross-rule matching stopped before convergence");
            break;
        }

        let batch = std::mem::take(&mut queue);
        let mut grown: IndexSet<OwnerKey> = IndexSet::new();
        for &(c, p) in &batch {
            let checker = &rules[c];
            let producer = &rules[p];
            for substitution in match_pair(checker, producer, &forest, registry) {
                grown.extend(apply(checker, &substitution, &mut forest, registry));
                let correspondence = Correspondence {
                    checker: checker.name.clone(),
                    producer: producer.name.clone(),
                    substitution,
                };
                if !correspondences.contains(&correspondence) {
                    correspondences.push(correspondence);
                }
            }
        }
        let resolved = resolve_copies(rules, &mut forest, registry);
        resolving = !resolved.is_empty();
        grown.extend(resolved);

        let stats = MatchRound {
            round,
            pairs_checked: batch.len(),
            literal_total: forest.literal_total(),
            key_total: forest.key_total(),
            grown: grown.len(),
        };
        tracing::debug!(
            round = stats.round,
            pairs = stats.pairs_checked,
            literals = stats.literal_total,
            keys = stats.key_total,
            grown = stats.grown,
            "matcher round"
        );
        rounds.push(stats);

        if !grown.is_empty() {
            let reach = forest.reachable_owners([OwnerKey::State]);
            for &(c, p) in &all_pairs {
                let producer_reach = forest.reachable_owners(
                    producer_roots(&rules[p], &forest).chain(reach.iter().cloned()),
                );
                if grown.iter().any(|o| producer_reach.contains(o)) {
                    queue.insert((c, p));
                }
            }
        }
    }

    MatchOutcome {
        forest,
        correspondences,
        rounds,
    }
}

fn pairs(checkers: &[usize], rule_count: usize) -> Vec<(usize, usize)> {
    checkers
        .iter()
        .flat_map(|&c| (0..rule_count).filter(move |&p| p != c).map(move |p| (c, p)))
        .collect()
}

fn producer_roots<'a>(
    producer: &'a RuleAnalysis,
    forest: &'a ValueCountForest,
) -> impl Iterator<Item = OwnerKey> + 'a {
    forest
        .roots
        .keys()
        .filter(move |o| o.rule() == Some(producer.name.as_str()))
        .cloned()
}

/// Upper bound on rounds: every round but the last inserts at least one key,
/// and keys come from a finite universe.
fn round_limit(rules: &[RuleAnalysis], registry: &DisjunctionRegistry) -> usize {
    let owners = 1 + rules.iter().map(|r| r.created.len()).sum::<usize>();
    let variables: usize = rules.iter().map(|r| r.variables.variables.len() + r.variables.rejected.len()).sum();
    let labels: usize = rules
        .iter()
        .flat_map(|r| r.check.values().chain(r.create.values()).chain(r.update.values()))
        .map(|t| t.edges.len() * (1 + t.edges.iter().map(|e| e.values.len()).sum::<usize>()))
        .sum();
    let literals: usize = registry.iter().map(|(_, l)| l.len()).sum();
    let keys = 2 + 2 * variables + labels + literals;
    owners * (labels + literals + 1) * keys + 2
}

/// All substitutions under which `checker` matches memory produced by `producer`.
pub fn match_pair(
    checker: &RuleAnalysis,
    producer: &RuleAnalysis,
    forest: &ValueCountForest,
    registry: &DisjunctionRegistry,
) -> Vec<Substitution> {
    let matcher = Matcher {
        checker,
        forest,
        registry,
    };
    let mut start = Substitution::new();
    start.insert(checker.state_var.clone(), Binding::Owner(OwnerKey::State));
    matcher
        .match_owner(&checker.state_var, &OwnerKey::State, start)
        .into_iter()
        .filter(|s| counts_as_match(checker, s))
        .filter(|s| {
            s.values().any(|b| match b {
                Binding::Owner(owner) => owner.rule() == Some(producer.name.as_str()),
                _ => false,
            })
        })
        .collect()
}

/// Trace every rule's copied values to whatever its conditions read. This
/// does not need the minimum match: a rule that only reads the state still
/// copies what the state holds. Returns the owners that changed.
fn resolve_copies(
    rules: &[RuleAnalysis],
    forest: &mut ValueCountForest,
    registry: &DisjunctionRegistry,
) -> IndexSet<OwnerKey> {
    let mut changed = IndexSet::new();
    for rule in rules {
        let placeholders = forest.placeholders(&rule.name);
        if placeholders.is_empty() {
            continue;
        }
        let matcher = Matcher {
            checker: rule,
            forest: &*forest,
            registry,
        };
        let mut start = Substitution::new();
        start.insert(rule.state_var.clone(), Binding::Owner(OwnerKey::State));
        let substitutions = matcher.match_owner(&rule.state_var, &OwnerKey::State, start);
        for substitution in &substitutions {
            changed.extend(resolve_placeholders(rule, &placeholders, substitution, forest, registry));
        }
    }
    changed
}

fn resolve_placeholders(
    rule: &RuleAnalysis,
    placeholders: &IndexSet<String>,
    substitution: &Substitution,
    forest: &mut ValueCountForest,
    registry: &DisjunctionRegistry,
) -> IndexSet<OwnerKey> {
    let mut changed = IndexSet::new();
    for var in placeholders {
        if !substitution.contains_key(var) {
            continue;
        }
        let replacements = bound_keys(rule, var, substitution, forest, registry);
        if replacements.is_empty() {
            continue;
        }
        let placeholder = ValueKey::Bound {
            rule: rule.name.clone(),
            var: var.clone(),
        };
        changed.extend(forest.resolve(&placeholder, &replacements));
    }
    changed
}

/// Minimum-match rule: every identifier of the hierarchy resolved, and at
/// least one of them beyond the state.
fn counts_as_match(checker: &RuleAnalysis, substitution: &Substitution) -> bool {
    checker.hierarchy.len() >= 2
        && checker
            .hierarchy
            .iter()
            .all(|v| matches!(substitution.get(v), Some(Binding::Owner(_))))
}

struct Matcher<'a> {
    checker: &'a RuleAnalysis,
    forest: &'a ValueCountForest,
    registry: &'a DisjunctionRegistry,
}

impl Matcher<'_> {
    fn match_owner(&self, var: &str, owner: &OwnerKey, substitution: Substitution) -> Vec<Substitution> {
        let Some(tree) = self.checker.check.get(var) else {
            return vec![substitution];
        };
        let mut solutions = vec![substitution];
        for edge in &tree.edges {
            for value in edge.values.iter().filter(|v| !v.is_negated()) {
                let mut next: Vec<Substitution> = Vec::new();
                for s in solutions {
                    for found in self.match_value(owner, &edge.label, value, s) {
                        if !next.contains(&found) {
                            next.push(found);
                        }
                    }
                }
                if next.is_empty() {
                    return next;
                }
                solutions = next;
            }
        }
        solutions
    }

    fn candidate_attributes(&self, owner: &OwnerKey, label: &MemoryValue, substitution: &Substitution) -> Vec<String> {
        let Some(tree) = self.forest.tree(owner) else {
            return Vec::new();
        };
        let present = |a: &String| tree.edges.contains_key(a.as_str());
        match label {
            MemoryValue::Literal(a) => vec![a.clone()].into_iter().filter(present).collect(),
            MemoryValue::RuleVariable(x) => match substitution.get(x) {
                Some(Binding::Literal(a)) => vec![a.clone()].into_iter().filter(present).collect(),
                _ if self.checker.disjunctions.contains_key(x) => {
                    attribute_names(self.checker, label, self.registry)
                        .into_iter()
                        .filter(present)
                        .collect()
                }
                _ => tree.edges.keys().cloned().collect(),
            },
            MemoryValue::Wildcard => Vec::new(),
        }
    }

    fn match_value(
        &self,
        owner: &OwnerKey,
        label: &MemoryValue,
        value: &AugmentedTree,
        substitution: Substitution,
    ) -> Vec<Substitution> {
        let mut out = Vec::new();
        for attr in self.candidate_attributes(owner, label, &substitution) {
            let Some(edge) = self.forest.edge(owner, &attr) else {
                continue;
            };
            let mut s = substitution.clone();
            if let MemoryValue::RuleVariable(x) = label {
                s.entry(x.clone()).or_insert_with(|| Binding::Literal(attr.clone()));
            }
            if !self.literal_set_allows(value, edge.live()) {
                continue;
            }
            match &value.name {
                MemoryValue::Literal(l) => {
                    if edge.values.contains(&ValueKey::Literal(l.clone())) {
                        out.push(s);
                    }
                }
                MemoryValue::Wildcard => out.push(s),
                MemoryValue::RuleVariable(v) if self.checker.hierarchy.contains(v) => {
                    let instances: Vec<OwnerKey> = edge.live().filter_map(ValueKey::as_owner).collect();
                    for instance in instances {
                        match s.get(v) {
                            Some(Binding::Owner(bound)) if *bound == instance => out.push(s.clone()),
                            Some(_) => {}
                            None => {
                                let mut deeper = s.clone();
                                deeper.insert(v.clone(), Binding::Owner(instance.clone()));
                                out.extend(self.match_owner(v, &instance, deeper));
                            }
                        }
                    }
                }
                MemoryValue::RuleVariable(v) => {
                    s.entry(v.clone())
                        .or_insert_with(|| Binding::Values(owner.clone(), attr.clone()));
                    out.push(s);
                }
            }
        }
        out
    }

    fn literal_set_allows<'k>(&self, value: &AugmentedTree, mut keys: impl Iterator<Item = &'k ValueKey>) -> bool {
        let Some(array) = value.restrictions.iter().find_map(|r| match r {
            Restriction::LiteralSet(name) => Some(name),
            _ => None,
        }) else {
            return true;
        };
        let Some(literals) = self.registry.literals(array) else {
            return true;
        };
        keys.any(|k| match k {
            ValueKey::Literal(l) => literals.contains(l),
            _ => true,
        })
    }
}

/// Push the checker's update writes into the matched instances and resolve
/// its placeholders. Returns the owners that changed.
fn apply(
    checker: &RuleAnalysis,
    substitution: &Substitution,
    forest: &mut ValueCountForest,
    registry: &DisjunctionRegistry,
) -> IndexSet<OwnerKey> {
    let mut changed = IndexSet::new();

    for (var, tree) in &checker.update {
        let Some(Binding::Owner(owner)) = substitution.get(var) else {
            continue;
        };
        for edge in &tree.edges {
            let attrs = match (&edge.label, edge.label.as_variable().and_then(|x| substitution.get(x))) {
                (_, Some(Binding::Literal(a))) => vec![a.clone()],
                (label, _) => attribute_names(checker, label, registry),
            };
            for attr in attrs {
                for value in &edge.values {
                    for key in write_keys(checker, &value.name, &attr, substitution, forest, registry) {
                        if forest.insert(owner, &attr, key) {
                            changed.insert(owner.clone());
                        }
                    }
                }
                forest.mark_updated(owner, &attr);
            }
        }
    }

    let placeholders = forest.placeholders(&checker.name);
    changed.extend(resolve_placeholders(checker, &placeholders, substitution, forest, registry));
    changed
}

fn write_keys(
    checker: &RuleAnalysis,
    value: &MemoryValue,
    attr: &str,
    substitution: &Substitution,
    forest: &ValueCountForest,
    registry: &DisjunctionRegistry,
) -> Vec<ValueKey> {
    match value {
        MemoryValue::Literal(l) => vec![ValueKey::Literal(l.clone())],
        MemoryValue::Wildcard => vec![ValueKey::Computed {
            rule: checker.name.clone(),
            attribute: attr.to_string(),
        }],
        MemoryValue::RuleVariable(v) if checker.created.contains(v) => vec![ValueKey::Identifier {
            rule: checker.name.clone(),
            var: v.clone(),
        }],
        MemoryValue::RuleVariable(v) if *v == checker.state_var => vec![ValueKey::State],
        MemoryValue::RuleVariable(v) => {
            let keys = bound_keys(checker, v, substitution, forest, registry);
            if keys.is_empty() {
                vec![ValueKey::Bound {
                    rule: checker.name.clone(),
                    var: v.clone(),
                }]
            } else {
                keys
            }
        }
    }
}

/// Concrete values a condition-bound variable stands for under `substitution`.
fn bound_keys(
    checker: &RuleAnalysis,
    var: &str,
    substitution: &Substitution,
    forest: &ValueCountForest,
    registry: &DisjunctionRegistry,
) -> Vec<ValueKey> {
    let allowed = checker
        .disjunctions
        .get(var)
        .and_then(|array| registry.literals(array));
    match substitution.get(var) {
        Some(Binding::Owner(owner)) => vec![owner.as_value()],
        Some(Binding::Literal(a)) => vec![ValueKey::Literal(a.clone())],
        Some(Binding::Values(owner, attr)) => forest
            .edge(owner, attr)
            .map(|edge| {
                edge.live()
                    .filter(|k| match (k, allowed) {
                        (ValueKey::Literal(l), Some(literals)) => literals.contains(l),
                        _ => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default(),
        None => allowed
            .map(|literals| literals.iter().cloned().map(ValueKey::Literal).collect())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;

    fn run(src: &str) -> (Vec<RuleAnalysis>, MatchOutcome) {
        let rules = soarta_dsl::parse(src, "test.soar").expect("parse failed");
        let analysis = analyze(&rules).expect("analysis failed");
        let outcome = cross_match(&analysis.rules, &analysis.disjunctions);
        (analysis.rules, outcome)
    }

    #[test]
    fn state_only_checkers_never_fan_out() {
        let (_, outcome) = run(
            r#"
sp {copy (state <s> ^source <x>) --> (<s> ^target <x>)}
sp {seed (state <s> ^go yes) --> (<s> ^source a)}
"#,
        );
        assert!(outcome.correspondences.is_empty());
        let edge = outcome.forest.edge(&OwnerKey::State, "target").unwrap();
        assert_eq!(edge.count(), 1);
        let values: Vec<String> = edge.live().map(|k| k.to_string()).collect();
        assert_eq!(values, vec!["a"]);
    }

    #[test]
    fn state_copies_take_every_value_the_source_holds() {
        let (_, outcome) = run(
            r#"
sp {seed*a (state <s> ^superstate nil) --> (<s> ^item a)}
sp {seed*b (state <s> ^superstate nil) --> (<s> ^item b)}
sp {mark :o-support (state <s> ^item <x>) --> (<s> ^marked <x>)}
"#,
        );
        let item = outcome.forest.edge(&OwnerKey::State, "item").unwrap();
        let marked = outcome.forest.edge(&OwnerKey::State, "marked").unwrap();
        assert_eq!(item.count(), 2);
        assert_eq!(marked.count(), item.count());
    }

    #[test]
    fn chained_copies_resolve_transitively() {
        let (_, outcome) = run(
            r#"
sp {seed*a (state <s> ^superstate nil) --> (<s> ^source a)}
sp {seed*b (state <s> ^superstate nil) --> (<s> ^source b)}
sp {copy (state <s> ^middle <x>) --> (<s> ^target <x>)}
sp {relay (state <s> ^source <v>) --> (<s> ^middle <v>)}
"#,
        );
        let target = outcome.forest.edge(&OwnerKey::State, "target").unwrap();
        let mut values: Vec<String> = target.live().map(|k| k.to_string()).collect();
        values.sort();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn update_writes_land_in_the_producer_instance() {
        let (_, outcome) = run(
            r#"
sp {make (state <s> ^go yes) --> (<s> ^task <t>) (<t> ^status ready)}
sp {finish (state <s> ^task <x>) (<x> ^status ready) --> (<x> ^status done)}
"#,
        );
        let task = OwnerKey::created("make", "t");
        let edge = outcome.forest.edge(&task, "status").unwrap();
        assert_eq!(edge.count(), 2);
        assert!(edge.updated);
        assert_eq!(outcome.correspondences.len(), 1);
        assert_eq!(outcome.correspondences[0].matched_variable("x"), Some("t"));
    }

    #[test]
    fn literal_mismatch_prevents_a_match() {
        let (_, outcome) = run(
            r#"
sp {make (state <s> ^go yes) --> (<s> ^task <t>) (<t> ^status ready)}
sp {finish (state <s> ^task <x>) (<x> ^status busy) --> (<x> ^status done)}
"#,
        );
        assert!(outcome.correspondences.is_empty());
        assert_eq!(
            outcome
                .forest
                .edge(&OwnerKey::created("make", "t"), "status")
                .unwrap()
                .count(),
            1
        );
    }

    #[test]
    fn disjunction_attributes_restrict_candidates() {
        let (_, outcome) = run(
            r#"
sp {make (state <s> ^go yes) --> (<s> ^task <t>) (<t> ^north 1 ^east 2)}
sp {mark (state <s> ^task <x>) (<x> ^{<d> << north south >>} <v>) --> (<x> ^seen <v>)}
"#,
        );
        let seen = outcome
            .forest
            .edge(&OwnerKey::created("make", "t"), "seen")
            .unwrap();
        let values: Vec<String> = seen.live().map(|k| k.to_string()).collect();
        assert_eq!(values, vec!["1"]);
    }
}
