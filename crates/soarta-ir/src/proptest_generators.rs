//! Proptest strategies for symbol trees and small, well-formed Soar rule sets.

use proptest::prelude::*;

use crate::symbol_tree::SymbolTree;

const ATTRIBUTES: [&str; 5] = ["color", "status", "count", "name", "target"];
const LITERALS: [&str; 6] = ["red", "green", "blue", "ready", "done", "7"];

fn arb_name() -> impl Strategy<Value = String> {
    "[a-e]{1,3}".prop_map(|s| s.to_string())
}

/// Strategy for a symbol tree built from 0-12 random root-to-leaf paths.
pub fn arb_symbol_tree() -> impl Strategy<Value = SymbolTree> {
    proptest::collection::vec(proptest::collection::vec(arb_name(), 1..4), 0..12).prop_map(
        |paths| {
            let mut tree = SymbolTree::new("state");
            for path in paths {
                let names: Vec<&str> = path.iter().map(String::as_str).collect();
                tree.add_path(tree.root(), &names);
            }
            tree
        },
    )
}

/// One generated rule: which attribute it tests, which it writes, and how.
#[derive(Debug, Clone)]
struct RuleShape {
    tested: usize,
    tested_value: usize,
    written: usize,
    written_value: usize,
    through_task: bool,
}

fn arb_rule_shape() -> impl Strategy<Value = RuleShape> {
    (
        0..ATTRIBUTES.len(),
        0..LITERALS.len(),
        0..ATTRIBUTES.len(),
        0..LITERALS.len(),
        any::<bool>(),
    )
        .prop_map(
            |(tested, tested_value, written, written_value, through_task)| RuleShape {
                tested,
                tested_value,
                written,
                written_value,
                through_task,
            },
        )
}

/// Strategy for the source text of 1-6 rules that always analyse cleanly.
///
/// The first rule creates a `^task` identifier; later rules either write to
/// the state or, when `through_task` is set, match the task and update it.
pub fn arb_rule_source() -> impl Strategy<Value = String> {
    proptest::collection::vec(arb_rule_shape(), 1..6).prop_map(|shapes| {
        let mut src = String::from(
            "sp {make*task\n   (state <s> ^superstate nil)\n-->\n   (<s> ^task <t>)\n   (<t> ^status ready)}\n",
        );
        for (i, shape) in shapes.iter().enumerate() {
            let tested = ATTRIBUTES[shape.tested];
            let tested_value = LITERALS[shape.tested_value];
            let written = ATTRIBUTES[shape.written];
            let written_value = LITERALS[shape.written_value];
            if shape.through_task {
                src.push_str(&format!(
                    "sp {{rule{i}\n   (state <s> ^task <x>)\n   (<x> ^{tested} {tested_value})\n-->\n   (<x> ^{written} {written_value})}}\n"
                ));
            } else {
                src.push_str(&format!(
                    "sp {{rule{i}\n   (state <s> ^{tested} {tested_value})\n-->\n   (<s> ^{written} {written_value})}}\n"
                ));
            }
        }
        src
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::identity::IdentityTable;
    use crate::matcher::cross_match;

    proptest! {
        #[test]
        fn inserting_an_existing_child_is_a_no_op(tree in arb_symbol_tree(), name in arb_name()) {
            let mut once = tree.clone();
            once.add_child(once.root(), &name);
            let mut twice = once.clone();
            twice.add_child(twice.root(), &name);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn identity_assignment_is_deterministic(src in arb_rule_source()) {
            let rules = soarta_dsl::parse(&src, "gen.soar").expect("parse failed");
            let analysis = analyze(&rules).expect("analysis failed");
            let first = IdentityTable::assign(&analysis.rules, &analysis.disjunctions, &analysis.shape);
            let second = IdentityTable::assign(&analysis.rules, &analysis.disjunctions, &analysis.shape);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn literal_totals_never_decrease(src in arb_rule_source()) {
            let rules = soarta_dsl::parse(&src, "gen.soar").expect("parse failed");
            let analysis = analyze(&rules).expect("analysis failed");
            let seeded = crate::value_count::ValueCountForest::build(&analysis.rules, &analysis.disjunctions)
                .literal_total();
            let outcome = cross_match(&analysis.rules, &analysis.disjunctions);
            let mut previous = seeded;
            for round in &outcome.rounds {
                prop_assert!(round.literal_total >= previous);
                previous = round.literal_total;
            }
            let vocabulary = ATTRIBUTES.len() + LITERALS.len();
            prop_assert!(outcome.rounds.len() <= vocabulary + 2);
        }
    }
}
