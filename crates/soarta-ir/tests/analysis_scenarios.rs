use soarta_ir::analysis::{analyze, Analysis, AnalysisError, WarningKind};
use soarta_ir::identity::IdentityTable;
use soarta_ir::matcher::{cross_match, MatchOutcome};
use soarta_ir::memory::{MemoryValue, Restriction};
use soarta_ir::rule::{ActionValue, PreferenceKind, RuleAction};
use soarta_ir::value_count::OwnerKey;

fn analyse(src: &str) -> Analysis {
    let rules = soarta_dsl::parse(src, "scenario.soar").expect("parse failed");
    analyze(&rules).expect("analysis failed")
}

fn matched(src: &str) -> (Analysis, MatchOutcome) {
    let analysis = analyse(src);
    let outcome = cross_match(&analysis.rules, &analysis.disjunctions);
    (analysis, outcome)
}

#[test]
fn producer_and_checker_agree_on_status() {
    let (_, outcome) = matched(
        r#"
sp {a*prepare
   (state <s> ^superstate nil)
-->
   (<s> ^job <j>)
   (<j> ^status ready)}

sp {b*check
   (state <s> ^job <w>)
   (<w> ^status ready)
-->
   (<w> ^checked yes)}
"#,
    );

    let first_round: Vec<_> = outcome
        .correspondences
        .iter()
        .filter(|c| c.checker == "b*check" && c.producer == "a*prepare")
        .collect();
    assert_eq!(first_round.len(), 1);
    assert_eq!(first_round[0].matched_variable("w"), Some("j"));
    assert!(outcome.rounds[0].grown > 0);

    let job = OwnerKey::created("a*prepare", "j");
    assert_eq!(outcome.forest.edge(&job, "status").unwrap().count(), 1);
    assert_eq!(outcome.forest.edge(&job, "checked").unwrap().count(), 1);
}

#[test]
fn three_writers_give_three_values() {
    let (_, outcome) = matched(
        r#"
sp {paint*red   (state <s> ^phase one)   --> (<s> ^color red)}
sp {paint*green (state <s> ^phase two)   --> (<s> ^color green)}
sp {paint*blue  (state <s> ^phase three) --> (<s> ^color blue)}
"#,
    );
    assert_eq!(outcome.forest.edge(&OwnerKey::State, "color").unwrap().count(), 3);
}

#[test]
fn matcher_rounds_are_monotone_and_bounded() {
    let (_, outcome) = matched(
        r#"
sp {make (state <s> ^superstate nil) --> (<s> ^job <j>) (<j> ^step 1)}
sp {step*two (state <s> ^job <j>) (<j> ^step 1) --> (<j> ^step 2)}
sp {step*three (state <s> ^job <j>) (<j> ^step 2) --> (<j> ^step 3)}
sp {step*four (state <s> ^job <j>) (<j> ^step 3) --> (<j> ^step 4)}
"#,
    );
    let totals: Vec<usize> = outcome.rounds.iter().map(|r| r.literal_total).collect();
    assert!(totals.windows(2).all(|w| w[0] <= w[1]));
    let job = OwnerKey::created("make", "j");
    assert_eq!(outcome.forest.edge(&job, "step").unwrap().count(), 4);
    // 4 literals plus the attribute and identifier vocabulary bound the passes.
    assert!(outcome.rounds.len() <= 8);
    assert_eq!(outcome.rounds.last().unwrap().grown, 0);
}

#[test]
fn identical_literal_sets_share_one_array() {
    let analysis = analyse(
        r#"
sp {first (state <s> ^color { <c> << red green blue >> }) --> (<s> ^seen <c>)}
sp {second (state <s> ^shade << blue red green >>) --> (<s> ^seen none)}
"#,
    );
    assert_eq!(analysis.disjunctions.len(), 1);
    let first = analysis.rule("first").unwrap();
    assert_eq!(first.disjunctions.get("c").map(String::as_str), Some("array_1"));
    let second = analysis.rule("second").unwrap();
    assert!(second.conditions[0]
        .restrictions
        .contains(&Restriction::LiteralSet("array_1".into())));
}

#[test]
fn operator_conditions_make_rules_o_supported() {
    let analysis = analyse(
        r#"
sp {apply*move
   (state <s> ^operator <o>)
   (<o> ^name move)
-->
   (<o> ^moved yes)}

sp {elaborate*task
   (state <s> ^task <t>)
   (<t> ^name move)
-->
   (<t> ^moved yes)}

sp {forced
   :o-support
   (state <s> ^task <t>)
-->
   (<t> ^moved yes)}

sp {denied
   :i-support
   (state <s> ^operator <o>)
-->
   (<o> ^moved yes)}
"#,
    );
    assert!(analysis.rule("apply*move").unwrap().o_supported);
    assert!(!analysis.rule("elaborate*task").unwrap().o_supported);
    assert!(analysis.rule("forced").unwrap().o_supported);
    assert!(!analysis.rule("denied").unwrap().o_supported);
}

#[test]
fn unbound_variable_aborts_the_batch() {
    let rules = soarta_dsl::parse(
        r#"
sp {fine (state <s> ^a 1) --> (<s> ^b 2)}
sp {broken (state <s> ^a 1) --> (<s> ^b 2) (<y> ^c 3)}
"#,
        "broken.soar",
    )
    .expect("parse failed");
    match analyze(&rules) {
        Err(AnalysisError::UnboundVariable { rule, variable, .. }) => {
            assert_eq!(rule, "broken");
            assert_eq!(variable, "y");
        }
        other => panic!("expected unbound variable, got {other:?}"),
    }
}

#[test]
fn unsupported_constructs_skip_only_their_rule() {
    let analysis = analyse(
        r#"
sp {float*relation (state <s> ^speed > 2.5) --> (<s> ^fast yes)}
sp {negated*pair (state <s> ^a 1) -(<s> ^b 2 ^c 3) --> (<s> ^d 4)}
sp {chain*disjunction (state <s> ^io.input-link << a b >>) --> (<s> ^e 5)}
sp {free*attribute (state <s> ^name <n>) --> (<s> ^<n> 6)}
sp {kept (state <s> ^a 1) --> (<s> ^f 7)}
"#,
    );
    assert_eq!(analysis.rules.len(), 1);
    assert_eq!(analysis.rules[0].name, "kept");
    assert_eq!(analysis.warnings.len(), 4);
    assert!(analysis
        .warnings
        .iter()
        .all(|w| w.kind == WarningKind::Unsupported && !w.reasons.is_empty()));
}

#[test]
fn dotted_chains_introduce_hidden_identifiers() {
    let analysis = analyse(
        r#"
sp {read (state <s> ^io.input-link.altitude <alt>) --> (<s> ^altitude <alt>)}
"#,
    );
    let rule = analysis.rule("read").unwrap();
    assert_eq!(rule.conditions.len(), 3);
    assert_eq!(rule.hierarchy.len(), 3);
    assert!(rule.hierarchy[1].starts_with("io#"));
    assert!(rule.variables.is_rejected(&rule.hierarchy[2]));
    assert_eq!(
        analysis.shape.path_of(rule.paths[&rule.hierarchy[2]]),
        "state_io_input-link"
    );
}

#[test]
fn actions_are_normalised() {
    let analysis = analyse(
        r#"
sp {apply*count
   (state <s> ^operator <o> ^count <c>)
   (<o> ^name increment)
-->
   (<s> ^count <c> -)
   (<s> ^count (+ <c> 1))
   (<s> ^operator <o> < <o>)
   (<s> ^log (concat a b))}
"#,
    );
    let rule = analysis.rule("apply*count").unwrap();
    assert!(matches!(&rule.actions[0], RuleAction::Remove { value: ActionValue::Variable(v), .. } if v == "c"));
    assert!(matches!(&rule.actions[1], RuleAction::Add { value: ActionValue::Compute { .. }, .. }));
    assert!(matches!(
        &rule.actions[2],
        RuleAction::Prefer { preference: PreferenceKind::Worse(v), .. } if v == "o"
    ));
    assert!(matches!(&rule.actions[3], RuleAction::Add { value: ActionValue::Unsupported(f), .. } if f == "concat"));
    let count_values: Vec<&MemoryValue> = rule.create["s"]
        .edge(&MemoryValue::literal("count"))
        .unwrap()
        .values
        .iter()
        .map(|v| &v.name)
        .collect();
    assert_eq!(count_values, vec![&MemoryValue::Wildcard]);
}

#[test]
fn identities_are_stable_across_runs() {
    let src = r#"
sp {propose (state <s> ^superstate nil) --> (<s> ^operator <o> +) (<o> ^name go)}
sp {apply (state <s> ^operator <o>) (<o> ^name go) --> (<s> ^done yes)}
"#;
    let first = analyse(src);
    let second = analyse(src);
    let a = IdentityTable::assign(&first.rules, &first.disjunctions, &first.shape);
    let b = IdentityTable::assign(&second.rules, &second.disjunctions, &second.shape);
    assert_eq!(a, b);
    assert_eq!(
        a.identity_for("apply", "o").unwrap().name,
        "state_operator_2"
    );
}
