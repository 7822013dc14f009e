use soarta_codegen::network::Network;
use soarta_codegen::sizing::Sizing;
use soarta_codegen::{generate, GenerationError, GeneratorOptions};
use soarta_ir::analysis::analyze;
use soarta_ir::identity::IdentityTable;
use soarta_ir::matcher::cross_match;

fn build(src: &str, options: &GeneratorOptions) -> Result<(Network, Sizing), GenerationError> {
    let rules = soarta_dsl::parse(src, "test.soar").expect("parse failed");
    let analysis = analyze(&rules).expect("analysis failed");
    let outcome = cross_match(&analysis.rules, &analysis.disjunctions);
    let table = IdentityTable::assign(&analysis.rules, &analysis.disjunctions, &analysis.shape);
    let model = generate(
        &analysis.rules,
        &analysis.disjunctions,
        &outcome.forest,
        &table,
        options,
    )?;
    Ok((model.network, model.sizing))
}

const COUNTER: &str = r#"
sp {propose*init (state <s> ^superstate nil -^count)
--> (<s> ^operator <o> + =) (<o> ^name init)}

sp {apply*init (state <s> ^operator <o>) (<o> ^name init)
--> (<s> ^count 0)}

sp {propose*increment (state <s> ^count { <c> < 3 })
--> (<s> ^operator <o> +) (<o> ^name increment)}

sp {apply*increment (state <s> ^operator <o> ^count <c>) (<o> ^name increment)
--> (<s> ^count <c> -) (<s> ^count (+ <c> 1))}

sp {detect*done (state <s> ^count 3)
--> (halt)}
"#;

#[test]
fn three_writers_of_three_literals_give_size_three() {
    let (network, sizing) = build(
        r#"
sp {a (state <s> ^phase one) --> (<s> ^mode fast)}
sp {b (state <s> ^phase two) --> (<s> ^mode slow)}
sp {c (state <s> ^phase three) --> (<s> ^mode idle)}
"#,
        &GeneratorOptions::default(),
    )
    .expect("generation failed");
    let mode = sizing.get("state_1", "mode").expect("mode array");
    assert_eq!(mode.size, 3);
    assert!(network
        .global_declaration
        .contains("int AV_state_1_mode[3] = {EMPTY, EMPTY, EMPTY};"));
}

#[test]
fn copied_values_size_their_destination() {
    let (network, sizing) = build(
        r#"
sp {seed*a (state <s> ^superstate nil) --> (<s> ^item a)}
sp {seed*b (state <s> ^superstate nil) --> (<s> ^item b)}
sp {mark :o-support (state <s> ^item <x>) --> (<s> ^marked <x>)}
"#,
        &GeneratorOptions::default(),
    )
    .expect("generation failed");
    let item = sizing.get("state_1", "item").expect("item array");
    let marked = sizing.get("state_1", "marked").expect("marked array");
    assert_eq!(item.size, 2);
    assert_eq!(marked.size, 2);

    let mark = network.template("mark").expect("mark template");
    let resume = mark.transitions_between("Apply_1", "Cond_0").next().expect("resume edge");
    assert!(resume.update.as_deref().unwrap_or_default().ends_with("idx_0 = idx_0 + 1"));
}

#[test]
fn counter_agent_produces_a_complete_network() {
    let (network, _) = build(COUNTER, &GeneratorOptions::default()).expect("generation failed");
    assert_eq!(network.templates.len(), 7);
    for rule in [
        "propose_init",
        "apply_init",
        "propose_increment",
        "apply_increment",
        "detect_done",
    ] {
        let t = network.template(rule).unwrap_or_else(|| panic!("missing {rule}"));
        assert_eq!(t.location_name(t.initial), "Start");
        assert!(t.location("Matched").is_some());
        assert!(network.system_block.contains(&format!("{rule}_0 = {rule}();")));
    }
    let decl = &network.global_declaration;
    assert!(decl.contains("const int N = 2;"));
    assert!(decl.contains("bool selectOperator(int op)"));
}

#[test]
fn halting_rule_sets_the_halted_flag() {
    let (network, _) = build(COUNTER, &GeneratorOptions::default()).expect("generation failed");
    let t = network.template("detect_done").unwrap();
    let halt = t.transitions_between("Run_Assignment", "Apply_1").next().unwrap();
    assert_eq!(halt.update.as_deref(), Some("halted = true, delta = true"));
}

#[test]
fn retract_chain_mirrors_the_match_chain() {
    let (network, _) = build(COUNTER, &GeneratorOptions::default()).expect("generation failed");
    let t = network.template("propose_increment").unwrap();
    let matching = t.locations.iter().filter(|l| l.name.starts_with("Cond_")).count();
    let retracting = t
        .locations
        .iter()
        .filter(|l| l.name.starts_with("Retract_Cond_"))
        .count();
    assert_eq!(matching, retracting);
    assert!(t.location("Retract_Test_0").is_some());

    let applying = network.template("apply_increment").unwrap();
    assert!(applying.location("Retract_Guard").is_none());
}

#[test]
fn firing_cap_is_configurable() {
    let options = GeneratorOptions {
        max_firings_per_cycle: 3,
    };
    let (network, _) = build(COUNTER, &options).expect("generation failed");
    assert!(network
        .global_declaration
        .contains("const int MAX_FIRINGS_PER_CYCLE = 3;"));
}

#[test]
fn generator_options_reject_unknown_fields() {
    let parsed: Result<GeneratorOptions, _> =
        serde_json::from_str(r#"{"max_firings_per_cycle": 4, "verbose": true}"#);
    assert!(parsed.is_err());
    let parsed: GeneratorOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(parsed, GeneratorOptions::default());
}

#[test]
fn attribute_variables_scan_the_attribute_table() {
    let (network, _) = build(
        r#"
sp {copy (state <s> ^source <v> ^phase copy) --> (<s> ^target <v>)}
sp {seed (state <s> ^superstate nil) --> (<s> ^source red)}
sp {watch (state <s> ^<a> red) --> (<s> ^seen <a>)}
"#,
        &GeneratorOptions::default(),
    )
    .expect("generation failed");
    let t = network.template("watch").unwrap();
    let advance = t.transitions_between("Cond_0", "Cond_0").next().unwrap();
    assert_eq!(
        advance.guard.as_deref(),
        Some("attrIdx_0 < NUM_ATTRIBUTES && wmNext(s, ATTRIBUTES[attrIdx_0], red, idx_0) < 0")
    );
    assert!(network.global_declaration.contains("const int ATTRIBUTES[NUM_ATTRIBUTES]"));
}
