//! One UPPAAL template per rule.
//!
//! Every rule instance waits in `Start` for the scheduler's `Run_Rule`
//! broadcast, walks its match chain through committed locations and, when all
//! conditions hold, applies its actions. After each firing the chain resumes
//! from the last enumerated binding, so every instantiation of the rule fires
//! within one wave. I-supported rules additionally re-check their conditions
//! once fired and retract what they added when the match no longer holds.

use soarta_ir::memory::MemoryValue;
use soarta_ir::rule::{ActionValue, ArithOp, RuleAction, RuleAnalysis};

use crate::conditions::{self, ConditionStep, Locals, StepKind};
use crate::naming::sanitize;
use crate::network::{LocationId, LocationKind, Template, Transition};
use crate::{GenContext, GenerationError};

/// Template-local names that are not rule variables.
struct Fixed {
    fired: String,
    delta: String,
    instances: String,
    remember: String,
    remember_preference: String,
    retract_all: String,
    keep_id: String,
    keep_attr: String,
    keep_value: String,
    keep_op: String,
    keep_pref: String,
    keep_other: String,
}

impl Fixed {
    fn allocate(locals: &mut Locals) -> Self {
        Self {
            fired: locals.fresh_name("fired"),
            delta: locals.fresh_name("delta"),
            instances: locals.fresh_name("instances"),
            remember: locals.fresh_name("remember"),
            remember_preference: locals.fresh_name("rememberPreference"),
            retract_all: locals.fresh_name("retractAll"),
            keep_id: locals.fresh_name("keep_id"),
            keep_attr: locals.fresh_name("keep_attr"),
            keep_value: locals.fresh_name("keep_value"),
            keep_op: locals.fresh_name("keep_op"),
            keep_pref: locals.fresh_name("keep_pref"),
            keep_other: locals.fresh_name("keep_other"),
        }
    }
}

/// Where a condition chain goes once it is done.
struct ChainEnds {
    success: LocationId,
    failure: LocationId,
}

pub(crate) fn build(ctx: &GenContext<'_>, rule: &RuleAnalysis) -> Result<Template, GenerationError> {
    let name = ctx
        .names
        .template(&rule.name)
        .map(str::to_string)
        .unwrap_or_else(|| sanitize(&rule.name));
    let mut locals = Locals::new(ctx.names.local_allocator());
    let fixed = Fixed::allocate(&mut locals);
    let steps = conditions::plan(ctx, rule, &mut locals)?;
    let state_local = locals.var(&rule.state_var);

    let mut t = Template::new(name);
    let start = t.add_location("Start", LocationKind::Normal);
    t.set_initial(start);
    let run_guard = t.add_location("Run_Guard", LocationKind::Committed);

    let entry_reset = entry_updates(&state_local, ctx.state_identity(), &steps);
    if rule.o_supported {
        t.add_transition(Transition::new(start, run_guard).sync("Run_Rule?"));
    } else {
        t.add_transition(
            Transition::new(start, run_guard)
                .guard(format!("!{}", fixed.fired))
                .sync("Run_Rule?"),
        );
    }

    let matched = t.add_location("Matched", LocationKind::Committed);
    let conds = emit_chain(
        &mut t,
        &steps,
        "",
        run_guard,
        &entry_reset,
        ChainEnds {
            success: matched,
            failure: start,
        },
    );

    let run_assignment = t.add_location("Run_Assignment", LocationKind::Committed);
    t.add_transition(
        Transition::new(matched, run_assignment)
            .guard("firedThisCycle < MAX_FIRINGS_PER_CYCLE")
            .update([format!("{} = false", fixed.delta)]),
    );
    t.add_transition(
        Transition::new(matched, start)
            .guard("firedThisCycle >= MAX_FIRINGS_PER_CYCLE")
            .update(["changed = true"]),
    );

    let effects = apply_effects(ctx, rule, &locals, &fixed)?;
    let mut current = run_assignment;
    for (i, effect) in effects.iter().enumerate() {
        let next = t.add_location(format!("Apply_{}", i + 1), LocationKind::Committed);
        t.add_transition(Transition::new(current, next).update([effect.clone()]));
        current = next;
    }
    let mut finish = Vec::new();
    if !rule.o_supported {
        finish.push(format!("{} = true", fixed.fired));
        finish.push(format!(
            "{instances} = {instances} + ({} ? 1 : 0)",
            fixed.delta,
            instances = fixed.instances
        ));
    }
    finish.push(format!(
        "firedThisCycle = firedThisCycle + ({} ? 1 : 0)",
        fixed.delta
    ));
    finish.push(format!("changed = changed || {}", fixed.delta));
    let (resume_at, resume_update) = resume(&steps, &conds, start);
    finish.extend(resume_update);
    t.add_transition(Transition::new(current, resume_at).update(finish));

    if !rule.o_supported {
        let retract_guard = t.add_location("Retract_Guard", LocationKind::Committed);
        let retract = t.add_location("Retract", LocationKind::Committed);
        t.add_transition(
            Transition::new(start, retract_guard)
                .guard(fixed.fired.clone())
                .sync("Run_Rule?"),
        );
        emit_chain(
            &mut t,
            &steps,
            "Retract_",
            retract_guard,
            &entry_reset,
            ChainEnds {
                success: start,
                failure: retract,
            },
        );
        t.add_transition(Transition::new(retract, start).update([
            format!("{}()", fixed.retract_all),
            format!("{} = false", fixed.fired),
            "changed = true".to_string(),
        ]));
    }

    t.declaration = declaration(rule, &locals, &fixed, ctx.options.max_firings_per_cycle);
    tracing::trace!(
        rule = %rule.name,
        steps = steps.len(),
        locations = t.locations.len(),
        "built rule template"
    );
    Ok(t)
}

fn entry_updates(state_local: &str, state: &str, steps: &[ConditionStep]) -> Vec<String> {
    let mut out = vec![format!("{state_local} = {state}")];
    for step in steps {
        for index in step.indices() {
            out.push(format!("{index} = 0"));
        }
    }
    out
}

/// Lay out one condition chain: `Cond_k` per step and `Test_k` where an
/// enumerated value still has to pass relation tests. Returns the `Cond_k`
/// locations.
fn emit_chain(
    t: &mut Template,
    steps: &[ConditionStep],
    prefix: &str,
    entry: LocationId,
    entry_update: &[String],
    ends: ChainEnds,
) -> Vec<LocationId> {
    let conds: Vec<LocationId> = (0..steps.len())
        .map(|k| t.add_location(format!("{prefix}Cond_{k}"), LocationKind::Committed))
        .collect();
    let first = conds.first().copied().unwrap_or(ends.success);
    t.add_transition(Transition::new(entry, first).update(entry_update.iter().cloned()));

    for (k, step) in steps.iter().enumerate() {
        let here = conds[k];
        let next = conds.get(k + 1).copied().unwrap_or(ends.success);
        let (back, back_update) = kickback(steps, &conds, k, ends.failure);

        match &step.kind {
            StepKind::Negated => {
                let scan = step.next_call(&step.attribute, "0");
                t.add_transition(Transition::new(here, next).guard(format!("{scan} < 0")));
                t.add_transition(
                    Transition::new(here, back)
                        .guard(format!("{scan} >= 0"))
                        .update(back_update),
                );
            }
            StepKind::Constrained => {
                let mut pass = vec![format!("{} >= 0", step.next_call(&step.attribute, "0"))];
                pass.extend(step.relations.iter().cloned());
                let pass = pass.join(" && ");
                t.add_transition(Transition::new(here, next).guard(pass.clone()));
                t.add_transition(
                    Transition::new(here, back)
                        .guard(format!("!({pass})"))
                        .update(back_update),
                );
            }
            StepKind::Enumerate => {
                let Some(index) = step.index.as_deref() else {
                    continue;
                };
                let scan = step.next_call(&step.attribute, index);
                let target = value_test(t, step, prefix, k, here, next);
                let mut found = vec![format!("{index} = {scan}")];
                if let Some(value) = &step.binds_value {
                    found.push(format!(
                        "{value} = wmGet({}, {}, {index})",
                        step.id, step.attribute
                    ));
                }
                t.add_transition(
                    Transition::new(here, target)
                        .guard(format!("{scan} >= 0"))
                        .update(found),
                );
                t.add_transition(
                    Transition::new(here, back)
                        .guard(format!("{scan} < 0"))
                        .update(back_update),
                );
            }
            StepKind::EnumerateAttribute {
                list,
                len,
                attr_index,
            } => {
                let Some(index) = step.index.as_deref() else {
                    continue;
                };
                let scanned = format!("{list}[{attr_index}]");
                let scan = step.next_call(&scanned, index);
                let target = value_test(t, step, prefix, k, here, next);
                let mut found = vec![
                    format!("{index} = {scan}"),
                    format!("{} = {scanned}", step.attribute),
                ];
                if let Some(value) = &step.binds_value {
                    found.push(format!(
                        "{value} = wmGet({}, {}, {index})",
                        step.id, step.attribute
                    ));
                }
                t.add_transition(
                    Transition::new(here, target)
                        .guard(format!("{attr_index} < {len} && {scan} >= 0"))
                        .update(found),
                );
                t.add_transition(
                    Transition::new(here, here)
                        .guard(format!("{attr_index} < {len} && {scan} < 0"))
                        .update([
                            format!("{attr_index} = {attr_index} + 1"),
                            format!("{index} = 0"),
                        ]),
                );
                t.add_transition(
                    Transition::new(here, back)
                        .guard(format!("{attr_index} >= {len}"))
                        .update(back_update),
                );
            }
        }
    }
    conds
}

/// `Test_k` for enumerators with relation tests; otherwise the next location.
fn value_test(
    t: &mut Template,
    step: &ConditionStep,
    prefix: &str,
    k: usize,
    here: LocationId,
    next: LocationId,
) -> LocationId {
    let (Some(relations), Some(index)) = (step.relation_guard(), step.index.as_deref()) else {
        return next;
    };
    let test = t.add_location(format!("{prefix}Test_{k}"), LocationKind::Committed);
    t.add_transition(Transition::new(test, next).guard(relations.clone()));
    t.add_transition(
        Transition::new(test, here)
            .guard(format!("!({relations})"))
            .update([format!("{index} = {index} + 1")]),
    );
    test
}

/// Backtrack target of step `k`: the closest earlier enumerator advances and
/// every index after it restarts. Without one the chain fails.
fn kickback(
    steps: &[ConditionStep],
    conds: &[LocationId],
    k: usize,
    failure: LocationId,
) -> (LocationId, Vec<String>) {
    backtrack(steps, conds, k, k + 1, failure)
}

/// Where the chain continues after a firing: the last enumerator moves on to
/// its next binding. Without one the rule has a single instantiation.
fn resume(
    steps: &[ConditionStep],
    conds: &[LocationId],
    done: LocationId,
) -> (LocationId, Vec<String>) {
    backtrack(steps, conds, steps.len(), steps.len(), done)
}

fn backtrack(
    steps: &[ConditionStep],
    conds: &[LocationId],
    before: usize,
    reset_end: usize,
    otherwise: LocationId,
) -> (LocationId, Vec<String>) {
    let Some(j) = (0..before).rev().find(|&j| steps[j].is_enumerator()) else {
        return (otherwise, Vec::new());
    };
    let mut update = Vec::new();
    if let Some(index) = &steps[j].index {
        update.push(format!("{index} = {index} + 1"));
    }
    for later in &steps[j + 1..reset_end] {
        for index in later.indices() {
            update.push(format!("{index} = 0"));
        }
    }
    (conds[j], update)
}

/// One update expression per action with a memory effect.
fn apply_effects(
    ctx: &GenContext<'_>,
    rule: &RuleAnalysis,
    locals: &Locals,
    fixed: &Fixed,
) -> Result<Vec<String>, GenerationError> {
    let delta = &fixed.delta;
    let mut effects = Vec::new();
    let mut kept = 0;
    let mut kept_preferences = 0;
    for action in &rule.actions {
        match action {
            RuleAction::Add {
                id,
                attribute,
                value,
            } => {
                let id = variable(ctx, rule, locals, id)?;
                let attribute = attribute_expr(ctx, rule, locals, attribute)?;
                let value = value_expr(ctx, rule, locals, value)?;
                if rule.o_supported {
                    effects.push(format!("{delta} = wmAdd({id}, {attribute}, {value}) || {delta}"));
                } else {
                    effects.push(format!(
                        "{delta} = {}({kept}, {id}, {attribute}, {value}) || {delta}",
                        fixed.remember
                    ));
                    kept += 1;
                }
            }
            RuleAction::Remove {
                id,
                attribute,
                value,
            } => {
                let id = variable(ctx, rule, locals, id)?;
                let attribute = attribute_expr(ctx, rule, locals, attribute)?;
                let value = value_expr(ctx, rule, locals, value)?;
                effects.push(format!(
                    "{delta} = wmRemove({id}, {attribute}, {value}) || {delta}"
                ));
            }
            RuleAction::Prefer {
                value, preference, ..
            } => {
                let op = value_expr(ctx, rule, locals, value)?;
                let other = match preference.operand() {
                    Some(var) => variable(ctx, rule, locals, var)?,
                    None => "EMPTY".to_string(),
                };
                let tag = preference.tag();
                if rule.o_supported {
                    effects.push(format!(
                        "{delta} = addPreference({op}, {tag}, {other}) || {delta}"
                    ));
                } else {
                    effects.push(format!(
                        "{delta} = {}({kept_preferences}, {op}, {tag}, {other}) || {delta}",
                        fixed.remember_preference
                    ));
                    kept_preferences += 1;
                }
            }
            RuleAction::Halt => {
                effects.push(format!("halted = true, {delta} = true"));
            }
            RuleAction::SideEffect(_) => {}
        }
    }
    Ok(effects)
}

/// A bound variable reads its local; a created one is its identity constant.
fn variable(
    ctx: &GenContext<'_>,
    rule: &RuleAnalysis,
    locals: &Locals,
    var: &str,
) -> Result<String, GenerationError> {
    if let Some(local) = locals.get(var) {
        return Ok(local.to_string());
    }
    ctx.identity(&rule.name, var)
}

fn attribute_expr(
    ctx: &GenContext<'_>,
    rule: &RuleAnalysis,
    locals: &Locals,
    attribute: &MemoryValue,
) -> Result<String, GenerationError> {
    match attribute {
        MemoryValue::Literal(a) => ctx.literal(&rule.name, a),
        MemoryValue::RuleVariable(v) => variable(ctx, rule, locals, v),
        MemoryValue::Wildcard => Err(GenerationError::UnresolvableIdentity {
            rule: rule.name.clone(),
            symbol: "^*".to_string(),
        }),
    }
}

fn value_expr(
    ctx: &GenContext<'_>,
    rule: &RuleAnalysis,
    locals: &Locals,
    value: &ActionValue,
) -> Result<String, GenerationError> {
    match value {
        ActionValue::Literal(l) => ctx.literal(&rule.name, l),
        ActionValue::Variable(v) => variable(ctx, rule, locals, v),
        ActionValue::Unsupported(_) => Ok("NA".to_string()),
        ActionValue::Compute {
            op: ArithOp::Neg,
            args,
        } => match args.first() {
            Some(arg) => Ok(format!("(-{})", value_expr(ctx, rule, locals, arg)?)),
            None => Ok("NA".to_string()),
        },
        ActionValue::Compute { op, args } => {
            let rendered = args
                .iter()
                .map(|a| value_expr(ctx, rule, locals, a))
                .collect::<Result<Vec<_>, _>>()?;
            if rendered.is_empty() {
                return Ok("NA".to_string());
            }
            Ok(format!("({})", rendered.join(&format!(" {} ", op.symbol()))))
        }
    }
}

fn declaration(rule: &RuleAnalysis, locals: &Locals, fixed: &Fixed, max_firings: u32) -> String {
    let mut out = String::new();
    for name in locals.ints() {
        out.push_str(&format!("int {name};\n"));
    }
    out.push_str(&format!("bool {} = false;\n", fixed.delta));
    if rule.o_supported {
        return out;
    }

    // Changing instantiations all fire in one wave, so at most one wave's
    // worth of firings is remembered between retractions.
    let slots = max_firings.max(1) as usize;
    out.push_str(&format!("bool {} = false;\n", fixed.fired));
    out.push_str(&format!("int {} = 0;\n", fixed.instances));
    let adds = rule
        .actions
        .iter()
        .filter(|a| matches!(a, RuleAction::Add { .. }))
        .count();
    let prefers = rule
        .actions
        .iter()
        .filter(|a| matches!(a, RuleAction::Prefer { .. }))
        .count();

    if adds > 0 {
        keep_arrays(&mut out, [&fixed.keep_id, &fixed.keep_attr, &fixed.keep_value], slots * adds);
        out.push_str(&format!(
            r#"
bool {remember}(int k, int id, int attr, int value) {{
    if (!wmAdd(id, attr, value)) {{
        return false;
    }}
    if ({instances} < {slots}) {{
        {keep_id}[{instances} * {adds} + k] = id;
        {keep_attr}[{instances} * {adds} + k] = attr;
        {keep_value}[{instances} * {adds} + k] = value;
    }}
    return true;
}}
"#,
            remember = fixed.remember,
            instances = fixed.instances,
            keep_id = fixed.keep_id,
            keep_attr = fixed.keep_attr,
            keep_value = fixed.keep_value,
        ));
    }
    if prefers > 0 {
        keep_arrays(&mut out, [&fixed.keep_op, &fixed.keep_pref, &fixed.keep_other], slots * prefers);
        out.push_str(&format!(
            r#"
bool {remember}(int k, int op, int pref, int other) {{
    if (!addPreference(op, pref, other)) {{
        return false;
    }}
    if ({instances} < {slots}) {{
        {keep_op}[{instances} * {prefers} + k] = op;
        {keep_pref}[{instances} * {prefers} + k] = pref;
        {keep_other}[{instances} * {prefers} + k] = other;
    }}
    return true;
}}
"#,
            remember = fixed.remember_preference,
            instances = fixed.instances,
            keep_op = fixed.keep_op,
            keep_pref = fixed.keep_pref,
            keep_other = fixed.keep_other,
        ));
    }

    out.push_str(&format!("\nvoid {}() {{\n", fixed.retract_all));
    if adds > 0 || prefers > 0 {
        out.push_str("    int k;\n");
    }
    if adds > 0 {
        out.push_str(&format!(
            "    for (k = 0; k < {len}; k++) {{\n        if ({id}[k] != EMPTY) {{\n            wmRemove({id}[k], {attr}[k], {value}[k]);\n            {id}[k] = EMPTY;\n        }}\n    }}\n",
            len = slots * adds,
            id = fixed.keep_id,
            attr = fixed.keep_attr,
            value = fixed.keep_value,
        ));
    }
    if prefers > 0 {
        out.push_str(&format!(
            "    for (k = 0; k < {len}; k++) {{\n        if ({op}[k] != EMPTY) {{\n            removePreference({op}[k], {pref}[k], {other}[k]);\n            {op}[k] = EMPTY;\n        }}\n    }}\n",
            len = slots * prefers,
            op = fixed.keep_op,
            pref = fixed.keep_pref,
            other = fixed.keep_other,
        ));
    }
    out.push_str(&format!("    {} = 0;\n", fixed.instances));
    out.push_str("}\n");
    out
}

fn keep_arrays(out: &mut String, names: [&String; 3], len: usize) {
    let empties = vec!["EMPTY"; len].join(", ");
    for keep in names {
        out.push_str(&format!("int {keep}[{len}] = {{{empties}}};\n"));
    }
}

#[cfg(test)]
mod tests {
    use crate::tests_support::generate_source;

    #[test]
    fn o_supported_rules_have_no_retraction() {
        let generated = generate_source(
            r#"
sp {apply*count (state <s> ^operator <o> ^count <c>) (<o> ^name count)
--> (<s> ^count <c> -) (<s> ^count (+ <c> 1))}
"#,
        );
        let t = generated.network.template("apply_count").unwrap();
        assert!(t.location("Retract").is_none());
        let entry = t.transitions_between("Start", "Run_Guard").next().unwrap();
        assert_eq!(entry.guard, None);
        assert_eq!(entry.sync.as_deref(), Some("Run_Rule?"));
        let updates: Vec<&str> = t
            .transitions
            .iter()
            .filter_map(|e| e.update.as_deref())
            .collect();
        assert!(updates.iter().any(|u| u.contains("wmRemove(s, count, c)")));
        assert!(updates.iter().any(|u| u.contains("wmAdd(s, count, (c + 1))")));
    }

    #[test]
    fn i_supported_rules_remember_and_retract() {
        let generated = generate_source(
            "sp {elaborate*ready (state <s> ^phase one) --> (<s> ^ready yes)}",
        );
        let t = generated.network.template("elaborate_ready").unwrap();
        let entry = t.transitions_between("Start", "Run_Guard").next().unwrap();
        assert_eq!(entry.guard.as_deref(), Some("!fired"));
        let recheck = t.transitions_between("Start", "Retract_Guard").next().unwrap();
        assert_eq!(recheck.guard.as_deref(), Some("fired"));
        let retract = t.transitions_between("Retract", "Start").next().unwrap();
        assert_eq!(
            retract.update.as_deref(),
            Some("retractAll(), fired = false, changed = true")
        );
        assert!(t.declaration.contains("int instances = 0;"));
        assert!(t
            .declaration
            .contains(&format!("int keep_id[10] = {{{}}};", vec!["EMPTY"; 10].join(", "))));
        assert!(t.declaration.contains("void retractAll()"));
        let apply = t.transitions_between("Run_Assignment", "Apply_1").next().unwrap();
        assert_eq!(
            apply.update.as_deref(),
            Some("delta = remember(0, s, ready, yes) || delta")
        );
    }

    #[test]
    fn enumerators_backtrack_to_the_previous_binding() {
        let generated = generate_source(
            r#"
sp {match*pair (state <s> ^item <i>) (<i> ^size { <n> > 2 })
--> (<s> ^big <i>)}
"#,
        );
        let t = generated.network.template("match_pair").unwrap();
        assert!(t.location("Test_1").is_some());
        let found = t.transitions_between("Cond_0", "Cond_1").next().unwrap();
        assert_eq!(
            found.update.as_deref(),
            Some("idx_0 = wmNext(s, item, ANY, idx_0), i = wmGet(s, item, idx_0)")
        );
        let back = t.transitions_between("Cond_1", "Cond_0").next().unwrap();
        assert_eq!(back.update.as_deref(), Some("idx_0 = idx_0 + 1, idx_1 = 0"));
        let exhausted = t.transitions_between("Cond_0", "Start").next().unwrap();
        assert_eq!(exhausted.guard.as_deref(), Some("wmNext(s, item, ANY, idx_0) < 0"));
        let rejected = t.transitions_between("Test_1", "Cond_1").next().unwrap();
        assert_eq!(rejected.guard.as_deref(), Some("!(n > 2)"));
    }

    #[test]
    fn firing_cap_defers_to_the_next_wave() {
        let generated = generate_source("sp {tick (state <s> ^phase one) --> (<s> ^ticked yes)}");
        let t = generated.network.template("tick").unwrap();
        let deferred = t.transitions_between("Matched", "Start").next().unwrap();
        assert_eq!(deferred.guard.as_deref(), Some("firedThisCycle >= MAX_FIRINGS_PER_CYCLE"));
        assert_eq!(deferred.update.as_deref(), Some("changed = true"));
        let finish = t.transitions_between("Apply_1", "Start").next().unwrap();
        assert_eq!(
            finish.update.as_deref(),
            Some("fired = true, instances = instances + (delta ? 1 : 0), firedThisCycle = firedThisCycle + (delta ? 1 : 0), changed = changed || delta")
        );
    }

    #[test]
    fn every_binding_fires_before_the_wave_ends() {
        let generated = generate_source(
            r#"
sp {seed*a (state <s> ^superstate nil) --> (<s> ^item a)}
sp {seed*b (state <s> ^superstate nil) --> (<s> ^item b)}
sp {mark :o-support (state <s> ^item <x>) --> (<s> ^marked <x>)}
"#,
        );
        let t = generated.network.template("mark").unwrap();
        assert!(t.transitions_between("Apply_1", "Start").next().is_none());
        let next = t.transitions_between("Apply_1", "Cond_0").next().unwrap();
        assert_eq!(
            next.update.as_deref(),
            Some("firedThisCycle = firedThisCycle + (delta ? 1 : 0), changed = changed || delta, idx_0 = idx_0 + 1")
        );
        let exhausted = t.transitions_between("Cond_0", "Start").next().unwrap();
        assert_eq!(exhausted.guard.as_deref(), Some("wmNext(s, item, ANY, idx_0) < 0"));
    }

    #[test]
    fn later_indices_restart_when_an_earlier_binding_moves_on() {
        let generated = generate_source(
            r#"
sp {match*pair (state <s> ^item <i>) (<i> ^size <n>)
--> (<s> ^seen <n>)}
"#,
        );
        let t = generated.network.template("match_pair").unwrap();
        let next = t.transitions_between("Apply_1", "Cond_1").next().unwrap();
        assert!(next.update.as_deref().unwrap().ends_with("idx_1 = idx_1 + 1"));
    }

    #[test]
    fn remembered_assertions_are_kept_per_instantiation() {
        let generated = generate_source(
            "sp {elaborate*copy (state <s> ^item <x>) --> (<s> ^copy <x> ^seen yes)}",
        );
        let t = generated.network.template("elaborate_copy").unwrap();
        assert!(t.declaration.contains("int keep_id[20] = {"));
        assert!(t.declaration.contains("keep_id[instances * 2 + k] = id;"));
        assert!(t.declaration.contains("    instances = 0;\n}"));
        let next = t.transitions_between("Apply_2", "Cond_0").next().unwrap();
        assert!(next
            .update
            .as_deref()
            .unwrap()
            .starts_with("fired = true, instances = instances + (delta ? 1 : 0)"));
    }

    #[test]
    fn negated_conditions_require_absence() {
        let generated = generate_source(
            "sp {init (state <s> ^superstate nil -^name) --> (<s> ^name start)}",
        );
        let t = generated.network.template("init").unwrap();
        let pass = t.transitions_between("Cond_1", "Matched").next().unwrap();
        assert_eq!(pass.guard.as_deref(), Some("wmNext(s, name, ANY, 0) < 0"));
        assert!(t.transitions_between("Cond_1", "Start").next().is_some());
    }

    #[test]
    fn proposals_set_preference_flags() {
        let generated = generate_source(
            "sp {propose*go (state <s> ^superstate nil) --> (<s> ^operator <o> + >) (<o> ^name go)}",
        );
        let t = generated.network.template("propose_go").unwrap();
        let updates: Vec<&str> = t
            .transitions
            .iter()
            .filter_map(|e| e.update.as_deref())
            .collect();
        assert!(updates
            .iter()
            .any(|u| u.contains("rememberPreference(0, state_operator_1, PREF_ACCEPTABLE, EMPTY)")));
        assert!(updates
            .iter()
            .any(|u| u.contains("rememberPreference(1, state_operator_1, PREF_BEST, EMPTY)")));
    }
}
