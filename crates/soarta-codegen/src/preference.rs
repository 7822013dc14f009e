//! The preference-resolution process.
//!
//! It runs once per decision phase. Starting from the proposed operators it
//! applies, in order, the require/prohibit test, acceptable collection, the
//! prohibit and reject filters, better/worse dominance, best, worst and
//! finally the indifference test. Every outcome answers the scheduler on
//! `decisionDone`; only `done` leaves a selected operator in `finalOp`.

use crate::network::{LocationKind, Template, Transition};

pub const TEMPLATE: &str = "preferenceResolutionTemplate";
pub const INSTANCE: &str = "preferenceResolution";

const DECLARATION: &str = r#"bool candidate[N];

int requiredCount() {
    int i;
    int count = 0;
    for (i = 0; i < N; i++) {
        if (operators[i].require) {
            count++;
        }
    }
    return count;
}

bool requireProhibited() {
    int i;
    for (i = 0; i < N; i++) {
        if (operators[i].require && operators[i].prohibit) {
            return true;
        }
    }
    return false;
}

int requiredOperator() {
    int i;
    for (i = 0; i < N; i++) {
        if (operators[i].require) {
            return OPERATOR_IDS[i];
        }
    }
    return EMPTY;
}

void collectAcceptable() {
    int i;
    for (i = 0; i < N; i++) {
        candidate[i] = operators[i].acceptable;
    }
}

void filterProhibit() {
    int i;
    for (i = 0; i < N; i++) {
        if (operators[i].prohibit) {
            candidate[i] = false;
        }
    }
}

void filterReject() {
    int i;
    for (i = 0; i < N; i++) {
        if (operators[i].reject) {
            candidate[i] = false;
        }
    }
}

void filterBetterWorse() {
    int i;
    int j;
    bool dominated[N];
    for (i = 0; i < N; i++) {
        dominated[i] = false;
        for (j = 0; j < N; j++) {
            if (candidate[i] && candidate[j] && i != j
                    && (operators[j].better[i] || operators[i].worse[j])) {
                dominated[i] = true;
            }
        }
    }
    for (i = 0; i < N; i++) {
        if (dominated[i]) {
            candidate[i] = false;
        }
    }
}

void filterBest() {
    int i;
    bool anyBest = false;
    for (i = 0; i < N; i++) {
        if (candidate[i] && operators[i].best) {
            anyBest = true;
        }
    }
    if (anyBest) {
        for (i = 0; i < N; i++) {
            if (!operators[i].best) {
                candidate[i] = false;
            }
        }
    }
}

void filterWorst() {
    int i;
    bool anyOther = false;
    for (i = 0; i < N; i++) {
        if (candidate[i] && !operators[i].worst) {
            anyOther = true;
        }
    }
    if (anyOther) {
        for (i = 0; i < N; i++) {
            if (operators[i].worst) {
                candidate[i] = false;
            }
        }
    }
}

int candidateCount() {
    int i;
    int count = 0;
    for (i = 0; i < N; i++) {
        if (candidate[i]) {
            count++;
        }
    }
    return count;
}

int firstCandidate() {
    int i;
    for (i = 0; i < N; i++) {
        if (candidate[i]) {
            return OPERATOR_IDS[i];
        }
    }
    return EMPTY;
}

bool indifferentPair(int i, int j) {
    bool unary = (operators[i].indifferent || operators[i].numeric)
        && (operators[j].indifferent || operators[j].numeric);
    return unary || operators[i].binaryIndifferent[j] || operators[j].binaryIndifferent[i];
}

bool allIndifferent() {
    int i;
    int j;
    for (i = 0; i < N; i++) {
        for (j = i + 1; j < N; j++) {
            if (candidate[i] && candidate[j] && !indifferentPair(i, j)) {
                return false;
            }
        }
    }
    return true;
}
"#;

pub fn build() -> Template {
    let mut t = Template::new(TEMPLATE);
    t.declaration = DECLARATION.to_string();

    let start = t.add_location("Start", LocationKind::Normal);
    t.set_initial(start);
    let committed = |t: &mut Template, name: &str| t.add_location(name, LocationKind::Committed);
    let require_test = committed(&mut t, "RequireTest");
    let constraint_failure = committed(&mut t, "ConstraintFailure");
    let acceptable = committed(&mut t, "AcceptableCollect");
    let prohibit = committed(&mut t, "ProhibitFilter");
    let reject = committed(&mut t, "RejectFilter");
    let better_worse = committed(&mut t, "BetterWorseFilter");
    let conflict = committed(&mut t, "Conflict");
    let best = committed(&mut t, "BestFilter");
    let worst = committed(&mut t, "WorstFilter");
    let indifferent = committed(&mut t, "IndifferentTest");
    let tie = committed(&mut t, "Tie");
    let no_change = committed(&mut t, "NoChange");
    let done = committed(&mut t, "done");

    t.add_transition(Transition::new(start, require_test).sync("requireTest?"));

    t.add_transition(
        Transition::new(require_test, constraint_failure)
            .guard("requiredCount() > 1 || requireProhibited()"),
    );
    t.add_transition(
        Transition::new(require_test, done)
            .guard("requiredCount() == 1 && !requireProhibited()")
            .update(["finalOp = requiredOperator()"]),
    );
    t.add_transition(
        Transition::new(require_test, acceptable)
            .guard("requiredCount() == 0")
            .update(["collectAcceptable()"]),
    );

    t.add_transition(Transition::new(acceptable, no_change).guard("candidateCount() == 0"));
    t.add_transition(
        Transition::new(acceptable, prohibit)
            .guard("candidateCount() > 0")
            .update(["filterProhibit()"]),
    );
    t.add_transition(Transition::new(prohibit, reject).update(["filterReject()"]));

    t.add_transition(Transition::new(reject, no_change).guard("candidateCount() == 0"));
    t.add_transition(
        Transition::new(reject, better_worse)
            .guard("candidateCount() > 0")
            .update(["filterBetterWorse()"]),
    );

    // Mutual better/worse leaves nobody standing.
    t.add_transition(Transition::new(better_worse, conflict).guard("candidateCount() == 0"));
    t.add_transition(
        Transition::new(better_worse, best)
            .guard("candidateCount() > 0")
            .update(["filterBest()"]),
    );
    t.add_transition(Transition::new(best, worst).update(["filterWorst()"]));
    t.add_transition(Transition::new(worst, indifferent));

    t.add_transition(
        Transition::new(indifferent, done)
            .guard("candidateCount() == 1")
            .update(["finalOp = firstCandidate()"]),
    );
    t.add_transition(
        Transition::new(indifferent, done)
            .select("i : int[0, N-1]")
            .guard("candidateCount() > 1 && allIndifferent() && candidate[i]")
            .update(["finalOp = OPERATOR_IDS[i]"]),
    );
    t.add_transition(
        Transition::new(indifferent, tie).guard("candidateCount() > 1 && !allIndifferent()"),
    );

    for failure in [tie, conflict, constraint_failure, no_change] {
        t.add_transition(
            Transition::new(failure, start)
                .sync("decisionDone!")
                .update(["finalOp = EMPTY"]),
        );
    }
    t.add_transition(Transition::new(done, start).sync("decisionDone!"));
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_outcome_answers_the_scheduler() {
        let t = build();
        for outcome in ["done", "Tie", "Conflict", "ConstraintFailure", "NoChange"] {
            let reply = t.transitions_between(outcome, "Start").next().unwrap();
            assert_eq!(reply.sync.as_deref(), Some("decisionDone!"), "{outcome}");
        }
        let done = t.transitions_between("done", "Start").next().unwrap();
        assert_eq!(done.update, None);
    }

    #[test]
    fn indifferent_candidates_are_chosen_nondeterministically() {
        let t = build();
        let picks: Vec<_> = t.transitions_between("IndifferentTest", "done").collect();
        assert_eq!(picks.len(), 2);
        assert!(picks
            .iter()
            .any(|e| e.select.as_deref() == Some("i : int[0, N-1]")));
        assert!(t.declaration.contains("bool allIndifferent()"));
    }

    #[test]
    fn a_single_require_short_circuits() {
        let t = build();
        let required = t.transitions_between("RequireTest", "done").next().unwrap();
        assert_eq!(required.update.as_deref(), Some("finalOp = requiredOperator()"));
        assert!(t.location("RequireTest").map(|l| l.kind) == Some(LocationKind::Committed));
    }
}
