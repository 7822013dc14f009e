//! The scheduler process: broadcasts rule waves until quiescence, then hands
//! over to preference resolution for the decision phase.

use crate::network::{LocationKind, Template, Transition};

pub const TEMPLATE: &str = "scheduler";
pub const INSTANCE: &str = "schd";

pub fn build() -> Template {
    let mut t = Template::new(TEMPLATE);
    let start = t.add_location("Start", LocationKind::Normal);
    let running = t.add_location("Running", LocationKind::Normal);
    let deciding = t.add_location("Deciding", LocationKind::Normal);
    let halted = t.add_location("Halted", LocationKind::Normal);
    t.set_initial(start);

    t.add_transition(
        Transition::new(start, running)
            .guard("!halted")
            .sync("Run_Rule!")
            .update(["firedThisCycle = 0", "changed = false"]),
    );
    // Another wave while the last one changed memory.
    t.add_transition(Transition::new(running, start).guard("!halted && changed"));
    t.add_transition(
        Transition::new(running, deciding)
            .guard("!halted && !changed")
            .sync("requireTest!"),
    );
    t.add_transition(
        Transition::new(deciding, start)
            .sync("decisionDone?")
            .update(["selectOperator(finalOp)"]),
    );
    t.add_transition(Transition::new(running, halted).guard("halted"));
    t
}
