//! The global declaration: constants, memory arrays and the shared helper
//! functions every template calls.

use soarta_ir::identity::Sentinel;
use soarta_ir::memory::{literal_kind, LiteralKind};

use crate::sizing::AttributeArray;
use crate::{GenContext, GenerationError};

/// Render the complete global declaration.
pub(crate) fn declaration(ctx: &GenContext<'_>) -> Result<String, GenerationError> {
    let mut out = String::new();
    emit_constants(&mut out, ctx);
    emit_disjunctions(&mut out, ctx)?;
    emit_attributes(&mut out, ctx);
    emit_memory(&mut out, ctx)?;
    emit_scheduling(&mut out, ctx);
    emit_operators(&mut out, ctx);
    emit_matching(&mut out);
    for size in ctx.sizing.sizes() {
        emit_size_helpers(&mut out, size);
    }
    emit_dispatchers(&mut out, ctx.sizing.arrays(), ctx.state_identity());
    emit_select_operator(&mut out, ctx);
    Ok(out)
}

fn emit_constants(out: &mut String, ctx: &GenContext<'_>) {
    out.push_str("// Sentinels and preference tags\n");
    for (sentinel, code) in ctx.table.sentinels() {
        out.push_str(&format!("const int {} = {code};\n", sentinel.name()));
    }

    out.push_str("\n// Literals\n");
    for (literal, code) in ctx.table.literals() {
        if matches!(literal_kind(literal), LiteralKind::Integer(_)) {
            continue;
        }
        if let Some(name) = ctx.names.literal(literal) {
            out.push_str(&format!("const int {name} = {code};\n"));
        }
    }

    out.push_str("\n// Identities\n");
    for identity in ctx.table.identities() {
        if let Some(name) = ctx.names.identity(&identity.name) {
            out.push_str(&format!("const int {name} = {};\n", identity.code));
        }
    }
    let (min, max) = ctx.table.identity_range();
    out.push_str(&format!("const int IDENTITY_MIN = {min};\n"));
    out.push_str(&format!("const int IDENTITY_MAX = {max};\n"));
}

fn emit_disjunctions(out: &mut String, ctx: &GenContext<'_>) -> Result<(), GenerationError> {
    out.push_str("\n// Disjunctions\n");
    for (array, code) in ctx.table.disjunctions() {
        if let Some(name) = ctx.names.disjunction(array) {
            out.push_str(&format!("const int {name} = {code};\n"));
        }
    }
    let width = ctx.registry.max_width().max(1);
    let mut rows = Vec::with_capacity(ctx.registry.len().max(1));
    for (array, literals) in ctx.registry.iter() {
        let mut cells = Vec::with_capacity(width);
        for literal in literals {
            cells.push(ctx.literal(array, literal)?);
        }
        cells.resize(width, Sentinel::Empty.name().to_string());
        rows.push(format!("    {{{}}}", cells.join(", ")));
    }
    if rows.is_empty() {
        rows.push("    {EMPTY}".to_string());
    }
    out.push_str(&format!(
        "const int DISJUNCTION_BASE = {};\n",
        ctx.table.disjunction_base()
    ));
    out.push_str(&format!("const int NUM_DISJUNCTIONS = {};\n", rows.len()));
    out.push_str(&format!("const int DISJUNCTION_LENGTH = {width};\n"));
    out.push_str(&format!(
        "const int DISJUNCTIONS[NUM_DISJUNCTIONS][DISJUNCTION_LENGTH] = {{\n{}\n}};\n",
        rows.join(",\n")
    ));
    Ok(())
}

fn emit_attributes(out: &mut String, ctx: &GenContext<'_>) {
    let mut attributes = ctx.sizing.attribute_constants();
    if attributes.is_empty() {
        attributes.push(Sentinel::Empty.name());
    }
    out.push_str("\n// Attributes\n");
    out.push_str(&format!("const int NUM_ATTRIBUTES = {};\n", attributes.len()));
    out.push_str(&format!(
        "const int ATTRIBUTES[NUM_ATTRIBUTES] = {{{}}};\n",
        attributes.join(", ")
    ));
}

fn emit_memory(out: &mut String, ctx: &GenContext<'_>) -> Result<(), GenerationError> {
    out.push_str("\n// Working memory\n");
    let state = ctx.table.state_identity().name.as_str();
    for array in ctx.sizing.arrays() {
        let mut cells = vec![Sentinel::Empty.name().to_string(); array.size];
        if array.identifier == state {
            if let Some((_, value)) = ctx.architecture.iter().find(|(a, _)| *a == array.attribute) {
                cells[0] = ctx.literal("state", value)?;
            }
        }
        out.push_str(&format!(
            "int {}[{}] = {{{}}};\n",
            array.uppaal_name,
            array.size,
            cells.join(", ")
        ));
    }
    Ok(())
}

fn emit_scheduling(out: &mut String, ctx: &GenContext<'_>) {
    out.push_str("\n// Scheduling\n");
    out.push_str("broadcast chan Run_Rule;\n");
    out.push_str("chan requireTest;\n");
    out.push_str("chan decisionDone;\n");
    out.push_str(&format!(
        "const int MAX_FIRINGS_PER_CYCLE = {};\n",
        ctx.options.max_firings_per_cycle
    ));
    out.push_str("int firedThisCycle = 0;\n");
    out.push_str("bool changed = false;\n");
    out.push_str("bool halted = false;\n");
    out.push_str("int finalOp = EMPTY;\n");
}

fn emit_operators(out: &mut String, ctx: &GenContext<'_>) {
    let ids: Vec<&str> = if ctx.operators.is_empty() {
        vec![Sentinel::Empty.name()]
    } else {
        ctx.operators.iter().map(String::as_str).collect()
    };
    out.push_str("\n// Operator preferences\n");
    out.push_str(&format!("const int N = {};\n", ids.len()));
    out.push_str(&format!("const int OPERATOR_IDS[N] = {{{}}};\n", ids.join(", ")));
    out.push_str(
        r#"typedef struct {
    bool acceptable;
    bool reject;
    bool require;
    bool prohibit;
    bool best;
    bool worst;
    bool indifferent;
    bool numeric;
    bool better[N];
    bool worse[N];
    bool binaryIndifferent[N];
} Operator;
Operator operators[N];

int opSlot(int id) {
    int i;
    for (i = 0; i < N; i++) {
        if (OPERATOR_IDS[i] == id) {
            return i;
        }
    }
    return -1;
}

bool setPreference(int op, int pref, int other, bool value) {
    int i;
    int j;
    bool before = value;
    i = opSlot(op);
    j = opSlot(other);
    if (i < 0) {
        return false;
    }
    if (pref == PREF_ACCEPTABLE) {
        before = operators[i].acceptable;
        operators[i].acceptable = value;
    } else if (pref == PREF_REJECT) {
        before = operators[i].reject;
        operators[i].reject = value;
    } else if (pref == PREF_REQUIRE) {
        before = operators[i].require;
        operators[i].require = value;
    } else if (pref == PREF_PROHIBIT) {
        before = operators[i].prohibit;
        operators[i].prohibit = value;
    } else if (pref == PREF_BEST) {
        before = operators[i].best;
        operators[i].best = value;
    } else if (pref == PREF_WORST) {
        before = operators[i].worst;
        operators[i].worst = value;
    } else if (pref == PREF_INDIFFERENT) {
        before = operators[i].indifferent;
        operators[i].indifferent = value;
    } else if (pref == PREF_NUMERIC_INDIFFERENT) {
        before = operators[i].numeric;
        operators[i].numeric = value;
    } else if (j >= 0 && pref == PREF_BETTER) {
        before = operators[i].better[j];
        operators[i].better[j] = value;
    } else if (j >= 0 && pref == PREF_WORSE) {
        before = operators[i].worse[j];
        operators[i].worse[j] = value;
    } else if (j >= 0 && pref == PREF_BINARY_INDIFFERENT) {
        before = operators[i].binaryIndifferent[j];
        operators[i].binaryIndifferent[j] = value;
    }
    return before != value;
}

bool addPreference(int op, int pref, int other) {
    return setPreference(op, pref, other, true);
}

bool removePreference(int op, int pref, int other) {
    return setPreference(op, pref, other, false);
}
"#,
    );
}

fn emit_matching(out: &mut String) {
    out.push_str(
        r#"
// Matching
bool inDisjunction(int value, int code) {
    int row;
    int i;
    row = DISJUNCTION_BASE - code;
    if (row < 0 || row >= NUM_DISJUNCTIONS) {
        return false;
    }
    for (i = 0; i < DISJUNCTION_LENGTH; i++) {
        if (DISJUNCTIONS[row][i] == value) {
            return true;
        }
    }
    return false;
}

bool matches(int value, int expected) {
    if (expected == ANY) {
        return true;
    }
    if (expected <= DISJUNCTION_BASE) {
        return inDisjunction(value, expected);
    }
    return value == expected;
}

bool isIdentity(int value) {
    return value >= IDENTITY_MIN && value <= IDENTITY_MAX;
}

bool sameType(int a, int b) {
    return isIdentity(a) == isIdentity(b);
}

int acceptableNext(int expected, int start) {
    int i;
    for (i = start; i < N; i++) {
        if (operators[i].acceptable && matches(OPERATOR_IDS[i], expected)) {
            return i;
        }
    }
    return -1;
}
"#,
    );
}

fn emit_size_helpers(out: &mut String, size: usize) {
    out.push_str(&format!(
        r#"
int findIn_{size}(int &arr[{size}], int expected, int start) {{
    int i;
    for (i = start; i < {size}; i++) {{
        if (arr[i] != EMPTY && matches(arr[i], expected)) {{
            return i;
        }}
    }}
    return -1;
}}

bool addTo_{size}(int &arr[{size}], int value) {{
    int i;
    for (i = 0; i < {size}; i++) {{
        if (arr[i] == value) {{
            return false;
        }}
    }}
    for (i = 0; i < {size}; i++) {{
        if (arr[i] == EMPTY) {{
            arr[i] = value;
            return true;
        }}
    }}
    return false;
}}

bool removeFrom_{size}(int &arr[{size}], int value) {{
    int i;
    for (i = 0; i < {size}; i++) {{
        if (arr[i] == value) {{
            arr[i] = EMPTY;
            return true;
        }}
    }}
    return false;
}}
"#
    ));
}

fn array_test(array: &AttributeArray) -> String {
    format!(
        "id == {} && attr == {}",
        array.identity_const, array.attribute_const
    )
}

fn emit_dispatchers(out: &mut String, arrays: &[AttributeArray], state: &str) {
    out.push_str("\n// Working-memory access by identifier and attribute\n");

    out.push_str("int wmNext(int id, int attr, int expected, int start) {\n");
    out.push_str("    if (attr == ACCEPTABLE_OPERATOR) {\n");
    out.push_str(&format!(
        "        return id == {state} ? acceptableNext(expected, start) : -1;\n"
    ));
    out.push_str("    }\n");
    for array in arrays {
        out.push_str(&format!(
            "    if ({}) {{\n        return findIn_{}({}, expected, start);\n    }}\n",
            array_test(array),
            array.size,
            array.uppaal_name
        ));
    }
    out.push_str("    return -1;\n}\n\n");

    out.push_str("int wmGet(int id, int attr, int index) {\n");
    out.push_str("    if (index < 0) {\n        return EMPTY;\n    }\n");
    out.push_str("    if (attr == ACCEPTABLE_OPERATOR) {\n");
    out.push_str("        return index < N ? OPERATOR_IDS[index] : EMPTY;\n");
    out.push_str("    }\n");
    for array in arrays {
        out.push_str(&format!(
            "    if ({}) {{\n        return index < {} ? {}[index] : EMPTY;\n    }}\n",
            array_test(array),
            array.size,
            array.uppaal_name
        ));
    }
    out.push_str("    return EMPTY;\n}\n\n");

    for (function, helper) in [("wmAdd", "addTo"), ("wmRemove", "removeFrom")] {
        out.push_str(&format!("bool {function}(int id, int attr, int value) {{\n"));
        for array in arrays {
            out.push_str(&format!(
                "    if ({}) {{\n        return {helper}_{}({}, value);\n    }}\n",
                array_test(array),
                array.size,
                array.uppaal_name
            ));
        }
        out.push_str("    return false;\n}\n\n");
    }
}

/// `selectOperator` replaces the selected operator on the state; true when it changed.
fn emit_select_operator(out: &mut String, ctx: &GenContext<'_>) {
    let slot = ctx
        .sizing
        .get(&ctx.table.state_identity().name, soarta_ir::identity::OPERATOR_ATTRIBUTE);
    out.push_str("bool selectOperator(int op) {\n");
    match slot {
        Some(array) => {
            out.push_str("    int i;\n");
            out.push_str(&format!(
                "    bool same = {name}[0] == op;\n",
                name = array.uppaal_name
            ));
            out.push_str(&format!(
                "    for (i = 0; i < {}; i++) {{\n        {}[i] = EMPTY;\n    }}\n",
                array.size, array.uppaal_name
            ));
            out.push_str(&format!(
                "    if (op != EMPTY) {{\n        {}[0] = op;\n    }}\n",
                array.uppaal_name
            ));
            out.push_str("    return !same;\n");
        }
        None => out.push_str("    return false;\n"),
    }
    out.push_str("}\n");
}
