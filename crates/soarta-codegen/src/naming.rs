//! UPPAAL-safe identifiers for every symbol the model declares.

use indexmap::{IndexMap, IndexSet};
use soarta_ir::identity::IdentityTable;
use soarta_ir::memory::{literal_kind, LiteralKind};
use soarta_ir::rule::RuleAnalysis;

/// Keywords and built-ins of the UPPAAL declaration and query languages.
const RESERVED: &[&str] = &[
    "A", "E", "M", "P", "abs", "and", "assign", "bool", "break", "broadcast", "case", "chan",
    "clock", "commit", "const", "continue", "default", "do", "double", "else", "exists", "exp",
    "false", "for", "forall", "guard", "if", "imply", "init", "int", "log", "max", "meta", "min",
    "not", "or", "pow", "priority", "process", "return", "scalar", "select", "sqrt", "state",
    "string", "struct", "sum", "switch", "sync", "system", "trans", "true", "typedef", "urgent",
    "void", "while", "deadlock",
];

/// Names the generated declarations use themselves.
pub(crate) const GLOBAL_NAMES: &[&str] = &[
    "ANY", "EMPTY", "NA", "ACCEPTABLE_OPERATOR", "PREF_ACCEPTABLE", "PREF_REJECT", "PREF_REQUIRE",
    "PREF_PROHIBIT", "PREF_BEST", "PREF_WORST", "PREF_INDIFFERENT", "PREF_BETTER", "PREF_WORSE",
    "PREF_BINARY_INDIFFERENT", "PREF_NUMERIC_INDIFFERENT", "IDENTITY_MIN", "IDENTITY_MAX",
    "DISJUNCTION_BASE", "NUM_DISJUNCTIONS", "DISJUNCTION_LENGTH", "DISJUNCTIONS",
    "NUM_ATTRIBUTES", "ATTRIBUTES", "N", "OPERATOR_IDS", "Operator", "operators", "candidate",
    "opSlot", "setPreference", "addPreference", "removePreference", "indifferentPair", "selectOperator", "acceptableNext", "wmNext",
    "wmGet", "wmAdd", "wmRemove", "matches", "inDisjunction", "sameType", "isIdentity",
    "Run_Rule", "requireTest", "decisionDone", "MAX_FIRINGS_PER_CYCLE", "firedThisCycle",
    "changed", "halted", "finalOp", "requiredCount", "requireProhibited", "requiredOperator",
    "collectAcceptable", "filterProhibit", "filterReject", "filterBetterWorse", "filterBest",
    "filterWorst", "candidateCount", "firstCandidate", "allIndifferent", "scheduler", "schd",
    "preferenceResolutionTemplate", "preferenceResolution",
];

/// Turn an arbitrary symbol into `[A-Za-z_][A-Za-z0-9_]*`.
pub fn sanitize(raw: &str) -> String {
    let trimmed = raw.trim_matches('|');
    let mut out: String = trimmed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push('_');
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Hands out unique, non-reserved identifiers.
#[derive(Debug, Clone)]
pub struct NameAllocator {
    used: IndexSet<String>,
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NameAllocator {
    pub fn new() -> Self {
        Self {
            used: RESERVED.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn reserve(&mut self, name: &str) {
        self.used.insert(name.to_string());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    /// A fresh name derived from `raw`; `_2`, `_3`, ... are appended on clashes.
    pub fn allocate(&mut self, raw: &str) -> String {
        let base = sanitize(raw);
        if self.used.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Declared name of every literal, identity, disjunction and template.
#[derive(Debug, Clone)]
pub struct SymbolNames {
    allocator: NameAllocator,
    literals: IndexMap<String, String>,
    identities: IndexMap<String, String>,
    disjunctions: IndexMap<String, String>,
    templates: IndexMap<String, String>,
    instances: IndexMap<String, String>,
}

impl SymbolNames {
    pub fn new(table: &IdentityTable, rules: &[RuleAnalysis]) -> Self {
        let mut allocator = NameAllocator::new();
        for name in GLOBAL_NAMES {
            allocator.reserve(name);
        }

        let identities = table
            .identities()
            .iter()
            .map(|i| (i.name.clone(), allocator.allocate(&i.name)))
            .collect();

        let mut literals = IndexMap::new();
        for (literal, code) in table.literals() {
            let rendered = match literal_kind(literal) {
                LiteralKind::Integer(_) => code.to_string(),
                _ => allocator.allocate(literal),
            };
            literals.insert(literal.to_string(), rendered);
        }

        let disjunctions = table
            .disjunctions()
            .map(|(array, _)| (array.to_string(), allocator.allocate(array)))
            .collect();

        let mut templates = IndexMap::new();
        let mut instances = IndexMap::new();
        for rule in rules {
            let template = allocator.allocate(&rule.name);
            let instance = allocator.allocate(&format!("{template}_0"));
            templates.insert(rule.name.clone(), template);
            instances.insert(rule.name.clone(), instance);
        }

        Self {
            allocator,
            literals,
            identities,
            disjunctions,
            templates,
            instances,
        }
    }

    /// Integers render as themselves, everything else as its constant.
    pub fn literal(&self, literal: &str) -> Option<&str> {
        self.literals.get(literal).map(String::as_str)
    }

    pub fn literals(&self) -> impl Iterator<Item = (&str, &str)> {
        self.literals.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn identity(&self, identity: &str) -> Option<&str> {
        self.identities.get(identity).map(String::as_str)
    }

    pub fn disjunction(&self, array: &str) -> Option<&str> {
        self.disjunctions.get(array).map(String::as_str)
    }

    pub fn template(&self, rule: &str) -> Option<&str> {
        self.templates.get(rule).map(String::as_str)
    }

    pub fn instance(&self, rule: &str) -> Option<&str> {
        self.instances.get(rule).map(String::as_str)
    }

    pub fn allocate(&mut self, raw: &str) -> String {
        self.allocator.allocate(raw)
    }

    /// Allocator for template-local names; locals never shadow a global.
    pub fn local_allocator(&self) -> NameAllocator {
        self.allocator.clone()
    }
}
