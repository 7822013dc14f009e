//! Sizing report: what was translated, how big every array is, and what
//! had to be skipped.

use serde::Serialize;

use soarta_codegen::sizing::{AttributeArray, Sizing};
use soarta_ir::analysis::Analysis;
use soarta_ir::identity::{Identity, IdentityTable};
use soarta_ir::matcher::{MatchOutcome, MatchRound};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Support {
    OSupported,
    ISupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEntry {
    pub name: String,
    /// `None` for skipped rules.
    pub support: Option<Support>,
    pub hierarchy: Vec<String>,
    pub skipped: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisjunctionEntry {
    pub name: String,
    pub code: i64,
    pub literals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationReport {
    pub rules: Vec<RuleEntry>,
    pub arrays: Vec<AttributeArray>,
    pub total_slots: usize,
    pub identities: Vec<Identity>,
    pub disjunctions: Vec<DisjunctionEntry>,
    pub rounds: Vec<MatchRound>,
    pub warnings: Vec<String>,
}

impl TranslationReport {
    pub fn build(
        analysis: &Analysis,
        outcome: &MatchOutcome,
        table: &IdentityTable,
        sizing: &Sizing,
    ) -> Self {
        let mut rules: Vec<RuleEntry> = analysis
            .rules
            .iter()
            .map(|rule| RuleEntry {
                name: rule.name.clone(),
                support: Some(if rule.o_supported {
                    Support::OSupported
                } else {
                    Support::ISupported
                }),
                hierarchy: rule.hierarchy.clone(),
                skipped: None,
            })
            .collect();
        rules.extend(analysis.warnings.iter().map(|w| RuleEntry {
            name: w.rule.clone(),
            support: None,
            hierarchy: Vec::new(),
            skipped: Some(w.to_string()),
        }));

        let disjunctions = analysis
            .disjunctions
            .iter()
            .map(|(name, literals)| DisjunctionEntry {
                name: name.to_string(),
                code: table.disjunction_code(name).unwrap_or_default(),
                literals: literals.to_vec(),
            })
            .collect();

        Self {
            rules,
            arrays: sizing.arrays().to_vec(),
            total_slots: sizing.total_slots(),
            identities: table.identities().to_vec(),
            disjunctions,
            rounds: outcome.rounds.clone(),
            warnings: analysis.warnings.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let translated = self.rules.iter().filter(|r| r.skipped.is_none()).count();
        out.push_str(&format!(
            "Rules: {translated} translated, {} skipped\n",
            self.rules.len() - translated
        ));
        for rule in &self.rules {
            match (&rule.support, &rule.skipped) {
                (Some(support), _) => {
                    let support = match support {
                        Support::OSupported => "o-support",
                        Support::ISupported => "i-support",
                    };
                    out.push_str(&format!(
                        "  {:<32} {support:<10} {}\n",
                        rule.name,
                        rule.hierarchy.join(" > ")
                    ));
                }
                (None, Some(reason)) => out.push_str(&format!("  {:<32} SKIPPED    {reason}\n", rule.name)),
                (None, None) => out.push_str(&format!("  {}\n", rule.name)),
            }
        }

        out.push_str(&format!(
            "\nArrays: {} ({} slots)\n",
            self.arrays.len(),
            self.total_slots
        ));
        for array in &self.arrays {
            let marker = if array.cross_rule { " *" } else { "" };
            out.push_str(&format!(
                "  {:<40} {:>3}  {}.{}{marker}\n",
                array.uppaal_name, array.size, array.identifier, array.attribute
            ));
        }

        out.push_str(&format!("\nIdentities: {}\n", self.identities.len()));
        for identity in &self.identities {
            out.push_str(&format!("  {:<32} {:>6}\n", identity.name, identity.code));
        }

        if !self.disjunctions.is_empty() {
            out.push_str(&format!("\nDisjunctions: {}\n", self.disjunctions.len()));
            for d in &self.disjunctions {
                out.push_str(&format!(
                    "  {:<16} {:>6}  << {} >>\n",
                    d.name,
                    d.code,
                    d.literals.join(" ")
                ));
            }
        }

        out.push_str(&format!("\nMatcher rounds: {}\n", self.rounds.len()));
        for round in &self.rounds {
            out.push_str(&format!(
                "  round {}: {} pairs, {} keys, {} owners grown\n",
                round.round, round.pairs_checked, round.key_total, round.grown
            ));
        }

        if !self.warnings.is_empty() {
            out.push_str("\nWarnings:\n");
            for warning in &self.warnings {
                out.push_str(&format!("  {warning}\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::pipeline::{translate_source, TranslateOptions};

    const SOURCE: &str = r#"
sp {set*mode (state <s> ^superstate nil) --> (<s> ^mode fast)}
sp {apply*mode (state <s> ^operator <o>) (<o> ^name go) --> (<s> ^mode slow)}
sp {unsupported (state <s> ^value > 1.5) --> (<s> ^mode idle)}
"#;

    #[test]
    fn report_lists_translated_and_skipped_rules() {
        let translation = translate_source(SOURCE, "report.soar", &TranslateOptions::default())
            .expect("translation failed");
        let report = &translation.report;
        assert_eq!(report.rules.len(), 3);
        let skipped = report.rules.iter().find(|r| r.name == "unsupported").unwrap();
        assert!(skipped.support.is_none());
        assert!(skipped.skipped.is_some());
        let mode = report.arrays.iter().find(|a| a.attribute == "mode").unwrap();
        assert_eq!(mode.size, 2);

        let text = report.render_text();
        assert!(text.contains("Rules: 2 translated, 1 skipped"));
        assert!(text.contains("AV_state_1_mode"));
    }

    #[test]
    fn report_serialises_to_json() {
        let translation = translate_source(SOURCE, "report.soar", &TranslateOptions::default())
            .expect("translation failed");
        let json = translation.report.to_json().expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["rules"][0]["support"], "i-supported");
        assert_eq!(value["rules"][1]["support"], "o-supported");
        assert!(value["arrays"][0].get("identity_const").is_none());
    }
}
