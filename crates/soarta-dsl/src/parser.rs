#![allow(clippy::result_large_err)]

use std::collections::HashSet;

use pest::Parser;
use pest_derive::Parser;

use crate::ast::*;
use crate::errors::{ParseDiagnostic, ParseDiagnosticSeverity, ParseError};

#[derive(Parser)]
#[grammar = "grammar.pest"]
struct SoarParser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

fn span_from(pair: &Pair<'_>) -> Span {
    let s = pair.as_span();
    Span::new(s.start(), s.end())
}

/// Parsing state shared by every production of one file.
struct Ctx<'s> {
    source: &'s str,
    filename: &'s str,
}

impl Ctx<'_> {
    fn syntax(&self, pair: &Pair<'_>, message: impl Into<String>) -> ParseError {
        ParseError::syntax(message, span_from(pair), self.source, self.filename)
    }

    fn missing(&self, pair: &Pair<'_>, what: &str) -> ParseError {
        self.syntax(pair, format!("expected {what}"))
    }
}

/// Parse a Soar rule file into a [`RuleSet`].
pub fn parse(source: &str, filename: &str) -> Result<RuleSet, ParseError> {
    let (rules, _) = parse_with_diagnostics(source, filename)?;
    Ok(rules)
}

/// Parse a Soar rule file and report non-fatal parser diagnostics.
pub fn parse_with_diagnostics(
    source: &str,
    filename: &str,
) -> Result<(RuleSet, Vec<ParseDiagnostic>), ParseError> {
    let pairs = SoarParser::parse(Rule::rule_set, source).map_err(|e| {
        let (start, end) = match e.location {
            pest::error::InputLocation::Pos(p) => (p, p + 1),
            pest::error::InputLocation::Span((s, e)) => (s, e),
        };
        ParseError::syntax(format!("{e}"), Span::new(start, end), source, filename)
    })?;
    let ctx = Ctx { source, filename };

    let mut rules = RuleSet::default();
    let mut diagnostics = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for pair in pairs.flat_map(|p| p.into_inner()) {
        match pair.as_rule() {
            Rule::production => {
                let production = parse_production(&ctx, pair)?;
                if !seen.insert(production.node.name.clone()) {
                    return Err(ParseError::duplicate(
                        production.node.name.clone(),
                        production.span,
                        source,
                        filename,
                    ));
                }
                for flag in &production.node.flags {
                    if let ProductionFlag::Other(name) = flag {
                        diagnostics.push(ParseDiagnostic {
                            code: "unknown_flag".into(),
                            severity: ParseDiagnosticSeverity::Warning,
                            message: format!(
                                "production '{}' carries unknown flag ':{name}'",
                                production.node.name
                            ),
                            span: Some(production.span),
                        });
                    }
                }
                rules.productions.push(production);
            }
            Rule::command_line => {
                let command = pair.as_str().split_whitespace().next().unwrap_or_default();
                diagnostics.push(ParseDiagnostic {
                    code: "ignored_command".into(),
                    severity: ParseDiagnosticSeverity::Warning,
                    message: format!("top-level command '{command}' is not a production and was ignored"),
                    span: Some(span_from(&pair)),
                });
            }
            _ => {}
        }
    }

    Ok((rules, diagnostics))
}

fn parse_production(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<Spanned<Production>, ParseError> {
    let span = span_from(&pair);
    let outer = pair.clone();
    let mut name = None;
    let mut documentation = None;
    let mut flags = Vec::new();
    let mut conditions = Vec::new();
    let mut actions = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::production_name => name = Some(inner.as_str().to_string()),
            Rule::documentation => {
                documentation = inner
                    .into_inner()
                    .next()
                    .map(|text| text.as_str().to_string());
            }
            Rule::flag => {
                flags.push(ProductionFlag::from_keyword(inner.as_str().trim_start_matches(':')));
            }
            Rule::condition_side => {
                for cond in inner.into_inner() {
                    conditions.push(parse_condition(ctx, cond)?);
                }
            }
            Rule::action_side => {
                for action in inner.into_inner() {
                    actions.push(parse_action(ctx, action)?);
                }
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| ctx.missing(&outer, "production name"))?;
    Ok(Spanned::new(
        Production {
            name,
            documentation,
            flags,
            conditions,
            actions,
        },
        span,
    ))
}

// --- conditions ---

fn parse_condition(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<Spanned<Condition>, ParseError> {
    let span = span_from(&pair);
    let outer = pair.clone();
    let mut negated = false;
    let mut positive = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::negation => negated = true,
            Rule::positive_condition => positive = inner.into_inner().next(),
            _ => {}
        }
    }
    let positive = positive.ok_or_else(|| ctx.missing(&outer, "condition"))?;

    let node = match positive.as_rule() {
        Rule::conjunction => {
            let conditions = positive
                .into_inner()
                .map(|c| parse_condition(ctx, c))
                .collect::<Result<Vec<_>, _>>()?;
            Condition::Conjunction {
                negated,
                conditions,
            }
        }
        Rule::id_conditions => {
            let id_conditions = parse_id_conditions(ctx, positive)?;
            if negated {
                Condition::Negated(id_conditions)
            } else {
                Condition::Positive(id_conditions)
            }
        }
        _ => return Err(ctx.syntax(&positive, "unexpected condition form")),
    };
    Ok(Spanned::new(node, span))
}

fn parse_id_conditions(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<IdConditions, ParseError> {
    let outer = pair.clone();
    let mut keyword = None;
    let mut id = None;
    let mut tests = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::goal_keyword => {
                keyword = Some(if inner.as_str() == "impasse" {
                    GoalKeyword::Impasse
                } else {
                    GoalKeyword::State
                });
            }
            Rule::test => id = Some(parse_test(ctx, inner)?),
            Rule::attr_value_tests => tests.push(parse_attr_value_tests(ctx, inner)?),
            _ => {}
        }
    }
    let id = id.ok_or_else(|| ctx.missing(&outer, "identifier test"))?;
    Ok(IdConditions { keyword, id, tests })
}

fn parse_attr_value_tests(
    ctx: &Ctx<'_>,
    pair: Pair<'_>,
) -> Result<Spanned<AttrValueTests>, ParseError> {
    let span = span_from(&pair);
    let mut negated = false;
    let mut attributes = Vec::new();
    let mut values = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::negation => negated = true,
            Rule::attr_chain => {
                for test in inner.into_inner() {
                    attributes.push(parse_test(ctx, test)?);
                }
            }
            Rule::value_test => {
                let mut test = None;
                let mut acceptable = false;
                let outer = inner.clone();
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::test => test = Some(parse_test(ctx, part)?),
                        Rule::acceptable_marker => acceptable = true,
                        _ => {}
                    }
                }
                let test = test.ok_or_else(|| ctx.missing(&outer, "value test"))?;
                values.push(ValueTest { test, acceptable });
            }
            _ => {}
        }
    }
    Ok(Spanned::new(
        AttrValueTests {
            negated,
            attributes,
            values,
        },
        span,
    ))
}

fn parse_test(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<Test, ParseError> {
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ctx.missing(&outer, "test"))?;
    match inner.as_rule() {
        Rule::conjunctive_test => {
            let tests = inner
                .into_inner()
                .map(|t| parse_simple_test(ctx, t))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Test::Conjunctive(tests))
        }
        Rule::simple_test => Ok(Test::Simple(parse_simple_test(ctx, inner)?)),
        _ => Err(ctx.syntax(&inner, "unexpected test form")),
    }
}

fn parse_simple_test(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<SimpleTest, ParseError> {
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ctx.missing(&outer, "simple test"))?;
    match inner.as_rule() {
        Rule::disjunction_test => {
            let values = inner
                .into_inner()
                .map(|c| parse_constant(ctx, c))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SimpleTest::Disjunction(values))
        }
        Rule::relational_test => {
            let mut relation = Relation::Equal;
            let mut value = None;
            for part in inner.clone().into_inner() {
                match part.as_rule() {
                    Rule::relation => {
                        relation = Relation::from_token(part.as_str())
                            .ok_or_else(|| ctx.syntax(&part, "unknown relation"))?;
                    }
                    Rule::single_test => value = Some(parse_single_test(ctx, part)?),
                    _ => {}
                }
            }
            let value = value.ok_or_else(|| ctx.missing(&inner, "value after relation"))?;
            Ok(SimpleTest::Relational { relation, value })
        }
        _ => Err(ctx.syntax(&inner, "unexpected simple test")),
    }
}

fn parse_single_test(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<SingleTest, ParseError> {
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ctx.missing(&outer, "variable or constant"))?;
    match inner.as_rule() {
        Rule::variable => Ok(SingleTest::Variable(variable_name(&inner))),
        Rule::constant => Ok(SingleTest::Constant(parse_constant(ctx, inner)?)),
        _ => Err(ctx.syntax(&inner, "expected variable or constant")),
    }
}

fn variable_name(pair: &Pair<'_>) -> String {
    let text = pair.as_str();
    text.trim_start_matches('<').trim_end_matches('>').to_string()
}

fn parse_constant(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<Constant, ParseError> {
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ctx.missing(&outer, "constant"))?;
    let text = inner.as_str();
    match inner.as_rule() {
        Rule::integer => text
            .trim_start_matches('+')
            .parse::<i64>()
            .map(Constant::Integer)
            .map_err(|_| {
                ParseError::invalid_number(text, span_from(&inner), ctx.source, ctx.filename)
            }),
        Rule::float => text.parse::<f64>().map(Constant::Float).map_err(|_| {
            ParseError::invalid_number(text, span_from(&inner), ctx.source, ctx.filename)
        }),
        Rule::quoted => Ok(Constant::Text(
            inner
                .into_inner()
                .next()
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
        )),
        Rule::symbol => Ok(Constant::Symbol(text.to_string())),
        _ => Err(ctx.syntax(&inner, "expected constant")),
    }
}

// --- actions ---

fn parse_action(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<Spanned<Action>, ParseError> {
    let span = span_from(&pair);
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ctx.missing(&outer, "action"))?;
    let node = match inner.as_rule() {
        Rule::make_action => {
            let mut id = None;
            let mut makes = Vec::new();
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::variable => id = Some(variable_name(&part)),
                    Rule::attr_value_make => makes.push(parse_attr_value_make(ctx, part)?),
                    _ => {}
                }
            }
            let id = id.ok_or_else(|| ctx.missing(&outer, "action identifier"))?;
            Action::Make { id, makes }
        }
        Rule::call_action => {
            let call = inner
                .clone()
                .into_inner()
                .next()
                .ok_or_else(|| ctx.missing(&inner, "function call"))?;
            Action::Call(parse_function_call(ctx, call)?)
        }
        _ => return Err(ctx.syntax(&inner, "unexpected action form")),
    };
    Ok(Spanned::new(node, span))
}

fn parse_attr_value_make(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<AttrValueMake, ParseError> {
    let mut attributes = Vec::new();
    let mut values = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::rhs_attr => {
                let outer = inner.clone();
                let attr = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| ctx.missing(&outer, "attribute"))?;
                attributes.push(match attr.as_rule() {
                    Rule::variable => RhsValue::Variable(variable_name(&attr)),
                    _ => RhsValue::Constant(parse_constant(ctx, attr)?),
                });
            }
            Rule::value_make => {
                let mut value = None;
                let mut preferences = Vec::new();
                let outer = inner.clone();
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::rhs_value => value = Some(parse_rhs_value(ctx, part)?),
                        Rule::preference => preferences.push(parse_preference(ctx, part)?),
                        _ => {}
                    }
                }
                let value = value.ok_or_else(|| ctx.missing(&outer, "value"))?;
                values.push(ValueMake { value, preferences });
            }
            _ => {}
        }
    }
    Ok(AttrValueMake { attributes, values })
}

fn parse_rhs_value(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<RhsValue, ParseError> {
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ctx.missing(&outer, "value"))?;
    match inner.as_rule() {
        Rule::variable => Ok(RhsValue::Variable(variable_name(&inner))),
        Rule::constant => Ok(RhsValue::Constant(parse_constant(ctx, inner)?)),
        Rule::function_call => Ok(RhsValue::Call(parse_function_call(ctx, inner)?)),
        _ => Err(ctx.syntax(&inner, "expected value")),
    }
}

fn parse_function_call(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<FunctionCall, ParseError> {
    let outer = pair.clone();
    let mut name = None;
    let mut args = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::function_name => name = Some(inner.as_str().to_string()),
            Rule::rhs_value => args.push(parse_rhs_value(ctx, inner)?),
            _ => {}
        }
    }
    let name = name.ok_or_else(|| ctx.missing(&outer, "function name"))?;
    Ok(FunctionCall { name, args })
}

fn parse_preference(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<Preference, ParseError> {
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| ctx.missing(&outer, "preference"))?;
    match inner.as_rule() {
        Rule::unary_preference => UnaryPreference::from_token(inner.as_str())
            .map(Preference::Unary)
            .ok_or_else(|| ctx.syntax(&inner, "unknown preference")),
        Rule::binary_preference => {
            let mut op = None;
            let mut value = None;
            for part in inner.clone().into_inner() {
                match part.as_rule() {
                    Rule::binary_op => op = BinaryPreference::from_token(part.as_str()),
                    Rule::rhs_value => value = Some(parse_rhs_value(ctx, part)?),
                    _ => {}
                }
            }
            match (op, value) {
                (Some(op), Some(value)) => Ok(Preference::Binary(op, value)),
                _ => Err(ctx.syntax(&inner, "malformed binary preference")),
            }
        }
        _ => Err(ctx.syntax(&inner, "unexpected preference")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> RuleSet {
        parse(src, "test.soar").expect("parse failed")
    }

    fn only(rules: &RuleSet) -> &Production {
        assert_eq!(rules.productions.len(), 1);
        &rules.productions[0].node
    }

    #[test]
    fn parses_minimal_production() {
        let rules = parse_ok("sp {init (state <s> ^superstate nil) --> (<s> ^name counter)}");
        let p = only(&rules);
        assert_eq!(p.name, "init");
        assert_eq!(p.conditions.len(), 1);
        let Condition::Positive(ids) = &p.conditions[0].node else {
            panic!("expected positive condition");
        };
        assert_eq!(ids.keyword, Some(GoalKeyword::State));
        assert_eq!(ids.id.as_variable(), Some("s"));
        assert_eq!(ids.tests[0].node.attributes[0].as_symbol(), Some("superstate"));
        assert_eq!(p.actions.len(), 1);
    }

    #[test]
    fn variable_is_not_mistaken_for_relation() {
        let rules = parse_ok("sp {r (state <s> ^count <c>) --> (<s> ^copy <c>)}");
        let Condition::Positive(ids) = &only(&rules).conditions[0].node else {
            panic!("expected positive condition");
        };
        assert_eq!(ids.tests[0].node.values[0].test.as_variable(), Some("c"));
    }

    #[test]
    fn parses_relations_and_disjunctions() {
        let rules = parse_ok(
            "sp {r (state <s> ^alt {<a> > 100 <> 250} ^color << red green >>) --> (<s> ^ok yes)}",
        );
        let Condition::Positive(ids) = &only(&rules).conditions[0].node else {
            panic!("expected positive condition");
        };
        let Test::Conjunctive(parts) = &ids.tests[0].node.values[0].test else {
            panic!("expected conjunctive test");
        };
        assert_eq!(parts.len(), 3);
        assert!(matches!(
            parts[1],
            SimpleTest::Relational {
                relation: Relation::Greater,
                value: SingleTest::Constant(Constant::Integer(100))
            }
        ));
        let Test::Simple(SimpleTest::Disjunction(values)) = &ids.tests[1].node.values[0].test
        else {
            panic!("expected disjunction");
        };
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn parses_dotted_chain_and_negation() {
        let rules = parse_ok(
            "sp {r (state <s> ^io.input-link <il> -^done true) -(<il> ^blocked yes) --> (<s> ^go now)}",
        );
        let p = only(&rules);
        let Condition::Positive(ids) = &p.conditions[0].node else {
            panic!("expected positive condition");
        };
        assert_eq!(ids.tests[0].node.attributes.len(), 2);
        assert!(ids.tests[1].node.negated);
        assert!(matches!(p.conditions[1].node, Condition::Negated(_)));
    }

    #[test]
    fn parses_preferences() {
        let rules = parse_ok(
            "sp {r (state <s> ^operator <o1> + ^operator <o2> +) --> (<s> ^operator <o1> > <o2>) (<s> ^operator <o2> <) (<s> ^operator <o1> = 5)}",
        );
        let p = only(&rules);
        let Condition::Positive(ids) = &p.conditions[0].node else {
            panic!("expected positive condition");
        };
        assert!(ids.tests[0].node.values[0].acceptable);

        let Action::Make { makes, .. } = &p.actions[0].node else {
            panic!("expected make action");
        };
        assert_eq!(
            makes[0].values[0].preferences,
            vec![Preference::Binary(
                BinaryPreference::Better,
                RhsValue::Variable("o2".into())
            )]
        );
        let Action::Make { makes, .. } = &p.actions[1].node else {
            panic!("expected make action");
        };
        assert_eq!(
            makes[0].values[0].preferences,
            vec![Preference::Unary(UnaryPreference::Worst)]
        );
        let Action::Make { makes, .. } = &p.actions[2].node else {
            panic!("expected make action");
        };
        assert!(matches!(
            makes[0].values[0].preferences[0],
            Preference::Binary(BinaryPreference::Indifferent, RhsValue::Constant(Constant::Integer(5)))
        ));
    }

    #[test]
    fn acceptable_preference_then_second_value() {
        let rules = parse_ok("sp {r (state <s>) --> (<s> ^operator <o1> + <o2> +)}");
        let Action::Make { makes, .. } = &only(&rules).actions[0].node else {
            panic!("expected make action");
        };
        assert_eq!(makes[0].values.len(), 2);
        assert_eq!(makes[0].values[1].value, RhsValue::Variable("o2".into()));
    }

    #[test]
    fn parses_function_calls() {
        let rules = parse_ok(
            "sp {r (state <s> ^count <c>) --> (<s> ^count <c> - (+ <c> 1)) (write |count is | <c>) (halt)}",
        );
        let p = only(&rules);
        let Action::Make { makes, .. } = &p.actions[0].node else {
            panic!("expected make action");
        };
        assert_eq!(makes[0].values.len(), 2);
        assert!(matches!(makes[0].values[1].value, RhsValue::Call(ref c) if c.name == "+"));
        assert!(matches!(p.actions[1].node, Action::Call(ref c) if c.name == "write"));
        assert!(matches!(p.actions[2].node, Action::Call(ref c) if c.name == "halt"));
    }

    #[test]
    fn parses_documentation_and_flags() {
        let rules = parse_ok(
            "sp {apply*move \"moves the block\" :o-support (state <s> ^operator <o>) --> (<o> ^done yes)}",
        );
        let p = only(&rules);
        assert_eq!(p.documentation.as_deref(), Some("moves the block"));
        assert!(p.has_flag(&ProductionFlag::OSupport));
    }

    #[test]
    fn comments_and_commands_are_skipped() {
        let src = "# header\nsource other.soar\nsp {a (state <s>) --> (<s> ^x 1)} # trailing\n";
        let (rules, diags) = parse_with_diagnostics(src, "t.soar").expect("parse failed");
        assert_eq!(rules.productions.len(), 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "ignored_command");
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let src = "sp {a (state <s>) --> (<s> ^x 1)}\nsp {a (state <s>) --> (<s> ^y 1)}";
        let err = parse(src, "t.soar").unwrap_err();
        assert!(matches!(err, ParseError::Duplicate { ref name, .. } if name == "a"));
    }

    #[test]
    fn missing_arrow_is_syntax_error() {
        let err = parse("sp {a (state <s>) (<s> ^x 1)}", "t.soar").unwrap_err();
        assert!(matches!(err, ParseError::Syntax { .. }));
    }
}
