//! Typed working-memory values and condition restrictions.

use std::fmt;

use serde::Serialize;
use soarta_dsl::ast;

/// A literal symbol as written in the rules (`move`, `3`, `0.5`, `|some text|`).
pub type Symbol = String;

/// What a value or edge label in an augmented tree denotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MemoryValue {
    Literal(Symbol),
    /// A rule-scoped variable, stored without angle brackets.
    RuleVariable(Symbol),
    /// Any value (attribute tested for presence, or a computed right-hand side).
    Wildcard,
}

impl MemoryValue {
    pub fn literal(s: impl Into<Symbol>) -> Self {
        MemoryValue::Literal(s.into())
    }

    pub fn variable(s: impl Into<Symbol>) -> Self {
        MemoryValue::RuleVariable(s.into())
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self {
            MemoryValue::RuleVariable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            MemoryValue::Literal(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, MemoryValue::RuleVariable(_))
    }
}

impl fmt::Display for MemoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryValue::Literal(s) => write!(f, "{s}"),
            MemoryValue::RuleVariable(v) => write!(f, "<{v}>"),
            MemoryValue::Wildcard => write!(f, "*"),
        }
    }
}

/// Classification of a literal symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Integer(i64),
    Float,
    Text,
    Symbol,
}

pub fn literal_kind(symbol: &str) -> LiteralKind {
    if let Ok(i) = symbol.parse::<i64>() {
        return LiteralKind::Integer(i);
    }
    if symbol.starts_with('|') {
        return LiteralKind::Text;
    }
    if symbol.contains('.') && symbol.parse::<f64>().is_ok() {
        return LiteralKind::Float;
    }
    LiteralKind::Symbol
}

/// Render a parsed constant as the symbol used throughout analysis.
pub fn constant_symbol(constant: &ast::Constant) -> Symbol {
    match constant {
        ast::Constant::Symbol(s) => s.clone(),
        ast::Constant::Integer(i) => i.to_string(),
        ast::Constant::Float(x) => {
            let s = x.to_string();
            if s.contains('.') {
                s
            } else {
                format!("{s}.0")
            }
        }
        ast::Constant::Text(t) => format!("|{t}|"),
    }
}

/// Relational operators other than equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelOp {
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    SameType,
}

impl RelOp {
    /// `None` for plain equality, which is not a restriction.
    pub fn from_relation(relation: ast::Relation) -> Option<Self> {
        match relation {
            ast::Relation::Equal => None,
            ast::Relation::NotEqual => Some(RelOp::NotEqual),
            ast::Relation::Less => Some(RelOp::Less),
            ast::Relation::Greater => Some(RelOp::Greater),
            ast::Relation::LessOrEqual => Some(RelOp::LessOrEqual),
            ast::Relation::GreaterOrEqual => Some(RelOp::GreaterOrEqual),
            ast::Relation::SameType => Some(RelOp::SameType),
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, RelOp::NotEqual | RelOp::SameType)
    }
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelOp::NotEqual => "<>",
            RelOp::Less => "<",
            RelOp::Greater => ">",
            RelOp::LessOrEqual => "<=",
            RelOp::GreaterOrEqual => ">=",
            RelOp::SameType => "<=>",
        };
        write!(f, "{s}")
    }
}

/// Restriction attached to a tested value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Restriction {
    Negated,
    Relation(RelOp, MemoryValue),
    /// Name of a disjunction array from the registry.
    LiteralSet(String),
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Restriction::Negated => write!(f, "negated"),
            Restriction::Relation(op, operand) => write!(f, "{op} {operand}"),
            Restriction::LiteralSet(name) => write!(f, "in {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_kinds() {
        assert_eq!(literal_kind("42"), LiteralKind::Integer(42));
        assert_eq!(literal_kind("-3"), LiteralKind::Integer(-3));
        assert_eq!(literal_kind("0.5"), LiteralKind::Float);
        assert_eq!(literal_kind("|hi there|"), LiteralKind::Text);
        assert_eq!(literal_kind("move-north"), LiteralKind::Symbol);
    }

    #[test]
    fn float_constants_keep_a_decimal_point() {
        assert_eq!(constant_symbol(&ast::Constant::Float(2.0)), "2.0");
        assert_eq!(literal_kind(&constant_symbol(&ast::Constant::Float(2.0))), LiteralKind::Float);
    }

    #[test]
    fn equality_is_not_a_restriction() {
        assert_eq!(RelOp::from_relation(ast::Relation::Equal), None);
        assert_eq!(
            RelOp::from_relation(ast::Relation::GreaterOrEqual),
            Some(RelOp::GreaterOrEqual)
        );
    }
}
