use std::fmt;

/// Source span for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A spanned AST node.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A parsed rule file: every `sp {...}` production in source order.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct RuleSet {
    pub productions: Vec<Spanned<Production>>,
}

impl RuleSet {
    pub fn production(&self, name: &str) -> Option<&Spanned<Production>> {
        self.productions.iter().find(|p| p.node.name == name)
    }
}

/// One Soar production: `sp {name "doc" :flags conditions --> actions}`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Production {
    pub name: String,
    pub documentation: Option<String>,
    pub flags: Vec<ProductionFlag>,
    pub conditions: Vec<Spanned<Condition>>,
    pub actions: Vec<Spanned<Action>>,
}

impl Production {
    pub fn has_flag(&self, flag: &ProductionFlag) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Production flags (`:o-support`, `:i-support`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum ProductionFlag {
    OSupport,
    ISupport,
    Chunk,
    Default,
    Template,
    Interrupt,
    Other(String),
}

impl ProductionFlag {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "o-support" => ProductionFlag::OSupport,
            "i-support" => ProductionFlag::ISupport,
            "chunk" => ProductionFlag::Chunk,
            "default" => ProductionFlag::Default,
            "template" => ProductionFlag::Template,
            "interrupt" => ProductionFlag::Interrupt,
            other => ProductionFlag::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ProductionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductionFlag::OSupport => write!(f, ":o-support"),
            ProductionFlag::ISupport => write!(f, ":i-support"),
            ProductionFlag::Chunk => write!(f, ":chunk"),
            ProductionFlag::Default => write!(f, ":default"),
            ProductionFlag::Template => write!(f, ":template"),
            ProductionFlag::Interrupt => write!(f, ":interrupt"),
            ProductionFlag::Other(s) => write!(f, ":{s}"),
        }
    }
}

/// A left-hand-side condition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Condition {
    /// `(id ^attr value ...)`
    Positive(IdConditions),
    /// `-(id ^attr value ...)`
    Negated(IdConditions),
    /// `{ cond cond ... }`, optionally negated.
    Conjunction {
        negated: bool,
        conditions: Vec<Spanned<Condition>>,
    },
}

/// Goal keyword introducing the state-implicit condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum GoalKeyword {
    State,
    Impasse,
}

/// Tests applied to a single identifier.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct IdConditions {
    pub keyword: Option<GoalKeyword>,
    pub id: Test,
    pub tests: Vec<Spanned<AttrValueTests>>,
}

/// `-^attr.chain value value ...`
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AttrValueTests {
    pub negated: bool,
    pub attributes: Vec<Test>,
    pub values: Vec<ValueTest>,
}

/// A value test with the optional acceptable-preference marker `+`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ValueTest {
    pub test: Test,
    pub acceptable: bool,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Test {
    Simple(SimpleTest),
    /// `{ <x> > 3 <> 7 }`
    Conjunctive(Vec<SimpleTest>),
}

impl Test {
    /// The variable this test binds, when it is a plain variable test.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Test::Simple(SimpleTest::Relational {
                relation: Relation::Equal,
                value: SingleTest::Variable(v),
            }) => Some(v),
            _ => None,
        }
    }

    /// The symbol this test names, when it is a plain symbolic constant.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Test::Simple(SimpleTest::Relational {
                relation: Relation::Equal,
                value: SingleTest::Constant(Constant::Symbol(s)),
            }) => Some(s),
            _ => None,
        }
    }

    pub fn is_conjunctive(&self) -> bool {
        matches!(self, Test::Conjunctive(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum SimpleTest {
    /// `<< a b c >>`
    Disjunction(Vec<Constant>),
    /// `relation value`, where a missing relation means equality.
    Relational { relation: Relation, value: SingleTest },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Relation {
    #[default]
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    SameType,
}

impl Relation {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Relation::Equal),
            "<>" => Some(Relation::NotEqual),
            "<" => Some(Relation::Less),
            ">" => Some(Relation::Greater),
            "<=" => Some(Relation::LessOrEqual),
            ">=" => Some(Relation::GreaterOrEqual),
            "<=>" => Some(Relation::SameType),
            _ => None,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::Equal => "=",
            Relation::NotEqual => "<>",
            Relation::Less => "<",
            Relation::Greater => ">",
            Relation::LessOrEqual => "<=",
            Relation::GreaterOrEqual => ">=",
            Relation::SameType => "<=>",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum SingleTest {
    /// Variable name without the angle brackets.
    Variable(String),
    Constant(Constant),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Constant {
    Symbol(String),
    Integer(i64),
    Float(f64),
    /// `|quoted text|`
    Text(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Symbol(s) => write!(f, "{s}"),
            Constant::Integer(i) => write!(f, "{i}"),
            Constant::Float(x) => write!(f, "{x}"),
            Constant::Text(s) => write!(f, "|{s}|"),
        }
    }
}

impl fmt::Display for SingleTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SingleTest::Variable(v) => write!(f, "<{v}>"),
            SingleTest::Constant(c) => write!(f, "{c}"),
        }
    }
}

impl fmt::Display for SimpleTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimpleTest::Disjunction(values) => {
                write!(f, "<<")?;
                for v in values {
                    write!(f, " {v}")?;
                }
                write!(f, " >>")
            }
            SimpleTest::Relational {
                relation: Relation::Equal,
                value,
            } => write!(f, "{value}"),
            SimpleTest::Relational { relation, value } => write!(f, "{relation} {value}"),
        }
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Test::Simple(t) => write!(f, "{t}"),
            Test::Conjunctive(tests) => {
                write!(f, "{{")?;
                for t in tests {
                    write!(f, " {t}")?;
                }
                write!(f, " }}")
            }
        }
    }
}

/// A right-hand-side action.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Action {
    /// `(<id> ^attr value pref ...)`
    Make {
        id: String,
        makes: Vec<AttrValueMake>,
    },
    /// `(halt)`, `(write ...)`, ...
    Call(FunctionCall),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct AttrValueMake {
    pub attributes: Vec<RhsValue>,
    pub values: Vec<ValueMake>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct ValueMake {
    pub value: RhsValue,
    pub preferences: Vec<Preference>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum RhsValue {
    Variable(String),
    Constant(Constant),
    Call(FunctionCall),
}

impl fmt::Display for RhsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RhsValue::Variable(v) => write!(f, "<{v}>"),
            RhsValue::Constant(c) => write!(f, "{c}"),
            RhsValue::Call(call) => write!(f, "{call}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<RhsValue>,
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum Preference {
    Unary(UnaryPreference),
    /// `> <o2>`, `< <o2>`, `= <o2>` or numeric indifference `= 0.5`.
    Binary(BinaryPreference, RhsValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum UnaryPreference {
    Acceptable,
    Reject,
    Require,
    Prohibit,
    Best,
    Worst,
    Indifferent,
}

impl UnaryPreference {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "+" => Some(UnaryPreference::Acceptable),
            "-" => Some(UnaryPreference::Reject),
            "!" => Some(UnaryPreference::Require),
            "~" => Some(UnaryPreference::Prohibit),
            ">" => Some(UnaryPreference::Best),
            "<" => Some(UnaryPreference::Worst),
            "=" => Some(UnaryPreference::Indifferent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub enum BinaryPreference {
    Better,
    Worse,
    Indifferent,
}

impl BinaryPreference {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            ">" => Some(BinaryPreference::Better),
            "<" => Some(BinaryPreference::Worse),
            "=" => Some(BinaryPreference::Indifferent),
            _ => None,
        }
    }
}
