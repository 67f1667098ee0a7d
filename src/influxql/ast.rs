//! InfluxQL Abstract Syntax Tree
//!
//! Typed nodes for the subset of InfluxQL that can be translated: a query is a
//! list of statements, and the only statement kind is `SELECT`.
//!
//! # Example Queries
//!
//! ```text
//! SELECT free FROM "disk" WHERE host = 'h1' AND path = '/opt'
//! SELECT mean("in") FROM "swap" WHERE host =~ /re/ GROUP BY time(2d), host
//! SELECT last(*) FROM mem WHERE time > now() - 1h
//! ```

use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// A parsed query: one or more `;`-separated statements
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub statements: Vec<Statement>,
}

/// A single statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectStatement),
}

impl Statement {
    /// Borrow the inner `SELECT` statement
    pub fn as_select(&self) -> &SelectStatement {
        match self {
            Statement::Select(s) => s,
        }
    }
}

/// `SELECT fields FROM sources [WHERE condition] [GROUP BY dimensions] [fill(...)]`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    /// Expressions returned by the query
    pub fields: Vec<Field>,
    /// Data sources read by the query
    pub sources: Vec<Source>,
    /// Optional WHERE clause
    pub condition: Option<Expr>,
    /// GROUP BY dimensions in insertion order
    pub dimensions: Vec<Dimension>,
    /// Optional fill() option of the GROUP BY clause
    pub fill: Option<Fill>,
}

/// A selected field with an optional alias
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl Field {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// A data source in the FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Measurement(Measurement),
    SubQuery(Box<SelectStatement>),
}

impl Source {
    /// Shorthand for a plain named measurement
    pub fn measurement(name: impl Into<String>) -> Self {
        Source::Measurement(Measurement {
            name: name.into(),
            ..Default::default()
        })
    }
}

/// A measurement reference, optionally qualified by database and retention policy
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measurement {
    pub database: Option<String>,
    pub retention_policy: Option<String>,
    pub name: String,
    /// Set when the measurement is given as `/regex/`
    pub regex: Option<String>,
}

/// A GROUP BY dimension
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub expr: Expr,
}

impl Dimension {
    pub fn new(expr: Expr) -> Self {
        Self { expr }
    }
}

/// Fill option for empty GROUP BY intervals
#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    Null,
    None,
    Previous,
    Linear,
    Number(f64),
}

/// Binary operators, ordered roughly by binding strength
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    EqRegex,
    NotEqRegex,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    /// True for the boolean connectives AND/OR
    pub fn is_connective(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// True for comparison operators (including regex matches)
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq
                | Self::NotEq
                | Self::Lt
                | Self::Lte
                | Self::Gt
                | Self::Gte
                | Self::EqRegex
                | Self::NotEqRegex
        )
    }

    /// The operator to use when the operands of a comparison are swapped
    pub fn reverse(&self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Lte => Self::Gte,
            Self::Gt => Self::Lt,
            Self::Gte => Self::Lte,
            other => *other,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::EqRegex => "=~",
            Self::NotEqRegex => "!~",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
        };
        f.write_str(s)
    }
}

/// An InfluxQL expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a tag, field or `time`
    VarRef(String),
    /// `*`
    Wildcard,
    /// Function call such as `mean(usage)` or `now()`
    Call { name: String, args: Vec<Expr> },
    /// Binary expression
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// Parenthesized expression
    Paren(Box<Expr>),
    StringLit(String),
    RegexLit(String),
    IntegerLit(i64),
    NumberLit(f64),
    BooleanLit(bool),
    DurationLit(Duration),
    /// Absolute instant; produced when evaluating `now()`, never by the parser
    TimeLit(DateTime<Utc>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::VarRef(name.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::StringLit(value.into())
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Expr::RegexLit(pattern.into())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn paren(expr: Expr) -> Self {
        Expr::Paren(Box::new(expr))
    }

    /// True when this is a reference to the reserved `time` key
    pub fn is_time_ref(&self) -> bool {
        matches!(self, Expr::VarRef(name) if name.eq_ignore_ascii_case("time"))
    }

    /// Number of nodes on the longest path from this node to a leaf
    pub fn depth(&self) -> usize {
        match self {
            Expr::Call { args, .. } => 1 + args.iter().map(Expr::depth).max().unwrap_or(0),
            Expr::Binary { lhs, rhs, .. } => 1 + lhs.depth().max(rhs.depth()),
            Expr::Paren(inner) => 1 + inner.depth(),
            _ => 1,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::VarRef(name) => write_ident(f, name),
            Expr::Wildcard => f.write_str("*"),
            Expr::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::Binary { op, lhs, rhs } => write!(f, "{} {} {}", lhs, op, rhs),
            Expr::Paren(inner) => write!(f, "({})", inner),
            Expr::StringLit(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Expr::RegexLit(r) => write!(f, "/{}/", r.replace('/', "\\/")),
            Expr::IntegerLit(n) => write!(f, "{}", n),
            Expr::NumberLit(n) => write!(f, "{}", n),
            Expr::BooleanLit(b) => write!(f, "{}", b),
            Expr::DurationLit(d) => f.write_str(&format_duration(*d)),
            Expr::TimeLit(t) => write!(f, "'{}'", t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Measurement(m) => {
                if let Some(db) = &m.database {
                    write_ident(f, db)?;
                    f.write_str(".")?;
                }
                if let Some(rp) = &m.retention_policy {
                    write_ident(f, rp)?;
                    f.write_str(".")?;
                }
                match &m.regex {
                    Some(re) => write!(f, "/{}/", re.replace('/', "\\/")),
                    None => write_ident(f, &m.name),
                }
            }
            Source::SubQuery(stmt) => write!(f, "({})", stmt),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            f.write_str(" AS ")?;
            write_ident(f, alias)?;
        }
        Ok(())
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl fmt::Display for Fill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fill::Null => f.write_str("fill(null)"),
            Fill::None => f.write_str("fill(none)"),
            Fill::Previous => f.write_str("fill(previous)"),
            Fill::Linear => f.write_str("fill(linear)"),
            Fill::Number(n) => write!(f, "fill({})", n),
        }
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        write_list(f, &self.fields)?;
        f.write_str(" FROM ")?;
        write_list(f, &self.sources)?;
        if let Some(cond) = &self.condition {
            write!(f, " WHERE {}", cond)?;
        }
        if !self.dimensions.is_empty() || self.fill.is_some() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.dimensions)?;
            if let Some(fill) = &self.fill {
                if !self.dimensions.is_empty() {
                    f.write_str(" ")?;
                }
                write!(f, "{}", fill)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(s) => write!(f, "{}", s),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Write an identifier, double-quoting it unless it is a plain bare word
fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let bare = name
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !super::parser::is_reserved(name);
    if bare {
        f.write_str(name)
    } else {
        write!(f, "\"{}\"", name.replace('"', "\\\""))
    }
}

const NANOS_PER_MICRO: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;
const NANOS_PER_WEEK: i64 = 7 * NANOS_PER_DAY;

/// Units accepted in duration literals, as (suffix, nanoseconds)
pub(crate) const DURATION_UNITS: &[(&str, i64)] = &[
    ("ns", 1),
    ("ms", NANOS_PER_MILLI),
    ("u", NANOS_PER_MICRO),
    ("µ", NANOS_PER_MICRO),
    ("s", NANOS_PER_SECOND),
    ("m", NANOS_PER_MINUTE),
    ("h", NANOS_PER_HOUR),
    ("d", NANOS_PER_DAY),
    ("w", NANOS_PER_WEEK),
];

/// Format a duration the way InfluxQL prints literals: the largest unit that
/// divides it evenly, e.g. `10080m` → `1w`, `2d` → `2d`.
pub fn format_duration(d: Duration) -> String {
    let nanos = match d.num_nanoseconds() {
        Some(n) => n,
        None => return format!("{}ms", d.num_milliseconds()),
    };
    if nanos == 0 {
        return "0s".to_string();
    }
    let units = [
        (NANOS_PER_WEEK, "w"),
        (NANOS_PER_DAY, "d"),
        (NANOS_PER_HOUR, "h"),
        (NANOS_PER_MINUTE, "m"),
        (NANOS_PER_SECOND, "s"),
        (NANOS_PER_MILLI, "ms"),
        (NANOS_PER_MICRO, "u"),
    ];
    for (size, suffix) in units {
        if nanos % size == 0 {
            return format!("{}{}", nanos / size, suffix);
        }
    }
    format!("{}ns", nanos)
}
