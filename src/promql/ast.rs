//! PromQL expression tree
//!
//! Only the node kinds the translator emits are modelled. Each node renders to
//! PromQL text through `Display`; OR-joined matcher groups use the MetricsQL
//! `{a="x" or b="y"}` filter syntax.

use std::fmt;
use std::time::Duration;

use regex::Regex;

use super::duration::format_duration;
use super::error::MatcherError;

/// Label holding the metric name
pub const METRIC_NAME: &str = "__name__";

/// Label matching operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOp {
    Equal,
    NotEqual,
    Re,
    NotRe,
}

impl MatchOp {
    pub fn is_regex(&self) -> bool {
        matches!(self, MatchOp::Re | MatchOp::NotRe)
    }
}

impl fmt::Display for MatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchOp::Equal => "=",
            MatchOp::NotEqual => "!=",
            MatchOp::Re => "=~",
            MatchOp::NotRe => "!~",
        };
        write!(f, "{}", s)
    }
}

/// A single `name op "value"` label constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    pub op: MatchOp,
    pub name: String,
    pub value: String,
}

impl Matcher {
    /// Build a matcher, checking that regex values compile
    ///
    /// Regex matchers are fully anchored, so the value is validated as
    /// `^(?:value)$`.
    pub fn new(
        op: MatchOp,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, MatcherError> {
        let name = name.into();
        let value = value.into();

        if name.is_empty() {
            return Err(MatcherError::EmptyName);
        }
        if op.is_regex() {
            Regex::new(&format!("^(?:{})$", value)).map_err(|e| MatcherError::InvalidRegex {
                pattern: value.clone(),
                reason: e.to_string(),
            })?;
        }

        Ok(Self { op, name, value })
    }

    /// `__name__="<name>"`
    pub fn metric_name(name: impl Into<String>) -> Self {
        Self {
            op: MatchOp::Equal,
            name: METRIC_NAME.to_string(),
            value: name.into(),
        }
    }

    fn is_name_equal_to(&self, metric: &str) -> bool {
        self.op == MatchOp::Equal && self.name == METRIC_NAME && self.value == metric
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.op, quote_label_value(&self.value))
    }
}

/// Double-quote a label value, escaping as PromQL string literals do
pub fn quote_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Label matchers in disjunctive normal form
///
/// Matchers inside a group are ANDed; groups are ORed. A selector with a
/// single group is ordinary PromQL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Matchers {
    pub groups: Vec<Vec<Matcher>>,
}

impl Matchers {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single AND group
    pub fn new(matchers: Vec<Matcher>) -> Self {
        if matchers.is_empty() {
            Self::empty()
        } else {
            Self {
                groups: vec![matchers],
            }
        }
    }

    pub fn with_groups(groups: Vec<Vec<Matcher>>) -> Self {
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.is_empty())
    }

    /// Number of matchers across all groups
    pub fn len(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }

    /// Add `matcher` to every group, creating one if there are none
    pub fn append(&mut self, matcher: Matcher) {
        if self.groups.is_empty() {
            self.groups.push(vec![matcher]);
            return;
        }
        for group in &mut self.groups {
            group.push(matcher.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Matcher> {
        self.groups.iter().flatten()
    }

    /// Render the selector body
    ///
    /// A trailing `__name__="<metric>"` in a group is left out since the
    /// selector prefix already carries it. In a multi-group selector it is
    /// kept when it is all the group holds, so that branch still matches.
    fn render(&self, metric: Option<&str>) -> String {
        let multi = self.groups.len() > 1;
        self.groups
            .iter()
            .map(|group| {
                let shown = match (metric, group.split_last()) {
                    (Some(name), Some((last, rest)))
                        if last.is_name_equal_to(name) && (!multi || !rest.is_empty()) =>
                    {
                        rest
                    }
                    _ => group.as_slice(),
                };
                shown
                    .iter()
                    .map(Matcher::to_string)
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .filter(|body| !body.is_empty())
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

impl fmt::Display for Matchers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(None))
    }
}

/// Instant vector selector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VectorSelector {
    pub name: Option<String>,
    pub matchers: Matchers,
}

impl VectorSelector {
    pub fn new(name: Option<String>, matchers: Matchers) -> Self {
        Self { name, matchers }
    }
}

impl From<&str> for VectorSelector {
    fn from(name: &str) -> Self {
        Self::new(Some(name.to_string()), Matchers::empty())
    }
}

impl fmt::Display for VectorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{}", name)?;
        }
        let body = self.matchers.render(self.name.as_deref());
        if !body.is_empty() {
            write!(f, "{{{}}}", body)?;
        }
        Ok(())
    }
}

/// Range vector selector: `selector[range]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixSelector {
    pub vs: VectorSelector,
    pub range: Duration,
}

impl MatrixSelector {
    pub fn new(vs: VectorSelector, range: Duration) -> Self {
        Self { vs, range }
    }
}

impl fmt::Display for MatrixSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.vs, format_duration(&self.range))
    }
}

/// Result type of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Vector,
    Matrix,
    Scalar,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Vector => "vector",
            ValueType::Matrix => "matrix",
            ValueType::Scalar => "scalar",
            ValueType::String => "string",
        };
        write!(f, "{}", s)
    }
}

/// Signature of a PromQL/MetricsQL function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: &'static str,
    pub arg_types: Vec<ValueType>,
    pub return_type: ValueType,
}

impl Function {
    pub fn new(name: &'static str, arg_types: Vec<ValueType>, return_type: ValueType) -> Self {
        Self {
            name,
            arg_types,
            return_type,
        }
    }
}

/// Function call node
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub func: Function,
    pub args: Vec<Expr>,
}

impl Call {
    pub fn new(func: Function, args: Vec<Expr>) -> Self {
        Self { func, args }
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.func.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ")")
    }
}

/// Cross-series aggregation operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggregateOp::Avg => "avg",
            AggregateOp::Sum => "sum",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Count => "count",
        };
        write!(f, "{}", s)
    }
}

/// `op by(labels) (expr)`
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub op: AggregateOp,
    pub grouping: Vec<String>,
    pub expr: Box<Expr>,
}

impl AggregateExpr {
    pub fn new(op: AggregateOp, grouping: Vec<String>, expr: Expr) -> Self {
        Self {
            op,
            grouping,
            expr: Box::new(expr),
        }
    }
}

impl fmt::Display for AggregateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.grouping.is_empty() {
            write!(f, "{}({})", self.op, self.expr)
        } else {
            write!(
                f,
                "{} by({}) ({})",
                self.op,
                self.grouping.join(", "),
                self.expr
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringLiteral {
    pub val: String,
}

impl StringLiteral {
    pub fn new(val: impl Into<String>) -> Self {
        Self { val: val.into() }
    }
}

impl fmt::Display for StringLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_label_value(&self.val))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberLiteral {
    pub val: f64,
}

impl NumberLiteral {
    pub fn new(val: f64) -> Self {
        Self { val }
    }
}

impl fmt::Display for NumberLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.val == f64::INFINITY {
            write!(f, "Inf")
        } else if self.val == f64::NEG_INFINITY {
            write!(f, "-Inf")
        } else if self.val.is_nan() {
            write!(f, "NaN")
        } else {
            write!(f, "{}", self.val)
        }
    }
}

/// A PromQL expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    VectorSelector(VectorSelector),
    MatrixSelector(MatrixSelector),
    Call(Call),
    Aggregate(AggregateExpr),
    StringLiteral(StringLiteral),
    NumberLiteral(NumberLiteral),
}

impl Expr {
    pub fn value_type(&self) -> ValueType {
        match self {
            Expr::VectorSelector(_) | Expr::Aggregate(_) => ValueType::Vector,
            Expr::MatrixSelector(_) => ValueType::Matrix,
            Expr::Call(call) => call.func.return_type,
            Expr::StringLiteral(_) => ValueType::String,
            Expr::NumberLiteral(_) => ValueType::Scalar,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::VectorSelector(vs) => write!(f, "{}", vs),
            Expr::MatrixSelector(ms) => write!(f, "{}", ms),
            Expr::Call(call) => write!(f, "{}", call),
            Expr::Aggregate(agg) => write!(f, "{}", agg),
            Expr::StringLiteral(s) => write!(f, "{}", s),
            Expr::NumberLiteral(n) => write!(f, "{}", n),
        }
    }
}

impl From<VectorSelector> for Expr {
    fn from(vs: VectorSelector) -> Self {
        Expr::VectorSelector(vs)
    }
}

impl From<MatrixSelector> for Expr {
    fn from(ms: MatrixSelector) -> Self {
        Expr::MatrixSelector(ms)
    }
}

impl From<Call> for Expr {
    fn from(call: Call) -> Self {
        Expr::Call(call)
    }
}

impl From<AggregateExpr> for Expr {
    fn from(agg: AggregateExpr) -> Self {
        Expr::Aggregate(agg)
    }
}
