//! InfluxQL Parser
//!
//! Parses InfluxQL `SELECT` statements into the typed AST.
//!
//! # Supported Syntax
//!
//! ```text
//! SELECT field [AS alias] [, field ...]
//! FROM measurement [, measurement ...]
//! [WHERE condition]
//! [GROUP BY [dimension [, dimension ...]] [fill(none|null|previous|linear|<n>)]]
//! ```
//!
//! Operator precedence from loosest to tightest: `OR`, `AND`, comparisons
//! (`= != <> < <= > >= =~ !~`), `+ -`, `* / %`.

use chrono::Duration;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{map, map_res, not, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::influxql::ast::*;
use crate::influxql::error::{ParseError, ParseResult};

/// Deepest parenthesis nesting accepted before recursive parsing starts
pub const MAX_NESTING_DEPTH: usize = 64;

/// Deepest expression tree the parser builds; long AND/OR or arithmetic
/// chains nest one level per operator
pub const MAX_EXPR_DEPTH: usize = 512;

const RESERVED: &[&str] = &[
    "and", "as", "asc", "by", "desc", "false", "fill", "from", "group", "in", "limit", "not",
    "offset", "or", "order", "select", "slimit", "soffset", "true", "where",
];

/// True for words that must be double-quoted to be used as identifiers
pub fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|k| k.eq_ignore_ascii_case(word))
}

/// Parse a query string into one or more statements
pub fn parse_query(input: &str) -> ParseResult<Query> {
    tracing::trace!(query = input, "parsing InfluxQL");
    check_nesting(input, MAX_NESTING_DEPTH)?;

    let mut statements = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        ensure_select(rest)?;
        let (remaining, stmt) = select_statement(rest).map_err(|e| syntax_error(input, e))?;
        statements.push(Statement::Select(stmt));

        rest = remaining.trim_start();
        if let Some(after) = rest.strip_prefix(';') {
            rest = after.trim_start();
        } else if !rest.is_empty() {
            return Err(ParseError::TrailingInput(rest.to_string()));
        }
    }

    if statements.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(Query { statements })
}

/// Parse text that must contain exactly one statement
pub fn parse_statement(input: &str) -> ParseResult<Statement> {
    let mut query = parse_query(input)?;
    if query.statements.len() != 1 {
        return Err(ParseError::StatementCount(query.statements.len()));
    }
    Ok(query.statements.remove(0))
}

/// Parse a bare expression such as a WHERE condition
pub fn parse_expr(input: &str) -> ParseResult<Expr> {
    check_nesting(input, MAX_NESTING_DEPTH)?;
    if input.trim().is_empty() {
        return Err(ParseError::Empty);
    }
    let (rest, parsed) = expr(input).map_err(|e| syntax_error(input, e))?;
    let rest = rest.trim();
    if !rest.is_empty() {
        return Err(ParseError::TrailingInput(rest.to_string()));
    }
    Ok(parsed)
}

/// Reject input whose parentheses nest deeper than `limit`
///
/// Parentheses inside string, identifier and regex literals are not counted.
fn check_nesting(input: &str, limit: usize) -> ParseResult<()> {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '/' if opens_regex(&input[..i]) => quote = Some(c),
            '(' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    if max_depth > limit {
        return Err(ParseError::NestingTooDeep {
            depth: max_depth,
            limit,
        });
    }
    Ok(())
}

/// True when a `/` following `before` starts a regex literal rather than
/// dividing the operand before it
fn opens_regex(before: &str) -> bool {
    let before = before.trim_end();
    match before.chars().last() {
        None => true,
        Some(c) if is_ident_char(c) => {
            let word_start = before
                .rfind(|c: char| !is_ident_char(c))
                .map_or(0, |i| i + 1);
            let word = &before[word_start..];
            word.eq_ignore_ascii_case("from") || word.eq_ignore_ascii_case("by")
        }
        Some(c) => !matches!(c, ')' | '"' | '\'' | '*'),
    }
}

fn ensure_select(input: &str) -> ParseResult<()> {
    let word: String = input
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if word.eq_ignore_ascii_case("select") {
        Ok(())
    } else if word.is_empty() {
        Err(syntax_error(
            input,
            nom::Err::Error(NomError::new(input, ErrorKind::Tag)),
        ))
    } else {
        Err(ParseError::UnsupportedStatement(word.to_uppercase()))
    }
}

fn syntax_error(full: &str, err: nom::Err<NomError<&str>>) -> ParseError {
    match err {
        nom::Err::Failure(e) if e.code == ErrorKind::TooLarge => ParseError::NestingTooDeep {
            depth: MAX_EXPR_DEPTH + 1,
            limit: MAX_EXPR_DEPTH,
        },
        nom::Err::Error(e) | nom::Err::Failure(e) => ParseError::Syntax {
            offset: full.len().saturating_sub(e.input.len()),
            near: e.input.chars().take(24).collect(),
        },
        nom::Err::Incomplete(_) => ParseError::Syntax {
            offset: full.len(),
            near: String::new(),
        },
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Skip leading whitespace before `inner`
fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    preceded(multispace0, inner)
}

/// Case-insensitive keyword that must not run into an identifier character
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    move |input: &'a str| {
        let (rest, matched) = tag_no_case(kw)(input)?;
        match rest.chars().next() {
            Some(c) if is_ident_char(c) => {
                Err(nom::Err::Error(NomError::new(input, ErrorKind::Tag)))
            }
            _ => Ok((rest, matched)),
        }
    }
}

fn comma(input: &str) -> IResult<&str, char> {
    preceded(multispace0, char(','))(input)
}

/// Text between `quote` characters. A backslash escapes the quote; when
/// `unescape_backslash` is set `\\` also collapses to one backslash.
fn quoted<'a>(
    quote: char,
    unescape_backslash: bool,
) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    move |input: &'a str| {
        let (body, _) = char(quote)(input)?;
        let mut out = String::new();
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some((_, next)) if next == quote => out.push(next),
                    Some((_, '\\')) if unescape_backslash => out.push('\\'),
                    Some((_, next)) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => break,
                }
            } else if c == quote {
                return Ok((&body[i + c.len_utf8()..], out));
            } else {
                out.push(c);
            }
        }
        Err(nom::Err::Error(NomError::new(input, ErrorKind::Char)))
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    quoted('\'', true)(input)
}

fn regex_literal(input: &str) -> IResult<&str, String> {
    quoted('/', false)(input)
}

fn bare_identifier(input: &str) -> IResult<&str, String> {
    let (rest, word) = recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)?;
    if is_reserved(word) {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Verify)));
    }
    Ok((rest, word.to_string()))
}

fn identifier(input: &str) -> IResult<&str, String> {
    alt((quoted('"', true), bare_identifier))(input)
}

/// Parse `SELECT ... FROM ... [WHERE ...] [GROUP BY ...]`
fn select_statement(input: &str) -> IResult<&str, SelectStatement> {
    let (input, _) = ws(keyword("SELECT"))(input)?;
    let (input, fields) = separated_list1(comma, field)(input)?;
    let (input, _) = ws(keyword("FROM"))(input)?;
    let (input, sources) = separated_list1(comma, source)(input)?;
    let (input, condition) = opt(preceded(ws(keyword("WHERE")), expr))(input)?;
    let (input, group) = opt(group_by_clause)(input)?;
    let (dimensions, fill) = group.unwrap_or_default();
    let (input, fill) = match fill {
        Some(fill) => (input, Some(fill)),
        None => opt(fill_option)(input)?,
    };

    Ok((
        input,
        SelectStatement {
            fields,
            sources,
            condition,
            dimensions,
            fill,
        },
    ))
}

fn field(input: &str) -> IResult<&str, Field> {
    let (input, expr) = expr(input)?;
    let (input, alias) = opt(preceded(ws(keyword("AS")), ws(identifier)))(input)?;
    Ok((input, Field { expr, alias }))
}

fn source(input: &str) -> IResult<&str, Source> {
    ws(alt((subquery_source, regex_source, measurement_source)))(input)
}

fn subquery_source(input: &str) -> IResult<&str, Source> {
    map(
        delimited(char('('), select_statement, ws(char(')'))),
        |stmt| Source::SubQuery(Box::new(stmt)),
    )(input)
}

fn regex_source(input: &str) -> IResult<&str, Source> {
    map(regex_literal, |re| {
        Source::Measurement(Measurement {
            regex: Some(re),
            ..Default::default()
        })
    })(input)
}

/// `name`, `rp.name` or `db.rp.name`
fn measurement_source(input: &str) -> IResult<&str, Source> {
    let (rest, first) = identifier(input)?;
    let (rest, more) = many0(preceded(char('.'), identifier))(rest)?;

    let mut segments = vec![first];
    segments.extend(more);
    let measurement = match segments.len() {
        1 => Measurement {
            name: segments.remove(0),
            ..Default::default()
        },
        2 => Measurement {
            retention_policy: Some(segments.remove(0)),
            name: segments.remove(0),
            ..Default::default()
        },
        3 => Measurement {
            database: Some(segments.remove(0)),
            retention_policy: Some(segments.remove(0)),
            name: segments.remove(0),
            regex: None,
        },
        _ => return Err(nom::Err::Error(NomError::new(input, ErrorKind::Verify))),
    };
    Ok((rest, Source::Measurement(measurement)))
}

fn group_by_clause(input: &str) -> IResult<&str, (Vec<Dimension>, Option<Fill>)> {
    let (input, _) = ws(keyword("GROUP"))(input)?;
    let (input, _) = ws(keyword("BY"))(input)?;
    let (input, dimensions) = separated_list0(comma, dimension)(input)?;
    let (input, fill) = opt(fill_option)(input)?;
    Ok((input, (dimensions, fill)))
}

fn dimension(input: &str) -> IResult<&str, Dimension> {
    let (input, _) = multispace0(input)?;
    let (input, _) = not(keyword("fill"))(input)?;
    map(
        alt((map(regex_literal, Expr::RegexLit), expr)),
        Dimension::new,
    )(input)
}

fn fill_option(input: &str) -> IResult<&str, Fill> {
    let (input, _) = ws(keyword("fill"))(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, fill) = ws(alt((
        value(Fill::Null, keyword("null")),
        value(Fill::None, keyword("none")),
        value(Fill::Previous, keyword("previous")),
        value(Fill::Linear, keyword("linear")),
        map(signed_number, Fill::Number),
    )))(input)?;
    let (input, _) = ws(char(')'))(input)?;
    Ok((input, fill))
}

fn signed_number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

/// Parse a full expression
pub(crate) fn expr(input: &str) -> IResult<&str, Expr> {
    or_expr(input)
}

/// Fail the whole parse once a tree would nest deeper than MAX_EXPR_DEPTH
fn check_depth(input: &str, depth: usize) -> Result<usize, nom::Err<NomError<&str>>> {
    if depth > MAX_EXPR_DEPTH {
        return Err(nom::Err::Failure(NomError::new(input, ErrorKind::TooLarge)));
    }
    Ok(depth)
}

/// `expr` after checking its depth
fn bounded(input: &str, expr: Expr) -> IResult<&str, Expr> {
    check_depth(input, expr.depth())?;
    Ok((input, expr))
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut lhs) = and_expr(input)?;
    let mut depth = lhs.depth();
    while let Ok((rest, _)) = ws(keyword("OR"))(input) {
        let (rest, rhs) = and_expr(rest)?;
        depth = check_depth(rest, depth.max(rhs.depth()) + 1)?;
        lhs = Expr::binary(BinaryOp::Or, lhs, rhs);
        input = rest;
    }
    Ok((input, lhs))
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut lhs) = comparison_expr(input)?;
    let mut depth = lhs.depth();
    while let Ok((rest, _)) = ws(keyword("AND"))(input) {
        let (rest, rhs) = comparison_expr(rest)?;
        depth = check_depth(rest, depth.max(rhs.depth()) + 1)?;
        lhs = Expr::binary(BinaryOp::And, lhs, rhs);
        input = rest;
    }
    Ok((input, lhs))
}

fn comparison_expr(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = additive_expr(input)?;
    let (input, op) = match ws(comparison_op)(input) {
        Ok(parsed) => parsed,
        Err(nom::Err::Error(_)) => return Ok((input, lhs)),
        Err(e) => return Err(e),
    };
    let (input, rhs) = match op {
        BinaryOp::EqRegex | BinaryOp::NotEqRegex => {
            ws(alt((map(regex_literal, Expr::RegexLit), additive_expr)))(input)?
        }
        _ => additive_expr(input)?,
    };
    bounded(input, Expr::binary(op, lhs, rhs))
}

fn comparison_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::EqRegex, tag("=~")),
        value(BinaryOp::NotEqRegex, tag("!~")),
        value(BinaryOp::NotEq, alt((tag("!="), tag("<>")))),
        value(BinaryOp::Lte, tag("<=")),
        value(BinaryOp::Gte, tag(">=")),
        value(BinaryOp::Eq, tag("=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
    ))(input)
}

fn additive_expr(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut lhs) = multiplicative_expr(input)?;
    let mut depth = lhs.depth();
    while let Ok((rest, op)) = ws(alt((
        value(BinaryOp::Add, char('+')),
        value(BinaryOp::Sub, char('-')),
    )))(input)
    {
        let (rest, rhs) = multiplicative_expr(rest)?;
        depth = check_depth(rest, depth.max(rhs.depth()) + 1)?;
        lhs = Expr::binary(op, lhs, rhs);
        input = rest;
    }
    Ok((input, lhs))
}

fn multiplicative_expr(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut lhs) = primary_expr(input)?;
    let mut depth = lhs.depth();
    while let Ok((rest, op)) = ws(alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, char('/')),
        value(BinaryOp::Mod, char('%')),
    )))(input)
    {
        let (rest, rhs) = primary_expr(rest)?;
        depth = check_depth(rest, depth.max(rhs.depth()) + 1)?;
        lhs = Expr::binary(op, lhs, rhs);
        input = rest;
    }
    Ok((input, lhs))
}

fn primary_expr(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        paren_expr,
        value(Expr::Wildcard, char('*')),
        map(string_literal, Expr::StringLit),
        number_or_duration,
        boolean_literal,
        call_expr,
        map(identifier, Expr::VarRef),
    )))(input)
}

fn paren_expr(input: &str) -> IResult<&str, Expr> {
    let (input, inner) = delimited(char('('), expr, ws(char(')')))(input)?;
    bounded(input, Expr::paren(inner))
}

fn boolean_literal(input: &str) -> IResult<&str, Expr> {
    alt((
        value(Expr::BooleanLit(true), keyword("true")),
        value(Expr::BooleanLit(false), keyword("false")),
    ))(input)
}

fn call_expr(input: &str) -> IResult<&str, Expr> {
    let (input, name) = bare_identifier(input)?;
    let (input, _) = ws(char('('))(input)?;
    let (input, args) = separated_list0(comma, expr)(input)?;
    let (input, _) = ws(char(')'))(input)?;
    bounded(
        input,
        Expr::Call {
            name: name.to_lowercase(),
            args,
        },
    )
}

/// Integer, float or duration literal such as `5`, `0.95`, `1h`, `1698163200000ms`
fn number_or_duration(input: &str) -> IResult<&str, Expr> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)?;
    let invalid = |kind| nom::Err::Error(NomError::new(input, kind));

    if text.contains('.') {
        let n = text.parse::<f64>().map_err(|_| invalid(ErrorKind::Float))?;
        return Ok((rest, Expr::NumberLit(n)));
    }

    let n = text.parse::<i64>().map_err(|_| invalid(ErrorKind::Digit))?;
    match duration_unit(rest) {
        Some((rest, unit_nanos)) => {
            let nanos = n
                .checked_mul(unit_nanos)
                .ok_or_else(|| invalid(ErrorKind::TooLarge))?;
            Ok((rest, Expr::DurationLit(Duration::nanoseconds(nanos))))
        }
        None => Ok((rest, Expr::IntegerLit(n))),
    }
}

fn duration_unit(input: &str) -> Option<(&str, i64)> {
    DURATION_UNITS.iter().find_map(|(suffix, nanos)| {
        let rest = input.strip_prefix(suffix)?;
        match rest.chars().next() {
            Some(c) if is_ident_char(c) => None,
            _ => Some((rest, *nanos)),
        }
    })
}
