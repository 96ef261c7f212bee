//! Attribute filter expressions.
//!
//! A small SQL-like language over layer attributes:
//!
//! ```text
//! lanes >= 2 AND (name LIKE 'A%' OR ref IS NOT NULL) AND NOT kind IN ('track', 'path')
//! ```
//!
//! Expressions are parsed into a [`FilterExpression`] tree and rendered back to SQL
//! where every literal becomes a bound parameter. Identifiers are looked up among the
//! layer's attributes; anything else is rejected. Parentheses and `NOT` may be nested
//! at most [`MAX_NESTING_DEPTH`] levels deep.

use anyhow::{Result, anyhow, bail};
use nom::{
	IResult, Parser,
	branch::alt,
	bytes::complete::{tag, tag_no_case, take_while, take_while1},
	character::complete::{char, digit1, multispace0, none_of, one_of, satisfy},
	combinator::{all_consuming, cut, map_res, not, opt, peek, recognize, value},
	error::context,
	multi::{many0, separated_list1},
	sequence::{delimited, pair, preceded, terminated},
};
use nom_language::error::{VerboseError, VerboseErrorKind, convert_error};
use rusqlite::types::Value;

type ParseResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

pub const MAX_NESTING_DEPTH: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
	Integer(i64),
	Real(f64),
	Text(String),
	Boolean(bool),
}

impl Literal {
	fn to_value(&self) -> Value {
		match self {
			Literal::Integer(v) => Value::Integer(*v),
			Literal::Real(v) => Value::Real(*v),
			Literal::Text(v) => Value::Text(v.clone()),
			Literal::Boolean(v) => Value::Integer(i64::from(*v)),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
	Equal,
	NotEqual,
	Less,
	LessOrEqual,
	Greater,
	GreaterOrEqual,
}

impl CompareOp {
	fn as_sql(self) -> &'static str {
		match self {
			CompareOp::Equal => "=",
			CompareOp::NotEqual => "<>",
			CompareOp::Less => "<",
			CompareOp::LessOrEqual => "<=",
			CompareOp::Greater => ">",
			CompareOp::GreaterOrEqual => ">=",
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterExpression {
	/// Two or more terms.
	And(Vec<FilterExpression>),
	/// Two or more terms.
	Or(Vec<FilterExpression>),
	Not(Box<FilterExpression>),
	Compare {
		attribute: String,
		op: CompareOp,
		value: Literal,
	},
	In {
		attribute: String,
		values: Vec<Literal>,
		negated: bool,
	},
	Like {
		attribute: String,
		pattern: String,
		negated: bool,
	},
	IsNull {
		attribute: String,
		negated: bool,
	},
}

impl FilterExpression {
	/// Attribute names referenced anywhere in the expression.
	pub fn attributes(&self) -> Vec<&str> {
		let mut names = Vec::new();
		self.collect_attributes(&mut names);
		names
	}

	fn collect_attributes<'a>(&'a self, names: &mut Vec<&'a str>) {
		use FilterExpression::*;
		match self {
			And(terms) | Or(terms) => {
				for term in terms {
					term.collect_attributes(names);
				}
			}
			Not(e) => e.collect_attributes(names),
			Compare { attribute, .. } | In { attribute, .. } | Like { attribute, .. } | IsNull { attribute, .. } => {
				names.push(attribute);
			}
		}
	}

	/// Appends the SQL form to `sql` and the literals to `parameters`.
	///
	/// `resolve` maps an attribute name to its SQL expression.
	pub fn render<F>(&self, resolve: &F, sql: &mut String, parameters: &mut Vec<Value>) -> Result<()>
	where
		F: Fn(&str) -> Option<String>,
	{
		use FilterExpression::*;
		let column = |attribute: &str| -> Result<String> {
			resolve(attribute).ok_or_else(|| anyhow!("unknown attribute '{attribute}'"))
		};
		match self {
			And(terms) | Or(terms) => {
				let connective = if matches!(self, And(..)) { " AND " } else { " OR " };
				sql.push('(');
				for (index, term) in terms.iter().enumerate() {
					if index > 0 {
						sql.push_str(connective);
					}
					term.render(resolve, sql, parameters)?;
				}
				sql.push(')');
			}
			Not(e) => {
				sql.push_str("NOT (");
				e.render(resolve, sql, parameters)?;
				sql.push(')');
			}
			Compare { attribute, op, value } => {
				sql.push_str(&format!("{} {} ?", column(attribute)?, op.as_sql()));
				parameters.push(value.to_value());
			}
			In {
				attribute,
				values,
				negated,
			} => {
				let placeholders = vec!["?"; values.len()].join(", ");
				let not = if *negated { "NOT " } else { "" };
				sql.push_str(&format!("{} {not}IN ({placeholders})", column(attribute)?));
				parameters.extend(values.iter().map(Literal::to_value));
			}
			Like {
				attribute,
				pattern,
				negated,
			} => {
				let not = if *negated { "NOT " } else { "" };
				sql.push_str(&format!("{} {not}LIKE ?", column(attribute)?));
				parameters.push(Value::Text(pattern.clone()));
			}
			IsNull { attribute, negated } => {
				let not = if *negated { "NOT " } else { "" };
				sql.push_str(&format!("{} IS {not}NULL", column(attribute)?));
			}
		}
		Ok(())
	}
}

fn ws0(input: &str) -> ParseResult<'_, ()> {
	value((), multispace0).parse(input)
}

/// Case-insensitive keyword that is not the prefix of a longer identifier.
fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = VerboseError<&'a str>> {
	terminated(
		tag_no_case(word),
		not(peek(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_'))),
	)
}

fn parse_identifier(input: &str) -> ParseResult<'_, String> {
	context(
		"parsing identifier",
		alt((
			delimited(char('"'), take_while1(|c: char| c != '"'), cut(char('"'))),
			recognize(pair(
				take_while1(|c: char| c.is_ascii_alphabetic() || c == '_'),
				take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
			)),
		)),
	)
	.parse(input)
	.map(|(rest, name)| (rest, name.to_string()))
}

fn parse_string(input: &str) -> ParseResult<'_, String> {
	context(
		"parsing string",
		delimited(
			char('\''),
			many0(alt((value('\'', tag("''")), none_of("'")))),
			cut(char('\'')),
		),
	)
	.parse(input)
	.map(|(rest, chars)| (rest, chars.into_iter().collect()))
}

fn parse_number(input: &str) -> ParseResult<'_, Literal> {
	context(
		"parsing number",
		map_res(
			recognize((
				opt(char('-')),
				digit1,
				opt((char('.'), digit1)),
				opt((one_of("eE"), opt(one_of("+-")), digit1)),
			)),
			|text: &str| match text.parse::<i64>() {
				Ok(v) => Ok(Literal::Integer(v)),
				Err(_) => text.parse::<f64>().map(Literal::Real),
			},
		),
	)
	.parse(input)
}

fn parse_literal(input: &str) -> ParseResult<'_, Literal> {
	context(
		"parsing literal",
		alt((
			parse_string.map(Literal::Text),
			parse_number,
			value(Literal::Boolean(true), keyword("true")),
			value(Literal::Boolean(false), keyword("false")),
		)),
	)
	.parse(input)
}

fn parse_operator(input: &str) -> ParseResult<'_, CompareOp> {
	context(
		"parsing comparison operator",
		alt((
			value(CompareOp::LessOrEqual, tag("<=")),
			value(CompareOp::GreaterOrEqual, tag(">=")),
			value(CompareOp::NotEqual, tag("<>")),
			value(CompareOp::NotEqual, tag("!=")),
			value(CompareOp::Equal, tag("==")),
			value(CompareOp::Equal, tag("=")),
			value(CompareOp::Less, tag("<")),
			value(CompareOp::Greater, tag(">")),
		)),
	)
	.parse(input)
}

fn parse_list(input: &str) -> ParseResult<'_, Vec<Literal>> {
	context(
		"parsing list",
		delimited(
			(char('('), ws0),
			separated_list1((ws0, char(','), ws0), parse_literal),
			(ws0, cut(char(')'))),
		),
	)
	.parse(input)
}

fn negation(input: &str) -> ParseResult<'_, bool> {
	opt(terminated(keyword("not"), ws0)).map(|not| not.is_some()).parse(input)
}

enum Condition {
	IsNull(bool),
	In(bool, Vec<Literal>),
	Like(bool, String),
	Compare(CompareOp, Literal),
}

fn parse_predicate(input: &str) -> ParseResult<'_, FilterExpression> {
	let (input, attribute) = parse_identifier(input)?;
	let (input, _) = ws0(input)?;
	let (input, condition) = context(
		"parsing condition",
		cut(alt((
			(keyword("is"), ws0, negation, keyword("null")).map(|(_, _, negated, _)| Condition::IsNull(negated)),
			(negation, keyword("in"), ws0, parse_list).map(|(negated, _, _, values)| Condition::In(negated, values)),
			(negation, keyword("like"), ws0, parse_string).map(|(negated, _, _, pattern)| Condition::Like(negated, pattern)),
			(parse_operator, ws0, parse_literal).map(|(op, _, literal)| Condition::Compare(op, literal)),
		))),
	)
	.parse(input)?;

	let expression = match condition {
		Condition::IsNull(negated) => FilterExpression::IsNull { attribute, negated },
		Condition::In(negated, values) => FilterExpression::In {
			attribute,
			values,
			negated,
		},
		Condition::Like(negated, pattern) => FilterExpression::Like {
			attribute,
			pattern,
			negated,
		},
		Condition::Compare(op, value) => FilterExpression::Compare { attribute, op, value },
	};
	Ok((input, expression))
}

/// Depth for the next nesting level, or a failure once the limit is reached.
fn nest(input: &str, depth: usize) -> Result<usize, nom::Err<VerboseError<&str>>> {
	if depth >= MAX_NESTING_DEPTH {
		return Err(nom::Err::Failure(VerboseError {
			errors: vec![(input, VerboseErrorKind::Context("nesting too deep"))],
		}));
	}
	Ok(depth + 1)
}

fn parse_primary<'a>(input: &'a str, depth: usize) -> ParseResult<'a, FilterExpression> {
	let (rest, open) = opt((char('('), ws0)).parse(input)?;
	if open.is_none() {
		return parse_predicate(input);
	}
	let depth = nest(input, depth)?;
	let (rest, expression) = cut(|i: &'a str| parse_or(i, depth)).parse(rest)?;
	let (rest, _) = (ws0, cut(char(')'))).parse(rest)?;
	Ok((rest, expression))
}

fn parse_unary<'a>(input: &'a str, depth: usize) -> ParseResult<'a, FilterExpression> {
	let (rest, not) = opt((keyword("not"), ws0)).parse(input)?;
	if not.is_none() {
		return parse_primary(input, depth);
	}
	let depth = nest(input, depth)?;
	let (rest, expression) = cut(|i: &'a str| parse_unary(i, depth)).parse(rest)?;
	Ok((rest, FilterExpression::Not(Box::new(expression))))
}

/// Flattens a chain of equal connectives into one n-ary node.
fn chain(first: FilterExpression, rest: Vec<FilterExpression>, node: fn(Vec<FilterExpression>) -> FilterExpression) -> FilterExpression {
	if rest.is_empty() {
		return first;
	}
	let mut terms = Vec::with_capacity(rest.len() + 1);
	terms.push(first);
	terms.extend(rest);
	node(terms)
}

fn parse_and<'a>(input: &'a str, depth: usize) -> ParseResult<'a, FilterExpression> {
	let (input, first) = parse_unary(input, depth)?;
	let (input, rest) =
		many0(preceded((ws0, keyword("and"), ws0), cut(|i: &'a str| parse_unary(i, depth)))).parse(input)?;
	Ok((input, chain(first, rest, FilterExpression::And)))
}

fn parse_or<'a>(input: &'a str, depth: usize) -> ParseResult<'a, FilterExpression> {
	let (input, first) = parse_and(input, depth)?;
	let (input, rest) =
		many0(preceded((ws0, keyword("or"), ws0), cut(|i: &'a str| parse_and(i, depth)))).parse(input)?;
	Ok((input, chain(first, rest, FilterExpression::Or)))
}

/// Parses a complete filter expression.
pub fn parse_filter(input: &str) -> Result<FilterExpression> {
	if input.trim().is_empty() {
		bail!("filter expression is empty");
	}
	match all_consuming(delimited(ws0, |i| parse_or(i, 0), ws0)).parse(input) {
		Ok((_, expression)) => Ok(expression),
		Err(nom::Err::Error(e) | nom::Err::Failure(e)) => Err(anyhow!(convert_error(input, e))),
		Err(e) => Err(anyhow!("error parsing filter expression: {e:?}")),
	}
}
