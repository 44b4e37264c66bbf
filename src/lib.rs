use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

pub mod backend;
pub mod calculus;
pub mod dispatch;
pub mod eval;
pub mod project;
pub mod remote;
pub mod sampler;
pub mod syntax;

#[derive(Parser)]
#[grammar = "leibniz.pest"]
pub struct MathParser;

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("Parse error: {0}")]
  ParseError(#[from] Box<pest::error::Error<Rule>>),
  #[error("Empty input")]
  EmptyInput,
  #[error("Evaluation error: {0}")]
  EvaluationError(String),
}

impl MathParser {
  pub fn parse_program(
    input: &str,
  ) -> Result<pest::iterators::Pairs<'_, Rule>, Box<pest::error::Error<Rule>>>
  {
    Self::parse(Rule::Program, input).map_err(Box::new)
  }
}

pub fn parse(
  input: &str,
) -> Result<pest::iterators::Pairs<'_, Rule>, Box<pest::error::Error<Rule>>> {
  MathParser::parse_program(input)
}

/// Parse an expression string into its AST.
pub fn parse_expression(input: &str) -> Result<syntax::Expr, EngineError> {
  let mut pairs = parse(input.trim())?;
  let program = pairs.next().ok_or(EngineError::EmptyInput)?;
  Ok(syntax::pair_to_expr(program))
}

/// Evaluate an expression with no variable bindings.
pub fn evaluate(input: &str) -> Result<eval::Value, EngineError> {
  evaluate_with(input, &eval::Bindings::new())
}

/// Evaluate an expression with the given variable bindings.
pub fn evaluate_with(
  input: &str,
  bindings: &eval::Bindings,
) -> Result<eval::Value, EngineError> {
  let expr = parse_expression(input)?;
  eval::evaluate_expr(&expr, bindings)
}

/// Symbolically differentiate an expression with respect to a variable,
/// returning the simplified derivative in infix notation.
pub fn derive(input: &str, variable: &str) -> Result<String, EngineError> {
  let expr = parse_expression(input)?;
  let d = calculus::differentiate(&expr, variable)?;
  Ok(syntax::expr_to_string(&calculus::simplify(d)))
}

pub use eval::{format_value, Bindings, Value};
pub use syntax::Expr;
