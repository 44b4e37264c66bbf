use crate::eval::{format_value, Bindings, Value};
use crate::EngineError;

/// Evaluation surface consumed by the sampler and the dispatcher.
/// Production code uses [`LocalBackend`]; tests substitute fakes.
pub trait Backend {
  /// Cheap parse check, used to reject an expression before sampling.
  fn check(&self, expr: &str) -> Result<(), EngineError>;
  /// Evaluate to a real number under the given variable bindings.
  fn evaluate(
    &self,
    expr: &str,
    bindings: &Bindings,
  ) -> Result<f64, EngineError>;
  /// Evaluate without bindings and render the result for display.
  fn evaluate_display(&self, expr: &str) -> Result<String, EngineError>;
  /// Symbolic derivative, rendered to infix notation.
  fn derive(&self, expr: &str, variable: &str)
    -> Result<String, EngineError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalBackend;

impl LocalBackend {
  pub fn new() -> Self {
    LocalBackend
  }
}

impl Backend for LocalBackend {
  fn check(&self, expr: &str) -> Result<(), EngineError> {
    crate::parse_expression(expr).map(|_| ())
  }

  fn evaluate(
    &self,
    expr: &str,
    bindings: &Bindings,
  ) -> Result<f64, EngineError> {
    match crate::evaluate_with(expr, bindings)? {
      Value::Real(v) => Ok(v),
      Value::Complex(c) if c.im == 0.0 => Ok(c.re),
      other => Err(EngineError::EvaluationError(format!(
        "expected a real result, got {}",
        format_value(&other)
      ))),
    }
  }

  fn evaluate_display(&self, expr: &str) -> Result<String, EngineError> {
    let value = crate::evaluate(expr)?;
    Ok(format_value(&value))
  }

  fn derive(
    &self,
    expr: &str,
    variable: &str,
  ) -> Result<String, EngineError> {
    crate::derive(expr, variable)
  }
}
