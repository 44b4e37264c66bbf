use std::collections::HashMap;

use num_complex::Complex64;

use crate::syntax::{format_real, BinaryOperator, Expr};
use crate::EngineError;

pub type Bindings = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Real(f64),
  Complex(Complex64),
  Matrix(Vec<Vec<f64>>),
}

pub fn evaluate_expr(
  expr: &Expr,
  bindings: &Bindings,
) -> Result<Value, EngineError> {
  match expr {
    Expr::Integer(n) => Ok(Value::Real(*n as f64)),
    Expr::Real(v) => Ok(Value::Real(*v)),
    Expr::Imaginary(v) => Ok(Value::Complex(Complex64::new(0.0, *v))),
    Expr::Identifier(name) => lookup(name, bindings),
    Expr::UnaryMinus(operand) => {
      match evaluate_expr(operand, bindings)? {
        Value::Real(v) => Ok(Value::Real(-v)),
        Value::Complex(c) => Ok(Value::Complex(-c)),
        Value::Matrix(m) => Ok(Value::Matrix(
          m.iter().map(|row| row.iter().map(|v| -v).collect()).collect(),
        )),
      }
    }
    Expr::BinaryOp { op, left, right } => {
      let lhs = evaluate_expr(left, bindings)?;
      let rhs = evaluate_expr(right, bindings)?;
      apply_binary(*op, lhs, rhs)
    }
    Expr::FunctionCall { name, args } => {
      let values = args
        .iter()
        .map(|arg| evaluate_expr(arg, bindings))
        .collect::<Result<Vec<_>, _>>()?;
      apply_function(name, values)
    }
    Expr::Matrix(rows) => {
      let mut out = Vec::with_capacity(rows.len());
      let width = rows.first().map_or(0, Vec::len);
      for row in rows {
        if row.len() != width {
          return Err(EngineError::EvaluationError(
            "matrix rows must all have the same length".to_string(),
          ));
        }
        let mut cells = Vec::with_capacity(row.len());
        for cell in row {
          match evaluate_expr(cell, bindings)? {
            Value::Real(v) => cells.push(v),
            _ => {
              return Err(EngineError::EvaluationError(
                "matrix entries must be real numbers".to_string(),
              ))
            }
          }
        }
        out.push(cells);
      }
      Ok(Value::Matrix(out))
    }
  }
}

fn lookup(name: &str, bindings: &Bindings) -> Result<Value, EngineError> {
  if let Some(value) = bindings.get(name) {
    return Ok(value.clone());
  }
  match name {
    "pi" => Ok(Value::Real(std::f64::consts::PI)),
    "e" => Ok(Value::Real(std::f64::consts::E)),
    "i" => Ok(Value::Complex(Complex64::new(0.0, 1.0))),
    _ => Err(EngineError::EvaluationError(format!(
      "unknown symbol '{name}'"
    ))),
  }
}

fn apply_binary(
  op: BinaryOperator,
  lhs: Value,
  rhs: Value,
) -> Result<Value, EngineError> {
  use BinaryOperator::*;
  match (lhs, rhs) {
    (Value::Real(a), Value::Real(b)) => match op {
      Plus => Ok(Value::Real(a + b)),
      Minus => Ok(Value::Real(a - b)),
      Times => Ok(Value::Real(a * b)),
      Divide => Ok(Value::Real(a / b)),
      Power => {
        if a < 0.0 && b.fract() != 0.0 {
          // Negative base with a fractional exponent leaves the reals.
          Ok(collapse(Complex64::new(a, 0.0).powc(Complex64::new(b, 0.0))))
        } else {
          Ok(Value::Real(a.powf(b)))
        }
      }
    },
    (Value::Complex(a), Value::Complex(b)) => complex_binary(op, a, b),
    (Value::Real(a), Value::Complex(b)) => {
      complex_binary(op, Complex64::new(a, 0.0), b)
    }
    (Value::Complex(a), Value::Real(b)) => {
      complex_binary(op, a, Complex64::new(b, 0.0))
    }
    (Value::Matrix(a), Value::Matrix(b)) => matrix_binary(op, &a, &b),
    (Value::Matrix(m), Value::Real(s)) => matrix_scalar(op, &m, s, false),
    (Value::Real(s), Value::Matrix(m)) => matrix_scalar(op, &m, s, true),
    _ => Err(EngineError::EvaluationError(
      "unsupported operands for arithmetic".to_string(),
    )),
  }
}

fn complex_binary(
  op: BinaryOperator,
  a: Complex64,
  b: Complex64,
) -> Result<Value, EngineError> {
  use BinaryOperator::*;
  let result = match op {
    Plus => a + b,
    Minus => a - b,
    Times => a * b,
    Divide => a / b,
    Power => {
      // Integer exponents go through repeated multiplication so that
      // i^2 yields exactly -1, with no residue from exp/ln.
      if b.im == 0.0 && b.re.fract() == 0.0 && b.re.abs() <= 64.0 {
        a.powi(b.re as i32)
      } else {
        a.powc(b)
      }
    }
  };
  Ok(collapse(result))
}

/// Drop the imaginary part when a complex intermediate lands back on the
/// real axis, so `i^2` prints as `-1` rather than `-1 + 0i`.
fn collapse(c: Complex64) -> Value {
  if c.im == 0.0 {
    Value::Real(c.re)
  } else {
    Value::Complex(c)
  }
}

fn matrix_binary(
  op: BinaryOperator,
  a: &[Vec<f64>],
  b: &[Vec<f64>],
) -> Result<Value, EngineError> {
  match op {
    BinaryOperator::Plus | BinaryOperator::Minus => {
      if a.len() != b.len()
        || a.first().map_or(0, Vec::len) != b.first().map_or(0, Vec::len)
      {
        return Err(EngineError::EvaluationError(
          "matrix dimensions do not match".to_string(),
        ));
      }
      let sign = if op == BinaryOperator::Plus { 1.0 } else { -1.0 };
      let out = a
        .iter()
        .zip(b)
        .map(|(ra, rb)| {
          ra.iter().zip(rb).map(|(x, y)| x + sign * y).collect()
        })
        .collect();
      Ok(Value::Matrix(out))
    }
    BinaryOperator::Times => matmul(a, b),
    _ => Err(EngineError::EvaluationError(
      "unsupported matrix operation".to_string(),
    )),
  }
}

fn matrix_scalar(
  op: BinaryOperator,
  m: &[Vec<f64>],
  s: f64,
  scalar_first: bool,
) -> Result<Value, EngineError> {
  let map = |f: &dyn Fn(f64) -> f64| {
    Value::Matrix(
      m.iter()
        .map(|row| row.iter().map(|v| f(*v)).collect())
        .collect(),
    )
  };
  match op {
    BinaryOperator::Times => Ok(map(&|v| v * s)),
    BinaryOperator::Divide if !scalar_first => Ok(map(&|v| v / s)),
    _ => Err(EngineError::EvaluationError(
      "unsupported matrix-scalar operation".to_string(),
    )),
  }
}

fn matmul(a: &[Vec<f64>], b: &[Vec<f64>]) -> Result<Value, EngineError> {
  let inner = a.first().map_or(0, Vec::len);
  if inner != b.len() || inner == 0 {
    return Err(EngineError::EvaluationError(
      "matrix dimensions do not match for multiplication".to_string(),
    ));
  }
  let cols = b[0].len();
  let out = a
    .iter()
    .map(|row| {
      (0..cols)
        .map(|j| row.iter().zip(b).map(|(x, rb)| x * rb[j]).sum())
        .collect()
    })
    .collect();
  Ok(Value::Matrix(out))
}

fn apply_function(
  name: &str,
  values: Vec<Value>,
) -> Result<Value, EngineError> {
  match name {
    "diff" | "derivative" => Err(EngineError::EvaluationError(
      "symbolic differentiation is only available at the top level of a query"
        .to_string(),
    )),
    "integral" | "integrate" => Err(EngineError::EvaluationError(
      "symbolic integration is not available locally".to_string(),
    )),
    "sin" | "cos" | "tan" | "log" | "sqrt" | "exp" | "abs" => {
      let value = one_arg(name, values)?;
      real_or_complex_fn(name, value)
    }
    "re" | "im" | "arg" | "conj" => {
      let value = one_arg(name, values)?;
      complex_part(name, value)
    }
    "det" => {
      let m = one_matrix(name, values)?;
      Ok(Value::Real(determinant(&m)?))
    }
    "inv" => {
      let m = one_matrix(name, values)?;
      inverse(&m)
    }
    "transpose" => {
      let m = one_matrix(name, values)?;
      if m.is_empty() {
        return Ok(Value::Matrix(Vec::new()));
      }
      let rows = m.len();
      let cols = m[0].len();
      let out = (0..cols)
        .map(|j| (0..rows).map(|i| m[i][j]).collect())
        .collect();
      Ok(Value::Matrix(out))
    }
    "multiply" | "dot" => {
      let (a, b) = two_matrices(name, values)?;
      matmul(&a, &b)
    }
    _ => Err(EngineError::EvaluationError(format!(
      "unknown function '{name}'"
    ))),
  }
}

fn one_arg(name: &str, mut values: Vec<Value>) -> Result<Value, EngineError> {
  if values.len() != 1 {
    return Err(EngineError::EvaluationError(format!(
      "{name} expects exactly one argument"
    )));
  }
  Ok(values.remove(0))
}

fn one_matrix(
  name: &str,
  values: Vec<Value>,
) -> Result<Vec<Vec<f64>>, EngineError> {
  match one_arg(name, values)? {
    Value::Matrix(m) => Ok(m),
    _ => Err(EngineError::EvaluationError(format!(
      "{name} expects a matrix argument"
    ))),
  }
}

fn two_matrices(
  name: &str,
  mut values: Vec<Value>,
) -> Result<(Vec<Vec<f64>>, Vec<Vec<f64>>), EngineError> {
  if values.len() != 2 {
    return Err(EngineError::EvaluationError(format!(
      "{name} expects exactly two arguments"
    )));
  }
  let b = values.pop().unwrap();
  let a = values.pop().unwrap();
  match (a, b) {
    (Value::Matrix(a), Value::Matrix(b)) => Ok((a, b)),
    _ => Err(EngineError::EvaluationError(format!(
      "{name} expects matrix arguments"
    ))),
  }
}

fn real_or_complex_fn(name: &str, value: Value) -> Result<Value, EngineError> {
  match value {
    Value::Real(v) => match name {
      "sin" => Ok(Value::Real(v.sin())),
      "cos" => Ok(Value::Real(v.cos())),
      "tan" => Ok(Value::Real(v.tan())),
      "exp" => Ok(Value::Real(v.exp())),
      "abs" => Ok(Value::Real(v.abs())),
      "log" => {
        if v < 0.0 {
          Ok(collapse(Complex64::new(v, 0.0).ln()))
        } else {
          Ok(Value::Real(v.ln()))
        }
      }
      "sqrt" => {
        if v < 0.0 {
          // sqrt(-4) = 2i
          Ok(Value::Complex(Complex64::new(0.0, (-v).sqrt())))
        } else {
          Ok(Value::Real(v.sqrt()))
        }
      }
      _ => unreachable!(),
    },
    Value::Complex(c) => {
      let result = match name {
        "sin" => c.sin(),
        "cos" => c.cos(),
        "tan" => c.tan(),
        "exp" => c.exp(),
        "log" => c.ln(),
        "sqrt" => c.sqrt(),
        "abs" => return Ok(Value::Real(c.norm())),
        _ => unreachable!(),
      };
      Ok(collapse(result))
    }
    Value::Matrix(_) => Err(EngineError::EvaluationError(format!(
      "{name} does not accept a matrix argument"
    ))),
  }
}

fn complex_part(name: &str, value: Value) -> Result<Value, EngineError> {
  let c = match value {
    Value::Real(v) => Complex64::new(v, 0.0),
    Value::Complex(c) => c,
    Value::Matrix(_) => {
      return Err(EngineError::EvaluationError(format!(
        "{name} does not accept a matrix argument"
      )))
    }
  };
  match name {
    "re" => Ok(Value::Real(c.re)),
    "im" => Ok(Value::Real(c.im)),
    "arg" => Ok(Value::Real(c.arg())),
    "conj" => Ok(collapse(c.conj())),
    _ => unreachable!(),
  }
}

/// Determinant by cofactor expansion along the first row.
fn determinant(m: &[Vec<f64>]) -> Result<f64, EngineError> {
  let n = m.len();
  if n == 0 || m.iter().any(|row| row.len() != n) {
    return Err(EngineError::EvaluationError(
      "determinant requires a square matrix".to_string(),
    ));
  }
  Ok(det_inner(m))
}

fn det_inner(m: &[Vec<f64>]) -> f64 {
  let n = m.len();
  match n {
    1 => m[0][0],
    2 => m[0][0] * m[1][1] - m[0][1] * m[1][0],
    _ => {
      let mut sum = 0.0;
      for j in 0..n {
        let minor: Vec<Vec<f64>> = m[1..]
          .iter()
          .map(|row| {
            row
              .iter()
              .enumerate()
              .filter(|(k, _)| *k != j)
              .map(|(_, v)| *v)
              .collect()
          })
          .collect();
        let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
        sum += sign * m[0][j] * det_inner(&minor);
      }
      sum
    }
  }
}

/// Matrix inverse via the adjugate.
fn inverse(m: &[Vec<f64>]) -> Result<Value, EngineError> {
  let n = m.len();
  let d = determinant(m)?;
  if d == 0.0 {
    return Err(EngineError::EvaluationError(
      "matrix is singular".to_string(),
    ));
  }
  if n == 1 {
    return Ok(Value::Matrix(vec![vec![1.0 / d]]));
  }
  let mut out = vec![vec![0.0; n]; n];
  for i in 0..n {
    for j in 0..n {
      let minor: Vec<Vec<f64>> = m
        .iter()
        .enumerate()
        .filter(|(r, _)| *r != j)
        .map(|(_, row)| {
          row
            .iter()
            .enumerate()
            .filter(|(c, _)| *c != i)
            .map(|(_, v)| *v)
            .collect()
        })
        .collect();
      let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
      out[i][j] = sign * det_inner(&minor) / d;
    }
  }
  Ok(Value::Matrix(out))
}

pub fn format_value(value: &Value) -> String {
  match value {
    Value::Real(v) => format_real(*v),
    Value::Complex(c) => {
      if c.re == 0.0 {
        format!("{}i", format_real(c.im))
      } else if c.im < 0.0 {
        format!("{} - {}i", format_real(c.re), format_real(-c.im))
      } else {
        format!("{} + {}i", format_real(c.re), format_real(c.im))
      }
    }
    Value::Matrix(rows) => {
      let rendered: Vec<String> = rows
        .iter()
        .map(|row| {
          let cells: Vec<String> =
            row.iter().map(|v| format_real(*v)).collect();
          format!("[{}]", cells.join(", "))
        })
        .collect();
      format!("[{}]", rendered.join(", "))
    }
  }
}
