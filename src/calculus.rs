use crate::syntax::{BinaryOperator, Expr};
use crate::EngineError;

/// Differentiate `expr` with respect to `variable`, returning an
/// unsimplified derivative tree. Callers usually pass the result
/// through [`simplify`].
pub fn differentiate(
  expr: &Expr,
  variable: &str,
) -> Result<Expr, EngineError> {
  // Subtrees that never mention the variable are constants, whatever
  // their shape. This keeps det([[1, 2], [3, 4]]) differentiable as
  // part of a larger expression.
  if !contains_variable(expr, variable) {
    return Ok(Expr::Integer(0));
  }
  match expr {
    // Constants were handled above, so an identifier reaching this
    // point is the variable itself.
    Expr::Integer(_) | Expr::Real(_) | Expr::Imaginary(_) => {
      Ok(Expr::Integer(0))
    }
    Expr::Identifier(_) => Ok(Expr::Integer(1)),
    Expr::UnaryMinus(operand) => Ok(Expr::UnaryMinus(Box::new(
      differentiate(operand, variable)?,
    ))),
    Expr::BinaryOp { op, left, right } => {
      diff_binary(*op, left, right, variable)
    }
    Expr::FunctionCall { name, args } => {
      diff_function(name, args, variable)
    }
    Expr::Matrix(_) => Err(EngineError::EvaluationError(
      "cannot differentiate a matrix expression".to_string(),
    )),
  }
}

fn diff_binary(
  op: BinaryOperator,
  left: &Expr,
  right: &Expr,
  variable: &str,
) -> Result<Expr, EngineError> {
  let dl = differentiate(left, variable)?;
  let dr = differentiate(right, variable)?;
  match op {
    BinaryOperator::Plus => Ok(binary(BinaryOperator::Plus, dl, dr)),
    BinaryOperator::Minus => Ok(binary(BinaryOperator::Minus, dl, dr)),
    BinaryOperator::Times => {
      // (fg)' = f'g + fg'
      Ok(binary(
        BinaryOperator::Plus,
        binary(BinaryOperator::Times, dl, right.clone()),
        binary(BinaryOperator::Times, left.clone(), dr),
      ))
    }
    BinaryOperator::Divide => {
      // (f/g)' = (f'g - fg') / g^2
      Ok(binary(
        BinaryOperator::Divide,
        binary(
          BinaryOperator::Minus,
          binary(BinaryOperator::Times, dl, right.clone()),
          binary(BinaryOperator::Times, left.clone(), dr),
        ),
        binary(BinaryOperator::Power, right.clone(), Expr::Integer(2)),
      ))
    }
    BinaryOperator::Power => diff_power(left, right, dl, dr),
  }
}

fn diff_power(
  base: &Expr,
  exponent: &Expr,
  db: Expr,
  de: Expr,
) -> Result<Expr, EngineError> {
  let base_const = is_constant(base);
  let exp_const = is_constant(exponent);
  if exp_const {
    // d/dx f^n = n * f^(n-1) * f'
    let reduced = match exponent {
      Expr::Integer(n) => Expr::Integer(n - 1),
      _ => binary(
        BinaryOperator::Minus,
        exponent.clone(),
        Expr::Integer(1),
      ),
    };
    return Ok(binary(
      BinaryOperator::Times,
      binary(
        BinaryOperator::Times,
        exponent.clone(),
        binary(BinaryOperator::Power, base.clone(), reduced),
      ),
      db,
    ));
  }
  let whole =
    binary(BinaryOperator::Power, base.clone(), exponent.clone());
  if matches!(base, Expr::Identifier(name) if name == "e") {
    // d/dx e^g = e^g * g'
    return Ok(binary(BinaryOperator::Times, whole, de));
  }
  if base_const {
    // d/dx a^g = a^g * log(a) * g'
    return Ok(binary(
      BinaryOperator::Times,
      binary(
        BinaryOperator::Times,
        whole,
        Expr::FunctionCall {
          name: "log".to_string(),
          args: vec![base.clone()],
        },
      ),
      de,
    ));
  }
  // General case: f^g * (g' * log(f) + g * f' / f)
  Ok(binary(
    BinaryOperator::Times,
    whole,
    binary(
      BinaryOperator::Plus,
      binary(
        BinaryOperator::Times,
        de,
        Expr::FunctionCall {
          name: "log".to_string(),
          args: vec![base.clone()],
        },
      ),
      binary(
        BinaryOperator::Divide,
        binary(BinaryOperator::Times, exponent.clone(), db),
        base.clone(),
      ),
    ),
  ))
}

fn diff_function(
  name: &str,
  args: &[Expr],
  variable: &str,
) -> Result<Expr, EngineError> {
  let inner = args.first().ok_or_else(|| {
    EngineError::EvaluationError(format!("{name} expects an argument"))
  })?;
  let di = differentiate(inner, variable)?;
  let call = |f: &str| Expr::FunctionCall {
    name: f.to_string(),
    args: vec![inner.clone()],
  };
  let outer = match name {
    "sin" => call("cos"),
    "cos" => Expr::UnaryMinus(Box::new(call("sin"))),
    "tan" => binary(
      BinaryOperator::Divide,
      Expr::Integer(1),
      binary(BinaryOperator::Power, call("cos"), Expr::Integer(2)),
    ),
    "log" => binary(
      BinaryOperator::Divide,
      Expr::Integer(1),
      inner.clone(),
    ),
    "sqrt" => binary(
      BinaryOperator::Divide,
      Expr::Integer(1),
      binary(
        BinaryOperator::Times,
        Expr::Integer(2),
        call("sqrt"),
      ),
    ),
    "exp" => call("exp"),
    _ => {
      return Err(EngineError::EvaluationError(format!(
        "no derivative rule for function '{name}'"
      )))
    }
  };
  Ok(binary(BinaryOperator::Times, outer, di))
}

fn contains_variable(expr: &Expr, variable: &str) -> bool {
  match expr {
    Expr::Integer(_) | Expr::Real(_) | Expr::Imaginary(_) => false,
    Expr::Identifier(name) => name == variable,
    Expr::UnaryMinus(operand) => contains_variable(operand, variable),
    Expr::BinaryOp { left, right, .. } => {
      contains_variable(left, variable)
        || contains_variable(right, variable)
    }
    Expr::FunctionCall { args, .. } => {
      args.iter().any(|arg| contains_variable(arg, variable))
    }
    Expr::Matrix(rows) => rows
      .iter()
      .any(|row| row.iter().any(|c| contains_variable(c, variable))),
  }
}

fn is_constant(expr: &Expr) -> bool {
  match expr {
    Expr::Integer(_) | Expr::Real(_) | Expr::Imaginary(_) => true,
    Expr::Identifier(name) => name == "pi" || name == "e",
    Expr::UnaryMinus(operand) => is_constant(operand),
    Expr::BinaryOp { left, right, .. } => {
      is_constant(left) && is_constant(right)
    }
    _ => false,
  }
}

fn binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
  Expr::BinaryOp {
    op,
    left: Box::new(left),
    right: Box::new(right),
  }
}

/// Bottom-up algebraic cleanup of derivative trees. Folds integer
/// arithmetic and removes identity operations so `diff(x^2, x)` prints
/// as `2 * x` instead of `2 * x^1 * 1`.
pub fn simplify(expr: Expr) -> Expr {
  match expr {
    Expr::UnaryMinus(operand) => match simplify(*operand) {
      Expr::Integer(0) => Expr::Integer(0),
      Expr::Integer(n) => Expr::Integer(-n),
      Expr::UnaryMinus(inner) => *inner,
      other => Expr::UnaryMinus(Box::new(other)),
    },
    Expr::BinaryOp { op, left, right } => {
      let left = simplify(*left);
      let right = simplify(*right);
      simplify_binary(op, left, right)
    }
    Expr::FunctionCall { name, args } => Expr::FunctionCall {
      name,
      args: args.into_iter().map(simplify).collect(),
    },
    Expr::Matrix(rows) => Expr::Matrix(
      rows
        .into_iter()
        .map(|row| row.into_iter().map(simplify).collect())
        .collect(),
    ),
    other => other,
  }
}

fn simplify_binary(op: BinaryOperator, left: Expr, right: Expr) -> Expr {
  use BinaryOperator::*;
  if let (Expr::Integer(a), Expr::Integer(b)) = (&left, &right) {
    // An overflowing fold keeps the tree as written.
    let folded = match op {
      Plus => a.checked_add(*b),
      Minus => a.checked_sub(*b),
      Times => a.checked_mul(*b),
      Power if (0..=8).contains(b) => a.checked_pow(*b as u32),
      _ => None,
    };
    if let Some(n) = folded {
      return Expr::Integer(n);
    }
  }
  match (op, &left, &right) {
    (Plus, Expr::Integer(0), _) => right,
    (Plus, _, Expr::Integer(0)) => left,
    (Minus, _, Expr::Integer(0)) => left,
    (Minus, Expr::Integer(0), _) => Expr::UnaryMinus(Box::new(right)),
    (Times, Expr::Integer(0), _) | (Times, _, Expr::Integer(0)) => {
      Expr::Integer(0)
    }
    (Times, Expr::Integer(1), _) => right,
    (Times, _, Expr::Integer(1)) => left,
    (Divide, _, Expr::Integer(1)) => left,
    (Divide, Expr::Integer(0), _) => Expr::Integer(0),
    (Power, _, Expr::Integer(1)) => left,
    (Power, _, Expr::Integer(0)) => Expr::Integer(1),
    (Power, Expr::Integer(1), _) => Expr::Integer(1),
    _ => Expr::BinaryOp {
      op,
      left: Box::new(left),
      right: Box::new(right),
    },
  }
}
