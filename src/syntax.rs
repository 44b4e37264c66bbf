use pest::iterators::Pair;

use crate::Rule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
  Plus,
  Minus,
  Times,
  Divide,
  Power,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Integer(i64),
  Real(f64),
  /// Imaginary literal such as `2i` (the coefficient of i).
  Imaginary(f64),
  Identifier(String),
  UnaryMinus(Box<Expr>),
  BinaryOp {
    op: BinaryOperator,
    left: Box<Expr>,
    right: Box<Expr>,
  },
  FunctionCall {
    name: String,
    args: Vec<Expr>,
  },
  Matrix(Vec<Vec<Expr>>),
}

/// Lower a pest pair into the expression AST. Shapes are guaranteed by
/// the grammar, so structural `unwrap`s here cannot fire on parsed input.
pub fn pair_to_expr(pair: Pair<Rule>) -> Expr {
  match pair.as_rule() {
    Rule::Program => {
      let inner = pair.into_inner().next().unwrap();
      pair_to_expr(inner)
    }
    Rule::Expression | Rule::Term => fold_binary(pair),
    Rule::Unary => {
      let mut negs = 0usize;
      let mut operand = None;
      for item in pair.into_inner() {
        match item.as_rule() {
          Rule::Neg => negs += 1,
          _ => operand = Some(pair_to_expr(item)),
        }
      }
      let mut expr = operand.unwrap();
      for _ in 0..negs {
        expr = Expr::UnaryMinus(Box::new(expr));
      }
      expr
    }
    Rule::Power => {
      // Grammar recursion already groups the exponent to the right, so
      // at most one `^` appears per Power pair.
      let mut inner = pair.into_inner();
      let base = pair_to_expr(inner.next().unwrap());
      match inner.next() {
        Some(exp) => Expr::BinaryOp {
          op: BinaryOperator::Power,
          left: Box::new(base),
          right: Box::new(pair_to_expr(exp)),
        },
        None => base,
      }
    }
    Rule::Primary => pair_to_expr(pair.into_inner().next().unwrap()),
    Rule::Number => {
      let text = pair.as_str();
      if text.contains('.') || text.contains('e') || text.contains('E') {
        Expr::Real(text.parse::<f64>().unwrap())
      } else {
        match text.parse::<i64>() {
          Ok(n) => Expr::Integer(n),
          Err(_) => Expr::Real(text.parse::<f64>().unwrap()),
        }
      }
    }
    Rule::Imaginary => {
      let text = pair.as_str().trim_end_matches('i');
      Expr::Imaginary(text.parse::<f64>().unwrap())
    }
    Rule::Identifier => Expr::Identifier(pair.as_str().to_string()),
    Rule::FunctionCall => {
      let mut inner = pair.into_inner();
      let name = inner.next().unwrap().as_str().to_string();
      let args = inner.map(pair_to_expr).collect();
      Expr::FunctionCall { name, args }
    }
    Rule::Matrix => {
      let rows = pair
        .into_inner()
        .map(|row| row.into_inner().map(pair_to_expr).collect())
        .collect();
      Expr::Matrix(rows)
    }
    other => unreachable!("unexpected rule in expression: {other:?}"),
  }
}

/// Fold a `lhs (op rhs)*` pair left-to-right.
fn fold_binary(pair: Pair<Rule>) -> Expr {
  let mut inner = pair.into_inner();
  let mut expr = pair_to_expr(inner.next().unwrap());
  while let Some(op_pair) = inner.next() {
    let op = match op_pair.as_str() {
      "+" => BinaryOperator::Plus,
      "-" => BinaryOperator::Minus,
      "*" => BinaryOperator::Times,
      "/" => BinaryOperator::Divide,
      other => unreachable!("unexpected operator: {other}"),
    };
    let rhs = pair_to_expr(inner.next().unwrap());
    expr = Expr::BinaryOp {
      op,
      left: Box::new(expr),
      right: Box::new(rhs),
    };
  }
  expr
}

fn precedence(op: BinaryOperator) -> u8 {
  match op {
    BinaryOperator::Plus | BinaryOperator::Minus => 1,
    BinaryOperator::Times | BinaryOperator::Divide => 2,
    BinaryOperator::Power => 4,
  }
}

fn op_symbol(op: BinaryOperator) -> &'static str {
  match op {
    BinaryOperator::Plus => " + ",
    BinaryOperator::Minus => " - ",
    BinaryOperator::Times => " * ",
    BinaryOperator::Divide => " / ",
    BinaryOperator::Power => "^",
  }
}

/// Render an expression back to infix notation, inserting parentheses
/// only where precedence demands them.
pub fn expr_to_string(expr: &Expr) -> String {
  match expr {
    Expr::Integer(n) => n.to_string(),
    Expr::Real(v) => format_real(*v),
    Expr::Imaginary(v) => format!("{}i", format_real(*v)),
    Expr::Identifier(name) => name.clone(),
    Expr::UnaryMinus(operand) => {
      let inner = expr_to_string(operand);
      if binds_looser_than(operand, 2) {
        format!("-({inner})")
      } else {
        format!("-{inner}")
      }
    }
    Expr::BinaryOp { op, left, right } => {
      let prec = precedence(*op);
      let left_str = wrap(left, prec, false, *op);
      let right_str = wrap(right, prec, true, *op);
      format!("{left_str}{}{right_str}", op_symbol(*op))
    }
    Expr::FunctionCall { name, args } => {
      let rendered: Vec<String> = args.iter().map(expr_to_string).collect();
      format!("{name}({})", rendered.join(", "))
    }
    Expr::Matrix(rows) => {
      let rendered: Vec<String> = rows
        .iter()
        .map(|row| {
          let cells: Vec<String> = row.iter().map(expr_to_string).collect();
          format!("[{}]", cells.join(", "))
        })
        .collect();
      format!("[{}]", rendered.join(", "))
    }
  }
}

fn binds_looser_than(expr: &Expr, prec: u8) -> bool {
  match expr {
    Expr::BinaryOp { op, .. } => precedence(*op) < prec,
    _ => false,
  }
}

fn wrap(
  child: &Expr,
  parent_prec: u8,
  is_right: bool,
  op: BinaryOperator,
) -> String {
  let rendered = expr_to_string(child);
  let child_prec = match child {
    Expr::BinaryOp { op, .. } => precedence(*op),
    Expr::UnaryMinus(_) => 3,
    _ => return rendered,
  };
  let non_assoc =
    matches!(op, BinaryOperator::Minus | BinaryOperator::Divide);
  let needs = if op == BinaryOperator::Power {
    // Power is right-associative: parenthesize any compound base.
    if is_right {
      child_prec < parent_prec
    } else {
      child_prec <= parent_prec
    }
  } else if is_right {
    child_prec < parent_prec || (child_prec == parent_prec && non_assoc)
  } else {
    child_prec < parent_prec
  };
  if needs {
    format!("({rendered})")
  } else {
    rendered
  }
}

/// Format a real number for display, dropping a trailing ".0" when the
/// value is a whole number.
pub fn format_real(v: f64) -> String {
  if v.fract() == 0.0 && v.abs() < 1e15 {
    format!("{}", v as i64)
  } else {
    format!("{v}")
  }
}
