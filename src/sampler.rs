use crate::backend::Backend;
use crate::eval::{Bindings, Value};

const DOMAIN_EPS: f64 = 1e-12;

/// One sampled x position with a value slot per plotted expression.
/// A `None` slot means that expression produced nothing usable there.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
  pub x: f64,
  pub vals: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParametricPoint {
  pub x: f64,
  pub y: f64,
  pub t: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarPoint {
  pub x: f64,
  pub y: f64,
  pub r: f64,
  pub theta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
  pub x: f64,
  pub y: f64,
  pub z: f64,
}

/// Dense (resolution+1)^2 grid of surface samples. Nodes where the
/// expression failed to evaluate stay `None`; successful evaluations
/// are kept even when non-finite, so the projector can decide how to
/// render them.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceGrid {
  resolution: usize,
  x_domain: (f64, f64),
  y_domain: (f64, f64),
  nodes: Vec<Option<GridPoint>>,
}

impl SurfaceGrid {
  pub fn resolution(&self) -> usize {
    self.resolution
  }

  pub fn x_domain(&self) -> (f64, f64) {
    self.x_domain
  }

  pub fn y_domain(&self) -> (f64, f64) {
    self.y_domain
  }

  /// Node at grid index (i, j). `None` for indices outside
  /// `0..=resolution` as well as for nodes that failed to evaluate.
  pub fn node(&self, i: usize, j: usize) -> Option<GridPoint> {
    let side = self.resolution + 1;
    if i >= side || j >= side {
      return None;
    }
    self.nodes.get(i * side + j).copied().flatten()
  }

  /// All successfully evaluated nodes, row-major.
  pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
    self.nodes.iter().flatten().copied()
  }
}

fn positions(domain: (f64, f64), steps: usize) -> Vec<f64> {
  let (min, max) = domain;
  if steps == 0 || (max - min).abs() < DOMAIN_EPS {
    // Degenerate domain: emit the single endpoint once.
    return vec![min];
  }
  let step = (max - min) / steps as f64;
  (0..=steps).map(|k| min + step * k as f64).collect()
}

fn eval_finite<B: Backend>(
  backend: &B,
  expr: &str,
  bindings: &Bindings,
) -> Option<f64> {
  backend
    .evaluate(expr, bindings)
    .ok()
    .filter(|v| v.is_finite())
}

/// Sample one or more expressions of `x` over a shared domain. An
/// expression that fails the upfront parse check contributes a
/// permanently empty column; a row is emitted only when at least one
/// expression produced a finite value there.
pub fn sample_1d<B: Backend>(
  backend: &B,
  exprs: &[&str],
  domain: (f64, f64),
  steps: usize,
) -> Vec<Row> {
  let usable: Vec<bool> = exprs
    .iter()
    .map(|expr| backend.check(expr).is_ok())
    .collect();
  let mut rows = Vec::new();
  let mut bindings = Bindings::new();
  for x in positions(domain, steps) {
    bindings.insert("x".to_string(), Value::Real(x));
    let vals: Vec<Option<f64>> = exprs
      .iter()
      .zip(&usable)
      .map(|(expr, ok)| {
        if *ok {
          eval_finite(backend, expr, &bindings)
        } else {
          None
        }
      })
      .collect();
    if vals.iter().any(Option::is_some) {
      rows.push(Row { x, vals });
    }
  }
  rows
}

/// Sample a parametric curve (x(t), y(t)). A point is kept only when
/// both coordinates come out finite.
pub fn sample_parametric<B: Backend>(
  backend: &B,
  x_expr: &str,
  y_expr: &str,
  domain: (f64, f64),
  steps: usize,
) -> Vec<ParametricPoint> {
  if backend.check(x_expr).is_err() || backend.check(y_expr).is_err() {
    return Vec::new();
  }
  let mut points = Vec::new();
  let mut bindings = Bindings::new();
  for t in positions(domain, steps) {
    bindings.insert("t".to_string(), Value::Real(t));
    let x = eval_finite(backend, x_expr, &bindings);
    let y = eval_finite(backend, y_expr, &bindings);
    if let (Some(x), Some(y)) = (x, y) {
      points.push(ParametricPoint { x, y, t });
    }
  }
  points
}

/// Sample a polar curve r(theta), converting to Cartesian coordinates.
pub fn sample_polar<B: Backend>(
  backend: &B,
  r_expr: &str,
  domain: (f64, f64),
  steps: usize,
) -> Vec<PolarPoint> {
  if backend.check(r_expr).is_err() {
    return Vec::new();
  }
  let mut points = Vec::new();
  let mut bindings = Bindings::new();
  for theta in positions(domain, steps) {
    bindings.insert("theta".to_string(), Value::Real(theta));
    if let Some(r) = eval_finite(backend, r_expr, &bindings) {
      points.push(PolarPoint {
        x: r * theta.cos(),
        y: r * theta.sin(),
        r,
        theta,
      });
    }
  }
  points
}

/// Sample z = f(x, y) over a rectangular domain into a dense grid.
/// Unlike the trace samplers, non-finite values are stored rather than
/// dropped so grid indices stay aligned.
pub fn sample_grid<B: Backend>(
  backend: &B,
  expr: &str,
  x_domain: (f64, f64),
  y_domain: (f64, f64),
  resolution: usize,
) -> SurfaceGrid {
  let resolution = resolution.max(1);
  let side = resolution + 1;
  let mut nodes = vec![None; side * side];
  if backend.check(expr).is_err() {
    return SurfaceGrid {
      resolution,
      x_domain,
      y_domain,
      nodes,
    };
  }
  let xs = grid_axis(x_domain, resolution);
  let ys = grid_axis(y_domain, resolution);
  let mut bindings = Bindings::new();
  for (i, &x) in xs.iter().enumerate() {
    bindings.insert("x".to_string(), Value::Real(x));
    for (j, &y) in ys.iter().enumerate() {
      bindings.insert("y".to_string(), Value::Real(y));
      if let Ok(z) = backend.evaluate(expr, &bindings) {
        nodes[i * side + j] = Some(GridPoint { x, y, z });
      }
    }
  }
  SurfaceGrid {
    resolution,
    x_domain,
    y_domain,
    nodes,
  }
}

fn grid_axis(domain: (f64, f64), resolution: usize) -> Vec<f64> {
  let (min, max) = domain;
  if (max - min).abs() < DOMAIN_EPS {
    return vec![min; resolution + 1];
  }
  let step = (max - min) / resolution as f64;
  (0..=resolution).map(|k| min + step * k as f64).collect()
}
