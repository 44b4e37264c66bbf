use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::Backend;
use crate::remote::{InferenceClient, RemoteError};

/// Where a result came from. Terminal failures are tagged `Remote`
/// since the remote call is always the last resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Local,
  Remote,
}

#[derive(Debug, Clone)]
pub struct SolveResult {
  pub value: String,
  pub explanation: String,
  pub steps: Vec<String>,
  pub latex: Option<String>,
  pub method: Method,
}

/// Outcome of trying to answer a query without the network.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalAttempt {
  /// The query was a derivative request and the symbolic engine
  /// produced an answer.
  Derivative { value: String },
  /// The query evaluated to a concrete value.
  Evaluated { value: String },
  /// Local resolution failed; `reason` explains why.
  Unsolved { reason: String },
}

/// Controls which local outcomes short-circuit the remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolvePolicy {
  /// Any successful local result is returned directly.
  #[default]
  PreferLocal,
  /// Only symbolic derivatives count as local answers; plain numeric
  /// evaluations are still sent to the solver for worked steps.
  SymbolicOnly,
}

/// Monotonic counter handing out request tokens. A token is current
/// until the next `begin` call, which lets callers drop answers to
/// queries the user has already replaced.
#[derive(Debug, Default)]
pub struct RequestTracker {
  generation: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken {
  id: u64,
}

impl RequestTracker {
  pub fn new() -> Self {
    RequestTracker {
      generation: AtomicU64::new(0),
    }
  }

  pub fn begin(&self) -> RequestToken {
    let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    RequestToken { id }
  }

  pub fn is_current(&self, token: &RequestToken) -> bool {
    self.generation.load(Ordering::SeqCst) == token.id
  }
}

/// Try to answer `expr` locally. Derivative queries of the form
/// `diff(f, x)` or `derivative(f, x)` go through the symbolic engine;
/// anything else is evaluated numerically.
pub fn attempt_local<B: Backend>(backend: &B, expr: &str) -> LocalAttempt {
  let trimmed = expr.trim();
  if let Some((target, variable)) = parse_derivative_query(trimmed) {
    return match backend.derive(&target, &variable) {
      Ok(value) => LocalAttempt::Derivative { value },
      Err(err) => LocalAttempt::Unsolved {
        reason: err.to_string(),
      },
    };
  }
  match backend.evaluate_display(trimmed) {
    Ok(value) => LocalAttempt::Evaluated { value },
    Err(err) => LocalAttempt::Unsolved {
      reason: err.to_string(),
    },
  }
}

/// Recognize `diff(inner)` / `derivative(inner)` and split the inner
/// argument list. Returns the target expression and the variable
/// (defaulting to `x`).
fn parse_derivative_query(input: &str) -> Option<(String, String)> {
  let lower = input.to_ascii_lowercase();
  let prefix_len = if lower.starts_with("diff(") {
    5
  } else if lower.starts_with("derivative(") {
    11
  } else {
    return None;
  };
  if !input.ends_with(')') {
    return None;
  }
  let inner = &input[prefix_len..input.len() - 1];
  let args = split_call_args(inner);
  let target = args.first()?.trim().to_string();
  if target.is_empty() {
    return None;
  }
  let variable = args
    .get(1)
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| "x".to_string());
  Some((target, variable))
}

/// Split on commas at bracket depth zero, so `diff(f(x, 2), x)` keeps
/// the nested call intact.
fn split_call_args(input: &str) -> Vec<String> {
  let mut args = Vec::new();
  let mut depth = 0i32;
  let mut current = String::new();
  for c in input.chars() {
    match c {
      '(' | '[' => {
        depth += 1;
        current.push(c);
      }
      ')' | ']' => {
        depth -= 1;
        current.push(c);
      }
      ',' if depth == 0 => {
        args.push(std::mem::take(&mut current));
      }
      _ => current.push(c),
    }
  }
  if !current.is_empty() {
    args.push(current);
  }
  args
}

pub struct Dispatcher<B: Backend> {
  backend: B,
  client: InferenceClient,
  tracker: RequestTracker,
  policy: SolvePolicy,
}

impl<B: Backend> Dispatcher<B> {
  pub fn new(backend: B, client: InferenceClient) -> Self {
    Self::with_policy(backend, client, SolvePolicy::default())
  }

  pub fn with_policy(
    backend: B,
    client: InferenceClient,
    policy: SolvePolicy,
  ) -> Self {
    Dispatcher {
      backend,
      client,
      tracker: RequestTracker::new(),
      policy,
    }
  }

  pub fn tracker(&self) -> &RequestTracker {
    &self.tracker
  }

  /// Resolve a query: local first, remote as fallback. Never returns
  /// an error; failures become a `SolveResult` the caller can display.
  pub async fn resolve(
    &self,
    expr: &str,
    domain_hint: &str,
  ) -> SolveResult {
    match attempt_local(&self.backend, expr) {
      LocalAttempt::Derivative { value } => {
        return SolveResult {
          value,
          explanation:
            "Computed locally using symbolic differentiation engine."
              .to_string(),
          steps: vec![
            "Parse the input expression".to_string(),
            "Apply symbolic differentiation rules (chain/product rules)"
              .to_string(),
            "Simplify and format the result".to_string(),
          ],
          latex: None,
          method: Method::Local,
        };
      }
      LocalAttempt::Evaluated { value }
        if self.policy == SolvePolicy::PreferLocal =>
      {
        return SolveResult {
          value,
          explanation: "Evaluated locally.".to_string(),
          steps: Vec::new(),
          latex: None,
          method: Method::Local,
        };
      }
      LocalAttempt::Evaluated { .. } => {
        tracing::debug!(
          expr,
          "local evaluation succeeded, deferring to solver for steps"
        );
      }
      LocalAttempt::Unsolved { reason } => {
        tracing::debug!(expr, %reason, "local resolution failed");
      }
    }
    match self.client.solve(expr, domain_hint).await {
      Ok(answer) => SolveResult {
        value: answer.value,
        explanation: answer.explanation,
        steps: answer.steps,
        latex: answer.latex,
        method: Method::Remote,
      },
      Err(RemoteError::Schema { raw }) => SolveResult {
        value: raw,
        explanation: "Error parsing structured response".to_string(),
        steps: Vec::new(),
        latex: None,
        method: Method::Remote,
      },
      Err(err) => {
        tracing::warn!(error = %err, "remote solve failed");
        SolveResult {
          value: "error".to_string(),
          explanation:
            "Solve failed: check the network connection or the \
             expression syntax."
              .to_string(),
          steps: Vec::new(),
          latex: None,
          method: Method::Remote,
        }
      }
    }
  }

  /// Like [`resolve`](Self::resolve), but drops the answer when the
  /// token has been superseded by a newer `begin` call.
  pub async fn resolve_latest(
    &self,
    token: &RequestToken,
    expr: &str,
    domain_hint: &str,
  ) -> Option<SolveResult> {
    let result = self.resolve(expr, domain_hint).await;
    if self.tracker.is_current(token) {
      Some(result)
    } else {
      tracing::debug!(expr, "dropping result for superseded request");
      None
    }
  }
}
