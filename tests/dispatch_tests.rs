use leibniz::backend::{Backend, LocalBackend};
use leibniz::dispatch::{
  attempt_local, Dispatcher, LocalAttempt, Method, RequestTracker,
  SolvePolicy,
};
use leibniz::eval::Bindings;
use leibniz::remote::{InferenceClient, RemoteConfig};
use leibniz::EngineError;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> InferenceClient {
  InferenceClient::new(RemoteConfig::new(server.uri()))
}

fn structured_answer() -> ResponseTemplate {
  ResponseTemplate::new(200).set_body_json(serde_json::json!({
    "value": "y = C * e^x",
    "explanation": "Separable first-order ODE",
    "steps": ["Separate variables", "Integrate both sides"],
    "latex": "y = Ce^{x}",
  }))
}

#[cfg(test)]
mod local_attempt_tests {
  use super::*;

  #[test]
  fn test_derivative_query_is_symbolic() {
    let backend = LocalBackend::new();
    let attempt = attempt_local(&backend, "diff(x^2, x)");
    assert_eq!(
      attempt,
      LocalAttempt::Derivative {
        value: "2 * x".to_string()
      }
    );
  }

  #[test]
  fn test_derivative_prefix_is_case_insensitive() {
    let backend = LocalBackend::new();
    let attempt = attempt_local(&backend, "Derivative(sin(x), x)");
    assert_eq!(
      attempt,
      LocalAttempt::Derivative {
        value: "cos(x)".to_string()
      }
    );
  }

  #[test]
  fn test_derivative_variable_defaults_to_x() {
    let backend = LocalBackend::new();
    let attempt = attempt_local(&backend, "diff(x^3)");
    assert_eq!(
      attempt,
      LocalAttempt::Derivative {
        value: "3 * x^2".to_string()
      }
    );
  }

  #[test]
  fn test_nested_commas_stay_with_the_target() {
    let backend = LocalBackend::new();
    // The split must happen at bracket depth zero, so the inner comma
    // of log(x) + sin(x) arguments is untouched; here the target
    // itself contains a bracketed comma.
    let attempt =
      attempt_local(&backend, "diff(x^2 + det([[1, 2], [3, 4]]), x)");
    assert_eq!(
      attempt,
      LocalAttempt::Derivative {
        value: "2 * x".to_string()
      }
    );
  }

  #[test]
  fn test_plain_expression_evaluates() {
    let backend = LocalBackend::new();
    let attempt = attempt_local(&backend, "1 + 2 * 3");
    assert_eq!(
      attempt,
      LocalAttempt::Evaluated {
        value: "7".to_string()
      }
    );
  }

  #[test]
  fn test_unsupported_input_is_unsolved() {
    let backend = LocalBackend::new();
    assert!(matches!(
      attempt_local(&backend, "solve y' = y"),
      LocalAttempt::Unsolved { .. }
    ));
    assert!(matches!(
      attempt_local(&backend, "diff(abs(x), x)"),
      LocalAttempt::Unsolved { .. }
    ));
  }
}

#[cfg(test)]
mod dispatcher_tests {
  use super::*;

  #[tokio::test]
  async fn test_derivative_short_circuits_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/generate"))
      .respond_with(structured_answer())
      .expect(0)
      .mount(&server)
      .await;

    let dispatcher =
      Dispatcher::new(LocalBackend::new(), client_for(&server));
    let result = dispatcher.resolve("diff(x^2, x)", "calculus").await;
    assert_eq!(result.value, "2 * x");
    assert_eq!(result.method, Method::Local);
    assert_eq!(result.steps.len(), 3);
  }

  #[tokio::test]
  async fn test_local_evaluation_short_circuits_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/generate"))
      .respond_with(structured_answer())
      .expect(0)
      .mount(&server)
      .await;

    let dispatcher =
      Dispatcher::new(LocalBackend::new(), client_for(&server));
    let result = dispatcher.resolve("2^10", "algebra").await;
    assert_eq!(result.value, "1024");
    assert_eq!(result.method, Method::Local);
    assert_eq!(result.explanation, "Evaluated locally.");
  }

  #[tokio::test]
  async fn test_symbolic_only_policy_defers_evaluations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/generate"))
      .respond_with(structured_answer())
      .expect(1)
      .mount(&server)
      .await;

    let dispatcher = Dispatcher::with_policy(
      LocalBackend::new(),
      client_for(&server),
      SolvePolicy::SymbolicOnly,
    );
    let result = dispatcher.resolve("2^10", "algebra").await;
    assert_eq!(result.method, Method::Remote);
    assert_eq!(result.value, "y = C * e^x");
  }

  #[tokio::test]
  async fn test_unsolved_query_falls_back_to_remote() {
    let server = MockServer::start().await;
    // The outbound body must carry both the user's expression and the
    // domain hint, not just the model name.
    Mock::given(method("POST"))
      .and(path("/v1/generate"))
      .and(body_string_contains("solve y' = y"))
      .and(body_string_contains("calculus and ODEs"))
      .respond_with(structured_answer())
      .expect(1)
      .mount(&server)
      .await;

    let dispatcher =
      Dispatcher::new(LocalBackend::new(), client_for(&server));
    let result =
      dispatcher.resolve("solve y' = y", "calculus and ODEs").await;
    assert_eq!(result.method, Method::Remote);
    assert_eq!(result.value, "y = C * e^x");
    assert_eq!(result.explanation, "Separable first-order ODE");
    assert_eq!(result.latex.as_deref(), Some("y = Ce^{x}"));
  }

  #[tokio::test]
  async fn test_unstructured_reply_surfaces_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/generate"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_string("The solution is y = Ce^x."),
      )
      .mount(&server)
      .await;

    let dispatcher =
      Dispatcher::new(LocalBackend::new(), client_for(&server));
    let result = dispatcher.resolve("solve y' = y", "calculus").await;
    assert_eq!(result.value, "The solution is y = Ce^x.");
    assert_eq!(
      result.explanation,
      "Error parsing structured response"
    );
    assert!(result.steps.is_empty());
    assert_eq!(result.method, Method::Remote);
  }

  #[tokio::test]
  async fn test_server_error_becomes_displayable_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/generate"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;

    let dispatcher =
      Dispatcher::new(LocalBackend::new(), client_for(&server));
    let result = dispatcher.resolve("solve y' = y", "calculus").await;
    assert_eq!(result.value, "error");
    assert!(result.explanation.contains("network connection"));
    assert_eq!(result.method, Method::Remote);
  }

  #[tokio::test]
  async fn test_stale_token_drops_the_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/v1/generate"))
      .respond_with(structured_answer())
      .mount(&server)
      .await;

    let dispatcher =
      Dispatcher::new(LocalBackend::new(), client_for(&server));
    let stale = dispatcher.tracker().begin();
    let current = dispatcher.tracker().begin();
    assert!(dispatcher
      .resolve_latest(&stale, "solve y' = y", "calculus")
      .await
      .is_none());
    assert!(dispatcher
      .resolve_latest(&current, "solve y' = y", "calculus")
      .await
      .is_some());
  }
}

#[cfg(test)]
mod tracker_tests {
  use super::*;

  #[test]
  fn test_only_the_newest_token_is_current() {
    let tracker = RequestTracker::new();
    let first = tracker.begin();
    assert!(tracker.is_current(&first));
    let second = tracker.begin();
    assert!(!tracker.is_current(&first));
    assert!(tracker.is_current(&second));
  }
}

/// A backend with canned answers, to pin down dispatcher routing
/// independently of the expression engine.
struct FixedBackend {
  derivative: Option<String>,
  evaluation: Option<String>,
}

impl Backend for FixedBackend {
  fn check(&self, _expr: &str) -> Result<(), EngineError> {
    Ok(())
  }

  fn evaluate(
    &self,
    _expr: &str,
    _bindings: &Bindings,
  ) -> Result<f64, EngineError> {
    Err(EngineError::EvaluationError("not numeric".to_string()))
  }

  fn evaluate_display(&self, _expr: &str) -> Result<String, EngineError> {
    self.evaluation.clone().ok_or_else(|| {
      EngineError::EvaluationError("cannot evaluate".to_string())
    })
  }

  fn derive(
    &self,
    _expr: &str,
    _variable: &str,
  ) -> Result<String, EngineError> {
    self.derivative.clone().ok_or_else(|| {
      EngineError::EvaluationError("cannot derive".to_string())
    })
  }
}

#[cfg(test)]
mod fake_backend_tests {
  use super::*;

  #[test]
  fn test_routing_uses_the_backend_seam() {
    let backend = FixedBackend {
      derivative: Some("anything".to_string()),
      evaluation: None,
    };
    assert_eq!(
      attempt_local(&backend, "diff(whatever, q)"),
      LocalAttempt::Derivative {
        value: "anything".to_string()
      }
    );
    assert!(matches!(
      attempt_local(&backend, "whatever"),
      LocalAttempt::Unsolved { .. }
    ));
  }
}
