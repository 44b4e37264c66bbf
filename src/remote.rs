use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

#[derive(Debug, Clone)]
pub struct RemoteConfig {
  pub base_url: String,
  pub model: String,
  pub api_key: Option<String>,
}

impl RemoteConfig {
  pub fn new(base_url: impl Into<String>) -> Self {
    RemoteConfig {
      base_url: base_url.into(),
      model: DEFAULT_MODEL.to_string(),
      api_key: None,
    }
  }

  /// Build a config from `LEIBNIZ_SOLVER_URL`, `LEIBNIZ_SOLVER_MODEL`
  /// and `LEIBNIZ_API_KEY`. Returns `None` when no solver URL is set.
  pub fn from_env() -> Option<Self> {
    let base_url = std::env::var("LEIBNIZ_SOLVER_URL").ok()?;
    let model = std::env::var("LEIBNIZ_SOLVER_MODEL")
      .unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let api_key = std::env::var("LEIBNIZ_API_KEY").ok();
    Some(RemoteConfig {
      base_url,
      model,
      api_key,
    })
  }
}

/// Structured solver answer. The endpoint is contracted (via
/// `response_schema`) to reply with exactly this shape.
#[derive(Debug, Clone, Deserialize)]
pub struct SolveResponse {
  pub value: String,
  pub explanation: String,
  pub steps: Vec<String>,
  #[serde(default)]
  pub latex: Option<String>,
}

#[derive(Debug, Error)]
pub enum RemoteError {
  #[error(transparent)]
  Request(#[from] reqwest::Error),
  #[error("solver returned HTTP {status}: {text}")]
  Http {
    status: reqwest::StatusCode,
    text: String,
  },
  /// The endpoint answered 200 but the body did not match the schema.
  /// `raw` keeps the unparsed text so callers can still show something.
  #[error("solver response did not match the expected schema")]
  Schema { raw: String },
}

#[derive(Debug, Clone)]
pub struct InferenceClient {
  http: reqwest::Client,
  config: RemoteConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
  model: &'a str,
  prompt: String,
  response_schema: serde_json::Value,
}

impl InferenceClient {
  pub fn new(config: RemoteConfig) -> Self {
    InferenceClient {
      http: reqwest::Client::new(),
      config,
    }
  }

  pub fn model(&self) -> &str {
    &self.config.model
  }

  /// Ask the remote solver for a structured answer to `query`, framed
  /// as a problem in `category` (e.g. "calculus and ODEs").
  pub async fn solve(
    &self,
    query: &str,
    category: &str,
  ) -> Result<SolveResponse, RemoteError> {
    let body = GenerateRequest {
      model: &self.config.model,
      prompt: solve_prompt(query, category),
      response_schema: response_schema(),
    };
    let url = format!(
      "{}/v1/generate",
      self.config.base_url.trim_end_matches('/')
    );
    let mut request = self.http.post(&url).json(&body);
    if let Some(key) = &self.config.api_key {
      request = request.bearer_auth(key);
    }
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      return Err(RemoteError::Http { status, text });
    }
    let text = response.text().await?;
    serde_json::from_str(&text)
      .map_err(|_| RemoteError::Schema { raw: text })
  }
}

fn solve_prompt(query: &str, category: &str) -> String {
  format!(
    "Task: Solve the following {category} math problem.\n\
     Problem: {query}\n\
     Provide the final answer, a concise explanation, and the \
     intermediate steps. If it's an ODE, provide the general solution \
     and particular solution if initial conditions are given."
  )
}

fn response_schema() -> serde_json::Value {
  serde_json::json!({
    "type": "object",
    "properties": {
      "value": {
        "type": "string",
        "description": "The final answer or result"
      },
      "explanation": {
        "type": "string",
        "description": "A concise explanation of the method used"
      },
      "steps": {
        "type": "array",
        "items": { "type": "string" },
        "description": "Intermediate solution steps"
      },
      "latex": {
        "type": "string",
        "description": "LaTeX rendering of the result, if applicable"
      }
    },
    "required": ["value", "explanation", "steps"]
  })
}
