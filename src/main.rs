use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use leibniz::backend::LocalBackend;
use leibniz::dispatch::{Dispatcher, Method};
use leibniz::project::{project, Viewport};
use leibniz::remote::{InferenceClient, RemoteConfig};
use leibniz::sampler::sample_grid;
use leibniz::{evaluate_with, format_value, Bindings};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Evaluate a math expression locally
  Eval {
    /// The expression to evaluate
    expression: String,
  },
  /// Differentiate an expression symbolically
  Diff {
    /// The expression to differentiate
    expression: String,
    /// The variable to differentiate with respect to
    #[arg(default_value = "x")]
    variable: String,
  },
  /// Solve a problem, falling back to the remote solver when the
  /// local engine cannot answer
  Solve {
    /// The expression or problem statement
    expression: String,
    /// Problem category forwarded to the solver
    #[arg(long, default_value = "calculus and ODEs")]
    domain: String,
  },
  /// Evaluate a matrix operation with matrices bound to A and B
  Matrix {
    /// The operation, e.g. "multiply(A, B)" or "det(A)"
    operation: String,
    /// Matrix literal bound to A, e.g. "[[1, 2], [3, 4]]"
    #[arg(long)]
    a: String,
    /// Matrix literal bound to B
    #[arg(long)]
    b: Option<String>,
  },
  /// Sample and project a surface z = f(x, y)
  Surface {
    /// The expression in x and y
    expression: String,
    #[arg(long, default_value_t = -10.0, allow_hyphen_values = true)]
    min: f64,
    #[arg(long, default_value_t = 10.0, allow_hyphen_values = true)]
    max: f64,
    #[arg(long, default_value_t = 40)]
    resolution: usize,
    #[arg(long, default_value_t = 45.0, allow_hyphen_values = true)]
    rot_x: f64,
    #[arg(long, default_value_t = 30.0, allow_hyphen_values = true)]
    rot_y: f64,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let cli = Cli::parse();

  match cli.command {
    Commands::Eval { expression } => {
      let value = leibniz::evaluate(&expression)?;
      println!("{}", format_value(&value));
    }
    Commands::Diff {
      expression,
      variable,
    } => {
      let result = leibniz::derive(&expression, &variable)?;
      println!("{result}");
    }
    Commands::Solve { expression, domain } => {
      let config = RemoteConfig::from_env().context(
        "LEIBNIZ_SOLVER_URL is not set; the remote solver is required \
         for queries the local engine cannot answer",
      )?;
      let client = InferenceClient::new(config);
      let dispatcher = Dispatcher::new(LocalBackend::new(), client);
      let result = dispatcher.resolve(&expression, &domain).await;
      println!("{}", result.value);
      if !result.explanation.is_empty() {
        println!("\n{}", result.explanation);
      }
      for (n, step) in result.steps.iter().enumerate() {
        println!("{}. {step}", n + 1);
      }
      if let Some(latex) = &result.latex {
        println!("\nLaTeX: {latex}");
      }
      let tag = match result.method {
        Method::Local => "local",
        Method::Remote => "remote",
      };
      println!("\n[{tag}]");
    }
    Commands::Matrix { operation, a, b } => {
      let mut bindings = Bindings::new();
      bindings.insert("A".to_string(), leibniz::evaluate(&a)?);
      if let Some(b) = &b {
        bindings.insert("B".to_string(), leibniz::evaluate(b)?);
      }
      let value = evaluate_with(&operation, &bindings)?;
      println!("{}", format_value(&value));
    }
    Commands::Surface {
      expression,
      min,
      max,
      resolution,
      rot_x,
      rot_y,
    } => {
      let backend = LocalBackend::new();
      let grid =
        sample_grid(&backend, &expression, (min, max), (min, max), resolution);
      let quads =
        project(&grid, rot_x, rot_y, Viewport::default());
      println!(
        "sampled {} points, projected {} quads",
        grid.points().count(),
        quads.len()
      );
    }
  }
  Ok(())
}
