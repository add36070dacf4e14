use thiserror::Error;

/// A single inconsistency found in the workflow graph.
///
/// Problems are independent; the validator reports all of them rather than
/// stopping at the first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphProblem {
  #[error("duplicate workflow identifier: {identifier}")]
  DuplicateWorkflow { identifier: String },

  #[error("duplicate subscription binding: {topic}/{subscription}")]
  DuplicateSubscription { topic: String, subscription: String },

  #[error(
    "handler '{handler}' of workflow '{workflow}' delegates to unknown workflow '{delegate}'"
  )]
  DanglingDelegate {
    workflow: String,
    handler: String,
    delegate: String,
  },

  #[error("no subscriber registered for workflow identifier '{identifier}'")]
  UnregisteredWorkflow { identifier: String },

  #[error("no subscriber registered for handler identifier '{identifier}'")]
  UnregisteredHandler { identifier: String },
}

/// Errors raised while loading or validating a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
  /// The configuration could not be parsed. Fatal: the process must not
  /// start serving traffic with a partial graph.
  #[error("malformed workflow configuration: {0}")]
  Malformed(#[from] serde_json::Error),

  /// The graph is inconsistent. Fatal at startup.
  #[error("workflow graph has {} problem(s): {}", .problems.len(), format_problems(.problems))]
  InvalidGraph { problems: Vec<GraphProblem> },
}

fn format_problems(problems: &[GraphProblem]) -> String {
  problems
    .iter()
    .map(|p| p.to_string())
    .collect::<Vec<_>>()
    .join("; ")
}
