use serde::{Deserialize, Serialize};

/// The role a workflow plays in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowKind {
  /// An externally-initiated pipeline entry. Dispatching a trigger logs a
  /// request row in the ledger.
  Trigger,

  /// A response-side reaction wired by delegation. Dispatching a handler
  /// logs a response against the stage's existing request row.
  Handler,
}
