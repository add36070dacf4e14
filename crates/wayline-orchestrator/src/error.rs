use thiserror::Error;

/// Errors raised by the orchestrator facade.
#[derive(Debug, Error)]
pub enum OrchestratorError {
  /// The identifier does not resolve to any configured workflow.
  #[error("unknown workflow identifier: {0}")]
  UnknownWorkflow(String),

  /// A handler-kind identifier was used as a pipeline entry point.
  /// Rejected to the caller with no side effects performed.
  #[error("workflow '{0}' is not a trigger and cannot start a pipeline run")]
  NotTrigger(String),

  #[error("ledger error: {0}")]
  Ledger(#[from] wayline_ledger::Error),

  #[error("bus error: {0}")]
  Bus(#[from] wayline_bus::BusError),
}

/// Error returned by a stage subscriber.
///
/// The dispatcher catches these at its invocation boundary and logs them;
/// a failing subscriber stalls only its own run, never the dispatch loop.
#[derive(Debug, Error)]
pub enum StageError {
  #[error(transparent)]
  Orchestrator(#[from] OrchestratorError),

  #[error(transparent)]
  Ledger(#[from] wayline_ledger::Error),

  #[error(transparent)]
  Bus(#[from] wayline_bus::BusError),

  /// Stage-specific failure.
  #[error("{0}")]
  Stage(String),
}

impl StageError {
  /// Build a stage-specific error from any displayable value.
  pub fn stage(message: impl Into<String>) -> Self {
    Self::Stage(message.into())
  }
}
