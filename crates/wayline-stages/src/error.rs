use thiserror::Error;
use wayline_orchestrator::StageError;

/// Errors surfaced by the job/dataset collaborator seams.
///
/// The in-memory implementations never fail; persistent implementations
/// report their storage faults through this type.
#[derive(Debug, Error)]
pub enum CollaboratorError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("storage error: {0}")]
  Storage(String),
}

impl From<CollaboratorError> for StageError {
  fn from(e: CollaboratorError) -> Self {
    StageError::stage(e.to_string())
  }
}
