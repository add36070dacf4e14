use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use wayline_message::QueueMessage;
use wayline_orchestrator::{DelegationContext, Orchestrator, StageError, StageSubscriber};

use crate::jobs::{JobService, JobStatus};

/// Generic response-side stage.
///
/// Registered under handler-kind workflow identifiers. Reads the worker's
/// reply: an unsuccessful reply marks the job failed and parks the run at
/// its current stage; a successful one records the reply on the job and
/// hands off to the workflow's handler bindings, which advance the run.
pub struct ResponseStage {
  orchestrator: Arc<Orchestrator>,
  jobs: Arc<dyn JobService>,
}

impl ResponseStage {
  pub fn new(orchestrator: Arc<Orchestrator>, jobs: Arc<dyn JobService>) -> Self {
    Self { orchestrator, jobs }
  }
}

#[async_trait]
impl StageSubscriber for ResponseStage {
  async fn on_message(
    &self,
    message: QueueMessage,
    _delegation: Option<DelegationContext>,
  ) -> Result<(), StageError> {
    if !message.success() {
      let reason = message
        .status_message()
        .unwrap_or("stage reported failure")
        .to_string();

      warn!(
        workflow = %message.message_type,
        reference_id = %message.reference_id,
        reason = %reason,
        "stage_failed"
      );

      self
        .jobs
        .update_status(&message.reference_id, JobStatus::Failed, Some(reason))
        .await?;
      return Ok(());
    }

    info!(
      workflow = %message.message_type,
      reference_id = %message.reference_id,
      "stage_succeeded"
    );

    self
      .jobs
      .set_response(&message.reference_id, message.data.clone())
      .await?;

    // Bindings decide what success means next: job status, dataset status,
    // and which workflow(s) the run advances to.
    self.orchestrator.delegate_workflow_handlers(&message).await?;
    Ok(())
  }
}
