use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use wayline_message::QueueMessage;
use wayline_orchestrator::{DelegationContext, Orchestrator, StageError, StageSubscriber};

/// Generic trigger-side stage.
///
/// Registered under trigger-kind workflow identifiers. The request payload
/// arrives already composed (by the caller of `trigger_workflow` or by the
/// previous stage's delegation); this stage hands it to the workflow's
/// handler bindings, which publish it for the external worker and run any
/// other side effects the configuration wires in.
pub struct RequestStage {
  orchestrator: Arc<Orchestrator>,
}

impl RequestStage {
  pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
    Self { orchestrator }
  }
}

#[async_trait]
impl StageSubscriber for RequestStage {
  async fn on_message(
    &self,
    message: QueueMessage,
    _delegation: Option<DelegationContext>,
  ) -> Result<(), StageError> {
    info!(
      workflow = %message.message_type,
      reference_id = %message.reference_id,
      "request_stage_started"
    );

    self.orchestrator.delegate_workflow_handlers(&message).await?;
    Ok(())
  }
}
