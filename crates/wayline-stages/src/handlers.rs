//! Binding handlers.
//!
//! Handler bindings are the configuration-driven side effects of a stage:
//! each binding names one of these handlers, and the handler receives the
//! binding's parameters and delegate list through the dispatch context.
//! Every handler advances the run through its delegate list after its own
//! side effect succeeds, so chains compose purely in configuration.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use wayline_message::QueueMessage;
use wayline_orchestrator::{DelegationContext, Orchestrator, StageError, StageSubscriber};

use crate::datasets::{DatasetService, DatasetStatus};
use crate::jobs::{JobService, JobStatus};

/// Handler identifier for [`PublishHandler`].
pub const PUBLISH_MESSAGE: &str = "publish_message";

/// Handler identifier for [`JobStatusHandler`].
pub const UPDATE_JOB_STATUS: &str = "update_job_status";

/// Handler identifier for [`DatasetStatusHandler`].
pub const UPDATE_DATASET_STATUS: &str = "update_dataset_status";

/// Publishes the message to the topic named by the binding's
/// `params.topic`, then advances through the binding's delegate list.
pub struct PublishHandler {
  orchestrator: Arc<Orchestrator>,
}

impl PublishHandler {
  pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
    Self { orchestrator }
  }
}

#[async_trait]
impl StageSubscriber for PublishHandler {
  async fn on_message(
    &self,
    message: QueueMessage,
    delegation: Option<DelegationContext>,
  ) -> Result<(), StageError> {
    let delegation = delegation.unwrap_or_default();

    let Some(topic) = delegation.params.get("topic").and_then(serde_json::Value::as_str)
    else {
      return Err(StageError::stage(format!(
        "publish binding for '{}' is missing the 'topic' param",
        message.message_type
      )));
    };

    self.orchestrator.publish_message(topic, &message).await?;
    self
      .orchestrator
      .delegate_workflow_if_any(&delegation.delegate_workflow, &message)
      .await?;
    Ok(())
  }
}

/// Updates the job keyed by the message's reference id, then advances
/// through the binding's delegate list.
///
/// The target status comes from `params.status` when present; otherwise a
/// binding with nothing left to delegate to marks the job completed, and
/// one that advances further keeps it running.
pub struct JobStatusHandler {
  orchestrator: Arc<Orchestrator>,
  jobs: Arc<dyn JobService>,
}

impl JobStatusHandler {
  pub fn new(orchestrator: Arc<Orchestrator>, jobs: Arc<dyn JobService>) -> Self {
    Self { orchestrator, jobs }
  }
}

#[async_trait]
impl StageSubscriber for JobStatusHandler {
  async fn on_message(
    &self,
    message: QueueMessage,
    delegation: Option<DelegationContext>,
  ) -> Result<(), StageError> {
    let delegation = delegation.unwrap_or_default();

    let status = match delegation.params.get("status") {
      Some(value) => serde_json::from_value::<JobStatus>(value.clone())
        .map_err(|e| StageError::stage(format!("invalid 'status' param: {e}")))?,
      None if delegation.delegate_workflow.is_empty() => JobStatus::Completed,
      None => JobStatus::Running,
    };

    self
      .jobs
      .update_status(
        &message.reference_id,
        status,
        message.status_message().map(str::to_string),
      )
      .await?;

    if let Some(url) = message.data.get("download_url").and_then(serde_json::Value::as_str) {
      self
        .jobs
        .set_download_url(&message.reference_id, url.to_string())
        .await?;
    }

    info!(
      reference_id = %message.reference_id,
      status = ?status,
      "job_status_updated"
    );

    self
      .orchestrator
      .delegate_workflow_if_any(&delegation.delegate_workflow, &message)
      .await?;
    Ok(())
  }
}

/// Transitions the dataset named by the message's `data.dataset_id` to the
/// status in `params.status`, then advances through the binding's delegate
/// list.
pub struct DatasetStatusHandler {
  orchestrator: Arc<Orchestrator>,
  datasets: Arc<dyn DatasetService>,
}

impl DatasetStatusHandler {
  pub fn new(orchestrator: Arc<Orchestrator>, datasets: Arc<dyn DatasetService>) -> Self {
    Self {
      orchestrator,
      datasets,
    }
  }
}

#[async_trait]
impl StageSubscriber for DatasetStatusHandler {
  async fn on_message(
    &self,
    message: QueueMessage,
    delegation: Option<DelegationContext>,
  ) -> Result<(), StageError> {
    let delegation = delegation.unwrap_or_default();

    let status = delegation
      .params
      .get("status")
      .cloned()
      .ok_or_else(|| StageError::stage("dataset binding is missing the 'status' param"))?;
    let status = serde_json::from_value::<DatasetStatus>(status)
      .map_err(|e| StageError::stage(format!("invalid 'status' param: {e}")))?;

    let Some(dataset_id) = message.data.get("dataset_id").and_then(serde_json::Value::as_str)
    else {
      return Err(StageError::stage(format!(
        "message for '{}' carries no dataset_id",
        message.message_type
      )));
    };

    self.datasets.set_status(dataset_id, status).await?;

    info!(
      reference_id = %message.reference_id,
      dataset_id,
      status = ?status,
      "dataset_status_updated"
    );

    self
      .orchestrator
      .delegate_workflow_if_any(&delegation.delegate_workflow, &message)
      .await?;
    Ok(())
  }
}
