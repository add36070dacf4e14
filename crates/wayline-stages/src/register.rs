use std::sync::Arc;

use wayline_config::WorkflowKind;
use wayline_orchestrator::Orchestrator;

use crate::datasets::DatasetService;
use crate::handlers::{
  DatasetStatusHandler, JobStatusHandler, PublishHandler, PUBLISH_MESSAGE, UPDATE_DATASET_STATUS,
  UPDATE_JOB_STATUS,
};
use crate::jobs::JobService;
use crate::request::RequestStage;
use crate::response::ResponseStage;

/// Register the generic stages and binding handlers for every workflow in
/// the orchestrator's registry.
///
/// Trigger-kind workflows get a shared [`RequestStage`], handler-kind
/// workflows a shared [`ResponseStage`], and the three binding handlers are
/// registered under their well-known identifiers. Call before validating
/// the graph: validation checks that every declared identifier ends up
/// with a subscriber.
pub fn register_default_stages(
  orchestrator: &Arc<Orchestrator>,
  jobs: Arc<dyn JobService>,
  datasets: Arc<dyn DatasetService>,
) {
  let dispatcher = orchestrator.dispatcher();

  let request_stage = Arc::new(RequestStage::new(orchestrator.clone()));
  let response_stage = Arc::new(ResponseStage::new(orchestrator.clone(), jobs.clone()));

  for def in orchestrator.registry().workflows() {
    match def.kind {
      WorkflowKind::Trigger => dispatcher.subscribe(&def.identifier, request_stage.clone()),
      WorkflowKind::Handler => dispatcher.subscribe(&def.identifier, response_stage.clone()),
    }
  }

  dispatcher.subscribe(PUBLISH_MESSAGE, Arc::new(PublishHandler::new(orchestrator.clone())));
  dispatcher.subscribe(
    UPDATE_JOB_STATUS,
    Arc::new(JobStatusHandler::new(orchestrator.clone(), jobs)),
  );
  dispatcher.subscribe(
    UPDATE_DATASET_STATUS,
    Arc::new(DatasetStatusHandler::new(orchestrator.clone(), datasets)),
  );
}
