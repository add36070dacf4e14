//! The orchestrator facade.
//!
//! This is the public contract stage implementations call: trigger a
//! pipeline entry, hand a trigger's completion to its handler bindings,
//! advance a run to its next stage(s), or publish a worker request to the
//! bus. The facade composes the registry, ledger, bus, and dispatcher; it
//! holds no per-run state of its own.

use std::sync::Arc;

use tracing::{debug, info, warn};
use wayline_bus::MessageBus;
use wayline_config::WorkflowKind;
use wayline_ledger::Ledger;
use wayline_message::QueueMessage;
use wayline_registry::WorkflowRegistry;

use crate::dispatcher::{DelegationContext, EventDispatcher};
use crate::error::OrchestratorError;

pub struct Orchestrator {
  registry: Arc<WorkflowRegistry>,
  ledger: Arc<dyn Ledger>,
  bus: Arc<dyn MessageBus>,
  dispatcher: Arc<EventDispatcher>,
}

impl Orchestrator {
  pub fn new(
    registry: Arc<WorkflowRegistry>,
    ledger: Arc<dyn Ledger>,
    bus: Arc<dyn MessageBus>,
    dispatcher: Arc<EventDispatcher>,
  ) -> Self {
    Self {
      registry,
      ledger,
      bus,
      dispatcher,
    }
  }

  pub fn registry(&self) -> &WorkflowRegistry {
    &self.registry
  }

  pub fn dispatcher(&self) -> &EventDispatcher {
    &self.dispatcher
  }

  pub fn ledger(&self) -> &dyn Ledger {
    self.ledger.as_ref()
  }

  /// Start a pipeline run by dispatching a trigger-kind workflow.
  ///
  /// Handler-kind identifiers are rejected before any side effect. On
  /// success the request is logged in the ledger, then emitted to the
  /// trigger's registered stage code. Triggering a pipeline entry (a
  /// trigger no binding delegates to) first obsoletes ledger history from
  /// prior runs of the same (reference id, group).
  pub async fn trigger_workflow(
    &self,
    identifier: &str,
    message: QueueMessage,
  ) -> Result<(), OrchestratorError> {
    let def = self
      .registry
      .lookup(identifier)
      .ok_or_else(|| OrchestratorError::UnknownWorkflow(identifier.to_string()))?;

    if def.kind != WorkflowKind::Trigger {
      return Err(OrchestratorError::NotTrigger(identifier.to_string()));
    }

    let message = message.with_type(identifier);

    if !self.registry.is_delegated(identifier) {
      self
        .ledger
        .obsolete(&message.reference_id, &def.group)
        .await?;
    }

    self
      .ledger
      .log_request(&def.group, &def.stage, &message)
      .await?;

    info!(
      identifier,
      reference_id = %message.reference_id,
      group = %def.group,
      stage = %def.stage,
      "workflow_triggered"
    );

    self.dispatcher.emit(identifier, message, None).await;
    Ok(())
  }

  /// Hand a workflow's completion to its configured handler bindings.
  ///
  /// Called by stage code once it has composed its message. Emits once per
  /// binding under the binding's handler identifier, passing that binding's
  /// delegate list and parameters along.
  pub async fn delegate_workflow_handlers(
    &self,
    message: &QueueMessage,
  ) -> Result<(), OrchestratorError> {
    let def = self
      .registry
      .lookup(&message.message_type)
      .ok_or_else(|| OrchestratorError::UnknownWorkflow(message.message_type.clone()))?;

    for handler in &def.handlers {
      let delegation = DelegationContext {
        delegate_workflow: handler.delegate_workflow.clone(),
        params: handler.params.clone(),
      };

      debug!(
        workflow = %def.identifier,
        handler = %handler.identifier,
        reference_id = %message.reference_id,
        "handler_delegated"
      );

      self
        .dispatcher
        .emit(&handler.identifier, message.clone(), Some(delegation))
        .await;
    }

    Ok(())
  }

  /// Advance a run to the next stage(s).
  ///
  /// For each identifier, the message is re-addressed to it and emitted.
  /// A trigger-kind target gets its stage's request logged before dispatch,
  /// so ledger row creation stays tied to trigger dispatch wherever the
  /// trigger originates. The caller is responsible for checking the
  /// message's `success` flag first; advancing a failed run is a caller
  /// bug this operation cannot detect.
  pub async fn delegate_workflow_if_any(
    &self,
    identifiers: &[String],
    message: &QueueMessage,
  ) -> Result<(), OrchestratorError> {
    for identifier in identifiers {
      let delegated = message.with_type(identifier);

      match self.registry.lookup(identifier) {
        Some(def) if def.kind == WorkflowKind::Trigger => {
          self
            .ledger
            .log_request(&def.group, &def.stage, &delegated)
            .await?;
        }
        Some(_) => {}
        None => {
          // Unreachable for a validated graph; emitted anyway so the
          // dispatcher's no-subscriber warning makes the hole visible.
          warn!(%identifier, "delegation to unconfigured workflow");
        }
      }

      info!(
        %identifier,
        reference_id = %delegated.reference_id,
        "workflow_delegated"
      );

      self.dispatcher.emit(identifier, delegated, None).await;
    }

    Ok(())
  }

  /// Hand a message to the bus for an external worker to pick up.
  pub async fn publish_message(
    &self,
    topic: &str,
    message: &QueueMessage,
  ) -> Result<(), OrchestratorError> {
    self.bus.publish(topic, message).await?;

    debug!(
      topic,
      reference_id = %message.reference_id,
      message_type = %message.message_type,
      "message_published"
    );

    Ok(())
  }
}
