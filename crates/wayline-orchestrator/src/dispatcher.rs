//! In-process event dispatch.
//!
//! The dispatcher maps workflow and handler identifiers to registered
//! subscriber code. Registration happens once per stage implementation at
//! startup; the map is read-only afterwards, so concurrent emission needs
//! no coordination beyond cloning the subscriber list out of the lock.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, error, warn};
use wayline_message::QueueMessage;

use crate::error::StageError;

/// Handler-binding context carried with a delegated emission.
///
/// When a workflow hands off to its handler bindings, each handler receives
/// the binding's delegate list and free-form parameters alongside the
/// message.
#[derive(Debug, Clone, Default)]
pub struct DelegationContext {
  /// Workflow identifiers to advance to when the handler succeeds.
  pub delegate_workflow: Vec<String>,

  /// The binding's parameters, passed through untouched.
  pub params: serde_json::Value,
}

/// A piece of stage code registered under a workflow or handler identifier.
#[async_trait]
pub trait StageSubscriber: Send + Sync {
  /// Handle one dispatched message.
  ///
  /// `delegation` is present only when the emission came from a handler
  /// binding hand-off.
  async fn on_message(
    &self,
    message: QueueMessage,
    delegation: Option<DelegationContext>,
  ) -> Result<(), StageError>;
}

/// String-keyed dispatch: identifier -> subscriber list.
#[derive(Default)]
pub struct EventDispatcher {
  subscribers: RwLock<HashMap<String, Vec<Arc<dyn StageSubscriber>>>>,
}

impl EventDispatcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a subscriber under an identifier. Startup only.
  pub fn subscribe(&self, identifier: impl Into<String>, subscriber: Arc<dyn StageSubscriber>) {
    let mut subscribers = self.subscribers.write().expect("dispatcher lock poisoned");
    subscribers.entry(identifier.into()).or_default().push(subscriber);
  }

  /// Identifiers with at least one subscriber.
  ///
  /// Fed to the graph validator's declared-vs-registered check once startup
  /// registration is complete.
  pub fn registered_identifiers(&self) -> HashSet<String> {
    let subscribers = self.subscribers.read().expect("dispatcher lock poisoned");
    subscribers.keys().cloned().collect()
  }

  /// Emit a message to every subscriber of an identifier.
  ///
  /// All subscribers receive the message (unordered fan-out). Every
  /// invocation is awaited and its failure is caught and logged here, never
  /// propagated to the emitter. A failing subscriber stalls only its own
  /// run.
  pub async fn emit(
    &self,
    identifier: &str,
    message: QueueMessage,
    delegation: Option<DelegationContext>,
  ) {
    let targets: Vec<Arc<dyn StageSubscriber>> = {
      let subscribers = self.subscribers.read().expect("dispatcher lock poisoned");
      subscribers.get(identifier).cloned().unwrap_or_default()
    };

    if targets.is_empty() {
      // The validator rejects unregistered configured identifiers, so this
      // only fires for identifiers outside the configured graph.
      warn!(identifier, "no subscribers for emitted message");
      return;
    }

    debug!(
      identifier,
      reference_id = %message.reference_id,
      subscribers = targets.len(),
      "message_dispatched"
    );

    let invocations = targets
      .iter()
      .map(|subscriber| Self::invoke(subscriber.as_ref(), &message, delegation.clone()));

    // Single policy point for subscriber failures.
    for result in join_all(invocations).await {
      if let Err(e) = result {
        error!(
          identifier,
          reference_id = %message.reference_id,
          error = %e,
          "handler_failed"
        );
      }
    }
  }

  /// Invocation wrapper: one subscriber call, typed result.
  async fn invoke(
    subscriber: &dyn StageSubscriber,
    message: &QueueMessage,
    delegation: Option<DelegationContext>,
  ) -> Result<(), StageError> {
    subscriber.on_message(message.clone(), delegation).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use tokio::sync::mpsc;

  struct Probe {
    sender: mpsc::UnboundedSender<(QueueMessage, Option<DelegationContext>)>,
  }

  impl Probe {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(QueueMessage, Option<DelegationContext>)>) {
      let (sender, receiver) = mpsc::unbounded_channel();
      (Arc::new(Self { sender }), receiver)
    }
  }

  #[async_trait]
  impl StageSubscriber for Probe {
    async fn on_message(
      &self,
      message: QueueMessage,
      delegation: Option<DelegationContext>,
    ) -> Result<(), StageError> {
      let _ = self.sender.send((message, delegation));
      Ok(())
    }
  }

  struct Failing;

  #[async_trait]
  impl StageSubscriber for Failing {
    async fn on_message(
      &self,
      _message: QueueMessage,
      _delegation: Option<DelegationContext>,
    ) -> Result<(), StageError> {
      Err(StageError::stage("stage blew up"))
    }
  }

  #[tokio::test]
  async fn test_emit_fans_out_to_all_subscribers() {
    let dispatcher = EventDispatcher::new();
    let (first, mut first_rx) = Probe::new();
    let (second, mut second_rx) = Probe::new();
    dispatcher.subscribe("UPLOAD_VALIDATE", first);
    dispatcher.subscribe("UPLOAD_VALIDATE", second);

    let message = QueueMessage::new("42", "UPLOAD_VALIDATE", json!({}));
    dispatcher.emit("UPLOAD_VALIDATE", message, None).await;

    assert_eq!(first_rx.recv().await.unwrap().0.reference_id, "42");
    assert_eq!(second_rx.recv().await.unwrap().0.reference_id, "42");
  }

  #[tokio::test]
  async fn test_failing_subscriber_does_not_starve_siblings() {
    let dispatcher = EventDispatcher::new();
    let (probe, mut probe_rx) = Probe::new();
    dispatcher.subscribe("UPLOAD_VALIDATE", Arc::new(Failing));
    dispatcher.subscribe("UPLOAD_VALIDATE", probe);

    let message = QueueMessage::new("42", "UPLOAD_VALIDATE", json!({}));
    dispatcher.emit("UPLOAD_VALIDATE", message, None).await;

    // The failure is swallowed at the dispatch boundary; the healthy
    // subscriber still ran.
    assert_eq!(probe_rx.recv().await.unwrap().0.reference_id, "42");
  }

  #[tokio::test]
  async fn test_emit_to_unregistered_identifier_is_a_noop() {
    let dispatcher = EventDispatcher::new();
    let message = QueueMessage::new("42", "NOBODY_HOME", json!({}));
    dispatcher.emit("NOBODY_HOME", message, None).await;
  }

  #[tokio::test]
  async fn test_delegation_context_reaches_subscriber() {
    let dispatcher = EventDispatcher::new();
    let (probe, mut probe_rx) = Probe::new();
    dispatcher.subscribe("publish_message", probe);

    let delegation = DelegationContext {
      delegate_workflow: vec!["UPLOAD_FORMAT".to_string()],
      params: json!({"topic": "osw-validate-request"}),
    };
    let message = QueueMessage::new("42", "UPLOAD_VALIDATE", json!({}));
    dispatcher.emit("publish_message", message, Some(delegation)).await;

    let (_, delegation) = probe_rx.recv().await.unwrap();
    let delegation = delegation.unwrap();
    assert_eq!(delegation.delegate_workflow, vec!["UPLOAD_FORMAT".to_string()]);
    assert_eq!(delegation.params["topic"], "osw-validate-request");
  }

  #[test]
  fn test_registered_identifiers() {
    let dispatcher = EventDispatcher::new();
    let (probe, _rx) = Probe::new();
    dispatcher.subscribe("UPLOAD_VALIDATE", probe.clone());
    dispatcher.subscribe("publish_message", probe);

    let registered = dispatcher.registered_identifiers();
    assert!(registered.contains("UPLOAD_VALIDATE"));
    assert!(registered.contains("publish_message"));
    assert_eq!(registered.len(), 2);
  }
}
