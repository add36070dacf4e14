//! Broker subscription management.
//!
//! One listener task per configured (topic, subscription) binding; each
//! delivered payload is handled on its own task, so handler bodies for
//! different runs proceed concurrently. Delivery errors are logged and the
//! message dropped; redelivery policy belongs to the bus, never to this
//! component.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use wayline_bus::MessageBus;
use wayline_config::WorkflowKind;
use wayline_ledger::Ledger;
use wayline_message::QueueMessage;
use wayline_registry::WorkflowRegistry;

use crate::dispatcher::EventDispatcher;
use crate::error::OrchestratorError;

pub struct SubscriptionManager {
  registry: Arc<WorkflowRegistry>,
  bus: Arc<dyn MessageBus>,
  ledger: Arc<dyn Ledger>,
  dispatcher: Arc<EventDispatcher>,
}

impl SubscriptionManager {
  pub fn new(
    registry: Arc<WorkflowRegistry>,
    bus: Arc<dyn MessageBus>,
    ledger: Arc<dyn Ledger>,
    dispatcher: Arc<EventDispatcher>,
  ) -> Self {
    Self {
      registry,
      bus,
      ledger,
      dispatcher,
    }
  }

  /// Bind every configured subscription and start its listener task.
  ///
  /// Returns the listener handles; they exit when the token is cancelled or
  /// the bus closes their channel.
  pub async fn start(
    &self,
    cancel: CancellationToken,
  ) -> Result<Vec<JoinHandle<()>>, OrchestratorError> {
    let router = Arc::new(MessageRouter {
      registry: self.registry.clone(),
      ledger: self.ledger.clone(),
      dispatcher: self.dispatcher.clone(),
    });

    let mut handles = Vec::with_capacity(self.registry.subscriptions().len());

    for binding in self.registry.subscriptions() {
      let mut receiver = self.bus.subscribe(&binding.topic, &binding.subscription).await?;
      let topic = binding.topic.clone();
      let subscription = binding.subscription.clone();
      let router = router.clone();
      let cancel = cancel.clone();

      info!(topic = %topic, subscription = %subscription, "subscription_started");

      handles.push(tokio::spawn(async move {
        loop {
          tokio::select! {
            _ = cancel.cancelled() => {
              info!(topic = %topic, subscription = %subscription, "subscription_cancelled");
              break;
            }
            raw = receiver.recv() => match raw {
              Some(raw) => {
                let router = router.clone();
                let topic = topic.clone();
                tokio::spawn(async move {
                  router.route(&topic, raw).await;
                });
              }
              None => {
                info!(topic = %topic, subscription = %subscription, "subscription_channel_closed");
                break;
              }
            }
          }
        }
      }));
    }

    Ok(handles)
  }
}

/// Routes one delivered payload: decode, ledger-log by workflow kind, emit.
struct MessageRouter {
  registry: Arc<WorkflowRegistry>,
  ledger: Arc<dyn Ledger>,
  dispatcher: Arc<EventDispatcher>,
}

impl MessageRouter {
  async fn route(&self, topic: &str, raw: String) {
    let message = match QueueMessage::from_json(&raw) {
      Ok(message) => message,
      Err(e) => {
        error!(topic, error = %e, "message_decode_failed");
        return;
      }
    };

    let Some(def) = self.registry.lookup(&message.message_type) else {
      // Foreign traffic on a shared topic; drop it.
      warn!(
        topic,
        message_type = %message.message_type,
        reference_id = %message.reference_id,
        "unknown_workflow_type"
      );
      return;
    };

    let logged = match def.kind {
      WorkflowKind::Trigger => {
        self
          .ledger
          .log_request(&def.group, &def.stage, &message)
          .await
      }
      WorkflowKind::Handler => self.ledger.log_response(&def.stage, &message).await,
    };

    if let Err(e) = logged {
      // Dropping here leaves redelivery to the bus; emitting without the
      // bookkeeping would advance a run the ledger never saw.
      error!(
        topic,
        reference_id = %message.reference_id,
        message_type = %message.message_type,
        error = %e,
        "ledger_write_failed"
      );
      return;
    }

    let identifier = message.message_type.clone();
    self.dispatcher.emit(&identifier, message, None).await;
  }
}
