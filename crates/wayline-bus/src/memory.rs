use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;
use wayline_message::QueueMessage;

use crate::{BusError, BusReceiver, MessageBus};

/// In-process message bus.
///
/// Each (topic, subscription) binding owns an unbounded channel; publishing
/// to a topic sends one copy of the encoded message to every subscription
/// bound to it. Send errors are ignored: a dropped receiver means the
/// subscriber went away, which mirrors a broker discarding delivery to a
/// dead consumer.
#[derive(Default)]
pub struct MemoryBus {
  // topic -> subscription -> sender
  topics: RwLock<HashMap<String, HashMap<String, mpsc::UnboundedSender<String>>>>,
}

impl MemoryBus {
  pub fn new() -> Self {
    Self::default()
  }

  /// Deliver a raw payload as-is, bypassing message encoding.
  ///
  /// A broker carries arbitrary bytes; this lets tests exercise consumer
  /// behavior on payloads that do not decode.
  pub fn publish_raw(&self, topic: &str, raw: impl Into<String>) {
    let raw = raw.into();
    let topics = self.topics.read().expect("bus lock poisoned");
    if let Some(subscriptions) = topics.get(topic) {
      for sender in subscriptions.values() {
        let _ = sender.send(raw.clone());
      }
    }
  }
}

#[async_trait]
impl MessageBus for MemoryBus {
  async fn publish(&self, topic: &str, message: &QueueMessage) -> Result<(), BusError> {
    let raw = message.to_json()?;

    let topics = self.topics.read().expect("bus lock poisoned");
    let Some(subscriptions) = topics.get(topic) else {
      debug!(topic, "publish to topic with no subscriptions");
      return Ok(());
    };

    for (subscription, sender) in subscriptions {
      if sender.send(raw.clone()).is_err() {
        debug!(topic, %subscription, "subscriber receiver dropped");
      }
    }

    Ok(())
  }

  async fn subscribe(&self, topic: &str, subscription: &str) -> Result<BusReceiver, BusError> {
    let mut topics = self.topics.write().expect("bus lock poisoned");
    let subscriptions = topics.entry(topic.to_string()).or_default();

    if subscriptions.contains_key(subscription) {
      return Err(BusError::DuplicateSubscription {
        topic: topic.to_string(),
        subscription: subscription.to_string(),
      });
    }

    let (sender, receiver) = mpsc::unbounded_channel();
    subscriptions.insert(subscription.to_string(), sender);
    Ok(receiver)
  }
}
