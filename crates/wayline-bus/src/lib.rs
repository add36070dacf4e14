//! Wayline Bus
//!
//! This crate provides the message-bus seam between the orchestrator and
//! the external workers that execute pipeline stages. The bus carries the
//! wire form of [`wayline_message::QueueMessage`] and guarantees
//! at-least-once delivery; redelivery policy belongs to the bus, never to
//! its consumers.
//!
//! A topic fans out: every subscription bound to it receives its own copy
//! of each published message. Consumers receive raw payloads and decode
//! them at the edge, so a malformed message is a consumer-side logging
//! concern rather than a bus failure.
//!
//! [`MemoryBus`] is the in-process implementation used by tests and local
//! runs; production deployments substitute a broker-backed implementation
//! behind the same [`MessageBus`] trait.

mod memory;

pub use memory::MemoryBus;

use async_trait::async_trait;
use tokio::sync::mpsc;
use wayline_message::QueueMessage;

/// Raw payload stream for one (topic, subscription) binding.
pub type BusReceiver = mpsc::UnboundedReceiver<String>;

/// Error type for bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
  /// The (topic, subscription) pair is already bound.
  #[error("subscription already exists: {topic}/{subscription}")]
  DuplicateSubscription { topic: String, subscription: String },

  /// The outbound message could not be encoded.
  #[error("message encode error: {0}")]
  Encode(#[from] serde_json::Error),
}

/// A publish/subscribe message bus.
#[async_trait]
pub trait MessageBus: Send + Sync {
  /// Publish a message to a topic.
  ///
  /// Publishing to a topic with no subscriptions is not an error; the
  /// message simply has no receiver yet.
  async fn publish(&self, topic: &str, message: &QueueMessage) -> Result<(), BusError>;

  /// Bind a subscription to a topic and receive its raw payload stream.
  async fn subscribe(&self, topic: &str, subscription: &str) -> Result<BusReceiver, BusError>;
}
