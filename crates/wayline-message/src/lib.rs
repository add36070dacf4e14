//! Wayline Message
//!
//! The [`QueueMessage`] envelope is the unit exchanged both in-process
//! (dispatcher emissions) and over the message bus (worker requests and
//! replies). It is ephemeral: never persisted directly, only logged into
//! the ledger as request/response payloads.
//!
//! Envelope shape on the wire:
//!
//! ```json
//! {
//!   "reference_id": "42",
//!   "type": "UPLOAD_VALIDATE_RESPONSE",
//!   "data": { "success": true, "validation_time": 12.5 }
//! }
//! ```
//!
//! `data` carries stage-specific fields; consumers must tolerate unknown
//! fields, so the payload stays a raw [`serde_json::Value`].

use serde::{Deserialize, Serialize};

/// A message tied to one pipeline run.
///
/// `reference_id` is the stable identifier (job id) of the run this message
/// belongs to; `message_type` names the workflow the message addresses and
/// must match a configured workflow identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueMessage {
  pub reference_id: String,

  #[serde(rename = "type")]
  pub message_type: String,

  #[serde(default)]
  pub data: serde_json::Value,
}

impl QueueMessage {
  /// Create a new message.
  pub fn new(
    reference_id: impl Into<String>,
    message_type: impl Into<String>,
    data: serde_json::Value,
  ) -> Self {
    Self {
      reference_id: reference_id.into(),
      message_type: message_type.into(),
      data,
    }
  }

  /// Copy of this message addressed to a different workflow identifier.
  ///
  /// Delegation advances a run by re-emitting the same payload under the
  /// next stage's identifier.
  pub fn with_type(&self, message_type: impl Into<String>) -> Self {
    Self {
      reference_id: self.reference_id.clone(),
      message_type: message_type.into(),
      data: self.data.clone(),
    }
  }

  /// Whether the stage that produced this message reported success.
  ///
  /// Absent or non-boolean `data.success` reads as `false`; a reply that
  /// does not claim success must never advance a pipeline.
  pub fn success(&self) -> bool {
    self
      .data
      .get("success")
      .and_then(serde_json::Value::as_bool)
      .unwrap_or(false)
  }

  /// Free-form status text carried in `data.message`, if any.
  pub fn status_message(&self) -> Option<&str> {
    self.data.get("message").and_then(serde_json::Value::as_str)
  }

  /// Decode a message from its wire form.
  pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(raw)
  }

  /// Encode the message to its wire form.
  pub fn to_json(&self) -> Result<String, serde_json::Error> {
    serde_json::to_string(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_roundtrip() {
    let message = QueueMessage::new("42", "UPLOAD_VALIDATE", json!({"success": true}));
    let raw = message.to_json().unwrap();
    let decoded = QueueMessage::from_json(&raw).unwrap();
    assert_eq!(decoded, message);
  }

  #[test]
  fn test_unknown_fields_tolerated() {
    let raw = r#"{
      "reference_id": "42",
      "type": "UPLOAD_VALIDATE",
      "data": {"success": true},
      "trace_id": "abc-123"
    }"#;
    let message = QueueMessage::from_json(raw).unwrap();
    assert_eq!(message.reference_id, "42");
    assert_eq!(message.message_type, "UPLOAD_VALIDATE");
  }

  #[test]
  fn test_missing_data_defaults_to_null() {
    let raw = r#"{"reference_id": "42", "type": "UPLOAD_VALIDATE"}"#;
    let message = QueueMessage::from_json(raw).unwrap();
    assert!(message.data.is_null());
    assert!(!message.success());
  }

  #[test]
  fn test_success_requires_boolean_true() {
    let truthy = QueueMessage::new("1", "T", json!({"success": true}));
    let falsy = QueueMessage::new("1", "T", json!({"success": false}));
    let stringly = QueueMessage::new("1", "T", json!({"success": "true"}));
    assert!(truthy.success());
    assert!(!falsy.success());
    assert!(!stringly.success());
  }

  #[test]
  fn test_with_type_preserves_reference_and_data() {
    let message = QueueMessage::new("42", "UPLOAD_VALIDATE_RESPONSE", json!({"success": true}));
    let delegated = message.with_type("UPLOAD_FORMAT");
    assert_eq!(delegated.reference_id, "42");
    assert_eq!(delegated.message_type, "UPLOAD_FORMAT");
    assert_eq!(delegated.data, message.data);
  }
}
