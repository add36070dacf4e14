use serde::{Deserialize, Serialize};

use crate::enums::WorkflowKind;
use crate::handler::HandlerDef;
use crate::subscription::SubscriptionDef;

/// One workflow definition in the declarative graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDef {
  /// Globally unique workflow identifier, e.g. "UPLOAD_VALIDATE".
  pub identifier: String,

  /// Whether this workflow is a pipeline entry or a response reaction.
  pub kind: WorkflowKind,

  /// Pipeline family the workflow belongs to, e.g. "osw-upload".
  pub group: String,

  /// Human label used for ledger grouping, e.g. "validate".
  pub stage: String,

  /// Handler bindings invoked when the workflow's stage code hands off.
  #[serde(default)]
  pub handlers: Vec<HandlerDef>,
}

/// The full declarative configuration: workflow definitions plus the
/// broker subscriptions the orchestrator listens on.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
  #[serde(default)]
  pub workflows: Vec<WorkflowDef>,

  #[serde(default)]
  pub subscriptions: Vec<SubscriptionDef>,
}

impl WorkflowConfig {
  /// Parse a configuration from its JSON form.
  ///
  /// Missing required fields fail here, before anything is wired up.
  pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(raw)
  }
}
