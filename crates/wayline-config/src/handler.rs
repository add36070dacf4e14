use serde::{Deserialize, Serialize};

/// A handler binding attached to a workflow definition.
///
/// When a workflow's stage code hands off to its bindings, each binding's
/// handler receives the message together with the binding's delegate list
/// and parameters. `params` is free-form and passed through to the handler
/// untouched (e.g. `{"topic": "osw-validate-request"}` for a publish
/// handler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerDef {
  /// Handler identifier the binding dispatches to.
  pub identifier: String,

  /// Workflow identifiers to advance to when the handler succeeds.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub delegate_workflow: Vec<String>,

  /// Free-form parameters passed through to the handler.
  #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
  pub params: serde_json::Value,
}
