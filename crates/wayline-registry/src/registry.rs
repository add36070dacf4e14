use std::collections::{HashMap, HashSet};

use wayline_config::{SubscriptionDef, WorkflowConfig, WorkflowDef};

use crate::error::RegistryError;

/// The locked workflow registry.
///
/// Constructed once from static configuration at process start and
/// immutable thereafter. Duplicate identifiers survive load (first
/// definition wins on lookup) so the validator can report every problem in
/// one pass; startup must call [`crate::validate`] before serving traffic.
#[derive(Debug, Clone)]
pub struct WorkflowRegistry {
  /// All definitions in configuration order, duplicates included.
  workflows: Vec<WorkflowDef>,
  /// identifier -> index into `workflows`; first definition wins.
  index: HashMap<String, usize>,
  /// Identifiers named as a delegate target by any handler binding.
  delegated: HashSet<String>,
  subscriptions: Vec<SubscriptionDef>,
}

impl WorkflowRegistry {
  /// Lock a parsed configuration into a registry.
  pub fn load(config: WorkflowConfig) -> Self {
    let mut index = HashMap::new();
    for (i, def) in config.workflows.iter().enumerate() {
      index.entry(def.identifier.clone()).or_insert(i);
    }

    let delegated = config
      .workflows
      .iter()
      .flat_map(|def| &def.handlers)
      .flat_map(|handler| &handler.delegate_workflow)
      .cloned()
      .collect();

    Self {
      workflows: config.workflows,
      index,
      delegated,
      subscriptions: config.subscriptions,
    }
  }

  /// Parse and lock a configuration from its JSON form.
  pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
    Ok(Self::load(WorkflowConfig::from_json(raw)?))
  }

  /// Look up a workflow definition by identifier.
  pub fn lookup(&self, identifier: &str) -> Option<&WorkflowDef> {
    self.index.get(identifier).map(|&i| &self.workflows[i])
  }

  /// All workflow definitions, in configuration order.
  pub fn workflows(&self) -> &[WorkflowDef] {
    &self.workflows
  }

  /// All broker subscription bindings.
  pub fn subscriptions(&self) -> &[SubscriptionDef] {
    &self.subscriptions
  }

  /// Whether any handler binding delegates to this identifier.
  ///
  /// A trigger nobody delegates to is a pipeline entry; triggering one
  /// starts a fresh run and invalidates prior ledger history for its
  /// (reference id, group).
  pub fn is_delegated(&self, identifier: &str) -> bool {
    self.delegated.contains(identifier)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wayline_config::{HandlerDef, WorkflowKind};

  fn def(identifier: &str, kind: WorkflowKind, handlers: Vec<HandlerDef>) -> WorkflowDef {
    WorkflowDef {
      identifier: identifier.to_string(),
      kind,
      group: "osw-upload".to_string(),
      stage: "validate".to_string(),
      handlers,
    }
  }

  #[test]
  fn test_lookup() {
    let registry = WorkflowRegistry::load(WorkflowConfig {
      workflows: vec![def("UPLOAD_VALIDATE", WorkflowKind::Trigger, vec![])],
      subscriptions: vec![],
    });

    assert!(registry.lookup("UPLOAD_VALIDATE").is_some());
    assert!(registry.lookup("MISSING").is_none());
  }

  #[test]
  fn test_first_definition_wins_on_duplicate() {
    let mut second = def("X", WorkflowKind::Handler, vec![]);
    second.stage = "other".to_string();

    let registry = WorkflowRegistry::load(WorkflowConfig {
      workflows: vec![def("X", WorkflowKind::Trigger, vec![]), second],
      subscriptions: vec![],
    });

    assert_eq!(registry.lookup("X").unwrap().kind, WorkflowKind::Trigger);
    assert_eq!(registry.workflows().len(), 2);
  }

  #[test]
  fn test_is_delegated() {
    let registry = WorkflowRegistry::load(WorkflowConfig {
      workflows: vec![
        def("UPLOAD_VALIDATE", WorkflowKind::Trigger, vec![]),
        def(
          "UPLOAD_VALIDATE_RESPONSE",
          WorkflowKind::Handler,
          vec![HandlerDef {
            identifier: "update_job_status".to_string(),
            delegate_workflow: vec!["UPLOAD_FORMAT".to_string()],
            params: serde_json::Value::Null,
          }],
        ),
        def("UPLOAD_FORMAT", WorkflowKind::Trigger, vec![]),
      ],
      subscriptions: vec![],
    });

    assert!(registry.is_delegated("UPLOAD_FORMAT"));
    assert!(!registry.is_delegated("UPLOAD_VALIDATE"));
  }
}
