use std::collections::HashSet;

use crate::error::{GraphProblem, RegistryError};
use crate::registry::WorkflowRegistry;

/// Check the registry for inconsistencies.
///
/// `registered` is the set of identifiers with at least one dispatcher
/// subscriber by the time startup completes; declared identifiers without a
/// subscriber would silently drop messages, so they fail validation too.
///
/// Each check is independent and all problems are reported:
/// - no two workflow definitions share an identifier
/// - no two subscription bindings share a (topic, subscription) pair
/// - every delegate target resolves to a real workflow definition
/// - every workflow identifier and handler identifier is registered
pub fn validate(registry: &WorkflowRegistry, registered: &HashSet<String>) -> Vec<GraphProblem> {
  let mut problems = Vec::new();

  let mut seen_workflows = HashSet::new();
  for def in registry.workflows() {
    if !seen_workflows.insert(def.identifier.as_str()) {
      problems.push(GraphProblem::DuplicateWorkflow {
        identifier: def.identifier.clone(),
      });
    }
  }

  let mut seen_subscriptions = HashSet::new();
  for binding in registry.subscriptions() {
    if !seen_subscriptions.insert((binding.topic.as_str(), binding.subscription.as_str())) {
      problems.push(GraphProblem::DuplicateSubscription {
        topic: binding.topic.clone(),
        subscription: binding.subscription.clone(),
      });
    }
  }

  for def in registry.workflows() {
    for handler in &def.handlers {
      for delegate in &handler.delegate_workflow {
        if registry.lookup(delegate).is_none() {
          problems.push(GraphProblem::DanglingDelegate {
            workflow: def.identifier.clone(),
            handler: handler.identifier.clone(),
            delegate: delegate.clone(),
          });
        }
      }
    }
  }

  let mut reported = HashSet::new();
  for def in registry.workflows() {
    if !registered.contains(&def.identifier) && reported.insert(def.identifier.clone()) {
      problems.push(GraphProblem::UnregisteredWorkflow {
        identifier: def.identifier.clone(),
      });
    }
    for handler in &def.handlers {
      if !registered.contains(&handler.identifier) && reported.insert(handler.identifier.clone()) {
        problems.push(GraphProblem::UnregisteredHandler {
          identifier: handler.identifier.clone(),
        });
      }
    }
  }

  problems
}

impl WorkflowRegistry {
  /// Validate and fail with [`RegistryError::InvalidGraph`] on any problem.
  pub fn ensure_valid(&self, registered: &HashSet<String>) -> Result<(), RegistryError> {
    let problems = validate(self, registered);
    if problems.is_empty() {
      Ok(())
    } else {
      Err(RegistryError::InvalidGraph { problems })
    }
  }
}
