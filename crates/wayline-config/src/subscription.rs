use serde::{Deserialize, Serialize};

/// A broker subscription binding.
///
/// Each binding produces one live bus subscription for the process
/// lifetime. No (topic, subscription) pair may appear twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionDef {
  pub topic: String,
  pub subscription: String,
}
