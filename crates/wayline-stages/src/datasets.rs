//! Dataset collaborator seam.
//!
//! Datasets are externally persisted; the orchestrator only drives their
//! status transitions, keyed by the dataset id carried inside message
//! payloads.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Publication status of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
  Draft,
  PreRelease,
  Publish,
}

/// Status-transition contract against the external dataset store.
#[async_trait]
pub trait DatasetService: Send + Sync {
  async fn status(&self, dataset_id: &str) -> Result<Option<DatasetStatus>, CollaboratorError>;

  async fn set_status(
    &self,
    dataset_id: &str,
    status: DatasetStatus,
  ) -> Result<(), CollaboratorError>;
}

/// In-memory dataset store for tests and local runs.
#[derive(Default)]
pub struct MemoryDatasetService {
  datasets: RwLock<HashMap<String, DatasetStatus>>,
}

impl MemoryDatasetService {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl DatasetService for MemoryDatasetService {
  async fn status(&self, dataset_id: &str) -> Result<Option<DatasetStatus>, CollaboratorError> {
    let datasets = self.datasets.read().expect("dataset store lock poisoned");
    Ok(datasets.get(dataset_id).copied())
  }

  async fn set_status(
    &self,
    dataset_id: &str,
    status: DatasetStatus,
  ) -> Result<(), CollaboratorError> {
    let mut datasets = self.datasets.write().expect("dataset store lock poisoned");
    datasets.insert(dataset_id.to_string(), status);
    Ok(())
  }
}
