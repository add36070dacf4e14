//! Job collaborator seam.
//!
//! Jobs are externally owned; the orchestrator only reads and writes the
//! few fields it needs, keyed by job id (which equals the message
//! reference id). The in-memory implementation backs tests and local runs;
//! deployments substitute a persistent one behind the same trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CollaboratorError;

/// Status of an ingestion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
  Running,
  Completed,
  Failed,
}

/// A job as the orchestrator sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
  pub job_id: String,
  pub status: JobStatus,
  pub message: Option<String>,
  pub response: Option<serde_json::Value>,
  pub download_url: Option<String>,
  pub updated_at: DateTime<Utc>,
}

impl Job {
  fn new(job_id: &str) -> Self {
    Self {
      job_id: job_id.to_string(),
      status: JobStatus::Running,
      message: None,
      response: None,
      download_url: None,
      updated_at: Utc::now(),
    }
  }
}

/// Read/write contract against the external job store.
#[async_trait]
pub trait JobService: Send + Sync {
  async fn get(&self, job_id: &str) -> Result<Option<Job>, CollaboratorError>;

  /// Set the job's status and, when present, its status message.
  async fn update_status(
    &self,
    job_id: &str,
    status: JobStatus,
    message: Option<String>,
  ) -> Result<(), CollaboratorError>;

  /// Attach the latest stage response properties to the job.
  async fn set_response(
    &self,
    job_id: &str,
    response: serde_json::Value,
  ) -> Result<(), CollaboratorError>;

  /// Record where the processed artifact can be downloaded from.
  async fn set_download_url(&self, job_id: &str, url: String) -> Result<(), CollaboratorError>;
}

/// In-memory job store. Writes upsert, since the API layer that owns job
/// creation in real deployments is absent here.
#[derive(Default)]
pub struct MemoryJobService {
  jobs: RwLock<HashMap<String, Job>>,
}

impl MemoryJobService {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl JobService for MemoryJobService {
  async fn get(&self, job_id: &str) -> Result<Option<Job>, CollaboratorError> {
    let jobs = self.jobs.read().expect("job store lock poisoned");
    Ok(jobs.get(job_id).cloned())
  }

  async fn update_status(
    &self,
    job_id: &str,
    status: JobStatus,
    message: Option<String>,
  ) -> Result<(), CollaboratorError> {
    let mut jobs = self.jobs.write().expect("job store lock poisoned");
    let job = jobs
      .entry(job_id.to_string())
      .or_insert_with(|| Job::new(job_id));
    job.status = status;
    if message.is_some() {
      job.message = message;
    }
    job.updated_at = Utc::now();
    Ok(())
  }

  async fn set_response(
    &self,
    job_id: &str,
    response: serde_json::Value,
  ) -> Result<(), CollaboratorError> {
    let mut jobs = self.jobs.write().expect("job store lock poisoned");
    let job = jobs
      .entry(job_id.to_string())
      .or_insert_with(|| Job::new(job_id));
    job.response = Some(response);
    job.updated_at = Utc::now();
    Ok(())
  }

  async fn set_download_url(&self, job_id: &str, url: String) -> Result<(), CollaboratorError> {
    let mut jobs = self.jobs.write().expect("job store lock poisoned");
    let job = jobs
      .entry(job_id.to_string())
      .or_insert_with(|| Job::new(job_id));
    job.download_url = Some(url);
    job.updated_at = Utc::now();
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_update_status_upserts() {
    let jobs = MemoryJobService::new();
    assert!(jobs.get("42").await.unwrap().is_none());

    jobs
      .update_status("42", JobStatus::Running, Some("validating".to_string()))
      .await
      .unwrap();

    let job = jobs.get("42").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Running);
    assert_eq!(job.message.as_deref(), Some("validating"));
  }

  #[tokio::test]
  async fn test_status_update_without_message_keeps_previous() {
    let jobs = MemoryJobService::new();
    jobs
      .update_status("42", JobStatus::Running, Some("validating".to_string()))
      .await
      .unwrap();
    jobs.update_status("42", JobStatus::Completed, None).await.unwrap();

    let job = jobs.get("42").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.message.as_deref(), Some("validating"));
  }
}
