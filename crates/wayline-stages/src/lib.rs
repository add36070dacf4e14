//! Wayline Stages
//!
//! This crate provides the stage layer that sits on top of the
//! orchestrator: generic trigger-side and response-side stages, the
//! binding handlers they hand off to, and the minimal collaborator seams
//! (jobs, datasets) the pipeline needs.
//!
//! Concrete pipelines are configuration plus these types. The
//! content-specific work (how validation or format conversion actually
//! happens) lives in external workers reached over the bus, never here.
//!
//! A stage is a pair of workflows:
//! - the trigger workflow's [`RequestStage`] hands the composed request to
//!   its handler bindings (typically a [`PublishHandler`] that puts it on
//!   the worker's request topic);
//! - the handler workflow's [`ResponseStage`] reads the worker's reply,
//!   marks the job failed on an unsuccessful reply, and otherwise hands
//!   off to its bindings, which update job/dataset state and advance the
//!   run to the next stage(s).

mod datasets;
mod error;
mod handlers;
mod jobs;
mod register;
mod request;
mod response;

pub use datasets::{DatasetService, DatasetStatus, MemoryDatasetService};
pub use error::CollaboratorError;
pub use handlers::{
  DatasetStatusHandler, JobStatusHandler, PublishHandler, PUBLISH_MESSAGE, UPDATE_DATASET_STATUS,
  UPDATE_JOB_STATUS,
};
pub use jobs::{Job, JobService, JobStatus, MemoryJobService};
pub use register::register_default_stages;
pub use request::RequestStage;
pub use response::ResponseStage;
