//! Wayline Registry
//!
//! This crate provides the locked workflow registry for Wayline. A locked
//! registry is the validated, immutable form of a workflow configuration
//! that the orchestrator dispatches against.
//!
//! Key differences from `wayline-config`:
//! - Workflow identifiers are indexed for lookup
//! - Delegate targets are resolvable (checked by the validator)
//! - Read-only after load; safe for concurrent readers
//!
//! A non-empty problem list from [`validate`] is fatal at startup: the
//! process must exit rather than run with a broken graph, since silently
//! mis-routing a dataset pipeline is worse than an outage.

mod error;
mod registry;
mod validate;

pub use error::{GraphProblem, RegistryError};
pub use registry::WorkflowRegistry;
pub use validate::validate;
