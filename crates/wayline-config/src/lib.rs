//! Wayline Config
//!
//! This crate contains the serializable workflow configuration types for
//! Wayline. These types represent the declarative workflow graph before it
//! is loaded and locked by the registry.
//!
//! Configuration can be loaded from:
//! - JSON files (via CLI with `wayline serve --config=workflows.json`)
//! - Database storage (as JSON blobs)
//!
//! The registry takes these configuration types, validates the graph, and
//! locks them into an immutable structure the orchestrator dispatches
//! against.

mod enums;
mod handler;
mod subscription;
mod workflow;

pub use enums::WorkflowKind;
pub use handler::HandlerDef;
pub use subscription::SubscriptionDef;
pub use workflow::{WorkflowConfig, WorkflowDef};
