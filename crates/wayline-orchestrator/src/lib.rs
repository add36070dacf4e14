//! Wayline Orchestrator
//!
//! This crate provides the orchestration core for Wayline: it decides when
//! each pipeline stage runs, what happens next on success or failure, and
//! keeps redelivered bus messages safe through the ledger. The heavy data
//! transformation happens in external workers; this crate only routes and
//! books.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     SubscriptionManager                     │
//! │  - one bus subscription per configured (topic, sub) pair    │
//! │  - decodes inbound payloads, routes by workflow kind to     │
//! │    ledger logging, then emits through the dispatcher        │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       EventDispatcher                       │
//! │  - identifier -> subscriber list, fixed at startup          │
//! │  - awaits every subscriber, catches and logs its failure    │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                         │
//! │  - trigger_workflow / delegate_workflow_handlers /          │
//! │    delegate_workflow_if_any / publish_message               │
//! │  - the only API stage implementations call into             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no explicit per-run state object: a run's position is
//! reconstructed from the ledger's latest record plus the externally-owned
//! job status.

mod dispatcher;
mod error;
mod orchestrator;
mod subscriptions;

pub use dispatcher::{DelegationContext, EventDispatcher, StageSubscriber};
pub use error::{OrchestratorError, StageError};
pub use orchestrator::Orchestrator;
pub use subscriptions::SubscriptionManager;
